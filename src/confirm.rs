//! Single-flight yes/no confirmation.
//!
//! At most one confirmation is pending per session. A new request resolves
//! the pending one with `false` before its own dialog opens. The pending
//! confirmation owns one key listener registration, released on every exit
//! path before the outcome is delivered.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmTone {
    #[default]
    Primary,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    pub cancel_label: String,
    pub tone: ConfirmTone,
}

impl ConfirmRequest {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            confirm_label: "OK".to_string(),
            cancel_label: "Cancel".to_string(),
            tone: ConfirmTone::Primary,
        }
    }

    pub fn danger(mut self) -> Self {
        self.tone = ConfirmTone::Danger;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The dialog host: shows and hides the dialog and routes key presses to
/// [`ConfirmationDialog::handle_key`] while a listener is bound.
pub trait DialogSurface {
    fn open(&self, request: &ConfirmRequest);
    fn close(&self);
    fn bind_keys(&self, listener: ListenerId);
    fn unbind_keys(&self, listener: ListenerId);
}

/// Element holding keyboard focus when a key is pressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusedElement {
    pub tag: String,
    pub input_type: Option<String>,
    pub content_editable: bool,
}

impl FocusedElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn input(input_type: &str) -> Self {
        Self {
            tag: "input".to_string(),
            input_type: Some(input_type.to_string()),
            content_editable: false,
        }
    }

    /// True for elements that consume typed characters.
    pub fn is_text_entry(&self) -> bool {
        if self.content_editable {
            return true;
        }
        match self.tag.to_ascii_lowercase().as_str() {
            "textarea" | "select" => true,
            "input" => !matches!(
                self.input_type
                    .as_deref()
                    .map(str::to_ascii_lowercase)
                    .as_deref(),
                Some("button" | "checkbox" | "radio" | "submit" | "reset" | "range" | "color" | "file" | "image")
            ),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInput {
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
    pub focus: Option<FocusedElement>,
}

impl KeyInput {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn focused(mut self, element: FocusedElement) -> Self {
        self.focus = Some(element);
        self
    }

    fn has_modifier(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }

    fn in_text_entry(&self) -> bool {
        self.focus.as_ref().is_some_and(FocusedElement::is_text_entry)
    }
}

/// Why a confirmation settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Accepted,
    Cancelled,
    EscapeKey,
    DeclineKey,
    Superseded,
}

impl Resolution {
    pub fn outcome(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Outcome of one confirmation request. Resolves to `false` if the dialog
/// goes away without an answer.
#[must_use = "a confirmation does nothing unless awaited"]
pub struct Confirmation {
    rx: Option<oneshot::Receiver<bool>>,
}

impl Confirmation {
    fn declined() -> Self {
        Self { rx: None }
    }
}

impl Future for Confirmation {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        match self.rx.as_mut() {
            None => Poll::Ready(false),
            Some(rx) => Pin::new(rx).poll(cx).map(|r| r.unwrap_or(false)),
        }
    }
}

struct Pending {
    resolver: oneshot::Sender<bool>,
    listener: ListenerId,
}

#[derive(Default)]
struct DialogState {
    next_listener: u64,
    pending: Option<Pending>,
}

pub struct ConfirmationDialog<S> {
    surface: Option<S>,
    state: Mutex<DialogState>,
}

impl<S: DialogSurface> ConfirmationDialog<S> {
    pub fn new(surface: S) -> Self {
        Self::with_surface(Some(surface))
    }

    pub fn with_surface(surface: Option<S>) -> Self {
        Self {
            surface,
            state: Mutex::new(DialogState::default()),
        }
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Opens a dialog for `request`. Any pending confirmation is resolved
    /// with `false` first. Without a surface the request is declined.
    pub fn confirm(&self, request: ConfirmRequest) -> Confirmation {
        let Some(surface) = self.surface.as_ref() else {
            warn!(title = %request.title, "No dialog surface, declining confirmation");
            return Confirmation::declined();
        };

        let previous = self.state.lock().pending.take();
        if let Some(previous) = previous {
            self.finish(previous, Resolution::Superseded);
        }

        let (resolver, rx) = oneshot::channel();
        let listener = {
            let mut state = self.state.lock();
            let listener = ListenerId(state.next_listener);
            state.next_listener += 1;
            listener
        };

        surface.open(&request);
        surface.bind_keys(listener);
        self.state.lock().pending = Some(Pending { resolver, listener });
        debug!(title = %request.title, listener = listener.0, "Confirmation opened");
        Confirmation { rx: Some(rx) }
    }

    /// Accept button.
    pub fn accept(&self) -> bool {
        self.resolve(Resolution::Accepted)
    }

    /// Cancel button or dismissal of the dialog.
    pub fn cancel(&self) -> bool {
        self.resolve(Resolution::Cancelled)
    }

    /// Routes a key press. Escape always declines; `N` declines unless a
    /// text-entry element has focus or a modifier is held. Returns whether
    /// the key was consumed.
    pub fn handle_key(&self, key: &KeyInput) -> bool {
        let resolution = match key.key.as_str() {
            "Escape" | "Esc" => Resolution::EscapeKey,
            "n" | "N" if !key.has_modifier() && !key.in_text_entry() => Resolution::DeclineKey,
            _ => return false,
        };
        self.resolve(resolution)
    }

    fn resolve(&self, resolution: Resolution) -> bool {
        let pending = self.state.lock().pending.take();
        match pending {
            Some(pending) => {
                self.finish(pending, resolution);
                true
            }
            None => false,
        }
    }

    fn finish(&self, pending: Pending, resolution: Resolution) {
        if let Some(surface) = self.surface.as_ref() {
            surface.unbind_keys(pending.listener);
            surface.close();
        }
        info!(?resolution, listener = pending.listener.0, "Confirmation resolved");
        // The receiver may already be gone; the outcome is then unobserved.
        let _ = pending.resolver.send(resolution.outcome());
    }
}

impl<S> Drop for ConfirmationDialog<S> {
    fn drop(&mut self) {
        if let Some(pending) = self.state.get_mut().pending.take() {
            let _ = pending.resolver.send(false);
        }
    }
}
