use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use super::{override_key, DeepLink, ScheduleOverride, SessionState};
use crate::error::Result;
use crate::model::{find_event, parse_events, Event};
use crate::store::StoreReader;

/// Presentation callbacks. Implementations must tolerate redundant calls.
pub trait ConsoleRenderer {
    fn render_events(&self, state: &SessionState);
    fn render_schedules(&self, state: &SessionState);
    fn render_participants(&self, state: &SessionState, preserve_status: bool);
}

/// Renderer for headless sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRenderer;

impl ConsoleRenderer for NoopRenderer {
    fn render_events(&self, _state: &SessionState) {}
    fn render_schedules(&self, _state: &SessionState) {}
    fn render_participants(&self, _state: &SessionState, _preserve_status: bool) {}
}

#[derive(Debug, Clone, Default)]
pub struct FinalizeOptions {
    pub preserve_selection: bool,
    pub previous_event_id: Option<String>,
    pub previous_schedule_id: Option<String>,
    /// Events as they were before the reload, used to keep showing a
    /// schedule that was deleted mid-session.
    pub previous_events_snapshot: Option<Vec<Event>>,
    /// Leave the participant panel's status message untouched.
    pub preserve_status: bool,
}

pub struct SelectionReconciler<R> {
    renderer: R,
}

impl<R: ConsoleRenderer> SelectionReconciler<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Repairs the selection after `state.events` has been replaced, then
    /// re-renders. Takes the state exclusively, so passes never interleave.
    pub fn finalize_load(&self, state: &mut SessionState, options: FinalizeOptions) {
        if let Some(link) = state.pending_deep_link.clone() {
            apply_deep_link(state, &link);
        } else if options.preserve_selection {
            preserve_selection(state, &options);
        } else {
            state.clear_selection();
        }

        retire_fulfilled_overrides(state);
        state.known_locations = known_locations(state);

        debug!(
            event = ?state.selected_event_id,
            schedule = ?state.selected_schedule_id,
            overrides = state.overrides.len(),
            "Selection reconciled"
        );

        self.renderer.render_events(state);
        self.renderer.render_schedules(state);
        self.renderer.render_participants(state, options.preserve_status);
    }

    /// Re-reads the events collection and reconciles the selection against
    /// it. On failure the previous events and selection stay in place and a
    /// status message is set.
    pub async fn reload(
        &self,
        state: &mut SessionState,
        store: &dyn StoreReader,
        events_path: &str,
        preserve_status: bool,
    ) -> Result<()> {
        let raw = match store.fetch_value(events_path).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = events_path, error = %err, "Failed to reload events");
                state.status_message = Some(format!("Could not load events: {err}"));
                self.renderer.render_participants(state, false);
                return Err(err);
            }
        };

        let options = FinalizeOptions {
            preserve_selection: true,
            previous_event_id: state.selected_event_id.clone(),
            previous_schedule_id: state.selected_schedule_id.clone(),
            previous_events_snapshot: Some(std::mem::replace(&mut state.events, parse_events(raw.as_ref()))),
            preserve_status,
        };
        info!(events = state.events.len(), "Events reloaded");
        self.finalize_load(state, options);
        Ok(())
    }
}

fn apply_deep_link(state: &mut SessionState, link: &DeepLink) {
    let Some(event) = find_event(&state.events, &link.event_id).cloned() else {
        warn!(event = %link.event_id, "Deep-linked event not found, will retry on next load");
        state.clear_selection();
        state.notice = Some(format!(
            "Event \"{}\" from the link was not found",
            link.event_display_name()
        ));
        return;
    };

    state.selected_event_id = Some(event.id.clone());
    state.selected_participant_id = None;
    state.selected_schedule_id = link.schedule_id.clone();

    if let Some(schedule_id) = link.schedule_id.as_deref() {
        let key = override_key(&event.id, schedule_id);
        if event.has_schedule(schedule_id) {
            state.overrides.remove(&key);
        } else if !state.overrides.contains_key(&key) {
            debug!(key = %key, "Synthesizing override for deep-linked schedule");
            state.overrides.insert(
                key,
                ScheduleOverride {
                    event_id: event.id.clone(),
                    event_name: link.event_label.clone().unwrap_or_else(|| event.name.clone()),
                    schedule_id: schedule_id.to_string(),
                    schedule_label: link
                        .schedule_label
                        .clone()
                        .unwrap_or_else(|| schedule_id.to_string()),
                    location: link.location.clone().unwrap_or_default(),
                    start_at: link.start_at,
                    end_at: link.end_at,
                },
            );
        }
    }

    state.focus = link.focus;
    state.notice = None;
    state.pending_deep_link = None;
    info!(event = %event.id, schedule = ?link.schedule_id, "Applied deep link");
}

fn preserve_selection(state: &mut SessionState, options: &FinalizeOptions) {
    let Some(event) = options
        .previous_event_id
        .as_deref()
        .and_then(|id| find_event(&state.events, id))
        .cloned()
    else {
        state.clear_selection();
        return;
    };
    state.selected_event_id = Some(event.id.clone());

    let Some(schedule_id) = options.previous_schedule_id.as_deref() else {
        state.selected_schedule_id = None;
        state.selected_participant_id = None;
        return;
    };
    let key = override_key(&event.id, schedule_id);

    if event.has_schedule(schedule_id) {
        state.overrides.remove(&key);
        state.selected_schedule_id = Some(schedule_id.to_string());
        return;
    }

    let backfill = options
        .previous_events_snapshot
        .as_deref()
        .and_then(|events| find_event(events, &event.id))
        .and_then(|previous| {
            previous
                .schedule(schedule_id)
                .map(|s| ScheduleOverride::from_schedule(previous, s))
        });

    match backfill {
        Some(placeholder) => {
            debug!(key = %key, "Backfilled override for vanished schedule");
            state.overrides.entry(key).or_insert(placeholder);
            state.selected_schedule_id = Some(schedule_id.to_string());
        }
        None if state.overrides.contains_key(&key) => {
            state.selected_schedule_id = Some(schedule_id.to_string());
        }
        None => {
            debug!(schedule = schedule_id, "Previously selected schedule is gone");
            state.selected_schedule_id = None;
            state.selected_participant_id = None;
        }
    }
}

/// Drops overrides whose schedule now exists in the fetched events.
fn retire_fulfilled_overrides(state: &mut SessionState) {
    let events = &state.events;
    state.overrides.retain(|key, placeholder| {
        let fulfilled = find_event(events, &placeholder.event_id)
            .is_some_and(|e| e.has_schedule(&placeholder.schedule_id));
        if fulfilled {
            debug!(key = %key, "Retired override for fetched schedule");
        }
        !fulfilled
    });
}

fn known_locations(state: &SessionState) -> BTreeSet<String> {
    let canonical = state
        .events
        .iter()
        .flat_map(|e| e.schedules.iter().map(|s| s.location.as_str()));
    let synthesized = state.overrides.values().map(|o| o.location.as_str());
    canonical
        .chain(synthesized)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
