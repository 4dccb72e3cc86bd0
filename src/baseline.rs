//! Dirty tracking for edited collections.
//!
//! A baseline is the last accepted copy of a collection plus its content
//! signature. It is only ever compared against, never restored from.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Content signature of a collection: its canonical JSON text.
pub fn signature<T: Serialize>(entries: &[T]) -> Option<String> {
    match serde_json::to_string(entries) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(error = %err, "Failed to compute collection signature");
            None
        }
    }
}

/// How the baseline copy was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    Structured,
    JsonRoundTrip,
    /// Per-entry copy that skips entries which could not be copied.
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct Baseline<T> {
    pub entries: Vec<T>,
    pub signature: Option<String>,
    pub ready: bool,
    pub copy_mode: CopyMode,
}

#[derive(Debug, Clone)]
pub struct ChangeTracker<T> {
    baseline: Option<Baseline<T>>,
}

impl<T> Default for ChangeTracker<T> {
    fn default() -> Self {
        Self { baseline: None }
    }
}

impl<T> ChangeTracker<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `entries` as the accepted state. Never fails: copy problems
    /// degrade to a weaker copy and are logged.
    pub fn capture_baseline(&mut self, entries: &[T], ready: bool) {
        let (copy, copy_mode) = copy_entries(entries);
        debug!(count = copy.len(), ?copy_mode, ready, "Captured baseline");
        self.baseline = Some(Baseline {
            signature: signature(entries),
            entries: copy,
            ready,
            copy_mode,
        });
    }

    pub fn baseline(&self) -> Option<&Baseline<T>> {
        self.baseline.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.baseline.as_ref().is_some_and(|b| b.ready)
    }

    pub fn reset(&mut self) {
        self.baseline = None;
    }

    /// True when `live` no longer matches the accepted state. A tracker that
    /// is not ready reports no changes; a signature that cannot be computed
    /// counts as changed.
    pub fn has_unsaved_changes(&self, live: &[T]) -> bool {
        let Some(baseline) = self.baseline.as_ref().filter(|b| b.ready) else {
            return false;
        };
        match (&baseline.signature, signature(live)) {
            (Some(accepted), Some(current)) => *accepted != current,
            _ => true,
        }
    }
}

fn copy_entries<T>(entries: &[T]) -> (Vec<T>, CopyMode)
where
    T: Clone + Serialize + DeserializeOwned,
{
    match catch_unwind(AssertUnwindSafe(|| entries.to_vec())) {
        Ok(copy) => return (copy, CopyMode::Structured),
        Err(_) => warn!("Structured copy of baseline failed, trying JSON round-trip"),
    }

    let round_trip = serde_json::to_value(entries).and_then(serde_json::from_value::<Vec<T>>);
    match round_trip {
        Ok(copy) => return (copy, CopyMode::JsonRoundTrip),
        Err(err) => warn!(error = %err, "JSON copy of baseline failed, copying entries individually"),
    }

    let copy = entries
        .iter()
        .filter_map(|entry| catch_unwind(AssertUnwindSafe(|| entry.clone())).ok())
        .collect();
    (copy, CopyMode::BestEffort)
}
