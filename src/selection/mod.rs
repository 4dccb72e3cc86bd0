//! Event → schedule → participant selection for one admin session.
//!
//! `SessionState` is the explicit context shared by the load cycle and the
//! reconciler. Admin actions mutate it directly; `SelectionReconciler` repairs
//! it after every reload of the events collection.

pub mod deep_link;
pub mod reconciler;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{find_event, Event, Schedule};

pub use deep_link::{DeepLink, FocusTarget};
pub use reconciler::{ConsoleRenderer, FinalizeOptions, NoopRenderer, SelectionReconciler};

pub fn override_key(event_id: &str, schedule_id: &str) -> String {
    format!("{event_id}::{schedule_id}")
}

/// Placeholder for a schedule that is selected but absent from the fetched
/// event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOverride {
    pub event_id: String,
    pub event_name: String,
    pub schedule_id: String,
    pub schedule_label: String,
    pub location: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

impl ScheduleOverride {
    pub fn key(&self) -> String {
        override_key(&self.event_id, &self.schedule_id)
    }

    pub fn from_schedule(event: &Event, schedule: &Schedule) -> Self {
        Self {
            event_id: event.id.clone(),
            event_name: event.name.clone(),
            schedule_id: schedule.id.clone(),
            schedule_label: schedule.label.clone(),
            location: schedule.location.clone(),
            start_at: schedule.start_at,
            end_at: schedule.end_at,
        }
    }
}

/// The selected schedule as consumers render it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    pub id: String,
    pub label: String,
    pub location: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    /// True when rendered from an override rather than a fetched schedule.
    pub synthesized: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub events: Vec<Event>,
    pub selected_event_id: Option<String>,
    pub selected_schedule_id: Option<String>,
    pub selected_participant_id: Option<String>,
    pub overrides: BTreeMap<String, ScheduleOverride>,
    /// Deep link still waiting for a load that contains its event.
    pub pending_deep_link: Option<DeepLink>,
    pub focus: Option<FocusTarget>,
    /// Session-visible notice, such as a deep-linked event that is missing.
    pub notice: Option<String>,
    pub status_message: Option<String>,
    pub known_locations: BTreeSet<String>,
}

impl SessionState {
    pub fn new(deep_link: Option<DeepLink>) -> Self {
        Self {
            pending_deep_link: deep_link,
            ..Self::default()
        }
    }

    pub fn selected_event(&self) -> Option<&Event> {
        find_event(&self.events, self.selected_event_id.as_deref()?)
    }

    /// Selected schedule, from the fetched event or its override.
    pub fn effective_schedule(&self) -> Option<ScheduleView> {
        let event_id = self.selected_event_id.as_deref()?;
        let schedule_id = self.selected_schedule_id.as_deref()?;

        if let Some(schedule) = self.selected_event().and_then(|e| e.schedule(schedule_id)) {
            return Some(ScheduleView {
                id: schedule.id.clone(),
                label: schedule.label.clone(),
                location: schedule.location.clone(),
                start_at: schedule.start_at,
                end_at: schedule.end_at,
                synthesized: false,
            });
        }
        self.overrides
            .get(&override_key(event_id, schedule_id))
            .map(|o| ScheduleView {
                id: o.schedule_id.clone(),
                label: o.schedule_label.clone(),
                location: o.location.clone(),
                start_at: o.start_at,
                end_at: o.end_at,
                synthesized: true,
            })
    }

    /// Admin picks an event. Any pending deep link is abandoned.
    pub fn select_event(&mut self, event_id: Option<&str>) {
        self.abandon_deep_link();
        if self.selected_event_id.as_deref() != event_id {
            self.selected_schedule_id = None;
            self.selected_participant_id = None;
        }
        self.selected_event_id = event_id.map(str::to_string);
    }

    /// Admin picks a schedule of the selected event. Selecting a fetched
    /// schedule retires its override.
    pub fn select_schedule(&mut self, schedule_id: Option<&str>) {
        self.abandon_deep_link();
        if self.selected_schedule_id.as_deref() != schedule_id {
            self.selected_participant_id = None;
        }
        let retired = match (self.selected_event(), schedule_id) {
            (Some(event), Some(id)) if event.has_schedule(id) => Some(override_key(&event.id, id)),
            _ => None,
        };
        if let Some(key) = retired {
            if self.overrides.remove(&key).is_some() {
                debug!(key = %key, "Removed override for selected schedule");
            }
        }
        self.selected_schedule_id = schedule_id.map(str::to_string);
    }

    pub fn select_participant(&mut self, participant_id: Option<&str>) {
        self.abandon_deep_link();
        self.selected_participant_id = participant_id.map(str::to_string);
    }

    fn abandon_deep_link(&mut self) {
        if let Some(link) = self.pending_deep_link.take() {
            debug!(event = %link.event_id, "Manual selection replaces pending deep link");
        }
    }

    fn clear_selection(&mut self) {
        self.selected_event_id = None;
        self.selected_schedule_id = None;
        self.selected_participant_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> Event {
        Event {
            id: "E1".to_string(),
            name: "Open Campus".to_string(),
            schedules: vec![Schedule {
                id: "S1".to_string(),
                label: "Morning".to_string(),
                location: "Hall A".to_string(),
                start_at: None,
                end_at: None,
            }],
        }
    }

    #[test]
    fn test_manual_selection_consumes_deep_link() {
        let mut state = SessionState::new(Some(DeepLink::new("E9", None)));
        state.events = vec![event()];
        state.select_event(Some("E1"));
        assert!(state.pending_deep_link.is_none());
        assert_eq!(state.selected_event().map(|e| e.name.as_str()), Some("Open Campus"));
    }

    #[test]
    fn test_selecting_fetched_schedule_removes_override() {
        let mut state = SessionState::default();
        state.events = vec![event()];
        let stale = ScheduleOverride::from_schedule(&state.events[0], &state.events[0].schedules[0]);
        state.overrides.insert(stale.key(), stale);

        state.select_event(Some("E1"));
        state.select_schedule(Some("S1"));
        assert!(state.overrides.is_empty());
        let view = state.effective_schedule().unwrap();
        assert_eq!(view.label, "Morning");
        assert!(!view.synthesized);
    }

    #[test]
    fn test_effective_schedule_falls_back_to_override() {
        let mut state = SessionState::default();
        state.events = vec![event()];
        state.overrides.insert(
            override_key("E1", "S9"),
            ScheduleOverride {
                event_id: "E1".to_string(),
                event_name: "Open Campus".to_string(),
                schedule_id: "S9".to_string(),
                schedule_label: "Evening".to_string(),
                location: String::new(),
                start_at: None,
                end_at: None,
            },
        );
        state.select_event(Some("E1"));
        state.select_schedule(Some("S9"));
        let view = state.effective_schedule().unwrap();
        assert!(view.synthesized);
        assert_eq!(view.label, "Evening");
    }

    #[test]
    fn test_changing_event_clears_lower_levels() {
        let mut state = SessionState::default();
        state.events = vec![event()];
        state.select_event(Some("E1"));
        state.select_schedule(Some("S1"));
        state.select_participant(Some("p1"));
        state.select_event(Some("E2"));
        assert_eq!(state.selected_schedule_id, None);
        assert_eq!(state.selected_participant_id, None);
    }
}
