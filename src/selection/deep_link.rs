use actix_web::web::Query;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::parse_timestamp_str;

/// Panel a deep link asks the console to focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusTarget {
    Events,
    Schedules,
    Participants,
}

impl FocusTarget {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "events" => Some(Self::Events),
            "schedules" => Some(Self::Schedules),
            "participants" => Some(Self::Participants),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeepLinkParams {
    event_id: Option<String>,
    schedule_id: Option<String>,
    event_label: Option<String>,
    schedule_label: Option<String>,
    location: Option<String>,
    start_at: Option<String>,
    end_at: Option<String>,
    focus: Option<String>,
}

/// Selection requested by the URL the console was opened with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepLink {
    pub event_id: String,
    pub schedule_id: Option<String>,
    pub event_label: Option<String>,
    pub schedule_label: Option<String>,
    pub location: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub focus: Option<FocusTarget>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl DeepLink {
    pub fn new(event_id: impl Into<String>, schedule_id: Option<&str>) -> Self {
        Self {
            event_id: event_id.into(),
            schedule_id: schedule_id.map(str::to_string),
            event_label: None,
            schedule_label: None,
            location: None,
            start_at: None,
            end_at: None,
            focus: None,
        }
    }

    /// Parses a query string such as `?eventId=E1&scheduleId=S9`. Returns
    /// `None` when no event id is present or the query is malformed. Unknown
    /// focus values are ignored.
    pub fn from_query(query: &str) -> Option<Self> {
        let query = query.trim_start_matches('?');
        let params = match Query::<DeepLinkParams>::from_query(query) {
            Ok(params) => params.into_inner(),
            Err(err) => {
                debug!(error = %err, "Ignoring malformed deep link");
                return None;
            }
        };

        let event_id = non_empty(params.event_id)?;
        Some(Self {
            event_id,
            schedule_id: non_empty(params.schedule_id),
            event_label: non_empty(params.event_label),
            schedule_label: non_empty(params.schedule_label),
            location: non_empty(params.location),
            start_at: params.start_at.as_deref().and_then(parse_timestamp_str),
            end_at: params.end_at.as_deref().and_then(parse_timestamp_str),
            focus: params.focus.as_deref().and_then(FocusTarget::parse),
        })
    }

    /// Name used when telling the admin the event could not be found.
    pub fn event_display_name(&self) -> &str {
        self.event_label.as_deref().unwrap_or(&self.event_id)
    }
}
