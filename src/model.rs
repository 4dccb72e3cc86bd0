//! Events, schedules and participants as read from the store.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub label: String,
    pub location: String,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub schedules: Vec<Schedule>,
}

impl Event {
    pub fn schedule(&self, schedule_id: &str) -> Option<&Schedule> {
        self.schedules.iter().find(|s| s.id == schedule_id)
    }

    pub fn has_schedule(&self, schedule_id: &str) -> bool {
        self.schedule(schedule_id).is_some()
    }
}

pub fn find_event<'a>(events: &'a [Event], event_id: &str) -> Option<&'a Event> {
    events.iter().find(|e| e.id == event_id)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    /// Identity of the CSV row the participant was imported from.
    #[serde(default)]
    pub row_key: Option<String>,
    #[serde(default, flatten)]
    pub profile: BTreeMap<String, Value>,
}

/// Accepts epoch milliseconds or an RFC 3339 string.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ms) = raw.parse::<i64>() {
        return Utc.timestamp_millis_opt(ms).single();
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn text(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Object collections are keyed by id; arrays carry the id in each record.
fn keyed_records(raw: Option<&Value>) -> Vec<(String, &Map<String, Value>)> {
    let pairs: Vec<(Option<&str>, &Value)> = match raw {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (Some(k.as_str()), v)).collect(),
        Some(Value::Array(items)) => items.iter().map(|v| (None, v)).collect(),
        _ => Vec::new(),
    };
    pairs
        .into_iter()
        .filter_map(|(key, value)| {
            let map = value.as_object()?;
            let id = key.map(str::to_string).unwrap_or_else(|| text(map, "id"));
            if id.trim().is_empty() {
                debug!("Skipping record without id");
                return None;
            }
            Some((id.trim().to_string(), map))
        })
        .collect()
}

fn parse_schedules(raw: Option<&Value>) -> Vec<Schedule> {
    let mut schedules: Vec<Schedule> = keyed_records(raw)
        .into_iter()
        .map(|(id, map)| Schedule {
            label: text(map, "label"),
            location: text(map, "location"),
            start_at: parse_timestamp(map.get("startAt")),
            end_at: parse_timestamp(map.get("endAt")),
            id,
        })
        .collect();
    // Undated schedules sort last.
    schedules.sort_by(|a, b| {
        match (a.start_at, b.start_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| a.id.cmp(&b.id))
    });
    schedules
}

/// Parses the events collection. Events are ordered by name, then id.
pub fn parse_events(raw: Option<&Value>) -> Vec<Event> {
    let mut events: Vec<Event> = keyed_records(raw)
        .into_iter()
        .map(|(id, map)| Event {
            name: text(map, "name"),
            schedules: parse_schedules(map.get("schedules")),
            id,
        })
        .collect();
    events.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    events
}

pub fn parse_participants(raw: Option<&Value>) -> Vec<Participant> {
    keyed_records(raw)
        .into_iter()
        .map(|(id, map)| {
            let mut profile: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let name = text(map, "name");
            let row_key = Some(text(map, "rowKey")).filter(|k| !k.is_empty());
            for key in ["id", "name", "rowKey"] {
                profile.remove(key);
            }
            Participant {
                id,
                name,
                row_key,
                profile,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_events_orders_schedules() {
        let events = parse_events(Some(&json!({
            "E1": {
                "name": "Open Campus",
                "schedules": {
                    "S2": {"label": "Afternoon", "location": "Hall B", "startAt": 1_700_003_600_000i64},
                    "S1": {"label": "Morning", "location": "Hall A", "startAt": "2023-11-14T22:13:20Z"},
                    "S3": {"label": "TBD"}
                }
            },
            "broken": 5
        })));
        assert_eq!(events.len(), 1);
        let ids: Vec<_> = events[0].schedules.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S3"]);
        assert!(events[0].has_schedule("S3"));
        assert_eq!(events[0].schedule("S2").unwrap().location, "Hall B");
    }

    #[test]
    fn test_parse_events_from_array() {
        let events = parse_events(Some(&json!([
            {"id": "E2", "name": "B"},
            {"id": "E1", "name": "A"},
            {"name": "no id"}
        ])));
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["E1", "E2"]);
        assert!(find_event(&events, "E2").is_some());
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp_str("0"),
            Utc.timestamp_millis_opt(0).single()
        );
        assert!(parse_timestamp_str("2024-05-01T09:00:00+09:00").is_some());
        assert_eq!(parse_timestamp_str("soon"), None);
        assert_eq!(parse_timestamp(Some(&json!(true))), None);
    }

    #[test]
    fn test_parse_participants_keeps_profile() {
        let participants = parse_participants(Some(&json!({
            "p1": {"name": "a", "rowKey": "r-1", "email": "a@example.com"}
        })));
        assert_eq!(participants[0].row_key.as_deref(), Some("r-1"));
        assert_eq!(participants[0].profile.get("email"), Some(&json!("a@example.com")));
        assert!(!participants[0].profile.contains_key("name"));
    }
}
