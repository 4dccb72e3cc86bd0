use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::status::{normalize_key, resolve_status, AssignmentStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Internal,
    External,
}

/// One team leader in an event's roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlProfile {
    pub id: String,
    pub name: String,
    pub phonetic: String,
    pub grade: String,
    pub faculty: String,
    pub department: String,
    pub email: String,
    pub club: String,
    pub source_type: SourceType,
}

pub type Roster = BTreeMap<String, GlProfile>;

/// Canonical assignment of one team leader: a fallback applied to every
/// schedule plus per-schedule overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentEntry {
    pub fallback: Option<AssignmentStatus>,
    pub schedules: BTreeMap<String, AssignmentStatus>,
}

impl AssignmentEntry {
    /// Effective status for `schedule_id`: the schedule override when present,
    /// otherwise the fallback.
    pub fn resolve(&self, schedule_id: &str) -> Option<&AssignmentStatus> {
        self.schedules
            .get(schedule_id)
            .or(self.fallback.as_ref())
    }

    fn is_empty(&self) -> bool {
        self.fallback.is_none() && self.schedules.is_empty()
    }
}

pub type AssignmentMap = BTreeMap<String, AssignmentEntry>;

/// Field names of a status record that are never schedule ids.
const RESERVED_FIELDS: &[&str] = &[
    "status",
    "teamId",
    "team_id",
    "team",
    "schedules",
    "source",
    "note",
    "createdAt",
    "updatedAt",
    "updatedBy",
    "updatedByUid",
    "updatedByName",
];

fn string_field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(Value::as_str)
}

fn text_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Team ids may be stored as strings or numbers.
fn team_id_field(map: &Map<String, Value>) -> Option<String> {
    ["teamId", "team_id", "team"]
        .into_iter()
        .map(|key| text_field(map, key))
        .find(|id| !id.is_empty())
}

fn status_of(record: &Value) -> Option<AssignmentStatus> {
    let map = record.as_object()?;
    resolve_status(string_field(map, &["status"]), team_id_field(map).as_deref())
}

/// Normalizes a raw roster, keyed by GL id or given as an array of records
/// carrying their own `id`. Records that are not objects or have no id are
/// skipped.
pub fn normalize_roster(raw: Option<&Value>) -> Roster {
    let records: Vec<(Option<&str>, &Value)> = match raw {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (Some(k.as_str()), v)).collect(),
        Some(Value::Array(items)) => items.iter().map(|v| (None, v)).collect(),
        _ => return Roster::new(),
    };

    let mut roster = Roster::new();
    for (key, value) in records {
        let Some(map) = value.as_object() else {
            debug!(?key, "Skipping non-object roster record");
            continue;
        };
        let id = key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| text_field(map, "id"));
        if id.is_empty() {
            debug!("Skipping roster record without id");
            continue;
        }
        let source_type = match string_field(map, &["sourceType"]).map(normalize_key).as_deref() {
            Some("external") => SourceType::External,
            _ => SourceType::Internal,
        };
        roster.insert(
            id.clone(),
            GlProfile {
                id,
                name: text_field(map, "name"),
                phonetic: text_field(map, "phonetic"),
                grade: text_field(map, "grade"),
                faculty: text_field(map, "faculty"),
                department: text_field(map, "department"),
                email: text_field(map, "email"),
                club: text_field(map, "club"),
                source_type,
            },
        );
    }
    roster
}

/// One top-level entry of a raw assignments payload, after shape detection.
#[derive(Debug)]
enum RawAssignmentEntry<'a> {
    /// Keyed by GL id. Carries a fallback, sibling keys holding schedule
    /// overrides, and an optional explicit `schedules` sub-map.
    Legacy {
        gl_id: &'a str,
        fallback: Option<AssignmentStatus>,
        siblings: Vec<(&'a str, AssignmentStatus)>,
        explicit: Vec<(&'a str, AssignmentStatus)>,
    },
    /// Keyed by schedule id, mapping GL id to status.
    Scheduled {
        schedule_id: &'a str,
        records: Vec<(&'a str, AssignmentStatus)>,
    },
}

impl<'a> RawAssignmentEntry<'a> {
    /// A record is a GL record when it yields a fallback status or carries an
    /// explicit `schedules` sub-map; anything else is read as a schedule
    /// bucket. Unusable inner records are dropped here.
    fn parse(key: &'a str, value: &'a Value) -> Option<Self> {
        let map = value.as_object()?;
        let fallback = status_of(value);
        let explicit_map = map.get("schedules").and_then(Value::as_object);

        if fallback.is_some() || explicit_map.is_some() {
            let siblings = map
                .iter()
                .filter(|(k, _)| !RESERVED_FIELDS.contains(&k.as_str()))
                .filter_map(|(k, v)| status_of(v).map(|s| (k.as_str(), s)))
                .collect();
            let explicit = explicit_map
                .into_iter()
                .flatten()
                .filter_map(|(k, v)| status_of(v).map(|s| (k.as_str(), s)))
                .collect();
            return Some(Self::Legacy {
                gl_id: key,
                fallback,
                siblings,
                explicit,
            });
        }

        let records: Vec<_> = map
            .iter()
            .filter_map(|(k, v)| status_of(v).map(|s| (k.as_str(), s)))
            .collect();
        if records.is_empty() {
            return None;
        }
        Some(Self::Scheduled {
            schedule_id: key,
            records,
        })
    }
}

/// Normalizes a raw assignments payload into one entry per GL id.
///
/// Legacy and schedule-keyed shapes may be mixed in a single payload. When
/// several sources name the same (GL, schedule) pair, an explicit
/// `schedules` sub-map entry beats a schedule-keyed bucket, which beats a
/// legacy sibling key. Entries that end up with no status are dropped.
pub fn normalize_assignments(raw: Option<&Value>) -> AssignmentMap {
    let Some(Value::Object(top)) = raw else {
        return AssignmentMap::new();
    };

    let parsed: Vec<RawAssignmentEntry<'_>> = top
        .iter()
        .filter_map(|(key, value)| {
            let entry = RawAssignmentEntry::parse(key, value);
            if entry.is_none() {
                debug!(key = %key, "Skipping unusable assignment record");
            }
            entry
        })
        .collect();

    let mut result = AssignmentMap::new();

    for entry in &parsed {
        if let RawAssignmentEntry::Legacy {
            gl_id,
            fallback,
            siblings,
            ..
        } = entry
        {
            let target = result.entry(gl_id.to_string()).or_default();
            target.fallback = fallback.clone();
            for (schedule_id, status) in siblings {
                target.schedules.insert(schedule_id.to_string(), status.clone());
            }
        }
    }

    for entry in &parsed {
        if let RawAssignmentEntry::Scheduled {
            schedule_id,
            records,
        } = entry
        {
            for (gl_id, status) in records {
                result
                    .entry(gl_id.to_string())
                    .or_default()
                    .schedules
                    .insert(schedule_id.to_string(), status.clone());
            }
        }
    }

    for entry in &parsed {
        if let RawAssignmentEntry::Legacy {
            gl_id, explicit, ..
        } = entry
        {
            let target = result.entry(gl_id.to_string()).or_default();
            for (schedule_id, status) in explicit {
                target.schedules.insert(schedule_id.to_string(), status.clone());
            }
        }
    }

    result.retain(|_, entry| !entry.is_empty());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn team(id: &str) -> AssignmentStatus {
        AssignmentStatus::Team(id.to_string())
    }

    #[test]
    fn test_roster_from_object_and_array() {
        let roster = normalize_roster(Some(&json!({
            "g1": {"name": " 田中 ", "faculty": "工学部", "grade": 2, "sourceType": "EXTERNAL"},
            "g2": "not a record"
        })));
        assert_eq!(roster.len(), 1);
        let g1 = &roster["g1"];
        assert_eq!(g1.name, "田中");
        assert_eq!(g1.grade, "2");
        assert_eq!(g1.source_type, SourceType::External);

        let roster = normalize_roster(Some(&json!([{"id": "g3", "name": "佐藤"}, {"name": "no id"}])));
        assert_eq!(roster.keys().collect::<Vec<_>>(), vec!["g3"]);
    }

    #[test]
    fn test_legacy_record_with_sibling_overrides() {
        let map = normalize_assignments(Some(&json!({
            "g1": {"status": "team", "teamId": "A", "S2": {"status": "欠席"}, "updatedAt": 5}
        })));
        let g1 = &map["g1"];
        assert_eq!(g1.fallback, Some(team("A")));
        assert_eq!(g1.schedules.get("S2"), Some(&AssignmentStatus::Absent));
        assert_eq!(g1.schedules.len(), 1);
    }

    #[test]
    fn test_scheduled_shape() {
        let map = normalize_assignments(Some(&json!({
            "S1": {"g1": {"status": "staff"}, "g2": {"teamId": "B"}}
        })));
        assert_eq!(map["g1"].resolve("S1"), Some(&AssignmentStatus::Staff));
        assert_eq!(map["g2"].resolve("S1"), Some(&team("B")));
        assert_eq!(map["g2"].resolve("S9"), None);
    }

    #[test]
    fn test_explicit_sub_map_wins_over_sibling() {
        let map = normalize_assignments(Some(&json!({
            "g1": {
                "status": "staff",
                "S1": {"status": "absent"},
                "schedules": {"S1": {"teamId": "C"}}
            }
        })));
        assert_eq!(map["g1"].resolve("S1"), Some(&team("C")));
        assert_eq!(map["g1"].resolve("S2"), Some(&AssignmentStatus::Staff));
    }

    #[test]
    fn test_mixed_shapes_merge_without_loss() {
        let map = normalize_assignments(Some(&json!({
            "g1": {"status": "absent"},
            "S1": {"g1": {"teamId": "A"}, "g2": {"status": "運営"}}
        })));
        assert_eq!(map["g1"].fallback, Some(AssignmentStatus::Absent));
        assert_eq!(map["g1"].resolve("S1"), Some(&team("A")));
        assert_eq!(map["g2"].resolve("S1"), Some(&AssignmentStatus::Staff));
    }

    #[test]
    fn test_records_without_status_are_dropped() {
        let map = normalize_assignments(Some(&json!({
            "g1": {"status": "team", "teamId": ""},
            "g2": {"schedules": {}},
            "g3": 42,
            "S1": {"g4": {"status": "team"}}
        })));
        assert!(map.is_empty());
    }

    #[test]
    fn test_no_status_outside_closed_set() {
        let map = normalize_assignments(Some(&json!({
            "g1": {"status": "team", "teamId": "A", "S1": {"status": "mystery"}, "S2": {"teamId": " "}},
            "S3": {"g2": {"status": "??"}, "g3": {"status": "ＳＴＡＦＦ"}}
        })));
        for entry in map.values() {
            let statuses = entry.fallback.iter().chain(entry.schedules.values());
            for status in statuses {
                if let AssignmentStatus::Team(id) = status {
                    assert!(!id.is_empty());
                }
            }
        }
        assert_eq!(map["g1"].schedules.len(), 0);
        assert_eq!(map["g3"].resolve("S3"), Some(&AssignmentStatus::Staff));
        assert!(!map.contains_key("g2"));
    }

    #[test]
    fn test_numeric_team_ids() {
        let map = normalize_assignments(Some(&json!({
            "g1": {"status": "team", "teamId": 3},
            "S1": {"g2": {"teamId": 7}}
        })));
        assert_eq!(map["g1"].fallback, Some(team("3")));
        assert_eq!(map["g2"].resolve("S1"), Some(&team("7")));
    }

    #[test]
    fn test_bucket_beats_sibling_key() {
        let map = normalize_assignments(Some(&json!({
            "g1": {"status": "staff", "S1": {"status": "absent"}},
            "S1": {"g1": {"teamId": "B"}}
        })));
        assert_eq!(map["g1"].resolve("S1"), Some(&team("B")));
        assert_eq!(map["g1"].resolve("S2"), Some(&AssignmentStatus::Staff));
    }

    #[test]
    fn test_override_beats_fallback() {
        let map = normalize_assignments(Some(&json!({
            "g1": {"status": "absent", "schedules": {"S1": {"status": "staff"}}}
        })));
        assert_eq!(map["g1"].resolve("S1"), Some(&AssignmentStatus::Staff));
        assert_eq!(map["g1"].resolve("S2"), Some(&AssignmentStatus::Absent));
    }
}
