use serde::{Deserialize, Serialize};

use super::normalize::{AssignmentMap, Roster};
use super::status::{natural_cmp, normalize_key, AssignmentStatus};
use crate::config::GroupConfig;

/// A team leader listed under a group, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLeader {
    pub id: String,
    pub name: String,
    pub meta: String,
}

/// Which assignments a group key selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSelector {
    /// Every absent leader.
    Cancellation,
    /// Every staff leader.
    Staff,
    /// Leaders assigned to the team with this normalized id.
    Team(String),
}

impl GroupSelector {
    pub fn from_key(group_key: &str, config: &GroupConfig) -> Self {
        let key = normalize_key(group_key);
        if key == normalize_key(&config.cancel_label) {
            Self::Cancellation
        } else if group_key.trim() == config.staff_key || key == normalize_key(&config.staff_label) {
            Self::Staff
        } else {
            Self::Team(key)
        }
    }

    pub fn matches(&self, status: &AssignmentStatus) -> bool {
        match (self, status) {
            (Self::Cancellation, AssignmentStatus::Absent) => true,
            (Self::Staff, AssignmentStatus::Staff) => true,
            (Self::Team(key), AssignmentStatus::Team(team_id)) => normalize_key(team_id) == *key,
            _ => false,
        }
    }
}

/// Lists the leaders whose effective status for `schedule_id` falls under
/// `group_key`, sorted by name in natural order.
pub fn collect_group_leaders(
    group_key: &str,
    roster: &Roster,
    assignments: &AssignmentMap,
    schedule_id: &str,
    config: &GroupConfig,
) -> Vec<GroupLeader> {
    let selector = GroupSelector::from_key(group_key, config);

    let mut leaders: Vec<GroupLeader> = assignments
        .iter()
        .filter_map(|(gl_id, entry)| {
            let status = entry.resolve(schedule_id)?;
            selector.matches(status).then(|| {
                let profile = roster.get(gl_id);
                let name = profile
                    .map(|p| p.name.as_str())
                    .filter(|n| !n.is_empty())
                    .unwrap_or(gl_id)
                    .to_string();
                let faculty = profile.map(|p| p.faculty.as_str()).unwrap_or_default();
                let department = profile.map(|p| p.department.as_str()).unwrap_or_default();
                GroupLeader {
                    id: gl_id.clone(),
                    name,
                    meta: leader_meta(status, faculty, department, config),
                }
            })
        })
        .collect();

    leaders.sort_by(|a, b| natural_cmp(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));
    leaders
}

/// Status label for absent/staff, then faculty, then department unless it
/// repeats the faculty.
fn leader_meta(status: &AssignmentStatus, faculty: &str, department: &str, config: &GroupConfig) -> String {
    let label = match status {
        AssignmentStatus::Absent => config.absent_meta.as_str(),
        AssignmentStatus::Staff => config.staff_meta.as_str(),
        AssignmentStatus::Team(_) => "",
    };
    let department = if department == faculty { "" } else { department };

    [label, faculty, department]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" / ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::normalize::{normalize_assignments, normalize_roster};
    use serde_json::json;

    fn config() -> GroupConfig {
        GroupConfig::default()
    }

    #[test]
    fn test_cancellation_group_selects_absent() {
        let roster = normalize_roster(Some(&json!({"g1": {"name": "田中"}})));
        let assignments = normalize_assignments(Some(&json!({"g1": {"status": "欠席"}})));

        let leaders = collect_group_leaders("キャンセル", &roster, &assignments, "", &config());
        assert_eq!(
            leaders,
            vec![GroupLeader {
                id: "g1".to_string(),
                name: "田中".to_string(),
                meta: "欠席".to_string(),
            }]
        );
    }

    #[test]
    fn test_staff_group_by_key_or_label() {
        let roster = normalize_roster(Some(&json!({
            "g1": {"name": "佐藤", "faculty": "理学部", "department": "理学部"}
        })));
        let assignments = normalize_assignments(Some(&json!({"g1": {"status": "staff"}})));

        for key in ["__staff", "運営"] {
            let leaders = collect_group_leaders(key, &roster, &assignments, "S1", &config());
            assert_eq!(leaders.len(), 1);
            assert_eq!(leaders[0].meta, "運営 / 理学部");
        }
    }

    #[test]
    fn test_team_group_uses_effective_status() {
        let roster = normalize_roster(Some(&json!({
            "g1": {"name": "班員10", "faculty": "工学部", "department": "情報工学科"},
            "g2": {"name": "班員2"},
            "g3": {"name": "班員1"}
        })));
        let assignments = normalize_assignments(Some(&json!({
            "g1": {"teamId": "A"},
            "g2": {"teamId": "Ａ"},
            "g3": {"teamId": "B", "S1": {"teamId": "a"}}
        })));

        let names: Vec<_> = collect_group_leaders("a", &roster, &assignments, "S1", &config())
            .into_iter()
            .map(|l| (l.name, l.meta))
            .collect();
        assert_eq!(
            names,
            vec![
                ("班員1".to_string(), String::new()),
                ("班員2".to_string(), String::new()),
                ("班員10".to_string(), "工学部 / 情報工学科".to_string()),
            ]
        );

        let other = collect_group_leaders("B", &roster, &assignments, "S2", &config());
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].id, "g3");
    }

    #[test]
    fn test_missing_profile_falls_back_to_id() {
        let assignments = normalize_assignments(Some(&json!({"g9": {"status": "absent"}})));
        let leaders = collect_group_leaders("キャンセル", &Roster::new(), &assignments, "", &config());
        assert_eq!(leaders[0].name, "g9");
    }
}
