use crate::roster::GroupLeader;
use crate::selection::SessionState;

/// Formats a leader as `name (meta)`, or just the name when there is no meta.
pub fn format_leader(leader: &GroupLeader) -> String {
    if leader.meta.is_empty() {
        leader.name.clone()
    } else {
        format!("{} ({})", leader.name, leader.meta)
    }
}

/// Prints the leaders of one group in a readable format
pub fn print_group_leaders(group: &str, schedule_id: Option<&str>, leaders: &[GroupLeader]) {
    match schedule_id {
        Some(schedule) => println!("\n=== {} @ {} ===", group, schedule),
        None => println!("\n=== {} ===", group),
    }
    if leaders.is_empty() {
        println!("  [EMPTY]");
        return;
    }
    for (i, leader) in leaders.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, format_leader(leader));
    }
    println!("Total: {}", leaders.len());
}

/// One-line summary of the current selection.
pub fn selection_summary(state: &SessionState) -> String {
    let event = state
        .selected_event()
        .map(|e| e.name.clone())
        .or_else(|| state.selected_event_id.clone())
        .unwrap_or_else(|| "-".to_string());
    let schedule = match state.effective_schedule() {
        Some(view) if view.synthesized => format!("{} (placeholder)", view.label),
        Some(view) => view.label,
        None => "-".to_string(),
    };
    format!("event: {event} / schedule: {schedule}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_leader() {
        let mut leader = GroupLeader {
            id: "g1".to_string(),
            name: "田中".to_string(),
            meta: "欠席".to_string(),
        };
        assert_eq!(format_leader(&leader), "田中 (欠席)");
        leader.meta.clear();
        assert_eq!(format_leader(&leader), "田中");
    }

    #[test]
    fn test_selection_summary_empty() {
        assert_eq!(selection_summary(&SessionState::default()), "event: - / schedule: -");
    }
}
