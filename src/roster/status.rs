use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Canonical assignment status of a team leader for one schedule.
///
/// `Team` always carries a non-empty team id; use [`AssignmentStatus::team`]
/// to build one from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "teamId", rename_all = "lowercase")]
pub enum AssignmentStatus {
    Team(String),
    Absent,
    Staff,
}

impl AssignmentStatus {
    pub fn team(team_id: &str) -> Option<Self> {
        let team_id = team_id.trim();
        (!team_id.is_empty()).then(|| Self::Team(team_id.to_string()))
    }

    pub fn team_id(&self) -> Option<&str> {
        match self {
            Self::Team(id) => Some(id),
            _ => None,
        }
    }

    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Team(_) => StatusKind::Team,
            Self::Absent => StatusKind::Absent,
            Self::Staff => StatusKind::Staff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Team,
    Absent,
    Staff,
}

const TEAM_SPELLINGS: &[&str] = &["team", "group", "班", "グループ"];
const ABSENT_SPELLINGS: &[&str] = &["absent", "cancel", "cancelled", "canceled", "欠席", "キャンセル"];
const STAFF_SPELLINGS: &[&str] = &["staff", "operations", "運営", "スタッフ"];

/// Maps a raw status spelling onto a status kind. Full-width ASCII and case
/// differences fold onto the same kind.
pub fn classify_status(raw: &str) -> Option<StatusKind> {
    let key = normalize_key(raw);
    if key.is_empty() {
        return None;
    }
    if ABSENT_SPELLINGS.contains(&key.as_str()) {
        Some(StatusKind::Absent)
    } else if STAFF_SPELLINGS.contains(&key.as_str()) {
        Some(StatusKind::Staff)
    } else if TEAM_SPELLINGS.contains(&key.as_str()) {
        Some(StatusKind::Team)
    } else {
        None
    }
}

/// Builds the canonical status from a raw status spelling and team id.
///
/// A missing or unrecognized status with a non-empty team id is a team
/// assignment. A team status without a team id is no assignment at all.
pub fn resolve_status(raw_status: Option<&str>, team_id: Option<&str>) -> Option<AssignmentStatus> {
    match raw_status.and_then(classify_status) {
        Some(StatusKind::Absent) => Some(AssignmentStatus::Absent),
        Some(StatusKind::Staff) => Some(AssignmentStatus::Staff),
        Some(StatusKind::Team) | None => team_id.and_then(AssignmentStatus::team),
    }
}

/// Folds full-width ASCII and the ideographic space onto their ASCII forms.
pub fn fold_width(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Width-folded, trimmed, lowercased form used for key comparisons.
pub fn normalize_key(value: &str) -> String {
    fold_width(value).trim().to_lowercase()
}

/// Natural ordering: digit runs compare numerically, everything else
/// compares case- and width-insensitively, with a raw comparison as the
/// final tie-break so the order is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = normalize_key(a);
    let right = normalize_key(b);
    let mut x = left.chars().peekable();
    let mut y = right.chars().peekable();

    loop {
        match (x.peek().copied(), y.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(cx), Some(cy)) if cx.is_ascii_digit() && cy.is_ascii_digit() => {
                let nx = take_digits(&mut x);
                let ny = take_digits(&mut y);
                let ord = compare_digit_runs(&nx, &ny);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(cx), Some(cy)) => {
                if cx != cy {
                    return cx.cmp(&cy);
                }
                x.next();
                y.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
