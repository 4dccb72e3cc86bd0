//! Team leader rosters and assignment resolution.
//!
//! Raw roster and assignment payloads arrive in several historical shapes.
//! `normalize` folds them into canonical maps, `leaders` groups leaders for
//! display, and `directory` loads the maps per event.

pub mod directory;
pub mod leaders;
pub mod normalize;
pub mod status;

pub use directory::{GlDirectory, LeaderSource};
pub use leaders::{collect_group_leaders, GroupLeader, GroupSelector};
pub use normalize::{
    normalize_assignments, normalize_roster, AssignmentEntry, AssignmentMap, GlProfile, Roster,
    SourceType,
};
pub use status::{classify_status, natural_cmp, normalize_key, AssignmentStatus, StatusKind};

/// Effective status of `entry` for `schedule_id`.
pub fn resolve<'a>(entry: &'a AssignmentEntry, schedule_id: &str) -> Option<&'a AssignmentStatus> {
    entry.resolve(schedule_id)
}
