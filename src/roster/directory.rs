use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::leaders::{collect_group_leaders, GroupLeader};
use super::normalize::{normalize_assignments, normalize_roster, AssignmentMap, Roster};
use crate::config::{GroupConfig, StoreConfig};
use crate::dedup::FetchDedup;
use crate::error::Result;
use crate::store::StoreReader;

/// Where `collect_leaders` reads roster and assignments from.
pub enum LeaderSource<'a> {
    /// The maps registered for this event id, loaded on demand.
    Event(&'a str),
    /// Caller-supplied maps.
    Maps {
        roster: &'a Roster,
        assignments: &'a AssignmentMap,
    },
}

type EventMaps<T> = Arc<Mutex<HashMap<String, Arc<T>>>>;

/// Per-event rosters and assignments, loaded lazily and at most once per
/// event at a time.
pub struct GlDirectory {
    store: Arc<dyn StoreReader>,
    paths: StoreConfig,
    groups: GroupConfig,
    rosters: EventMaps<Roster>,
    assignments: EventMaps<AssignmentMap>,
    /// Events whose last load failed; their empty maps are placeholders.
    failed: Arc<Mutex<HashSet<String>>>,
    fetches: FetchDedup<String, Result<()>>,
}

impl GlDirectory {
    pub fn new(store: Arc<dyn StoreReader>, paths: StoreConfig, groups: GroupConfig) -> Self {
        Self {
            store,
            paths,
            groups,
            rosters: Arc::default(),
            assignments: Arc::default(),
            failed: Arc::default(),
            fetches: FetchDedup::new(),
        }
    }

    pub fn roster(&self, event_id: &str) -> Option<Arc<Roster>> {
        self.rosters.lock().get(event_id).cloned()
    }

    pub fn assignments(&self, event_id: &str) -> Option<Arc<AssignmentMap>> {
        self.assignments.lock().get(event_id).cloned()
    }

    pub fn is_loaded(&self, event_id: &str) -> bool {
        self.rosters.lock().contains_key(event_id) && self.assignments.lock().contains_key(event_id)
    }

    /// True when the maps registered for `event_id` come from a failed load.
    pub fn load_failed(&self, event_id: &str) -> bool {
        self.failed.lock().contains(event_id)
    }

    /// Loads roster and assignments for `event_id` unless already present.
    ///
    /// Concurrent loads of the same event share one fetch. A failed fetch
    /// still registers empty maps, and every caller joined on it receives
    /// the error; the next call retries. `force` reloads even when maps are
    /// present.
    pub async fn load_event(&self, event_id: &str, force: bool) -> Result<()> {
        if !force && self.is_loaded(event_id) && !self.load_failed(event_id) {
            return Ok(());
        }

        let store = Arc::clone(&self.store);
        let rosters = Arc::clone(&self.rosters);
        let assignments = Arc::clone(&self.assignments);
        let failed = Arc::clone(&self.failed);
        let roster_path = self.paths.roster_path_for(event_id);
        let assignments_path = self.paths.assignments_path_for(event_id);
        let event = event_id.to_string();

        self.fetches
            .run(event.clone(), move || async move {
                let (raw_roster, raw_assignments) = tokio::join!(
                    store.fetch_value(&roster_path),
                    store.fetch_value(&assignments_path)
                );

                let fetched = raw_roster.and_then(|r| raw_assignments.map(|a| (r, a)));
                let (roster, assignment_map, outcome) = match fetched {
                    Ok((r, a)) => (
                        normalize_roster(r.as_ref()),
                        normalize_assignments(a.as_ref()),
                        Ok(()),
                    ),
                    Err(err) => {
                        warn!(event = %event, error = %err, "Failed to load team leader data");
                        (Roster::new(), AssignmentMap::new(), Err(err))
                    }
                };

                debug!(
                    event = %event,
                    leaders = roster.len(),
                    assignments = assignment_map.len(),
                    "Registered team leader maps"
                );
                if outcome.is_ok() {
                    failed.lock().remove(&event);
                } else {
                    failed.lock().insert(event.clone());
                }
                rosters.lock().insert(event.clone(), Arc::new(roster));
                assignments.lock().insert(event, Arc::new(assignment_map));
                outcome
            })
            .await
    }

    pub async fn collect_leaders(
        &self,
        group_key: &str,
        source: LeaderSource<'_>,
        schedule_id: &str,
    ) -> Result<Vec<GroupLeader>> {
        match source {
            LeaderSource::Maps {
                roster,
                assignments,
            } => Ok(collect_group_leaders(
                group_key,
                roster,
                assignments,
                schedule_id,
                &self.groups,
            )),
            LeaderSource::Event(event_id) => {
                self.load_event(event_id, false).await?;
                let roster = self.roster(event_id).unwrap_or_default();
                let assignments = self.assignments(event_id).unwrap_or_default();
                Ok(collect_group_leaders(
                    group_key,
                    &roster,
                    &assignments,
                    schedule_id,
                    &self.groups,
                ))
            }
        }
    }
}
