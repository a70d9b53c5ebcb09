//! Status board fed by the monitor and the build-limit gate.
//!
//! Availability changes queue up until a reader drains them; usage counts
//! keep their latest value per resource.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::notify::{AvailabilityListener, UsageListener};
use crate::core::registry::RegistryListener;
use crate::core::resource::{Resource, ResourceId};
use crate::util::clock::now_ms;

/// One observed availability edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityChange {
    /// Resource id.
    pub resource_id: ResourceId,
    /// Resource name at the time of the change.
    pub name: String,
    /// New reachability.
    pub available: bool,
    /// Observation time (ms since epoch).
    pub at_ms: u128,
}

/// Snapshot handed to a status reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Availability changes since the previous drain, oldest first.
    pub changes: Vec<AvailabilityChange>,
    /// Latest in-flight count per resource id.
    pub usage: BTreeMap<ResourceId, usize>,
    /// When the report was taken (ms since epoch).
    pub generated_at_ms: u128,
}

#[derive(Default)]
struct Board {
    pending: Vec<AvailabilityChange>,
    usage: BTreeMap<ResourceId, usize>,
    revisions: HashMap<ResourceId, u64>,
}

/// Listener that aggregates state for status polling.
#[derive(Default)]
pub struct StatusBoard {
    board: Mutex<Board>,
}

impl StatusBoard {
    /// Empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the pending changes along with the current usage counts.
    pub fn drain(&self) -> StatusReport {
        let mut board = self.board.lock();
        StatusReport {
            changes: std::mem::take(&mut board.pending),
            usage: board.usage.clone(),
            generated_at_ms: now_ms(),
        }
    }

    /// Last reported usage for a resource.
    pub fn usage_of(&self, id: &str) -> usize {
        self.board.lock().usage.get(id).copied().unwrap_or(0)
    }

    /// Number of changes waiting to be drained.
    pub fn pending(&self) -> usize {
        self.board.lock().pending.len()
    }
}

impl AvailabilityListener for StatusBoard {
    fn availability_changed(&self, resource: &Resource, available: bool) {
        self.board.lock().pending.push(AvailabilityChange {
            resource_id: resource.id().to_string(),
            name: resource.name().to_string(),
            available,
            at_ms: now_ms(),
        });
    }
}

impl UsageListener for StatusBoard {
    fn usage_changed(&self, resource: &Resource, count: usize) {
        self.board.lock().usage.insert(resource.id().to_string(), count);
    }

    fn usage_revised(&self, resource: &Resource, count: usize, revision: u64) {
        let mut board = self.board.lock();
        let seen = board.revisions.entry(resource.id().to_string()).or_default();
        if revision <= *seen {
            return;
        }
        *seen = revision;
        board.usage.insert(resource.id().to_string(), count);
    }
}

impl RegistryListener for StatusBoard {
    fn resource_removed(&self, resource: &Resource) {
        let mut board = self.board.lock();
        board.usage.remove(resource.id());
        board.revisions.remove(resource.id());
        board.pending.retain(|c| c.resource_id != resource.id());
    }
}
