//! Per-resource runtime state shared by the monitor and the admission gates.
//!
//! One record per resource id holds the edge-triggered availability and
//! enablement bits plus the set of runs counted against the build limit.
//! Each record sits behind its own mutex, so mutation is serialized per
//! resource while different resources never contend.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::core::registry::ResourceLookup;
use crate::core::resource::{Resource, ResourceId, RunId};

/// Runtime state of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSlot {
    /// Last edge-triggered reachability; optimistic until the first probe.
    pub available: bool,
    /// Administrative flag.
    pub enabled: bool,
    /// Runs currently counted against the build limit.
    pub in_flight: HashSet<RunId>,
    /// Bumped on every change to `in_flight`.
    pub revision: u64,
}

impl ResourceSlot {
    fn seeded(enabled: bool) -> Self {
        Self {
            available: true,
            enabled,
            in_flight: HashSet::new(),
            revision: 0,
        }
    }

    /// Current usage count.
    pub fn usage(&self) -> usize {
        self.in_flight.len()
    }

    /// Count the run; returns the new usage and revision if the set grew.
    pub fn admit(&mut self, run: RunId) -> Option<(usize, u64)> {
        self.in_flight.insert(run).then(|| self.bump())
    }

    /// Stop counting the run; returns the new usage and revision if it was counted.
    pub fn release(&mut self, run: RunId) -> Option<(usize, u64)> {
        self.in_flight.remove(&run).then(|| self.bump())
    }

    fn bump(&mut self) -> (usize, u64) {
        self.revision += 1;
        (self.usage(), self.revision)
    }
}

/// One release applied by [`ResourceStateTable::release_run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Released {
    /// Resource whose set held the run.
    pub resource_id: ResourceId,
    /// Usage after the release.
    pub count: usize,
    /// Slot revision after the release.
    pub revision: u64,
}

/// Shared slot handle; lock it to read or mutate the record.
pub type SharedSlot = Arc<Mutex<ResourceSlot>>;

/// Arena of resource records keyed by id.
#[derive(Debug, Default)]
pub struct ResourceStateTable {
    slots: RwLock<HashMap<ResourceId, SharedSlot>>,
}

impl ResourceStateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for the resource, created on first reference.
    ///
    /// Returns `None` once the registry no longer holds the resource (same id
    /// and address), so a caller working from a stale snapshot never revives
    /// state that removal already purged. A new record starts available, with
    /// the resource's persisted enablement flag and no runs in flight.
    pub fn tracked_slot(&self, resource: &Resource, registry: &dyn ResourceLookup) -> Option<SharedSlot> {
        let registered = || {
            registry
                .get_by_id(resource.id())
                .is_some_and(|current| current.address() == resource.address())
        };
        if !registered() {
            return None;
        }
        if let Some(slot) = self.slots.read().get(resource.id()) {
            return Some(Arc::clone(slot));
        }
        let mut slots = self.slots.write();
        // Removal purges under this lock after the registry drops the entry.
        if !registered() {
            return None;
        }
        Some(Arc::clone(
            slots
                .entry(resource.id().to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ResourceSlot::seeded(resource.is_enabled())))),
        ))
    }

    /// Remove the run from every record that counts it.
    ///
    /// Releases follow the run rather than its pipeline's current link, so a
    /// pipeline relinked or deleted mid-build cannot strand the run.
    pub fn release_run(&self, run: RunId) -> Vec<Released> {
        let slots: Vec<(ResourceId, SharedSlot)> = self
            .slots
            .read()
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();
        slots
            .into_iter()
            .filter_map(|(resource_id, slot)| {
                let (count, revision) = slot.lock().release(run)?;
                Some(Released {
                    resource_id,
                    count,
                    revision,
                })
            })
            .collect()
    }

    /// Record for the id if one was ever created.
    pub fn existing(&self, id: &str) -> Option<SharedSlot> {
        self.slots.read().get(id).cloned()
    }

    /// Drop the record; returns it if it existed.
    pub fn remove(&self, id: &str) -> Option<SharedSlot> {
        self.slots.write().remove(id)
    }

    /// Reachability as last observed; unknown ids read as available.
    pub fn is_available(&self, id: &str) -> bool {
        self.existing(id).is_none_or(|slot| slot.lock().available)
    }

    /// Enablement; unknown ids read as enabled.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.existing(id).is_none_or(|slot| slot.lock().enabled)
    }

    /// In-flight run count; unknown ids read as zero.
    pub fn usage(&self, id: &str) -> usize {
        self.existing(id).map_or(0, |slot| slot.lock().usage())
    }

    /// Copy of one record.
    pub fn snapshot(&self, id: &str) -> Option<ResourceSlot> {
        self.existing(id).map(|slot| slot.lock().clone())
    }

    /// Number of tracked resources.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether no resource is tracked.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}
