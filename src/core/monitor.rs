//! Availability monitor: periodic probing with edge-triggered events.
//!
//! Each resource carries two independent bits, availability and enablement.
//! Listeners hear about a bit only when it flips; repeating the same probe
//! result or the same administrative action is silent.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::unbounded;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::core::notify::{AvailabilityListener, ListenerSet};
use crate::core::probe::ReachabilityProbe;
use crate::core::registry::ResourceLookup;
use crate::core::resource::Resource;
use crate::core::state::ResourceStateTable;

/// Counts gathered during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    /// Resources probed.
    pub monitored: usize,
    /// Resources whose probe failed.
    pub unavailable: usize,
    /// Resources administratively disabled.
    pub disabled: usize,
    /// Resources both enabled and reachable.
    pub usable: usize,
}

/// Direction of an availability edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Unavailable to available.
    BecameAvailable,
    /// Available to unavailable.
    BecameUnavailable,
}

/// Probes every registered resource and tracks edge-triggered state.
pub struct AvailabilityMonitor {
    registry: Arc<dyn ResourceLookup>,
    probe: Arc<dyn ReachabilityProbe>,
    states: Arc<ResourceStateTable>,
    listeners: ListenerSet<dyn AvailabilityListener>,
    probe_workers: usize,
}

impl AvailabilityMonitor {
    /// Create a monitor over the registry's resources.
    pub fn new(
        registry: Arc<dyn ResourceLookup>,
        probe: Arc<dyn ReachabilityProbe>,
        states: Arc<ResourceStateTable>,
    ) -> Self {
        Self {
            registry,
            probe,
            states,
            listeners: ListenerSet::new(),
            probe_workers: num_cpus::get().max(1),
        }
    }

    /// Limit how many probes run at once during a tick.
    #[must_use]
    pub fn with_probe_workers(mut self, workers: usize) -> Self {
        self.probe_workers = workers.max(1);
        self
    }

    /// Register a listener. Call before the first tick.
    pub fn add_listener(&self, listener: Arc<dyn AvailabilityListener>) {
        self.listeners.add(listener);
    }

    /// Probe every resource once and apply the resulting transitions.
    ///
    /// Probes run on a small pool of scoped threads so a slow endpoint only
    /// occupies one worker; the tick returns once every probe has answered.
    pub fn tick(&self) -> TickSummary {
        let resources = self.registry.all();
        let results = self.probe_all(&resources);

        let mut summary = TickSummary {
            monitored: resources.len(),
            ..TickSummary::default()
        };
        for (resource, available) in resources.iter().zip(results) {
            self.record_probe(resource, available);
            let enabled = self.states.is_enabled(resource.id());
            if !available {
                summary.unavailable += 1;
            }
            if !enabled {
                summary.disabled += 1;
            }
            if available && enabled {
                summary.usable += 1;
            }
        }

        info!(
            monitored = summary.monitored,
            unavailable = summary.unavailable,
            disabled = summary.disabled,
            usable = summary.usable,
            "resource availability checked"
        );
        summary
    }

    fn probe_all(&self, resources: &[Resource]) -> Vec<bool> {
        if resources.is_empty() {
            return Vec::new();
        }
        let workers = self.probe_workers.min(resources.len());
        let (job_tx, job_rx) = unbounded::<usize>();
        let (result_tx, result_rx) = unbounded::<(usize, bool)>();
        for index in 0..resources.len() {
            if job_tx.send(index).is_err() {
                break;
            }
        }
        drop(job_tx);

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let probe = Arc::clone(&self.probe);
                scope.spawn(move || {
                    for index in &job_rx {
                        let resource = &resources[index];
                        let available = panic::catch_unwind(AssertUnwindSafe(|| probe.probe(resource)))
                            .unwrap_or_else(|_| {
                                error!(resource = %resource.name(), "probe panicked, treating as unavailable");
                                false
                            });
                        if result_tx.send((index, available)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut results = vec![false; resources.len()];
        for (index, available) in result_rx.try_iter() {
            results[index] = available;
        }
        results
    }

    /// Apply one probe result, notifying listeners on a flip.
    ///
    /// A result for a resource removed while it was being probed is dropped.
    pub fn record_probe(&self, resource: &Resource, available: bool) -> Option<Transition> {
        let Some(slot) = self.states.tracked_slot(resource, self.registry.as_ref()) else {
            debug!(resource = %resource.name(), available, "probe result for removed resource dropped");
            return None;
        };
        let transition = {
            let mut state = slot.lock();
            if state.available == available {
                None
            } else {
                state.available = available;
                Some(if available {
                    Transition::BecameAvailable
                } else {
                    Transition::BecameUnavailable
                })
            }
        };

        match transition {
            Some(Transition::BecameAvailable) => {
                info!(resource = %resource.name(), "resource available");
                self.listeners.notify(|l| l.availability_changed(resource, true));
            }
            Some(Transition::BecameUnavailable) => {
                info!(resource = %resource.name(), "resource unavailable");
                self.listeners.notify(|l| l.availability_changed(resource, false));
            }
            None => debug!(resource = %resource.name(), available, "availability unchanged"),
        }
        transition
    }

    /// Mark the resource enabled; returns whether the flag changed.
    pub fn enable(&self, resource: &Resource) -> bool {
        self.set_enabled(resource, true)
    }

    /// Mark the resource disabled; returns whether the flag changed.
    pub fn disable(&self, resource: &Resource) -> bool {
        self.set_enabled(resource, false)
    }

    fn set_enabled(&self, resource: &Resource, enabled: bool) -> bool {
        let Some(slot) = self.states.tracked_slot(resource, self.registry.as_ref()) else {
            debug!(resource = %resource.name(), enabled, "enablement of removed resource ignored");
            return false;
        };
        let changed = {
            let mut state = slot.lock();
            let changed = state.enabled != enabled;
            state.enabled = enabled;
            changed
        };
        if changed {
            info!(resource = %resource.name(), enabled, "resource enablement changed");
            self.listeners.notify(|l| l.enablement_changed(resource, enabled));
        }
        changed
    }

    /// Last observed reachability.
    pub fn is_available(&self, id: &str) -> bool {
        self.states.is_available(id)
    }

    /// Current administrative flag; before the resource's first tick this is
    /// its persisted flag.
    pub fn is_enabled(&self, id: &str) -> bool {
        match self.states.existing(id) {
            Some(slot) => slot.lock().enabled,
            None => self.registry.get_by_id(id).is_none_or(|r| r.is_enabled()),
        }
    }
}
