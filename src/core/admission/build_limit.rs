use std::sync::Arc;

use tracing::{debug, info};

use super::{Agent, BuildLifecycleListener, BuildRun, DequeueCause, StartPrecondition, WaitReason};
use crate::core::notify::{ListenerSet, UsageListener};
use crate::core::registry::{RegistryListener, ResourceLookup};
use crate::core::resource::Resource;
use crate::core::state::ResourceStateTable;

/// Concurrency-limit gate and owner of the per-resource in-flight sets.
///
/// Allocation and release are set insert and remove under the resource's
/// slot lock, so duplicate signals for one run never double count.
pub struct BuildLimitGate {
    registry: Arc<dyn ResourceLookup>,
    states: Arc<ResourceStateTable>,
    listeners: ListenerSet<dyn UsageListener>,
}

impl BuildLimitGate {
    /// Gate sharing the state table with the availability monitor.
    pub fn new(registry: Arc<dyn ResourceLookup>, states: Arc<ResourceStateTable>) -> Self {
        Self {
            registry,
            states,
            listeners: ListenerSet::new(),
        }
    }

    /// Register a usage listener. Call before steady-state operation.
    pub fn add_listener(&self, listener: Arc<dyn UsageListener>) {
        self.listeners.add(listener);
    }

    /// Runs currently counted against the resource.
    ///
    /// An id the registry no longer knows reads as zero and any leftover
    /// record for it is dropped.
    pub fn usage(&self, id: &str) -> usize {
        if self.registry.get_by_id(id).is_none() {
            if self.states.remove(id).is_some() {
                debug!(resource = id, "dropped state of untracked resource");
            }
            return 0;
        }
        self.states.usage(id)
    }

    fn candidates_on(&self, resource: &Resource, candidates: &[BuildRun]) -> usize {
        candidates
            .iter()
            .filter(|c| {
                self.registry
                    .find_by_pipeline_id(&c.pipeline_id)
                    .is_some_and(|r| r.id() == resource.id())
            })
            .count()
    }

    fn refusal(resource: &Resource) -> WaitReason {
        WaitReason::new(format!(
            "Build cannot start until the number of builds using the resource {} is below the limit of {}",
            resource.name(),
            resource.build_limit()
        ))
    }

    /// Count the run against its resource. Returns the resource, the new
    /// usage and the record revision when the set actually grew.
    fn allocate(&self, run: &BuildRun) -> Option<(Resource, usize, u64)> {
        let resource = self.registry.find_by_pipeline_id(&run.pipeline_id)?;
        let slot = self.states.tracked_slot(&resource, self.registry.as_ref())?;
        let admitted = slot.lock().admit(run.run_id);
        match admitted {
            Some((count, revision)) => {
                info!(run = run.run_id, resource = %resource.name(), count, "build allocated");
                Some((resource, count, revision))
            }
            None => {
                debug!(run = run.run_id, resource = %resource.name(), "build already allocated");
                None
            }
        }
    }

    fn allocate_and_notify(&self, run: &BuildRun) {
        if let Some((resource, count, revision)) = self.allocate(run) {
            self.listeners.notify(|l| l.usage_revised(&resource, count, revision));
        }
    }

    /// Release the run from whichever resource counts it, regardless of
    /// where its pipeline is linked now.
    fn release(&self, run: &BuildRun) {
        let released = self.states.release_run(run.run_id);
        if released.is_empty() {
            debug!(run = run.run_id, pipeline = %run.pipeline_id, "nothing to release");
        }
        for release in released {
            let Some(resource) = self.registry.get_by_id(&release.resource_id) else {
                debug!(run = run.run_id, resource = %release.resource_id, "released from untracked resource");
                continue;
            };
            info!(run = run.run_id, resource = %resource.name(), count = release.count, "build released");
            self.listeners
                .notify(|l| l.usage_revised(&resource, release.count, release.revision));
        }
    }
}

impl StartPrecondition for BuildLimitGate {
    fn can_start(&self, run: &BuildRun, candidates: &[BuildRun], dry_run: bool) -> Option<WaitReason> {
        let resource = self.registry.find_by_pipeline_id(&run.pipeline_id)?;
        let limit = resource.build_limit() as usize;
        let pending = if limit > 0 {
            self.candidates_on(&resource, candidates)
        } else {
            0
        };

        if dry_run {
            let allocated = self.states.usage(resource.id());
            if limit > 0 && allocated + pending >= limit {
                debug!(run = run.run_id, resource = %resource.name(), allocated, pending, limit, "dry run refused");
                return Some(Self::refusal(&resource));
            }
            return None;
        }

        let Some(slot) = self.states.tracked_slot(&resource, self.registry.as_ref()) else {
            debug!(run = run.run_id, resource = %resource.name(), "resource removed during admission");
            return None;
        };
        let admitted = {
            let mut state = slot.lock();
            let allocated = state.usage();
            if limit > 0 && allocated + pending >= limit {
                drop(state);
                info!(run = run.run_id, resource = %resource.name(), allocated, pending, limit, "build limit reached");
                return Some(Self::refusal(&resource));
            }
            state.admit(run.run_id)
        };
        if let Some((count, revision)) = admitted {
            info!(run = run.run_id, resource = %resource.name(), count, "build allocated");
            self.listeners.notify(|l| l.usage_revised(&resource, count, revision));
        }
        None
    }
}

impl BuildLifecycleListener for BuildLimitGate {
    fn build_started(&self, run: &BuildRun) {
        self.allocate_and_notify(run);
    }

    fn build_finished(&self, run: &BuildRun) {
        self.release(run);
    }

    fn build_interrupted(&self, run: &BuildRun) {
        self.release(run);
    }

    fn build_dequeued(&self, run: &BuildRun, cause: DequeueCause) {
        match cause {
            DequeueCause::User => self.release(run),
            DequeueCause::Internal => debug!(run = run.run_id, "internal requeue keeps its slot"),
        }
    }

    fn server_startup(&self, running: &[BuildRun]) {
        let restored = running.iter().filter(|run| self.allocate(run).is_some()).count();
        info!(running = running.len(), restored, "in-flight builds restored");
    }

    fn agent_registered(&self, agent: &Agent) {
        if let Some(run) = &agent.running_build {
            debug!(agent = %agent.name, run = run.run_id, "agent registered with a running build");
            self.allocate_and_notify(run);
        }
    }

    fn agent_unregistering(&self, agent: &Agent) {
        if let Some(run) = &agent.running_build {
            debug!(agent = %agent.name, run = run.run_id, "agent leaving with a running build");
            self.release(run);
        }
    }
}

impl RegistryListener for BuildLimitGate {
    fn resource_removed(&self, resource: &Resource) {
        if let Some(slot) = self.states.remove(resource.id()) {
            let dropped = slot.lock().usage();
            info!(resource = %resource.name(), dropped, "in-flight builds discarded with resource");
        }
    }
}
