use std::sync::Arc;

use tracing::debug;

use super::{BuildRun, StartPrecondition, WaitReason};
use crate::core::monitor::AvailabilityMonitor;
use crate::core::registry::ResourceLookup;

/// Refuses runs whose resource is unreachable or disabled.
///
/// Reads the monitor's edge-triggered state; never probes.
pub struct AvailabilityGate {
    registry: Arc<dyn ResourceLookup>,
    monitor: Arc<AvailabilityMonitor>,
}

impl AvailabilityGate {
    /// Gate over the monitor's view of the registry's resources.
    pub fn new(registry: Arc<dyn ResourceLookup>, monitor: Arc<AvailabilityMonitor>) -> Self {
        Self { registry, monitor }
    }
}

impl StartPrecondition for AvailabilityGate {
    fn can_start(&self, run: &BuildRun, _candidates: &[BuildRun], _dry_run: bool) -> Option<WaitReason> {
        let resource = self.registry.find_by_pipeline_id(&run.pipeline_id)?;
        let condition = if !self.monitor.is_available(resource.id()) {
            "available"
        } else if !self.monitor.is_enabled(resource.id()) {
            "enabled"
        } else {
            return None;
        };
        debug!(run = run.run_id, resource = %resource.name(), condition, "run waits for resource");
        Some(WaitReason::new(format!(
            "Build cannot start until the required resource {} is {condition}",
            resource.name()
        )))
    }
}
