//! Pause and resume linked pipelines on availability edges.

use std::sync::Arc;

use tracing::{debug, info};

use crate::core::notify::AvailabilityListener;
use crate::core::pipeline::PipelineCatalog;
use crate::core::resource::Resource;

/// Marker carried in every pause reason issued on behalf of the monitor.
///
/// Actuators use it to tell automatic pauses from an operator's own.
pub const PAUSE_MARKER: &str = "ResourceMonitor";

/// Host-side pipeline pause control.
pub trait PauseActuator: Send + Sync {
    /// Pause a pipeline.
    fn pause(&self, pipeline: &str, reason: &str);
    /// Resume a pipeline.
    fn resume(&self, pipeline: &str, reason: &str);
}

/// Availability listener forwarding each edge to a [`PauseActuator`].
///
/// The actuator is called once per linked pipeline: explicit links first,
/// then pipelines matched by name rules when a catalog is attached.
pub struct ActuatorBridge {
    actuator: Arc<dyn PauseActuator>,
    catalog: Option<Arc<dyn PipelineCatalog>>,
}

impl ActuatorBridge {
    /// Bridge without a catalog; only explicit links are paused.
    pub fn new(actuator: Arc<dyn PauseActuator>) -> Self {
        Self {
            actuator,
            catalog: None,
        }
    }

    /// Also pause pipelines linked through name-match rules.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn PipelineCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }
}

impl AvailabilityListener for ActuatorBridge {
    fn availability_changed(&self, resource: &Resource, available: bool) {
        let pipelines = resource.linked_pipelines(self.catalog.as_deref());
        if pipelines.is_empty() {
            debug!(resource = %resource.name(), "no linked pipelines to actuate");
            return;
        }
        if available {
            let reason = format!("Resource {} is available again ({PAUSE_MARKER})", resource.name());
            for pipeline in &pipelines {
                self.actuator.resume(pipeline, &reason);
            }
            info!(resource = %resource.name(), pipelines = pipelines.len(), "linked pipelines resumed");
        } else {
            let reason = format!("Resource {} is unavailable ({PAUSE_MARKER})", resource.name());
            for pipeline in &pipelines {
                self.actuator.pause(pipeline, &reason);
            }
            info!(resource = %resource.name(), pipelines = pipelines.len(), "linked pipelines paused");
        }
    }
}
