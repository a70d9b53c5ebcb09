//! Admin-facing views of the live resource state.

use serde::{Deserialize, Serialize};

use crate::core::{
    AvailabilityMonitor, BuildLimitGate, HostApi, PipelineId, Resource, ResourceLookup, ResourceRegistry,
};

/// One row of the resource listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStateView {
    /// Resource id.
    pub id: String,
    /// Resource name.
    pub name: String,
    /// Host.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Concurrent build limit; 0 means unlimited.
    pub build_limit: u32,
    /// Explicitly linked pipelines, as the host displays them.
    pub pipelines: Vec<PipelineId>,
    /// Pipelines linked through name rules, as the host displays them.
    pub matched_pipelines: Vec<PipelineId>,
    /// Last observed reachability.
    pub available: bool,
    /// Administrative flag.
    pub enabled: bool,
    /// In-flight builds.
    pub usage: usize,
}

struct Sources<'a> {
    registry: &'a ResourceRegistry,
    monitor: &'a AvailabilityMonitor,
    gate: &'a BuildLimitGate,
    host_api: HostApi,
}

impl Sources<'_> {
    fn display_ids(&self, ids: &[PipelineId]) -> Vec<PipelineId> {
        let Some(catalog) = self.registry.catalog() else {
            return ids.to_vec();
        };
        ids.iter()
            .map(|id| {
                catalog
                    .find(id)
                    .map_or_else(|| id.clone(), |info| self.host_api.external_id(&info).to_string())
            })
            .collect()
    }

    fn view(&self, resource: &Resource) -> ResourceStateView {
        let matched = self
            .registry
            .catalog()
            .map(|catalog| resource.matched_pipelines(catalog))
            .unwrap_or_default();
        ResourceStateView {
            id: resource.id().to_string(),
            name: resource.name().to_string(),
            host: resource.host().to_string(),
            port: resource.port(),
            build_limit: resource.build_limit(),
            pipelines: self.display_ids(resource.pipelines()),
            matched_pipelines: self.display_ids(&matched),
            available: self.monitor.is_available(resource.id()),
            enabled: self.monitor.is_enabled(resource.id()),
            usage: self.gate.usage(resource.id()),
        }
    }
}

/// Every registered resource with its live state, sorted by name.
pub fn resource_states(
    registry: &ResourceRegistry,
    monitor: &AvailabilityMonitor,
    gate: &BuildLimitGate,
    host_api: HostApi,
) -> Vec<ResourceStateView> {
    let sources = Sources {
        registry,
        monitor,
        gate,
        host_api,
    };
    let mut views: Vec<ResourceStateView> = registry.all().iter().map(|r| sources.view(r)).collect();
    views.sort_by(|a, b| a.name.cmp(&b.name));
    views
}
