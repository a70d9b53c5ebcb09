//! Assemble a ready-to-use engine from configuration.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::{GateConfig, MonitorConfig};
use crate::core::{
    ActuatorBridge, Agent, AppResult, AvailabilityGate, AvailabilityListener, AvailabilityMonitor,
    BuildLifecycleListener, BuildLimitGate, BuildRun, DequeueCause, GateChain, HostApi, PauseActuator,
    PipelineCatalog, ReachabilityProbe, RegistryError, ResourceLookup, ResourceRegistry, ResourceStateTable,
    StartPrecondition, StatusBoard, TcpProbe, TickSummary, UsageListener, WaitReason,
};
use crate::runtime::api::{resource_states, ResourceStateView};
#[cfg(feature = "tokio-runtime")]
use crate::runtime::{MonitorTicker, TokioSpawner};

/// Builder wiring the registry, monitor, gates and listeners.
///
/// Every listener is registered inside [`EngineBuilder::build`], before the
/// engine is handed out.
pub struct EngineBuilder {
    config: GateConfig,
    probe: Option<Arc<dyn ReachabilityProbe>>,
    catalog: Option<Arc<dyn PipelineCatalog>>,
    actuator: Option<Arc<dyn PauseActuator>>,
    host_version: Option<u32>,
    availability_listeners: Vec<Arc<dyn AvailabilityListener>>,
    usage_listeners: Vec<Arc<dyn UsageListener>>,
}

impl EngineBuilder {
    /// Start from a configuration document.
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            probe: None,
            catalog: None,
            actuator: None,
            host_version: None,
            availability_listeners: Vec::new(),
            usage_listeners: Vec::new(),
        }
    }

    /// Replace the TCP probe.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Validate links and resolve name rules against the host's pipelines.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn PipelineCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Pause and resume linked pipelines on availability edges.
    #[must_use]
    pub fn with_actuator(mut self, actuator: Arc<dyn PauseActuator>) -> Self {
        self.actuator = Some(actuator);
        self
    }

    /// Host major version, used to pick the [`HostApi`] adapter.
    #[must_use]
    pub fn with_host_version(mut self, major: u32) -> Self {
        self.host_version = Some(major);
        self
    }

    /// Extra availability listener.
    #[must_use]
    pub fn with_availability_listener(mut self, listener: Arc<dyn AvailabilityListener>) -> Self {
        self.availability_listeners.push(listener);
        self
    }

    /// Extra usage listener.
    #[must_use]
    pub fn with_usage_listener(mut self, listener: Arc<dyn UsageListener>) -> Self {
        self.usage_listeners.push(listener);
        self
    }

    /// Validate the configuration and assemble the engine.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid.
    pub fn build(self) -> AppResult<Engine> {
        self.config.validate().context("invalid gate configuration")?;
        let resources = self.config.to_resources()?;

        let registry = Arc::new(match &self.catalog {
            Some(catalog) => ResourceRegistry::with_catalog(Arc::clone(catalog)),
            None => ResourceRegistry::new(),
        });
        let loaded = registry.replace_all(resources);

        let probe: Arc<dyn ReachabilityProbe> = match self.probe {
            Some(probe) => probe,
            None => match self.config.monitor.connect_timeout() {
                Some(timeout) => Arc::new(TcpProbe::new().with_connect_timeout(timeout)),
                None => Arc::new(TcpProbe::new()),
            },
        };
        let states = Arc::new(ResourceStateTable::new());
        let monitor = Arc::new(
            AvailabilityMonitor::new(registry.clone(), probe, states.clone())
                .with_probe_workers(self.config.monitor.probe_workers),
        );
        let build_limit = Arc::new(BuildLimitGate::new(registry.clone(), states));
        let availability = Arc::new(AvailabilityGate::new(registry.clone(), monitor.clone()));
        let status = Arc::new(StatusBoard::new());

        registry.add_listener(build_limit.clone());
        registry.add_listener(status.clone());
        monitor.add_listener(status.clone());
        build_limit.add_listener(status.clone());
        if let Some(actuator) = self.actuator {
            let bridge = match &self.catalog {
                Some(catalog) => ActuatorBridge::new(actuator).with_catalog(Arc::clone(catalog)),
                None => ActuatorBridge::new(actuator),
            };
            monitor.add_listener(Arc::new(bridge));
        }
        for listener in self.availability_listeners {
            monitor.add_listener(listener);
        }
        for listener in self.usage_listeners {
            build_limit.add_listener(listener);
        }

        let gates = GateChain::new().with(availability).with(build_limit.clone());
        let host_api = self.host_version.map_or(HostApi::Modern, HostApi::detect);
        info!(resources = loaded, ?host_api, "resource gate engine assembled");

        Ok(Engine {
            registry,
            monitor,
            build_limit,
            gates,
            status,
            host_api,
            monitor_config: self.config.monitor,
        })
    }
}

/// Assembled engine: the single entry point the host orchestrator calls.
pub struct Engine {
    registry: Arc<ResourceRegistry>,
    monitor: Arc<AvailabilityMonitor>,
    build_limit: Arc<BuildLimitGate>,
    gates: GateChain,
    status: Arc<StatusBoard>,
    host_api: HostApi,
    monitor_config: MonitorConfig,
}

impl Engine {
    /// Resource registry.
    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Availability monitor; hand it to a ticker.
    pub fn monitor(&self) -> &Arc<AvailabilityMonitor> {
        &self.monitor
    }

    /// Build-limit gate.
    pub fn build_limit_gate(&self) -> &Arc<BuildLimitGate> {
        &self.build_limit
    }

    /// Status board.
    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    /// Host adapter chosen at build time.
    pub const fn host_api(&self) -> HostApi {
        self.host_api
    }

    /// Monitor settings the engine was built with.
    pub const fn monitor_config(&self) -> &MonitorConfig {
        &self.monitor_config
    }

    /// Drive the monitor on tokio with the configured delay and interval.
    #[cfg(feature = "tokio-runtime")]
    pub fn start_ticker(&self, spawner: TokioSpawner) -> MonitorTicker {
        let ticker = MonitorTicker::new(Arc::clone(&self.monitor), spawner);
        ticker.start(&self.monitor_config);
        ticker
    }

    /// Run one availability tick on the calling thread.
    pub fn tick(&self) -> TickSummary {
        self.monitor.tick()
    }

    /// In-flight builds counted against a resource.
    pub fn usage(&self, id: &str) -> usize {
        self.build_limit.usage(id)
    }

    /// Enable or disable a resource, persisting the flag.
    ///
    /// Returns whether the runtime flag changed.
    ///
    /// # Errors
    ///
    /// Fails for an unknown resource.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool, RegistryError> {
        // Fetched before the update so a first-time slot is seeded with the
        // previous flag and the change is observed as an edge.
        let resource = self
            .registry
            .get_by_id(id)
            .ok_or_else(|| RegistryError::UnknownResource(id.to_string()))?;
        self.registry.set_enabled(id, enabled)?;
        Ok(if enabled {
            self.monitor.enable(&resource)
        } else {
            self.monitor.disable(&resource)
        })
    }

    /// Admin listing of every resource with its live state.
    pub fn resource_states(&self) -> Vec<ResourceStateView> {
        resource_states(&self.registry, &self.monitor, &self.build_limit, self.host_api)
    }

    /// Current registry as a configuration document.
    pub fn to_config(&self) -> GateConfig {
        GateConfig::from_registry(self.monitor_config.clone(), &self.registry)
    }
}

impl StartPrecondition for Engine {
    fn can_start(&self, run: &BuildRun, candidates: &[BuildRun], dry_run: bool) -> Option<WaitReason> {
        self.gates.can_start(run, candidates, dry_run)
    }
}

impl BuildLifecycleListener for Engine {
    fn build_started(&self, run: &BuildRun) {
        self.build_limit.build_started(run);
    }

    fn build_finished(&self, run: &BuildRun) {
        self.build_limit.build_finished(run);
    }

    fn build_interrupted(&self, run: &BuildRun) {
        self.build_limit.build_interrupted(run);
    }

    fn build_dequeued(&self, run: &BuildRun, cause: DequeueCause) {
        self.build_limit.build_dequeued(run, cause);
    }

    fn server_startup(&self, running: &[BuildRun]) {
        self.build_limit.server_startup(running);
    }

    fn agent_registered(&self, agent: &Agent) {
        self.build_limit.agent_registered(agent);
    }

    fn agent_unregistering(&self, agent: &Agent) {
        self.build_limit.agent_unregistering(agent);
    }
}
