//! Resource model, availability monitoring and build admission.

pub mod actuator;
pub mod admission;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod pipeline;
pub mod probe;
pub mod registry;
pub mod resource;
pub mod state;
pub mod status;

pub use actuator::{ActuatorBridge, PauseActuator, PAUSE_MARKER};
pub use admission::{
    Agent, AvailabilityGate, BuildLifecycleListener, BuildLimitGate, BuildRun, DequeueCause, GateChain,
    StartPrecondition, WaitReason,
};
pub use error::{AppResult, ConfigError, RegistryError};
pub use monitor::{AvailabilityMonitor, TickSummary, Transition};
pub use notify::{AvailabilityListener, ListenerSet, UsageListener};
pub use pipeline::{HostApi, PipelineCatalog, PipelineId, PipelineInfo};
pub use probe::{ProbeFailure, ReachabilityProbe, TcpProbe};
pub use registry::{RegistryListener, ResourceLookup, ResourceRegistry};
pub use resource::{parse_build_limit, parse_port, MatchRule, Resource, ResourceId, RunId};
pub use state::{Released, ResourceSlot, ResourceStateTable, SharedSlot};
pub use status::{AvailabilityChange, StatusBoard, StatusReport};
