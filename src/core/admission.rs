//! Build-start admission: the host asks whether a queued run may start and
//! reports lifecycle events so in-flight accounting stays accurate.
//!
//! Two gates implement [`StartPrecondition`]: [`AvailabilityGate`] refuses
//! runs whose resource is unreachable or disabled, [`BuildLimitGate`] refuses
//! runs that would push their resource to its concurrent build limit.
//! [`GateChain`] evaluates them in order and stops at the first refusal.

mod availability;
mod build_limit;

pub use availability::AvailabilityGate;
pub use build_limit::BuildLimitGate;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::pipeline::PipelineId;
use crate::core::resource::RunId;

/// Advisory text explaining why a run cannot start yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaitReason(String);

impl WaitReason {
    /// Wrap a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Message text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the message text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for WaitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A queued or running build: a unique run id plus the pipeline it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildRun {
    /// Unique run identifier.
    pub run_id: RunId,
    /// Pipeline the run was queued for.
    pub pipeline_id: PipelineId,
}

impl BuildRun {
    /// Describe a run.
    pub fn new(run_id: RunId, pipeline_id: impl Into<PipelineId>) -> Self {
        Self {
            run_id,
            pipeline_id: pipeline_id.into(),
        }
    }
}

/// Execution host as reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Agent name.
    pub name: String,
    /// Build the agent is executing, if any.
    #[serde(default)]
    pub running_build: Option<BuildRun>,
}

impl Agent {
    /// Idle agent.
    pub fn idle(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running_build: None,
        }
    }

    /// Agent executing `run`.
    pub fn running(name: impl Into<String>, run: BuildRun) -> Self {
        Self {
            name: name.into(),
            running_build: Some(run),
        }
    }
}

/// Who removed a run from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DequeueCause {
    /// An operator removed it; its slot is released.
    User,
    /// The host re-queued it internally; the slot is still in use.
    Internal,
}

/// Decides whether a queued run may start.
pub trait StartPrecondition: Send + Sync {
    /// `None` admits the run; `Some` carries the reason to wait.
    ///
    /// `candidates` are other runs the scheduler is tentatively admitting in
    /// the same pass. A `dry_run` evaluation must not change any state.
    fn can_start(&self, run: &BuildRun, candidates: &[BuildRun], dry_run: bool) -> Option<WaitReason>;
}

/// Build lifecycle notifications from the host orchestrator.
///
/// Every hook is idempotent; repeated or unmatched signals are absorbed.
pub trait BuildLifecycleListener: Send + Sync {
    /// A run started executing.
    fn build_started(&self, _run: &BuildRun) {}
    /// A run finished.
    fn build_finished(&self, _run: &BuildRun) {}
    /// A run was interrupted.
    fn build_interrupted(&self, _run: &BuildRun) {}
    /// A run left the queue without starting.
    fn build_dequeued(&self, _run: &BuildRun, _cause: DequeueCause) {}
    /// The process started with these runs already executing.
    fn server_startup(&self, _running: &[BuildRun]) {}
    /// An execution host registered.
    fn agent_registered(&self, _agent: &Agent) {}
    /// An execution host is about to unregister.
    fn agent_unregistering(&self, _agent: &Agent) {}
}

/// Ordered list of preconditions; the first refusal wins.
///
/// Later gates are not consulted once one refuses, so a run refused for
/// availability never takes a build-limit slot.
#[derive(Default, Clone)]
pub struct GateChain {
    gates: Vec<Arc<dyn StartPrecondition>>,
}

impl GateChain {
    /// Empty chain; admits everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a gate.
    #[must_use]
    pub fn with(mut self, gate: Arc<dyn StartPrecondition>) -> Self {
        self.gates.push(gate);
        self
    }

    /// Number of gates.
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// Whether the chain has no gates.
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

impl StartPrecondition for GateChain {
    fn can_start(&self, run: &BuildRun, candidates: &[BuildRun], dry_run: bool) -> Option<WaitReason> {
        self.gates
            .iter()
            .find_map(|gate| gate.can_start(run, candidates, dry_run))
    }
}
