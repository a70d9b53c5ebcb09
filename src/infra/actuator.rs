//! In-memory pause actuator.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::core::actuator::{PauseActuator, PAUSE_MARKER};
use crate::core::pipeline::PipelineId;

/// Keeps pause state per pipeline the way a host would.
///
/// A pipeline that is already paused keeps its original reason, and only
/// pauses carrying [`PAUSE_MARKER`] are lifted by `resume`, so an operator's
/// manual pause survives a resource coming back.
#[derive(Debug, Default)]
pub struct InMemoryActuator {
    paused: Mutex<HashMap<PipelineId, String>>,
}

impl InMemoryActuator {
    /// No pipeline paused.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the pipeline is paused.
    pub fn is_paused(&self, pipeline: &str) -> bool {
        self.paused.lock().contains_key(pipeline)
    }

    /// Reason recorded for a paused pipeline.
    pub fn pause_reason(&self, pipeline: &str) -> Option<String> {
        self.paused.lock().get(pipeline).cloned()
    }

    /// Paused pipelines, sorted.
    pub fn paused(&self) -> Vec<PipelineId> {
        let mut ids: Vec<PipelineId> = self.paused.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl PauseActuator for InMemoryActuator {
    fn pause(&self, pipeline: &str, reason: &str) {
        let mut paused = self.paused.lock();
        if paused.contains_key(pipeline) {
            debug!(pipeline, "already paused");
            return;
        }
        paused.insert(pipeline.to_string(), reason.to_string());
    }

    fn resume(&self, pipeline: &str, _reason: &str) {
        let mut paused = self.paused.lock();
        match paused.get(pipeline) {
            Some(current) if current.contains(PAUSE_MARKER) => {
                paused.remove(pipeline);
            }
            Some(_) => debug!(pipeline, "paused by someone else, leaving it"),
            None => debug!(pipeline, "not paused"),
        }
    }
}
