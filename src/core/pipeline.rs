//! Pipeline identities as seen by the host orchestrator.

use serde::{Deserialize, Serialize};

/// Identifier of a pipeline (build configuration) in the host.
pub type PipelineId = String;

/// Host-side description of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInfo {
    /// Internal pipeline identifier, used for linking.
    pub id: PipelineId,
    /// User-facing identifier exposed by newer host generations.
    #[serde(default)]
    pub external_id: Option<String>,
    /// Full display name, matched against resource name rules.
    pub full_name: String,
}

impl PipelineInfo {
    /// Create a pipeline description without an external id.
    pub fn new(id: impl Into<PipelineId>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external_id: None,
            full_name: full_name.into(),
        }
    }

    /// Attach an external id.
    #[must_use]
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

/// Read access to the host's pipeline definitions.
pub trait PipelineCatalog: Send + Sync {
    /// Look up a pipeline by internal id.
    fn find(&self, id: &str) -> Option<PipelineInfo>;
    /// All pipelines currently defined.
    fn all(&self) -> Vec<PipelineInfo>;
}

/// Host API generation, detected once when the engine is assembled.
///
/// Older hosts have no notion of external ids; newer ones expose them and
/// fall back to the internal id when a pipeline has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostApi {
    /// Hosts up to major version 7.
    Legacy,
    /// Hosts from major version 8 on.
    Modern,
}

impl HostApi {
    /// Pick the adapter for a host's major version.
    pub const fn detect(major_version: u32) -> Self {
        if major_version > 7 {
            Self::Modern
        } else {
            Self::Legacy
        }
    }

    /// The identifier to show for a pipeline on this host generation.
    pub fn external_id<'a>(&self, pipeline: &'a PipelineInfo) -> &'a str {
        match self {
            Self::Legacy => &pipeline.id,
            Self::Modern => pipeline.external_id.as_deref().unwrap_or(&pipeline.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_generation_from_major_version() {
        assert_eq!(HostApi::detect(7), HostApi::Legacy);
        assert_eq!(HostApi::detect(8), HostApi::Modern);
        assert_eq!(HostApi::detect(2024), HostApi::Modern);
    }

    #[test]
    fn test_legacy_hosts_show_internal_id() {
        let pipeline = PipelineInfo::new("bt12", "Project :: Build").with_external_id("Project_Build");
        assert_eq!(HostApi::Legacy.external_id(&pipeline), "bt12");
        assert_eq!(HostApi::Modern.external_id(&pipeline), "Project_Build");
    }

    #[test]
    fn test_modern_hosts_fall_back_to_internal_id() {
        let pipeline = PipelineInfo::new("bt12", "Project :: Build");
        assert_eq!(HostApi::Modern.external_id(&pipeline), "bt12");
    }
}
