//! Resource entity: a shared network endpoint with a concurrency limit.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::pipeline::{PipelineCatalog, PipelineId, PipelineInfo};
use crate::core::RegistryError;

/// Opaque resource identifier.
pub type ResourceId = String;

/// Unique identifier of a build run (queued or running).
pub type RunId = u64;

/// Rule implicitly linking every pipeline whose full name matches it.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MatchRule {
    regex: Regex,
}

impl MatchRule {
    /// Compile a rule from a regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidPattern`] when the expression does not compile.
    pub fn new(pattern: &str) -> Result<Self, RegistryError> {
        Regex::new(pattern)
            .map(|regex| Self { regex })
            .map_err(|e| RegistryError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    /// Source expression.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Whether a pipeline full name matches anywhere in the expression.
    pub fn is_match(&self, full_name: &str) -> bool {
        self.regex.is_match(full_name)
    }
}

impl PartialEq for MatchRule {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for MatchRule {}

impl fmt::Debug for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MatchRule").field(&self.as_str()).finish()
    }
}

impl TryFrom<String> for MatchRule {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<MatchRule> for String {
    fn from(rule: MatchRule) -> Self {
        rule.as_str().to_string()
    }
}

/// A monitored endpoint shared by the pipelines linked to it.
///
/// Construction validates identity and address; uniqueness across resources
/// is enforced by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    id: ResourceId,
    name: String,
    host: String,
    port: u16,
    build_limit: u32,
    enabled: bool,
    pipelines: Vec<PipelineId>,
    match_rules: Vec<MatchRule>,
}

impl Resource {
    /// Create an enabled, unlimited resource with no links.
    ///
    /// # Errors
    ///
    /// Fails when the id, name or host is empty, or the port is 0.
    pub fn new(
        id: impl Into<ResourceId>,
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Result<Self, RegistryError> {
        let id = id.into();
        let name = name.into();
        let host = host.into();
        if id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        validate_name(&name)?;
        validate_host(&host)?;
        if port == 0 {
            return Err(RegistryError::InvalidPort(port.to_string()));
        }
        Ok(Self {
            id,
            name,
            host,
            port,
            build_limit: 0,
            enabled: true,
            pipelines: Vec::new(),
            match_rules: Vec::new(),
        })
    }

    /// Set the concurrent build limit (0 means unlimited).
    #[must_use]
    pub fn with_build_limit(mut self, build_limit: u32) -> Self {
        self.build_limit = build_limit;
        self
    }

    /// Set the administrative enablement flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Link a pipeline explicitly.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: impl Into<PipelineId>) -> Self {
        self.link_pipeline(pipeline);
        self
    }

    /// Add a name-match rule.
    #[must_use]
    pub fn with_match_rule(mut self, rule: MatchRule) -> Self {
        self.add_match_rule(rule);
        self
    }

    /// Immutable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unique display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` key used for address uniqueness.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Concurrent build limit; 0 means unlimited.
    pub const fn build_limit(&self) -> u32 {
        self.build_limit
    }

    /// Persisted administrative flag.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Explicitly linked pipelines, in link order.
    pub fn pipelines(&self) -> &[PipelineId] {
        &self.pipelines
    }

    /// Name-match rules, in insertion order.
    pub fn match_rules(&self) -> &[MatchRule] {
        &self.match_rules
    }

    /// Link a pipeline; returns false if it was already linked.
    pub fn link_pipeline(&mut self, pipeline: impl Into<PipelineId>) -> bool {
        let pipeline = pipeline.into();
        if self.pipelines.contains(&pipeline) {
            return false;
        }
        self.pipelines.push(pipeline);
        true
    }

    /// Unlink a pipeline; returns false if it was not linked.
    pub fn unlink_pipeline(&mut self, pipeline: &str) -> bool {
        let before = self.pipelines.len();
        self.pipelines.retain(|p| p != pipeline);
        before != self.pipelines.len()
    }

    /// Add a rule unless an identical one exists.
    pub fn add_match_rule(&mut self, rule: MatchRule) -> bool {
        if self.match_rules.contains(&rule) {
            return false;
        }
        self.match_rules.push(rule);
        true
    }

    /// Remove the rule with this source expression.
    pub fn remove_match_rule(&mut self, pattern: &str) -> bool {
        let before = self.match_rules.len();
        self.match_rules.retain(|r| r.as_str() != pattern);
        before != self.match_rules.len()
    }

    /// Whether the pipeline id is explicitly linked.
    pub fn links(&self, pipeline: &str) -> bool {
        self.pipelines.iter().any(|p| p == pipeline)
    }

    /// Whether any rule matches the pipeline's full name.
    pub fn matches_name(&self, full_name: &str) -> bool {
        self.match_rules.iter().any(|r| r.is_match(full_name))
    }

    /// Whether the pipeline is linked explicitly or through a rule.
    pub fn is_linked(&self, pipeline: &PipelineInfo) -> bool {
        self.links(&pipeline.id) || self.matches_name(&pipeline.full_name)
    }

    /// Pipelines linked only through name-match rules.
    pub fn matched_pipelines(&self, catalog: &dyn PipelineCatalog) -> Vec<PipelineId> {
        if self.match_rules.is_empty() {
            return Vec::new();
        }
        catalog
            .all()
            .into_iter()
            .filter(|p| !self.links(&p.id) && self.matches_name(&p.full_name))
            .map(|p| p.id)
            .collect()
    }

    /// Explicit links followed by rule-matched pipelines.
    pub fn linked_pipelines(&self, catalog: Option<&dyn PipelineCatalog>) -> Vec<PipelineId> {
        let mut linked = self.pipelines.clone();
        if let Some(catalog) = catalog {
            linked.extend(self.matched_pipelines(catalog));
        }
        linked
    }

    pub(crate) fn set_identity(&mut self, name: String, host: String, port: u16, build_limit: u32) {
        self.name = name;
        self.host = host;
        self.port = port;
        self.build_limit = build_limit;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.trim().is_empty() {
        return Err(RegistryError::EmptyName);
    }
    Ok(())
}

pub(crate) fn validate_host(host: &str) -> Result<(), RegistryError> {
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(RegistryError::InvalidHost(host.to_string()));
    }
    Ok(())
}

/// Parse a port from operator input.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidPort`] unless the value is an integer in 1-65535.
pub fn parse_port(value: &str) -> Result<u16, RegistryError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(RegistryError::InvalidPort(value.to_string())),
    }
}

/// Parse a build limit from operator input; blank means unlimited.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidBuildLimit`] for anything but a non-negative integer.
pub fn parse_build_limit(value: &str) -> Result<u32, RegistryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| RegistryError::InvalidBuildLimit(value.to_string()))
}
