//! Monitor and resource configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::pipeline::PipelineId;
use crate::core::registry::ResourceRegistry;
use crate::core::resource::{MatchRule, Resource};
use crate::core::{ConfigError, RegistryError, ResourceLookup};

/// Path of the JSON configuration file.
pub const ENV_CONFIG_PATH: &str = "RESOURCE_GATE_CONFIG";
/// Override for [`MonitorConfig::check_interval_secs`].
pub const ENV_CHECK_INTERVAL_SECS: &str = "RESOURCE_GATE_CHECK_INTERVAL_SECS";
/// Override for [`MonitorConfig::connect_timeout_ms`].
pub const ENV_CONNECT_TIMEOUT_MS: &str = "RESOURCE_GATE_CONNECT_TIMEOUT_MS";

const fn default_check_interval_secs() -> u64 {
    30
}

const fn default_initial_delay_secs() -> u64 {
    1
}

fn default_probe_workers() -> usize {
    num_cpus::get().clamp(1, 16)
}

const fn default_enabled() -> bool {
    true
}

/// Availability monitor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between ticks.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Seconds before the first tick.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    /// Per-address connect timeout; `None` uses the platform default.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Probes run concurrently within one tick.
    #[serde(default = "default_probe_workers")]
    pub probe_workers: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            initial_delay_secs: default_initial_delay_secs(),
            connect_timeout_ms: None,
            probe_workers: default_probe_workers(),
        }
    }
}

impl MonitorConfig {
    /// Validate monitor settings.
    ///
    /// # Errors
    ///
    /// Rejects a zero interval or zero probe workers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval_secs == 0 {
            return Err(ConfigError::Invalid("check_interval_secs must be greater than 0".into()));
        }
        if self.probe_workers == 0 {
            return Err(ConfigError::Invalid("probe_workers must be greater than 0".into()));
        }
        Ok(())
    }

    /// Interval between ticks.
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Delay before the first tick.
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Connect timeout, if one is configured.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Persisted form of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource id.
    pub id: String,
    /// Unique name.
    pub name: String,
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Concurrent build limit; 0 means unlimited.
    #[serde(default)]
    pub build_limit: u32,
    /// Administrative flag.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Explicitly linked pipeline ids.
    #[serde(default)]
    pub pipelines: Vec<PipelineId>,
    /// Name-match rules as regular expressions.
    #[serde(default)]
    pub match_rules: Vec<String>,
}

impl ResourceConfig {
    /// Build the resource this entry describes.
    ///
    /// # Errors
    ///
    /// Fails when the identity, address or a match rule is invalid.
    pub fn to_resource(&self) -> Result<Resource, RegistryError> {
        let mut resource = Resource::new(self.id.clone(), self.name.clone(), self.host.clone(), self.port)?
            .with_build_limit(self.build_limit)
            .with_enabled(self.enabled);
        for pipeline in &self.pipelines {
            resource.link_pipeline(pipeline.clone());
        }
        for pattern in &self.match_rules {
            resource.add_match_rule(MatchRule::new(pattern)?);
        }
        Ok(resource)
    }

    /// Persisted form of a resource.
    pub fn from_resource(resource: &Resource) -> Self {
        Self {
            id: resource.id().to_string(),
            name: resource.name().to_string(),
            host: resource.host().to_string(),
            port: resource.port(),
            build_limit: resource.build_limit(),
            enabled: resource.is_enabled(),
            pipelines: resource.pipelines().to_vec(),
            match_rules: resource.match_rules().iter().map(|r| r.as_str().to_string()).collect(),
        }
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Monitor settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Registered resources.
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl GateConfig {
    /// Validate the document.
    ///
    /// Uniqueness across resources is not checked here; loading into the
    /// registry skips the offending entries instead.
    ///
    /// # Errors
    ///
    /// Fails on invalid monitor settings or a malformed resource entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.monitor.validate()?;
        for entry in &self.resources {
            entry
                .to_resource()
                .map_err(|e| ConfigError::Invalid(format!("resource {:?}: {e}", entry.id)))?;
        }
        Ok(())
    }

    /// Resources described by the document, in order.
    ///
    /// # Errors
    ///
    /// Fails on the first malformed entry.
    pub fn to_resources(&self) -> Result<Vec<Resource>, ConfigError> {
        self.resources
            .iter()
            .map(|entry| {
                entry
                    .to_resource()
                    .map_err(|e| ConfigError::Invalid(format!("resource {:?}: {e}", entry.id)))
            })
            .collect()
    }

    /// Snapshot the registry for persistence.
    pub fn from_registry(monitor: MonitorConfig, registry: &ResourceRegistry) -> Self {
        Self {
            monitor,
            resources: registry.all().iter().map(ResourceConfig::from_resource).collect(),
        }
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or invalid content.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a JSON file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or its content is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "configuration loaded");
        Self::from_json_str(&raw)
    }

    /// Write as JSON, replacing the file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be written.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = self.to_json_string()?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load from the environment, reading `.env` first if present.
    ///
    /// The document comes from the file named by `RESOURCE_GATE_CONFIG`
    /// (defaults when unset); interval and timeout variables override it.
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable or a variable is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GateConfig::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable or a variable is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(ENV_CONFIG_PATH) {
            Some(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        if let Some(value) = lookup(ENV_CHECK_INTERVAL_SECS) {
            config.monitor.check_interval_secs = parse_env(ENV_CHECK_INTERVAL_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            config.monitor.connect_timeout_ms = Some(parse_env(ENV_CONNECT_TIMEOUT_MS, &value)?);
        }
        config.monitor.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = GateConfig::from_json_str(
            r#"{ "resources": [ { "id": "1", "name": "db", "host": "localhost", "port": 5432 } ] }"#,
        )
        .unwrap();
        assert_eq!(config.monitor.check_interval_secs, 30);
        assert_eq!(config.monitor.initial_delay_secs, 1);
        assert_eq!(config.monitor.connect_timeout(), None);
        assert!(config.resources[0].enabled);
        assert_eq!(config.resources[0].build_limit, 0);
    }

    #[test]
    fn test_rejects_bad_entries() {
        let bad_rule = r#"{ "resources": [ { "id": "1", "name": "db", "host": "h", "port": 1, "match_rules": ["("] } ] }"#;
        assert!(matches!(GateConfig::from_json_str(bad_rule), Err(ConfigError::Invalid(_))));
        let zero_interval = r#"{ "monitor": { "check_interval_secs": 0 } }"#;
        assert!(matches!(GateConfig::from_json_str(zero_interval), Err(ConfigError::Invalid(_))));
        assert!(matches!(GateConfig::from_json_str("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_lookup_overrides_monitor_settings() {
        let config = GateConfig::from_lookup(|key| match key {
            ENV_CHECK_INTERVAL_SECS => Some("5".into()),
            ENV_CONNECT_TIMEOUT_MS => Some("250".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.monitor.check_interval(), Duration::from_secs(5));
        assert_eq!(config.monitor.connect_timeout(), Some(Duration::from_millis(250)));

        let err = GateConfig::from_lookup(|key| (key == ENV_CHECK_INTERVAL_SECS).then(|| "soon".to_string()));
        assert!(matches!(err, Err(ConfigError::InvalidEnv { .. })));
    }
}
