//! Error types for registry mutations and configuration handling.
//!
//! The admission and monitoring paths never return errors: probe failures fold
//! into a boolean and inconsistent lifecycle signals are absorbed as no-ops.

use thiserror::Error;

/// Validation errors produced by registry mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Resource id was empty.
    #[error("id cannot be empty")]
    EmptyId,
    /// Resource name was empty.
    #[error("name cannot be empty")]
    EmptyName,
    /// Host was empty or contained whitespace.
    #[error("invalid host: {0:?}")]
    InvalidHost(String),
    /// Port was missing, non-numeric or outside 1-65535.
    #[error("invalid port number: {0:?}")]
    InvalidPort(String),
    /// Build limit was not a non-negative integer.
    #[error("invalid build limit: {0:?}")]
    InvalidBuildLimit(String),
    /// Another resource already uses this id.
    #[error("resource with id {0} already exists")]
    DuplicateId(String),
    /// Another resource already uses this name.
    #[error("resource with name {0} already exists")]
    DuplicateName(String),
    /// Another resource already addresses this endpoint.
    #[error("resource with host {host} and port {port} already exists")]
    DuplicateAddress {
        /// Conflicting host.
        host: String,
        /// Conflicting port.
        port: u16,
    },
    /// No resource with this id is registered.
    #[error("resource with id {0} does not exist")]
    UnknownResource(String),
    /// The pipeline catalog does not know this pipeline.
    #[error("pipeline id {0} does not exist")]
    UnknownPipeline(String),
    /// A name-match rule failed to compile.
    #[error("invalid match rule {pattern:?}: {reason}")]
    InvalidPattern {
        /// Offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
}

/// Errors raised while loading, validating or persisting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Document could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Document parsed but failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Environment variable held a value that could not be used.
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
    /// Reading or writing the configuration file failed.
    #[error("configuration file {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
