//! Tests for error types

use resource_gate::core::{ConfigError, RegistryError};

#[test]
fn test_duplicate_address_error() {
    let err = RegistryError::DuplicateAddress {
        host: "db.internal".to_string(),
        port: 5432,
    };
    assert_eq!(
        format!("{err}"),
        "resource with host db.internal and port 5432 already exists"
    );
}

#[test]
fn test_unknown_pipeline_error() {
    let err = RegistryError::UnknownPipeline("bt42".to_string());
    assert_eq!(format!("{err}"), "pipeline id bt42 does not exist");
}

#[test]
fn test_invalid_port_error() {
    let err = RegistryError::InvalidPort("http".to_string());
    assert_eq!(format!("{err}"), "invalid port number: \"http\"");
}

#[test]
fn test_config_parse_error_wraps_serde() {
    let err: ConfigError = serde_json::from_str::<serde_json::Value>("{")
        .unwrap_err()
        .into();
    assert!(format!("{err}").starts_with("parse error:"));
}

#[test]
fn test_config_env_error() {
    let err = ConfigError::InvalidEnv {
        key: "RESOURCE_GATE_CHECK_INTERVAL_SECS".to_string(),
        value: "soon".to_string(),
    };
    assert_eq!(
        format!("{err}"),
        "invalid value \"soon\" for RESOURCE_GATE_CHECK_INTERVAL_SECS"
    );
}
