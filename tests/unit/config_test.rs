//! Tests for configuration loading and persistence

use resource_gate::config::{GateConfig, MonitorConfig, ResourceConfig};
use resource_gate::core::{ConfigError, Resource, ResourceRegistry};

fn resource_config(id: &str, name: &str, port: u16) -> ResourceConfig {
    ResourceConfig {
        id: id.to_string(),
        name: name.to_string(),
        host: "localhost".to_string(),
        port,
        build_limit: 2,
        enabled: true,
        pipelines: vec!["bt1".to_string()],
        match_rules: vec!["Nightly.*".to_string()],
    }
}

#[test]
fn test_monitor_config_validation() {
    assert!(MonitorConfig::default().validate().is_ok());

    let zero_interval = MonitorConfig {
        check_interval_secs: 0,
        ..MonitorConfig::default()
    };
    assert!(zero_interval.validate().is_err());

    let zero_workers = MonitorConfig {
        probe_workers: 0,
        ..MonitorConfig::default()
    };
    assert!(zero_workers.validate().is_err());
}

#[test]
fn test_monitor_defaults() {
    let config = MonitorConfig::default();
    assert_eq!(config.check_interval_secs, 30);
    assert_eq!(config.initial_delay_secs, 1);
    assert_eq!(config.connect_timeout(), None);
    assert!(config.probe_workers >= 1);
}

#[test]
fn test_resource_config_round_trips_through_resource() {
    let entry = resource_config("1", "db", 5432);
    let resource = entry.to_resource().unwrap();
    assert_eq!(resource.build_limit(), 2);
    assert_eq!(resource.pipelines(), ["bt1"]);
    assert!(resource.matches_name("Nightly build"));
    assert_eq!(ResourceConfig::from_resource(&resource), entry);
}

#[test]
fn test_invalid_resource_entry_is_rejected() {
    let mut entry = resource_config("1", "db", 5432);
    entry.host = String::new();
    let config = GateConfig {
        monitor: MonitorConfig::default(),
        resources: vec![entry],
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resources.json");
    let config = GateConfig {
        monitor: MonitorConfig {
            connect_timeout_ms: Some(500),
            ..MonitorConfig::default()
        },
        resources: vec![resource_config("1", "db", 5432), resource_config("2", "cache", 6379)],
    };

    config.write_file(&path).unwrap();
    let loaded = GateConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GateConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_env_lookup_reads_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gate.json");
    GateConfig {
        monitor: MonitorConfig::default(),
        resources: vec![resource_config("7", "ldap", 389)],
    }
    .write_file(&path)
    .unwrap();

    let path_str = path.display().to_string();
    let config = GateConfig::from_lookup(|key| match key {
        "RESOURCE_GATE_CONFIG" => Some(path_str.clone()),
        "RESOURCE_GATE_CHECK_INTERVAL_SECS" => Some("10".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(config.resources.len(), 1);
    assert_eq!(config.resources[0].name, "ldap");
    assert_eq!(config.monitor.check_interval_secs, 10);
}

#[test]
fn test_snapshot_of_registry() {
    let registry = ResourceRegistry::new();
    registry
        .add(Resource::new("1", "db", "localhost", 5432).unwrap().with_enabled(false))
        .unwrap();
    let config = GateConfig::from_registry(MonitorConfig::default(), &registry);
    assert_eq!(config.resources.len(), 1);
    assert!(!config.resources[0].enabled);
}
