//! Tests for the engine builder

use std::sync::Arc;

use resource_gate::builders::EngineBuilder;
use resource_gate::config::{GateConfig, MonitorConfig, ResourceConfig};
use resource_gate::core::{
    BuildLifecycleListener, BuildRun, HostApi, PipelineInfo, Resource, ResourceLookup, StartPrecondition,
};
use resource_gate::infra::{InMemoryActuator, InMemoryPipelineCatalog};

fn entry(id: &str, name: &str, port: u16, limit: u32, pipelines: &[&str]) -> ResourceConfig {
    ResourceConfig {
        id: id.to_string(),
        name: name.to_string(),
        host: "localhost".to_string(),
        port,
        build_limit: limit,
        enabled: true,
        pipelines: pipelines.iter().map(ToString::to_string).collect(),
        match_rules: Vec::new(),
    }
}

fn config(resources: Vec<ResourceConfig>) -> GateConfig {
    GateConfig {
        monitor: MonitorConfig::default(),
        resources,
    }
}

#[test]
fn test_builder_skips_duplicate_entries() {
    let engine = EngineBuilder::new(config(vec![
        entry("1", "db", 5432, 1, &["bt1"]),
        entry("2", "db", 5433, 1, &[]),
        entry("3", "cache", 5432, 1, &[]),
    ]))
    .with_probe(Arc::new(|_: &Resource| true))
    .build()
    .unwrap();

    assert_eq!(engine.registry().len(), 1);
    assert_eq!(engine.to_config().resources.len(), 1);
}

#[test]
fn test_builder_rejects_invalid_config() {
    let mut bad = config(vec![]);
    bad.monitor.check_interval_secs = 0;
    assert!(EngineBuilder::new(bad).build().is_err());
}

#[test]
fn test_host_api_detection() {
    let legacy = EngineBuilder::new(config(vec![])).with_host_version(7).build().unwrap();
    let modern = EngineBuilder::new(config(vec![])).with_host_version(8).build().unwrap();
    let unspecified = EngineBuilder::new(config(vec![])).build().unwrap();
    assert_eq!(legacy.host_api(), HostApi::Legacy);
    assert_eq!(modern.host_api(), HostApi::Modern);
    assert_eq!(unspecified.host_api(), HostApi::Modern);
}

#[test]
fn test_engine_refuses_on_availability_before_allocating() {
    let engine = EngineBuilder::new(config(vec![entry("1", "R1", 7400, 1, &["P1"])]))
        .with_probe(Arc::new(|_: &Resource| false))
        .build()
        .unwrap();

    engine.tick();
    let reason = engine.can_start(&BuildRun::new(1, "P1"), &[], false).unwrap();
    assert!(reason.as_str().contains("available"));
    assert_eq!(engine.usage("1"), 0);
}

#[test]
fn test_engine_enablement_persists_and_gates() {
    let engine = EngineBuilder::new(config(vec![entry("1", "R1", 7400, 0, &["P1"])]))
        .with_probe(Arc::new(|_: &Resource| true))
        .build()
        .unwrap();
    let run = BuildRun::new(1, "P1");

    assert!(engine.set_enabled("1", false).unwrap());
    assert!(!engine.set_enabled("1", false).unwrap());
    assert!(!engine.registry().get_by_id("1").unwrap().is_enabled());
    assert!(!engine.resource_states()[0].enabled);
    let reason = engine.can_start(&run, &[], true).unwrap();
    assert!(reason.as_str().contains("enabled"));

    assert!(engine.set_enabled("1", true).unwrap());
    assert!(engine.can_start(&run, &[], false).is_none());
    assert!(engine.set_enabled("9", true).is_err());
}

#[test]
fn test_persisted_disabled_flag_gates_before_first_tick() {
    let mut disabled = entry("1", "R1", 7400, 0, &["P1"]);
    disabled.enabled = false;
    let engine = EngineBuilder::new(config(vec![disabled]))
        .with_probe(Arc::new(|_: &Resource| true))
        .build()
        .unwrap();
    assert!(engine.can_start(&BuildRun::new(1, "P1"), &[], true).is_some());
}

#[test]
fn test_engine_wires_status_and_actuator() {
    let catalog = Arc::new(InMemoryPipelineCatalog::with_pipelines([
        PipelineInfo::new("P1", "Backend :: Integration"),
        PipelineInfo::new("P2", "Backend :: Nightly"),
    ]));
    let mut resource = entry("1", "R1", 7400, 2, &["P1"]);
    resource.match_rules = vec!["Nightly$".to_string()];
    let actuator = Arc::new(InMemoryActuator::new());
    let engine = EngineBuilder::new(config(vec![resource]))
        .with_catalog(catalog)
        .with_actuator(actuator.clone())
        .with_probe(Arc::new(|_: &Resource| false))
        .build()
        .unwrap();

    engine.build_started(&BuildRun::new(1, "P2"));
    engine.tick();

    assert_eq!(actuator.paused(), vec!["P1".to_string(), "P2".to_string()]);
    let report = engine.status().drain();
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.usage.get("1"), Some(&1));

    let states = engine.resource_states();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].matched_pipelines, vec!["P2".to_string()]);
    assert!(!states[0].available);
    assert_eq!(states[0].usage, 1);
}
