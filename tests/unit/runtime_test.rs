//! Tests for the tokio spawner and the monitor ticker

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resource_gate::core::{AvailabilityMonitor, Resource, ResourceRegistry, ResourceStateTable};
use resource_gate::runtime::{MonitorTicker, Spawn, TokioSpawner};

fn counting_monitor(calls: Arc<AtomicUsize>) -> Arc<AvailabilityMonitor> {
    let registry = Arc::new(ResourceRegistry::new());
    registry
        .add(Resource::new("1", "R1", "localhost", 7400).unwrap())
        .unwrap();
    let probe = move |_: &Resource| {
        calls.fetch_add(1, Ordering::SeqCst);
        true
    };
    Arc::new(AvailabilityMonitor::new(
        registry,
        Arc::new(probe),
        Arc::new(ResourceStateTable::new()),
    ))
}

async fn wait_for_ticks(ticker: &MonitorTicker, n: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while ticker.ticks() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("ticker made progress");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ticker_runs_until_stopped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let ticker = MonitorTicker::new(counting_monitor(calls.clone()), TokioSpawner::current());

    ticker.reschedule(Duration::ZERO, Duration::from_millis(10));
    assert!(ticker.is_running());
    wait_for_ticks(&ticker, 3).await;
    assert_eq!(ticker.last_summary().map(|s| s.monitored), Some(1));

    ticker.stop();
    assert!(!ticker.is_running());
    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), settled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initial_delay_holds_the_first_tick() {
    let calls = Arc::new(AtomicUsize::new(0));
    let ticker = MonitorTicker::new(counting_monitor(calls.clone()), TokioSpawner::current());

    ticker.reschedule(Duration::from_secs(60), Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ticker.ticks(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    ticker.reschedule(Duration::ZERO, Duration::from_millis(10));
    wait_for_ticks(&ticker, 1).await;
    ticker.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_engine_starts_its_ticker() {
    use resource_gate::builders::EngineBuilder;
    use resource_gate::config::{GateConfig, MonitorConfig};

    let config = GateConfig {
        monitor: MonitorConfig {
            initial_delay_secs: 0,
            ..MonitorConfig::default()
        },
        resources: Vec::new(),
    };
    let engine = EngineBuilder::new(config)
        .with_probe(Arc::new(|_: &Resource| true))
        .build()
        .unwrap();

    let ticker = engine.start_ticker(TokioSpawner::current());
    wait_for_ticks(&ticker, 1).await;
    assert_eq!(ticker.last_summary().map(|s| s.monitored), Some(0));
    drop(ticker);
}
