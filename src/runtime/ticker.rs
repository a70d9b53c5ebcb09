//! Periodic driver for [`AvailabilityMonitor::tick`].
//!
//! The first tick runs after the initial delay and then once per interval.
//! Ticks run on tokio's blocking pool because probes use blocking sockets.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::{Spawn, TokioSpawner};
use crate::config::MonitorConfig;
use crate::core::{AvailabilityMonitor, TickSummary};

/// Owns the monitor's schedule. Dropping the ticker stops it.
pub struct MonitorTicker<S = TokioSpawner> {
    monitor: Arc<AvailabilityMonitor>,
    spawner: S,
    schedule: Mutex<Option<oneshot::Sender<()>>>,
    ticks: Arc<AtomicU64>,
    last: Arc<Mutex<Option<TickSummary>>>,
}

impl<S: Spawn> MonitorTicker<S> {
    /// Idle ticker; call [`MonitorTicker::start`] to begin.
    pub fn new(monitor: Arc<AvailabilityMonitor>, spawner: S) -> Self {
        Self {
            monitor,
            spawner,
            schedule: Mutex::new(None),
            ticks: Arc::new(AtomicU64::new(0)),
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Start ticking with the configured delay and interval.
    pub fn start(&self, config: &MonitorConfig) {
        self.reschedule(config.initial_delay(), config.check_interval());
    }

    /// Replace the current schedule, cancelling the previous one first.
    pub fn reschedule(&self, initial_delay: Duration, interval: Duration) {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        if self.schedule.lock().replace(stop_tx).is_some() {
            debug!("previous monitor schedule cancelled");
        }

        let monitor = Arc::clone(&self.monitor);
        let ticks = Arc::clone(&self.ticks);
        let last = Arc::clone(&self.last);
        let period = interval.max(Duration::from_millis(1));
        info!(?initial_delay, interval = ?period, "monitor scheduled");

        self.spawner.spawn(async move {
            tokio::select! {
                _ = &mut stop_rx => return,
                () = tokio::time::sleep(initial_delay) => {}
            }
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = timer.tick() => {
                        let monitor = Arc::clone(&monitor);
                        match tokio::task::spawn_blocking(move || monitor.tick()).await {
                            Ok(summary) => {
                                ticks.fetch_add(1, Ordering::Relaxed);
                                *last.lock() = Some(summary);
                            }
                            Err(e) => error!(error = %e, "monitor tick failed"),
                        }
                    }
                }
            }
            debug!("monitor schedule stopped");
        });
    }

    /// Stop ticking. A tick already running completes.
    pub fn stop(&self) {
        if self.schedule.lock().take().is_some() {
            info!("monitor stopped");
        }
    }

    /// Whether a schedule is active.
    pub fn is_running(&self) -> bool {
        self.schedule.lock().is_some()
    }

    /// Completed ticks since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Summary of the most recent tick.
    pub fn last_summary(&self) -> Option<TickSummary> {
        *self.last.lock()
    }
}
