//! # Resource Gate
//!
//! Availability monitoring and build admission control for shared network
//! resources.
//!
//! Build pipelines often depend on an external endpoint (a database, a device
//! farm, a licence server) that only tolerates a few concurrent users and is
//! sometimes down. This crate keeps track of such resources and tells the
//! host's scheduler when a queued run has to wait.
//!
//! ## Pieces
//!
//! - **Probe**: [`core::TcpProbe`] connects to `host:port` and folds every
//!   failure into `false`.
//! - **Monitor**: [`core::AvailabilityMonitor`] probes all resources per tick
//!   and fires listeners only when reachability or enablement flips.
//! - **Gates**: [`core::AvailabilityGate`] refuses runs whose resource is down
//!   or disabled; [`core::BuildLimitGate`] refuses runs that would reach the
//!   resource's build limit and keeps the in-flight run sets.
//! - **Listeners**: [`core::StatusBoard`] for status polling,
//!   [`core::ActuatorBridge`] to pause and resume linked pipelines.
//! - **Driver**: `runtime::MonitorTicker` runs ticks on tokio.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use resource_gate::builders::EngineBuilder;
//! use resource_gate::config::GateConfig;
//! use resource_gate::core::{BuildLifecycleListener, BuildRun, StartPrecondition};
//!
//! # fn main() -> resource_gate::core::AppResult<()> {
//! let config = GateConfig::from_json_str(r#"{
//!     "resources": [
//!         { "id": "1", "name": "db", "host": "db.internal", "port": 5432,
//!           "build_limit": 2, "pipelines": ["integration"] }
//!     ]
//! }"#)?;
//! let engine = EngineBuilder::new(config).build()?;
//!
//! engine.tick();
//! let run = BuildRun::new(1, "integration");
//! match engine.can_start(&run, &[], false) {
//!     None => println!("start"),
//!     Some(reason) => println!("wait: {reason}"),
//! }
//! engine.build_finished(&run);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Resource model, monitoring and admission.
pub mod core;
/// Configuration models for the monitor and the resource set.
pub mod config;
/// Builders to assemble the engine from configuration.
pub mod builders;
/// Reference adapters for host-side collaborators.
pub mod infra;
/// Runtime adapters and admin views.
pub mod runtime;
/// Shared utilities.
pub mod util;
