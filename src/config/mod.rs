//! Configuration models for the monitor and the resource set.

pub mod gate;

pub use gate::{GateConfig, MonitorConfig, ResourceConfig};
