//! Runtime adapters: task spawning, the periodic ticker and admin views.

use std::future::Future;

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod ticker;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use api::{resource_states, ResourceStateView};
#[cfg(feature = "tokio-runtime")]
pub use ticker::MonitorTicker;
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;

/// Abstraction over async task spawning.
pub trait Spawn {
    /// Spawn a detached task.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
