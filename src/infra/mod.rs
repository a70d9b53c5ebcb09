//! Reference adapters for the host-side collaborators.

pub mod actuator;
pub mod catalog;

pub use actuator::InMemoryActuator;
pub use catalog::InMemoryPipelineCatalog;
