//! Embedded event-admission engine.
//!
//! [`EventManager`] is the surface collaborators (forms, dashboards, report
//! screens) call into. It wires the admission aggregate to an in-memory event
//! store, a bus for change notifications and the read-model projections.

pub mod config;
pub mod error;
pub mod manager;

pub use config::{ConfigError, EngineConfig};
pub use error::EngineError;
pub use manager::{AdmissionOutcome, EventManager};
