//! Event vocabulary shared by the write side and its consumers.
//!
//! - [`Event`]: the contract every domain event type implements.
//! - [`EventEnvelope`]: a committed event plus its stream coordinates.
//! - [`EventBus`]: post-commit fan-out to projections and collaborators.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
