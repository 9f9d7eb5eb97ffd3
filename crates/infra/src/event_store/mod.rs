//! Append-only event store boundary.
//!
//! Each event stream is the transaction log of one aggregate. The store only
//! guarantees per-stream ordering and all-or-nothing batch appends; it makes
//! no storage assumptions beyond that.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
