//! Projection implementations (read model builders).
//!
//! Projections consume committed listing events and build query-optimized
//! read models. All of them are:
//! - **Rebuildable**: reconstructed from the event store on demand
//! - **Idempotent**: a per-stream cursor drops envelopes already applied

use thiserror::Error;

pub mod attendee_registrations;
pub mod cursor;
pub mod listings;
pub mod reports;

pub use attendee_registrations::{
    AttendeeRegistration, AttendeeRegistrationsProjection, RegistrationKey, RegistrationRow,
};
pub use cursor::StreamCursors;
pub use listings::{ListingCatalogProjection, ListingFilter, ListingReadModel};
pub use reports::{CategoryReport, EventReport, OverallSummary, category_reports};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize listing event: {0}")]
    Deserialize(String),

    #[error("event does not belong to its stream: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("no read model for event {0}")]
    MissingReadModel(String),

    #[error("projection lock poisoned")]
    Poisoned,
}
