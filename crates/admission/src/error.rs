use thiserror::Error;

use seatwise_core::DomainError;

/// Admission-level failures.
///
/// Every variant is recoverable at the request boundary: a command that fails
/// produces no events, so nothing has been written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// Capacity was non-positive at creation, or an edit tried to lower it.
    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    /// No free seat. Internal signal; requests turn it into a waitlist offer.
    #[error("no seats available")]
    NoSeatsAvailable,

    #[error("attendee is already registered for this event")]
    AlreadyRegistered,

    #[error("attendee is already on the waitlist for this event")]
    AlreadyWaitlisted,

    /// Unknown event, registration or waitlist entry.
    #[error("not found")]
    NotFound,

    #[error("event already exists")]
    AlreadyExists,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl AdmissionError {
    pub fn invalid_capacity(msg: impl Into<String>) -> Self {
        Self::InvalidCapacity(msg.into())
    }
}
