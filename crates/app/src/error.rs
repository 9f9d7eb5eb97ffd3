use thiserror::Error;

use seatwise_admission::AdmissionError;
use seatwise_core::DomainError;
use seatwise_infra::command_dispatcher::DispatchError;
use seatwise_infra::projections::ProjectionError;

/// Errors surfaced to collaborators.
///
/// Every variant is returned with no state change, except
/// [`EngineError::Storage`] raised while refreshing read models after a
/// commit: the facts are stored and a rebuild repairs the views.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("attendee is already registered for this event")]
    AlreadyRegistered,

    #[error("attendee is already on the waitlist for this event")]
    AlreadyWaitlisted,

    #[error("not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    /// Rejected by a consistency rule; indicates a bug rather than bad input.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Concurrent writers kept winning until the retries ran out.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<AdmissionError> for EngineError {
    fn from(value: AdmissionError) -> Self {
        match value {
            AdmissionError::InvalidCapacity(msg) => EngineError::InvalidCapacity(msg),
            AdmissionError::AlreadyRegistered => EngineError::AlreadyRegistered,
            AdmissionError::AlreadyWaitlisted => EngineError::AlreadyWaitlisted,
            AdmissionError::NotFound => EngineError::NotFound,
            AdmissionError::AlreadyExists => EngineError::Conflict("event already exists".to_string()),
            AdmissionError::NoSeatsAvailable => EngineError::Rejected("no seats available".to_string()),
            AdmissionError::Domain(DomainError::Validation(msg)) => EngineError::Validation(msg),
            AdmissionError::Domain(DomainError::InvalidId(msg)) => EngineError::Validation(msg),
            AdmissionError::Domain(DomainError::Conflict(msg)) => EngineError::Conflict(msg),
            AdmissionError::Domain(DomainError::InvariantViolation(msg)) => EngineError::Rejected(msg),
        }
    }
}

impl From<DispatchError<AdmissionError>> for EngineError {
    fn from(value: DispatchError<AdmissionError>) -> Self {
        match value {
            DispatchError::Domain(e) => e.into(),
            DispatchError::Concurrency(msg) => EngineError::Conflict(msg),
            DispatchError::Deserialize(msg) => EngineError::Storage(msg),
            DispatchError::Store(e) => EngineError::Storage(e.to_string()),
        }
    }
}

impl From<ProjectionError> for EngineError {
    fn from(value: ProjectionError) -> Self {
        EngineError::Storage(value.to_string())
    }
}
