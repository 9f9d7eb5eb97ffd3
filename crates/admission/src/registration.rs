//! Registration ledger: confirmed admissions and their tickets.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use seatwise_core::{AttendeeId, ValueObject};

use crate::error::AdmissionError;
use crate::ids::{EventId, RegistrationId, TicketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Confirmed,
}

/// A confirmed seat held by one attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub event_id: EventId,
    pub attendee_id: AttendeeId,
    pub registered_at: DateTime<Utc>,
    pub status: RegistrationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub registration_id: RegistrationId,
    pub event_id: EventId,
}

impl ValueObject for Ticket {}

/// A registration together with the ticket issued for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub registration: Registration,
    pub ticket: Ticket,
}

/// Confirmed registrations of one event, at most one per attendee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationLedger {
    confirmations: BTreeMap<RegistrationId, Confirmation>,
    by_attendee: HashMap<AttendeeId, RegistrationId>,
    next_id: u64,
}

impl RegistrationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a confirmed registration and its ticket.
    ///
    /// Callers must have debited the seat that backs it in the same unit of
    /// work.
    pub fn confirm(
        &mut self,
        event_id: EventId,
        attendee_id: AttendeeId,
        registered_at: DateTime<Utc>,
    ) -> Result<Confirmation, AdmissionError> {
        if self.by_attendee.contains_key(&attendee_id) {
            return Err(AdmissionError::AlreadyRegistered);
        }

        let id = RegistrationId(self.next_id + 1);
        let confirmation = Confirmation {
            registration: Registration {
                id,
                event_id,
                attendee_id,
                registered_at,
                status: RegistrationStatus::Confirmed,
            },
            ticket: Ticket {
                id: TicketId::issue(id, event_id),
                registration_id: id,
                event_id,
            },
        };
        self.record(confirmation.clone());
        Ok(confirmation)
    }

    /// Insert a confirmation that was already accepted (replay path).
    pub fn record(&mut self, confirmation: Confirmation) {
        let id = confirmation.registration.id;
        self.next_id = self.next_id.max(id.0);
        self.by_attendee
            .insert(confirmation.registration.attendee_id, id);
        self.confirmations.insert(id, confirmation);
    }

    /// Remove a registration and its ticket, returning them.
    pub fn release(&mut self, registration_id: RegistrationId) -> Option<Confirmation> {
        let confirmation = self.confirmations.remove(&registration_id)?;
        self.by_attendee
            .remove(&confirmation.registration.attendee_id);
        Some(confirmation)
    }

    pub fn is_registered(&self, attendee_id: AttendeeId) -> bool {
        self.by_attendee.contains_key(&attendee_id)
    }

    pub fn len(&self) -> usize {
        self.confirmations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.confirmations.is_empty()
    }

    /// Confirmations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Confirmation> {
        self.confirmations.values()
    }
}
