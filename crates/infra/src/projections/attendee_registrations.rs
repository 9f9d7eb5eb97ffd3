use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use seatwise_admission::{EventDetails, EventId, ListingEvent, RegistrationId, RegistrationStatus, TicketId};
use seatwise_core::AttendeeId;
use seatwise_events::EventEnvelope;

use super::ProjectionError;
use super::cursor::{StreamCursors, decode_listing_event};
use crate::read_model::ReadModelStore;

/// Stored registration row, keyed by `(event, registration)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRow {
    pub registration_id: RegistrationId,
    pub event_id: EventId,
    pub attendee_id: AttendeeId,
    pub ticket_id: TicketId,
    pub registered_at: DateTime<Utc>,
    pub status: RegistrationStatus,
}

pub type RegistrationKey = (EventId, RegistrationId);

/// One of an attendee's registrations, joined with the event's current details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeRegistration {
    pub registration_id: RegistrationId,
    pub event_id: EventId,
    pub title: String,
    pub category: String,
    pub location: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub ticket_id: TicketId,
    pub registered_at: DateTime<Utc>,
    pub status: RegistrationStatus,
}

/// Attendee registrations projection ("my events").
///
/// Keeps registration rows and the latest details of every event apart, so a
/// details edit never has to touch the rows.
#[derive(Debug)]
pub struct AttendeeRegistrationsProjection<R, D>
where
    R: ReadModelStore<RegistrationKey, RegistrationRow>,
    D: ReadModelStore<EventId, EventDetails>,
{
    rows: R,
    details: D,
    cursors: StreamCursors,
}

impl<R, D> AttendeeRegistrationsProjection<R, D>
where
    R: ReadModelStore<RegistrationKey, RegistrationRow>,
    D: ReadModelStore<EventId, EventDetails>,
{
    pub fn new(rows: R, details: D) -> Self {
        Self {
            rows,
            details,
            cursors: StreamCursors::new(),
        }
    }

    /// An attendee's registrations, ordered by event date and time.
    pub fn for_attendee(&self, attendee_id: AttendeeId) -> Vec<AttendeeRegistration> {
        let mut out: Vec<AttendeeRegistration> = self
            .rows
            .list()
            .into_iter()
            .filter(|r| r.attendee_id == attendee_id)
            .filter_map(|r| {
                let d = self.details.get(&r.event_id)?;
                Some(AttendeeRegistration {
                    registration_id: r.registration_id,
                    event_id: r.event_id,
                    title: d.title,
                    category: d.category,
                    location: d.location,
                    date: d.date,
                    time: d.time,
                    ticket_id: r.ticket_id,
                    registered_at: r.registered_at,
                    status: r.status,
                })
            })
            .collect();

        out.sort_by(|a, b| {
            (a.date, a.time, a.event_id, a.registration_id).cmp(&(b.date, b.time, b.event_id, b.registration_id))
        });
        out
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(event) = decode_listing_event(envelope)? else {
            return Ok(());
        };
        self.cursors.advance(envelope, || {
            self.apply_event(event);
            Ok(())
        })?;
        Ok(())
    }

    fn apply_event(&self, event: ListingEvent) {
        match event {
            ListingEvent::ListingCreated(e) => self.details.upsert(e.event_id, e.details),
            ListingEvent::DetailsEdited(e) => self.details.upsert(e.event_id, e.details),
            ListingEvent::AttendeeAdmitted(e) => {
                let c = e.confirmation;
                self.rows.upsert(
                    (c.registration.event_id, c.registration.id),
                    RegistrationRow {
                        registration_id: c.registration.id,
                        event_id: c.registration.event_id,
                        attendee_id: c.registration.attendee_id,
                        ticket_id: c.ticket.id,
                        registered_at: c.registration.registered_at,
                        status: c.registration.status,
                    },
                );
            }
            ListingEvent::RegistrationCancelled(e) => {
                self.rows.remove(&(e.event_id, e.registration_id));
            }
            ListingEvent::CapacityIncreased(_)
            | ListingEvent::AttendeeWaitlisted(_)
            | ListingEvent::WaitlistEntryWithdrawn(_) => {}
        }
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.clear();
        self.rows.clear();
        self.details.clear();

        for env in envelopes {
            self.apply_envelope(&env)?;
        }
        Ok(())
    }
}
