use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use seatwise_admission::{
    AGGREGATE_TYPE, CancelRegistration, Confirmation, CreateListing, DrainWaitlist, EditListing, EventDetails,
    EventId, EventListing, IncreaseCapacity, ListingCommand, ListingEvent, RegistrationId, RequestAdmission,
    WaitlistEntry, WithdrawFromWaitlist,
};
use seatwise_core::AttendeeId;
use seatwise_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use seatwise_infra::command_dispatcher::CommandDispatcher;
use seatwise_infra::event_store::{EventStore, InMemoryEventStore};
use seatwise_infra::projections::{
    AttendeeRegistration, AttendeeRegistrationsProjection, CategoryReport, EventReport, ListingCatalogProjection,
    ListingFilter, ListingReadModel, OverallSummary, RegistrationKey, RegistrationRow, category_reports,
};
use seatwise_infra::read_model::InMemoryReadModelStore;

use crate::config::EngineConfig;
use crate::error::EngineError;

type Store = Arc<InMemoryEventStore>;
type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Catalog = ListingCatalogProjection<InMemoryReadModelStore<EventId, ListingReadModel>>;
type Attendees = AttendeeRegistrationsProjection<
    InMemoryReadModelStore<RegistrationKey, RegistrationRow>,
    InMemoryReadModelStore<EventId, EventDetails>,
>;

/// Result of an admission request that was not rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionOutcome {
    /// A seat was debited and a ticket issued.
    Admitted(Confirmation),
    /// The event was full; the attendee now holds a waitlist entry.
    Waitlisted(WaitlistEntry),
}

/// Entry point for collaborators.
///
/// Writes go through the dispatcher as one transaction per event. After each
/// commit the read models catch up from the event's stream before the call
/// returns, so queries made afterwards observe the write.
#[derive(Debug)]
pub struct EventManager {
    dispatcher: CommandDispatcher<Store, Bus>,
    catalog: Catalog,
    attendees: Attendees,
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl EventManager {
    pub fn new(config: &EngineConfig) -> Self {
        let dispatcher = CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
            .with_conflict_retries(config.max_conflict_retries);

        Self {
            dispatcher,
            catalog: ListingCatalogProjection::new(InMemoryReadModelStore::new()),
            attendees: AttendeeRegistrationsProjection::new(InMemoryReadModelStore::new(), InMemoryReadModelStore::new()),
        }
    }

    /// Create an event with every seat free.
    pub fn create_event(&self, details: EventDetails, capacity: u32) -> Result<ListingReadModel, EngineError> {
        let event_id = EventId::generate();
        self.execute(ListingCommand::CreateListing(CreateListing {
            event_id,
            details,
            capacity,
            occurred_at: Utc::now(),
        }))?;

        tracing::info!(event_id = %event_id, capacity, "event created");
        self.get_event(event_id).ok_or(EngineError::NotFound)
    }

    /// Replace the details and set the capacity, which may only grow. Seats
    /// added by the edit go to the waitlist first.
    pub fn edit_event(
        &self,
        event_id: EventId,
        details: EventDetails,
        capacity: u32,
    ) -> Result<ListingReadModel, EngineError> {
        let events = self.execute(ListingCommand::EditListing(EditListing {
            event_id,
            details,
            capacity,
            occurred_at: Utc::now(),
        }))?;

        log_promotions(event_id, &events);
        self.get_event(event_id).ok_or(EngineError::NotFound)
    }

    /// Raise capacity and promote from the waitlist. Returns the promotions.
    pub fn increase_capacity(&self, event_id: EventId, capacity: u32) -> Result<Vec<Confirmation>, EngineError> {
        let events = self.execute(ListingCommand::IncreaseCapacity(IncreaseCapacity {
            event_id,
            capacity,
            occurred_at: Utc::now(),
        }))?;

        log_promotions(event_id, &events);
        Ok(promotions(events))
    }

    pub fn request_admission(
        &self,
        event_id: EventId,
        attendee_id: AttendeeId,
    ) -> Result<AdmissionOutcome, EngineError> {
        let events = self.execute(ListingCommand::RequestAdmission(RequestAdmission {
            event_id,
            attendee_id,
            occurred_at: Utc::now(),
        }))?;

        for event in events {
            match event {
                ListingEvent::AttendeeAdmitted(e) if e.confirmation.registration.attendee_id == attendee_id => {
                    tracing::info!(
                        event_id = %event_id,
                        attendee_id = %attendee_id,
                        registration_id = %e.confirmation.registration.id,
                        seats_available = e.seats_available,
                        "attendee admitted"
                    );
                    return Ok(AdmissionOutcome::Admitted(e.confirmation));
                }
                ListingEvent::AttendeeWaitlisted(e) if e.entry.attendee_id == attendee_id => {
                    tracing::info!(
                        event_id = %event_id,
                        attendee_id = %attendee_id,
                        entry_id = %e.entry.id,
                        "event full, attendee waitlisted"
                    );
                    return Ok(AdmissionOutcome::Waitlisted(e.entry));
                }
                _ => {}
            }
        }

        Err(EngineError::Rejected(
            "admission request committed no outcome for the attendee".to_string(),
        ))
    }

    /// Promote waitlisted attendees into free seats. Returns the promotions.
    pub fn drain_waitlist(&self, event_id: EventId) -> Result<Vec<Confirmation>, EngineError> {
        let events = self.execute(ListingCommand::DrainWaitlist(DrainWaitlist {
            event_id,
            occurred_at: Utc::now(),
        }))?;

        log_promotions(event_id, &events);
        Ok(promotions(events))
    }

    /// Remove a registration and hand its seat to the waitlist. Returns the
    /// promotions the freed seat caused.
    pub fn cancel_registration(
        &self,
        event_id: EventId,
        registration_id: RegistrationId,
    ) -> Result<Vec<Confirmation>, EngineError> {
        let events = self.execute(ListingCommand::CancelRegistration(CancelRegistration {
            event_id,
            registration_id,
            occurred_at: Utc::now(),
        }))?;

        tracing::info!(event_id = %event_id, registration_id = %registration_id, "registration cancelled");
        log_promotions(event_id, &events);
        Ok(promotions(events))
    }

    pub fn withdraw_from_waitlist(&self, event_id: EventId, attendee_id: AttendeeId) -> Result<(), EngineError> {
        self.execute(ListingCommand::WithdrawFromWaitlist(WithdrawFromWaitlist {
            event_id,
            attendee_id,
            occurred_at: Utc::now(),
        }))?;

        tracing::info!(event_id = %event_id, attendee_id = %attendee_id, "waitlist entry withdrawn");
        Ok(())
    }

    pub fn get_event(&self, event_id: EventId) -> Option<ListingReadModel> {
        self.catalog.get(event_id)
    }

    /// Events matching `filter`, ordered by date then time.
    pub fn list_events(&self, filter: &ListingFilter) -> Vec<ListingReadModel> {
        self.catalog.list(filter)
    }

    pub fn attendee_registrations(&self, attendee_id: AttendeeId) -> Vec<AttendeeRegistration> {
        self.attendees.for_attendee(attendee_id)
    }

    pub fn event_report(&self, event_id: EventId) -> Result<EventReport, EngineError> {
        self.catalog
            .get(event_id)
            .map(|l| EventReport::from(&l))
            .ok_or(EngineError::NotFound)
    }

    /// Per-category totals, busiest category first.
    pub fn category_report(&self) -> Vec<CategoryReport> {
        category_reports(&self.catalog.list(&ListingFilter::default()))
    }

    pub fn overall_summary(&self) -> OverallSummary {
        OverallSummary::from_listings(&self.catalog.list(&ListingFilter::default()))
    }

    /// Receive every fact committed from now on.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.dispatcher.bus().subscribe()
    }

    /// Drop the read models and rebuild them from the event store.
    pub fn rebuild_read_models(&self) -> Result<(), EngineError> {
        let envelopes: Vec<_> = self
            .dispatcher
            .store()
            .load_all()
            .map_err(|e| EngineError::Storage(e.to_string()))?
            .iter()
            .map(|e| e.to_envelope())
            .collect();

        self.catalog.rebuild_from_scratch(envelopes.clone())?;
        self.attendees.rebuild_from_scratch(envelopes)?;
        tracing::info!("read models rebuilt");
        Ok(())
    }

    /// Run one transaction, then bring the read models up to date.
    fn execute(&self, command: ListingCommand) -> Result<Vec<ListingEvent>, EngineError> {
        let event_id = command.event_id();
        let committed = self
            .dispatcher
            .dispatch(event_id.0, AGGREGATE_TYPE, command, |id| EventListing::empty(EventId::new(id)))?;
        self.catch_up(event_id)?;
        Ok(committed.into_iter().map(|c| c.event).collect())
    }

    fn catch_up(&self, event_id: EventId) -> Result<(), EngineError> {
        let stream = self
            .dispatcher
            .store()
            .load_stream(event_id.0)
            .map_err(|e| EngineError::Storage(e.to_string()))?;

        for stored in &stream {
            let env = stored.to_envelope();
            self.catalog.apply_envelope(&env)?;
            self.attendees.apply_envelope(&env)?;
        }
        Ok(())
    }
}

fn promotions(events: Vec<ListingEvent>) -> Vec<Confirmation> {
    events
        .into_iter()
        .filter_map(|e| match e {
            ListingEvent::AttendeeAdmitted(a) if a.promoted_from.is_some() => Some(a.confirmation),
            _ => None,
        })
        .collect()
}

fn log_promotions(event_id: EventId, events: &[ListingEvent]) {
    for event in events {
        if let ListingEvent::AttendeeAdmitted(e) = event {
            tracing::info!(
                event_id = %event_id,
                attendee_id = %e.confirmation.registration.attendee_id,
                registration_id = %e.confirmation.registration.id,
                seats_available = e.seats_available,
                "promoted from waitlist"
            );
        }
    }
}
