//! Integration tests for the full event-sourced pipeline.
//!
//! Tests: Command → EventStore → EventBus → Projection → ReadModel
//!
//! Verifies:
//! - Committed facts update the catalog and attendee read models
//! - Redelivery and full rebuilds give the same read models
//! - Projections reject gaps in a stream

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::Value as JsonValue;

use seatwise_admission::{
    AGGREGATE_TYPE, CancelRegistration, CreateListing, EventDetails, EventId, EventListing, IncreaseCapacity,
    ListingCommand, ListingEvent, RegistrationId, RequestAdmission,
};
use seatwise_core::AttendeeId;
use seatwise_events::{EventBus, EventEnvelope, InMemoryEventBus};

use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::projections::{
    AttendeeRegistrationsProjection, ListingCatalogProjection, ListingFilter, ListingReadModel, ProjectionError,
    RegistrationKey, RegistrationRow,
};
use crate::read_model::InMemoryReadModelStore;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Catalog = ListingCatalogProjection<Arc<InMemoryReadModelStore<EventId, ListingReadModel>>>;
type Attendees = AttendeeRegistrationsProjection<
    InMemoryReadModelStore<RegistrationKey, RegistrationRow>,
    InMemoryReadModelStore<EventId, EventDetails>,
>;

struct Pipeline {
    dispatcher: CommandDispatcher<Arc<InMemoryEventStore>, Bus>,
    catalog: Catalog,
    attendees: Attendees,
}

impl Pipeline {
    fn new() -> Self {
        Self {
            dispatcher: CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new())),
            catalog: ListingCatalogProjection::new(Arc::new(InMemoryReadModelStore::new())),
            attendees: AttendeeRegistrationsProjection::new(InMemoryReadModelStore::new(), InMemoryReadModelStore::new()),
        }
    }

    fn run(&self, cmd: ListingCommand) -> Vec<ListingEvent> {
        let event_id = cmd.event_id();
        let committed = self
            .dispatcher
            .dispatch(event_id.0, AGGREGATE_TYPE, cmd, |id| EventListing::empty(EventId::new(id)))
            .unwrap();
        self.catch_up(event_id);
        committed.into_iter().map(|c| c.event).collect()
    }

    fn catch_up(&self, event_id: EventId) {
        for stored in self.dispatcher.store().load_stream(event_id.0).unwrap() {
            let env = stored.to_envelope();
            self.catalog.apply_envelope(&env).unwrap();
            self.attendees.apply_envelope(&env).unwrap();
        }
    }

    fn create(&self, title: &str, category: &str, day: u32, capacity: u32) -> EventId {
        let event_id = EventId::generate();
        self.run(ListingCommand::CreateListing(CreateListing {
            event_id,
            details: EventDetails {
                title: title.to_string(),
                category: category.to_string(),
                location: "Civic Centre".to_string(),
                date: NaiveDate::from_ymd_opt(2026, 9, day).unwrap(),
                time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            },
            capacity,
            occurred_at: Utc::now(),
        }));
        event_id
    }

    fn request(&self, event_id: EventId, attendee_id: AttendeeId) -> Vec<ListingEvent> {
        self.run(ListingCommand::RequestAdmission(RequestAdmission {
            event_id,
            attendee_id,
            occurred_at: Utc::now(),
        }))
    }
}

#[test]
fn capacity_increase_promotion_reaches_every_read_model() {
    let p = Pipeline::new();
    let event_id = p.create("Rust workshop", "Workshop", 10, 2);
    let (a1, a2, a3) = (AttendeeId::new(), AttendeeId::new(), AttendeeId::new());

    p.request(event_id, a1);
    p.request(event_id, a2);
    p.request(event_id, a3);

    let before = p.catalog.get(event_id).unwrap();
    assert_eq!(before.seats_available, 0);
    assert_eq!(before.waitlisted, 1);
    assert!(p.attendees.for_attendee(a3).is_empty());

    p.run(ListingCommand::IncreaseCapacity(IncreaseCapacity {
        event_id,
        capacity: 3,
        occurred_at: Utc::now(),
    }));

    let after = p.catalog.get(event_id).unwrap();
    assert_eq!(after.capacity, 3);
    assert_eq!(after.seats_available, 0);
    assert_eq!(after.registrations, 3);
    assert_eq!(after.waitlisted, 0);

    let mine = p.attendees.for_attendee(a3);
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].title, "Rust workshop");
    assert_eq!(mine[0].ticket_id.as_str(), format!("T3E{event_id}"));
}

#[test]
fn cancellation_moves_the_row_to_the_promoted_attendee() {
    let p = Pipeline::new();
    let event_id = p.create("Quiz", "Social", 3, 1);
    let (holder, waiting) = (AttendeeId::new(), AttendeeId::new());
    p.request(event_id, holder);
    p.request(event_id, waiting);

    p.run(ListingCommand::CancelRegistration(CancelRegistration {
        event_id,
        registration_id: RegistrationId(1),
        occurred_at: Utc::now(),
    }));

    assert!(p.attendees.for_attendee(holder).is_empty());
    assert_eq!(p.attendees.for_attendee(waiting).len(), 1);
    let listing = p.catalog.get(event_id).unwrap();
    assert_eq!((listing.registrations, listing.waitlisted, listing.seats_available), (1, 0, 0));
}

#[test]
fn catalog_lists_by_date_and_filters() {
    let p = Pipeline::new();
    let late = p.create("Late", "Music", 20, 5);
    let early = p.create("Early", "Music", 2, 5);
    p.create("Match", "Sport", 5, 5);

    let music: Vec<EventId> = p
        .catalog
        .list(&ListingFilter::default().category("mus"))
        .into_iter()
        .map(|l| l.event_id)
        .collect();
    assert_eq!(music, vec![early, late]);

    let on_day = p
        .catalog
        .list(&ListingFilter::default().date(NaiveDate::from_ymd_opt(2026, 9, 5).unwrap()));
    assert_eq!(on_day.len(), 1);
    assert_eq!(on_day[0].title, "Match");
}

#[test]
fn redelivery_and_rebuild_give_the_same_read_models() {
    let p = Pipeline::new();
    let event_id = p.create("Talk", "Talk", 1, 1);
    let attendee = AttendeeId::new();
    p.request(event_id, attendee);
    p.request(event_id, AttendeeId::new());

    // Redeliver the whole stream.
    p.catch_up(event_id);
    let incremental = p.catalog.get(event_id).unwrap();
    assert_eq!(incremental.registrations, 1);
    assert_eq!(incremental.waitlisted, 1);

    let envelopes: Vec<_> = p
        .dispatcher
        .store()
        .load_all()
        .unwrap()
        .iter()
        .map(|e| e.to_envelope())
        .collect();
    p.catalog.rebuild_from_scratch(envelopes.clone()).unwrap();
    p.attendees.rebuild_from_scratch(envelopes).unwrap();

    assert_eq!(p.catalog.get(event_id).unwrap(), incremental);
    assert_eq!(p.attendees.for_attendee(attendee).len(), 1);
}

#[test]
fn projection_rejects_a_gap_in_the_stream() {
    let p = Pipeline::new();
    let event_id = p.create("Talk", "Talk", 1, 1);
    p.request(event_id, AttendeeId::new());
    p.request(event_id, AttendeeId::new());

    let stream = p.dispatcher.store().load_stream(event_id.0).unwrap();
    let fresh = Pipeline::new();
    fresh.catalog.apply_envelope(&stream[0].to_envelope()).unwrap();

    let err = fresh.catalog.apply_envelope(&stream[2].to_envelope()).unwrap_err();
    assert!(matches!(err, ProjectionError::NonMonotonicSequence { last: 1, found: 3 }));
}

#[test]
fn bus_subscribers_receive_committed_facts() {
    let p = Pipeline::new();
    let catalog: Arc<Catalog> = Arc::new(ListingCatalogProjection::new(Arc::new(InMemoryReadModelStore::new())));

    // Subscribe to the bus BEFORE any events are published
    let sub = p.dispatcher.bus().subscribe();
    let worker_catalog = Arc::clone(&catalog);
    let worker = std::thread::spawn(move || {
        let mut applied = 0;
        while applied < 3 {
            match sub.recv_timeout(Duration::from_secs(5)) {
                Ok(env) => {
                    worker_catalog.apply_envelope(&env).unwrap();
                    applied += 1;
                }
                Err(_) => break,
            }
        }
        applied
    });

    let event_id = p.create("Gig", "Music", 7, 1);
    p.request(event_id, AttendeeId::new());
    p.request(event_id, AttendeeId::new());

    assert_eq!(worker.join().unwrap(), 3);
    let listing = catalog.get(event_id).unwrap();
    assert_eq!((listing.registrations, listing.waitlisted), (1, 1));
}
