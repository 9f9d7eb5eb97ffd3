use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use seatwise_core::{Aggregate, AggregateRoot, AttendeeId, DomainError, ValueObject};
use seatwise_events::Event;

use crate::capacity::SeatLedger;
use crate::error::AdmissionError;
use crate::ids::{EventId, RegistrationId, WaitlistEntryId};
use crate::registration::{Confirmation, RegistrationLedger};
use crate::waitlist::{WaitlistEntry, WaitlistQueue};

/// Stream type recorded next to every listing event.
pub const AGGREGATE_TYPE: &str = "listing";

/// Descriptive fields of an event. Editing them has no seat side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    pub title: String,
    pub category: String,
    pub location: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl ValueObject for EventDetails {}

impl EventDetails {
    fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        Ok(())
    }
}

/// Aggregate root: one event with its seats, registrations and waitlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventListing {
    id: EventId,
    details: Option<EventDetails>,
    seats: SeatLedger,
    registrations: RegistrationLedger,
    waitlist: WaitlistQueue,
    version: u64,
    created: bool,
}

impl EventListing {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: EventId) -> Self {
        Self {
            id,
            details: None,
            seats: SeatLedger::default(),
            registrations: RegistrationLedger::new(),
            waitlist: WaitlistQueue::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> EventId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn details(&self) -> Option<&EventDetails> {
        self.details.as_ref()
    }

    pub fn seats(&self) -> &SeatLedger {
        &self.seats
    }

    pub fn registrations(&self) -> &RegistrationLedger {
        &self.registrations
    }

    pub fn waitlist(&self) -> &WaitlistQueue {
        &self.waitlist
    }

    /// Check the cross-component invariants:
    /// - the seat ledger matches the number of confirmed registrations;
    /// - nobody waits while a seat is free;
    /// - nobody is both registered and waitlisted.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        self.seats.check_against(self.registrations.len())?;

        if !self.waitlist.is_empty() && !self.seats.is_full() {
            return Err(DomainError::invariant(format!(
                "{} waiting while {} seats are free",
                self.waitlist.len(),
                self.seats.seats_available()
            )));
        }

        if let Some(entry) = self
            .waitlist
            .iter()
            .find(|e| self.registrations.is_registered(e.attendee_id))
        {
            return Err(DomainError::invariant(format!(
                "attendee {} is both registered and waitlisted",
                entry.attendee_id
            )));
        }

        Ok(())
    }
}

impl AggregateRoot for EventListing {
    type Id = EventId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateListing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateListing {
    pub event_id: EventId,
    pub details: EventDetails,
    pub capacity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditListing. Replaces the details and raises capacity if asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditListing {
    pub event_id: EventId,
    pub details: EventDetails,
    pub capacity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: IncreaseCapacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncreaseCapacity {
    pub event_id: EventId,
    pub capacity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RequestAdmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAdmission {
    pub event_id: EventId,
    pub attendee_id: AttendeeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DrainWaitlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainWaitlist {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelRegistration. Releases the seat and drains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRegistration {
    pub event_id: EventId,
    pub registration_id: RegistrationId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: WithdrawFromWaitlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawFromWaitlist {
    pub event_id: EventId,
    pub attendee_id: AttendeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingCommand {
    CreateListing(CreateListing),
    EditListing(EditListing),
    IncreaseCapacity(IncreaseCapacity),
    RequestAdmission(RequestAdmission),
    DrainWaitlist(DrainWaitlist),
    CancelRegistration(CancelRegistration),
    WithdrawFromWaitlist(WithdrawFromWaitlist),
}

impl ListingCommand {
    pub fn event_id(&self) -> EventId {
        match self {
            ListingCommand::CreateListing(c) => c.event_id,
            ListingCommand::EditListing(c) => c.event_id,
            ListingCommand::IncreaseCapacity(c) => c.event_id,
            ListingCommand::RequestAdmission(c) => c.event_id,
            ListingCommand::DrainWaitlist(c) => c.event_id,
            ListingCommand::CancelRegistration(c) => c.event_id,
            ListingCommand::WithdrawFromWaitlist(c) => c.event_id,
        }
    }
}

/// Event: ListingCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingCreated {
    pub event_id: EventId,
    pub details: EventDetails,
    pub capacity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DetailsEdited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsEdited {
    pub event_id: EventId,
    pub details: EventDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CapacityIncreased. Carries the seat count after the increase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityIncreased {
    pub event_id: EventId,
    pub previous_capacity: u32,
    pub capacity: u32,
    pub seats_available: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AttendeeAdmitted.
///
/// One seat debited, one registration and ticket created and, for a
/// promotion, the waitlist entry it came from removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeAdmitted {
    pub event_id: EventId,
    pub confirmation: Confirmation,
    pub promoted_from: Option<WaitlistEntryId>,
    pub seats_available: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AttendeeWaitlisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeWaitlisted {
    pub event_id: EventId,
    pub entry: WaitlistEntry,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RegistrationCancelled. Carries the seat count after the release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationCancelled {
    pub event_id: EventId,
    pub registration_id: RegistrationId,
    pub attendee_id: AttendeeId,
    pub seats_available: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: WaitlistEntryWithdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntryWithdrawn {
    pub event_id: EventId,
    pub entry_id: WaitlistEntryId,
    pub attendee_id: AttendeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingEvent {
    ListingCreated(ListingCreated),
    DetailsEdited(DetailsEdited),
    CapacityIncreased(CapacityIncreased),
    AttendeeAdmitted(AttendeeAdmitted),
    AttendeeWaitlisted(AttendeeWaitlisted),
    RegistrationCancelled(RegistrationCancelled),
    WaitlistEntryWithdrawn(WaitlistEntryWithdrawn),
}

impl ListingEvent {
    pub fn event_id(&self) -> EventId {
        match self {
            ListingEvent::ListingCreated(e) => e.event_id,
            ListingEvent::DetailsEdited(e) => e.event_id,
            ListingEvent::CapacityIncreased(e) => e.event_id,
            ListingEvent::AttendeeAdmitted(e) => e.event_id,
            ListingEvent::AttendeeWaitlisted(e) => e.event_id,
            ListingEvent::RegistrationCancelled(e) => e.event_id,
            ListingEvent::WaitlistEntryWithdrawn(e) => e.event_id,
        }
    }
}

impl Event for ListingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ListingEvent::ListingCreated(_) => "listing.created",
            ListingEvent::DetailsEdited(_) => "listing.details_edited",
            ListingEvent::CapacityIncreased(_) => "listing.capacity_increased",
            ListingEvent::AttendeeAdmitted(_) => "listing.attendee_admitted",
            ListingEvent::AttendeeWaitlisted(_) => "listing.attendee_waitlisted",
            ListingEvent::RegistrationCancelled(_) => "listing.registration_cancelled",
            ListingEvent::WaitlistEntryWithdrawn(_) => "listing.waitlist_entry_withdrawn",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ListingEvent::ListingCreated(e) => e.occurred_at,
            ListingEvent::DetailsEdited(e) => e.occurred_at,
            ListingEvent::CapacityIncreased(e) => e.occurred_at,
            ListingEvent::AttendeeAdmitted(e) => e.occurred_at,
            ListingEvent::AttendeeWaitlisted(e) => e.occurred_at,
            ListingEvent::RegistrationCancelled(e) => e.occurred_at,
            ListingEvent::WaitlistEntryWithdrawn(e) => e.occurred_at,
        }
    }
}

impl Aggregate for EventListing {
    type Command = ListingCommand;
    type Event = ListingEvent;
    type Error = AdmissionError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ListingEvent::ListingCreated(e) => {
                self.id = e.event_id;
                self.details = Some(e.details.clone());
                self.seats = SeatLedger::restore(e.capacity, e.capacity);
                self.created = true;
            }
            ListingEvent::DetailsEdited(e) => {
                self.details = Some(e.details.clone());
            }
            ListingEvent::CapacityIncreased(e) => {
                self.seats = SeatLedger::restore(e.capacity, e.seats_available);
            }
            ListingEvent::AttendeeAdmitted(e) => {
                self.registrations.record(e.confirmation.clone());
                if let Some(entry_id) = e.promoted_from {
                    self.waitlist.remove(entry_id);
                }
                self.seats = SeatLedger::restore(self.seats.capacity(), e.seats_available);
            }
            ListingEvent::AttendeeWaitlisted(e) => {
                self.waitlist.record(e.entry.clone());
            }
            ListingEvent::RegistrationCancelled(e) => {
                self.registrations.release(e.registration_id);
                self.seats = SeatLedger::restore(self.seats.capacity(), e.seats_available);
            }
            ListingEvent::WaitlistEntryWithdrawn(e) => {
                self.waitlist.remove(e.entry_id);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ListingCommand::CreateListing(cmd) => self.handle_create(cmd),
            ListingCommand::EditListing(cmd) => self.handle_edit(cmd),
            ListingCommand::IncreaseCapacity(cmd) => self.handle_increase_capacity(cmd),
            ListingCommand::RequestAdmission(cmd) => self.handle_request_admission(cmd),
            ListingCommand::DrainWaitlist(cmd) => self.handle_drain(cmd),
            ListingCommand::CancelRegistration(cmd) => self.handle_cancel(cmd),
            ListingCommand::WithdrawFromWaitlist(cmd) => self.handle_withdraw(cmd),
        }
    }
}

// Decisions run against a draft clone. The draft is mutated through the
// ledger and queue contracts while facts are collected; only the facts leave
// `handle`, and `apply` replays them onto the real state.
impl EventListing {
    fn ensure_exists(&self, event_id: EventId) -> Result<(), AdmissionError> {
        if !self.created {
            return Err(AdmissionError::NotFound);
        }
        if self.id != event_id {
            return Err(DomainError::invariant("event_id mismatch").into());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateListing) -> Result<Vec<ListingEvent>, AdmissionError> {
        if self.created {
            return Err(AdmissionError::AlreadyExists);
        }
        cmd.details.validate()?;
        SeatLedger::open(cmd.capacity)?;

        Ok(vec![ListingEvent::ListingCreated(ListingCreated {
            event_id: cmd.event_id,
            details: cmd.details.clone(),
            capacity: cmd.capacity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit(&self, cmd: &EditListing) -> Result<Vec<ListingEvent>, AdmissionError> {
        self.ensure_exists(cmd.event_id)?;
        cmd.details.validate()?;

        let mut draft = self.clone();
        let mut events = Vec::new();

        // Capacity first so a rejected decrease leaves the details untouched too.
        if let Some(increased) = draft.raise_capacity(cmd.capacity, cmd.occurred_at)? {
            events.push(increased);
        }

        if self.details.as_ref() != Some(&cmd.details) {
            draft.details = Some(cmd.details.clone());
            events.push(ListingEvent::DetailsEdited(DetailsEdited {
                event_id: self.id,
                details: cmd.details.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }

        events.extend(draft.drain(cmd.occurred_at));
        Ok(events)
    }

    fn handle_increase_capacity(
        &self,
        cmd: &IncreaseCapacity,
    ) -> Result<Vec<ListingEvent>, AdmissionError> {
        self.ensure_exists(cmd.event_id)?;

        let mut draft = self.clone();
        let mut events = Vec::new();
        if let Some(increased) = draft.raise_capacity(cmd.capacity, cmd.occurred_at)? {
            events.push(increased);
        }
        events.extend(draft.drain(cmd.occurred_at));
        Ok(events)
    }

    fn handle_request_admission(
        &self,
        cmd: &RequestAdmission,
    ) -> Result<Vec<ListingEvent>, AdmissionError> {
        self.ensure_exists(cmd.event_id)?;

        if self.registrations.is_registered(cmd.attendee_id) {
            return Err(AdmissionError::AlreadyRegistered);
        }

        let mut draft = self.clone();
        let promoted_from = draft.waitlist.entry_for(cmd.attendee_id).map(|e| e.id);

        match draft.admit(cmd.attendee_id, promoted_from, cmd.occurred_at) {
            Ok(admitted) => Ok(vec![admitted]),
            Err(AdmissionError::NoSeatsAvailable) => {
                let entry = draft
                    .waitlist
                    .enqueue(self.id, cmd.attendee_id, cmd.occurred_at)?;
                Ok(vec![ListingEvent::AttendeeWaitlisted(AttendeeWaitlisted {
                    event_id: self.id,
                    entry,
                    occurred_at: cmd.occurred_at,
                })])
            }
            Err(other) => Err(other),
        }
    }

    fn handle_drain(&self, cmd: &DrainWaitlist) -> Result<Vec<ListingEvent>, AdmissionError> {
        self.ensure_exists(cmd.event_id)?;
        let mut draft = self.clone();
        Ok(draft.drain(cmd.occurred_at))
    }

    fn handle_cancel(&self, cmd: &CancelRegistration) -> Result<Vec<ListingEvent>, AdmissionError> {
        self.ensure_exists(cmd.event_id)?;

        let mut draft = self.clone();
        let released = draft
            .registrations
            .release(cmd.registration_id)
            .ok_or(AdmissionError::NotFound)?;
        draft.seats.credit_seat();

        let mut events = vec![ListingEvent::RegistrationCancelled(RegistrationCancelled {
            event_id: self.id,
            registration_id: released.registration.id,
            attendee_id: released.registration.attendee_id,
            seats_available: draft.seats.seats_available(),
            occurred_at: cmd.occurred_at,
        })];
        events.extend(draft.drain(cmd.occurred_at));
        Ok(events)
    }

    fn handle_withdraw(&self, cmd: &WithdrawFromWaitlist) -> Result<Vec<ListingEvent>, AdmissionError> {
        self.ensure_exists(cmd.event_id)?;

        let entry = self
            .waitlist
            .entry_for(cmd.attendee_id)
            .ok_or(AdmissionError::NotFound)?;

        Ok(vec![ListingEvent::WaitlistEntryWithdrawn(WaitlistEntryWithdrawn {
            event_id: self.id,
            entry_id: entry.id,
            attendee_id: entry.attendee_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Raise capacity on the draft. `None` when the capacity is unchanged.
    fn raise_capacity(
        &mut self,
        new_capacity: u32,
        occurred_at: DateTime<Utc>,
    ) -> Result<Option<ListingEvent>, AdmissionError> {
        let previous_capacity = self.seats.capacity();
        let delta = self.seats.increase_capacity(new_capacity)?;
        if delta == 0 {
            return Ok(None);
        }

        Ok(Some(ListingEvent::CapacityIncreased(CapacityIncreased {
            event_id: self.id,
            previous_capacity,
            capacity: self.seats.capacity(),
            seats_available: self.seats.seats_available(),
            occurred_at,
        })))
    }

    /// Debit a seat and confirm `attendee_id` on the draft.
    fn admit(
        &mut self,
        attendee_id: AttendeeId,
        promoted_from: Option<WaitlistEntryId>,
        occurred_at: DateTime<Utc>,
    ) -> Result<ListingEvent, AdmissionError> {
        if self.registrations.is_registered(attendee_id) {
            return Err(AdmissionError::AlreadyRegistered);
        }

        self.seats.debit_seat()?;
        let confirmation = self.registrations.confirm(self.id, attendee_id, occurred_at)?;
        if let Some(entry_id) = promoted_from {
            self.waitlist.remove(entry_id);
        }

        Ok(ListingEvent::AttendeeAdmitted(AttendeeAdmitted {
            event_id: self.id,
            confirmation,
            promoted_from,
            seats_available: self.seats.seats_available(),
            occurred_at,
        }))
    }

    /// Promote waitlist entries in queue order while seats remain.
    ///
    /// Each round re-reads the free seats and the queue head. The loop is
    /// bounded by the seats free when it starts, and a failed promotion ends
    /// it instead of being retried.
    fn drain(&mut self, occurred_at: DateTime<Utc>) -> Vec<ListingEvent> {
        let budget = self.seats.seats_available();
        let mut promoted = Vec::new();

        for _ in 0..budget {
            if self.seats.is_full() {
                break;
            }
            let Some(front) = self.waitlist.peek_front().cloned() else {
                break;
            };
            match self.admit(front.attendee_id, Some(front.id), occurred_at) {
                Ok(admitted) => promoted.push(admitted),
                Err(_) => break,
            }
        }

        promoted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use seatwise_core::AggregateId;

    fn test_event_id() -> EventId {
        EventId::new(AggregateId::new())
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn details(title: &str) -> EventDetails {
        EventDetails {
            title: title.to_string(),
            category: "Workshop".to_string(),
            location: "Hall A".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 11, 3).unwrap(),
            time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
        }
    }

    /// Run a command and apply what it decided, like the dispatcher does.
    fn exec(listing: &mut EventListing, cmd: ListingCommand) -> Result<Vec<ListingEvent>, AdmissionError> {
        let events = listing.handle(&cmd)?;
        for e in &events {
            listing.apply(e);
        }
        Ok(events)
    }

    fn created(capacity: u32) -> EventListing {
        let event_id = test_event_id();
        let mut listing = EventListing::empty(event_id);
        exec(
            &mut listing,
            ListingCommand::CreateListing(CreateListing {
                event_id,
                details: details("Rust meetup"),
                capacity,
                occurred_at: at(0),
            }),
        )
        .unwrap();
        listing
    }

    fn request(listing: &mut EventListing, attendee: AttendeeId, t: i64) -> Result<Vec<ListingEvent>, AdmissionError> {
        let event_id = listing.id_typed();
        exec(
            listing,
            ListingCommand::RequestAdmission(RequestAdmission {
                event_id,
                attendee_id: attendee,
                occurred_at: at(t),
            }),
        )
    }

    fn increase(listing: &mut EventListing, capacity: u32, t: i64) -> Result<Vec<ListingEvent>, AdmissionError> {
        let event_id = listing.id_typed();
        exec(
            listing,
            ListingCommand::IncreaseCapacity(IncreaseCapacity {
                event_id,
                capacity,
                occurred_at: at(t),
            }),
        )
    }

    #[test]
    fn create_listing_opens_every_seat() {
        let listing = created(3);
        assert!(listing.is_created());
        assert_eq!(listing.seats().capacity(), 3);
        assert_eq!(listing.seats().seats_available(), 3);
        assert_eq!(listing.version(), 1);
    }

    #[test]
    fn create_rejects_zero_capacity_and_blank_title() {
        let event_id = test_event_id();
        let listing = EventListing::empty(event_id);

        let err = listing
            .handle(&ListingCommand::CreateListing(CreateListing {
                event_id,
                details: details("Rust meetup"),
                capacity: 0,
                occurred_at: at(0),
            }))
            .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidCapacity(_)));

        let err = listing
            .handle(&ListingCommand::CreateListing(CreateListing {
                event_id,
                details: details("   "),
                capacity: 5,
                occurred_at: at(0),
            }))
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn commands_against_unknown_event_are_not_found() {
        let event_id = test_event_id();
        let listing = EventListing::empty(event_id);
        let err = listing
            .handle(&ListingCommand::RequestAdmission(RequestAdmission {
                event_id,
                attendee_id: AttendeeId::new(),
                occurred_at: at(1),
            }))
            .unwrap_err();
        assert_eq!(err, AdmissionError::NotFound);
    }

    #[test]
    fn admission_debits_and_issues_ticket() {
        let mut listing = created(2);
        let attendee = AttendeeId::new();

        let events = request(&mut listing, attendee, 1).unwrap();

        match &events[..] {
            [ListingEvent::AttendeeAdmitted(e)] => {
                assert_eq!(e.confirmation.registration.attendee_id, attendee);
                assert_eq!(e.confirmation.ticket.registration_id, e.confirmation.registration.id);
                assert_eq!(e.seats_available, 1);
                assert_eq!(e.promoted_from, None);
            }
            other => panic!("Expected a single AttendeeAdmitted event, got {other:?}"),
        }
        assert_eq!(listing.seats().seats_available(), 1);
        listing.check_invariants().unwrap();
    }

    #[test]
    fn duplicate_request_is_rejected_without_mutation() {
        let mut listing = created(2);
        let attendee = AttendeeId::new();
        request(&mut listing, attendee, 1).unwrap();
        let before = listing.clone();

        let err = request(&mut listing, attendee, 2).unwrap_err();

        assert_eq!(err, AdmissionError::AlreadyRegistered);
        assert_eq!(listing, before);
    }

    #[test]
    fn full_event_waitlists_and_rejects_second_waitlist_request() {
        let mut listing = created(1);
        request(&mut listing, AttendeeId::new(), 1).unwrap();
        let waiting = AttendeeId::new();

        let events = request(&mut listing, waiting, 2).unwrap();
        assert!(matches!(&events[..], [ListingEvent::AttendeeWaitlisted(e)] if e.entry.attendee_id == waiting));

        let err = request(&mut listing, waiting, 3).unwrap_err();
        assert_eq!(err, AdmissionError::AlreadyWaitlisted);
        assert_eq!(listing.waitlist().len(), 1);
    }

    #[test]
    fn capacity_increase_promotes_the_waitlisted_attendee() {
        // capacity=2: admit 1, admit 2, 3 waitlisted; 2 -> 3 promotes 3.
        let mut listing = created(2);
        let (a1, a2, a3) = (AttendeeId::new(), AttendeeId::new(), AttendeeId::new());

        request(&mut listing, a1, 1).unwrap();
        assert_eq!(listing.seats().seats_available(), 1);
        request(&mut listing, a2, 2).unwrap();
        assert_eq!(listing.seats().seats_available(), 0);
        request(&mut listing, a3, 3).unwrap();
        assert_eq!(listing.waitlist().peek_front().unwrap().attendee_id, a3);

        let events = increase(&mut listing, 3, 4).unwrap();

        assert_eq!(events.len(), 2);
        match &events[1] {
            ListingEvent::AttendeeAdmitted(e) => {
                assert_eq!(e.confirmation.registration.attendee_id, a3);
                assert!(e.promoted_from.is_some());
            }
            other => panic!("Expected AttendeeAdmitted, got {other:?}"),
        }
        assert!(listing.registrations().is_registered(a3));
        assert_eq!(listing.seats().seats_available(), 0);
        assert!(listing.waitlist().is_empty());
        listing.check_invariants().unwrap();
    }

    #[test]
    fn one_new_seat_promotes_only_the_queue_head() {
        // capacity=1 full, queue=[A(t=1), B(t=2)]; 1 -> 2 promotes A only.
        let mut listing = created(1);
        request(&mut listing, AttendeeId::new(), 0).unwrap();
        let (a, b) = (AttendeeId::new(), AttendeeId::new());
        request(&mut listing, a, 1).unwrap();
        request(&mut listing, b, 2).unwrap();

        increase(&mut listing, 2, 3).unwrap();

        assert!(listing.registrations().is_registered(a));
        assert!(!listing.registrations().is_registered(b));
        assert_eq!(listing.waitlist().peek_front().unwrap().attendee_id, b);
        assert_eq!(listing.seats().seats_available(), 0);
        listing.check_invariants().unwrap();
    }

    #[test]
    fn capacity_decrease_is_rejected() {
        let mut listing = created(3);
        let before = listing.clone();

        let err = increase(&mut listing, 2, 1).unwrap_err();

        assert!(matches!(err, AdmissionError::InvalidCapacity(_)));
        assert_eq!(listing, before);
    }

    #[test]
    fn unchanged_edit_emits_nothing() {
        let mut listing = created(3);
        let event_id = listing.id_typed();
        let events = exec(
            &mut listing,
            ListingCommand::EditListing(EditListing {
                event_id,
                details: details("Rust meetup"),
                capacity: 3,
                occurred_at: at(1),
            }),
        )
        .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn edit_updates_details_raises_capacity_and_drains() {
        let mut listing = created(1);
        request(&mut listing, AttendeeId::new(), 1).unwrap();
        let waiting = AttendeeId::new();
        request(&mut listing, waiting, 2).unwrap();
        let event_id = listing.id_typed();

        let events = exec(
            &mut listing,
            ListingCommand::EditListing(EditListing {
                event_id,
                details: details("Rust meetup (moved)"),
                capacity: 4,
                occurred_at: at(3),
            }),
        )
        .unwrap();

        let kinds: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            kinds,
            vec!["listing.capacity_increased", "listing.details_edited", "listing.attendee_admitted"]
        );
        assert_eq!(listing.details().unwrap().title, "Rust meetup (moved)");
        assert!(listing.registrations().is_registered(waiting));
        assert_eq!(listing.seats().seats_available(), 2);
        listing.check_invariants().unwrap();
    }

    #[test]
    fn edit_with_lower_capacity_changes_nothing() {
        let mut listing = created(3);
        let before = listing.clone();
        let event_id = listing.id_typed();

        let err = exec(
            &mut listing,
            ListingCommand::EditListing(EditListing {
                event_id,
                details: details("Renamed"),
                capacity: 1,
                occurred_at: at(1),
            }),
        )
        .unwrap_err();

        assert!(matches!(err, AdmissionError::InvalidCapacity(_)));
        assert_eq!(listing, before);
    }

    #[test]
    fn cancellation_releases_the_seat_to_the_queue_head() {
        let mut listing = created(1);
        let holder = AttendeeId::new();
        let events = request(&mut listing, holder, 1).unwrap();
        let registration_id = match &events[0] {
            ListingEvent::AttendeeAdmitted(e) => e.confirmation.registration.id,
            other => panic!("Expected AttendeeAdmitted, got {other:?}"),
        };
        let waiting = AttendeeId::new();
        request(&mut listing, waiting, 2).unwrap();
        let event_id = listing.id_typed();

        let events = exec(
            &mut listing,
            ListingCommand::CancelRegistration(CancelRegistration {
                event_id,
                registration_id,
                occurred_at: at(3),
            }),
        )
        .unwrap();

        assert_eq!(events.len(), 2);
        assert!(!listing.registrations().is_registered(holder));
        assert!(listing.registrations().is_registered(waiting));
        assert_eq!(listing.seats().seats_available(), 0);
        listing.check_invariants().unwrap();
    }

    #[test]
    fn cancelling_unknown_registration_is_not_found() {
        let mut listing = created(1);
        let event_id = listing.id_typed();
        let err = exec(
            &mut listing,
            ListingCommand::CancelRegistration(CancelRegistration {
                event_id,
                registration_id: RegistrationId(42),
                occurred_at: at(1),
            }),
        )
        .unwrap_err();
        assert_eq!(err, AdmissionError::NotFound);
    }

    #[test]
    fn withdrawal_removes_the_entry_and_skips_it_on_drain() {
        let mut listing = created(1);
        request(&mut listing, AttendeeId::new(), 0).unwrap();
        let (a, b) = (AttendeeId::new(), AttendeeId::new());
        request(&mut listing, a, 1).unwrap();
        request(&mut listing, b, 2).unwrap();
        let event_id = listing.id_typed();

        exec(
            &mut listing,
            ListingCommand::WithdrawFromWaitlist(WithdrawFromWaitlist {
                event_id,
                attendee_id: a,
                occurred_at: at(3),
            }),
        )
        .unwrap();
        increase(&mut listing, 2, 4).unwrap();

        assert!(!listing.registrations().is_registered(a));
        assert!(listing.registrations().is_registered(b));
        assert!(listing.waitlist().is_empty());
    }

    #[test]
    fn drain_with_nothing_to_do_is_empty() {
        let mut listing = created(2);
        let event_id = listing.id_typed();
        let events = exec(
            &mut listing,
            ListingCommand::DrainWaitlist(DrainWaitlist {
                event_id,
                occurred_at: at(1),
            }),
        )
        .unwrap();
        assert!(events.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Request(usize, i64),
        Increase(u32),
        Cancel(u64),
        Withdraw(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0usize..12, 0i64..6).prop_map(|(a, t)| Op::Request(a, t)),
            1 => (0u32..3).prop_map(Op::Increase),
            1 => (1u64..12).prop_map(Op::Cancel),
            1 => (0usize..12).prop_map(Op::Withdraw),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after every command the seat ledger agrees with the
        /// registrations, capacity never shrinks, and replaying the stored
        /// (JSON) facts onto a fresh aggregate reproduces the same state.
        #[test]
        fn invariants_hold_and_history_replays(
            initial in 1u32..4,
            ops in prop::collection::vec(op(), 0..48)
        ) {
            let attendees: Vec<AttendeeId> = (0..12).map(|_| AttendeeId::new()).collect();
            let mut listing = created(initial);
            let event_id = listing.id_typed();
            let mut history = Vec::new();
            let mut last_capacity = listing.seats().capacity();

            for (step, op) in ops.into_iter().enumerate() {
                let t = step as i64;
                let cmd = match op {
                    Op::Request(a, skew) => ListingCommand::RequestAdmission(RequestAdmission {
                        event_id,
                        attendee_id: attendees[a],
                        occurred_at: at(t - skew),
                    }),
                    Op::Increase(by) => ListingCommand::IncreaseCapacity(IncreaseCapacity {
                        event_id,
                        capacity: listing.seats().capacity() + by,
                        occurred_at: at(t),
                    }),
                    Op::Cancel(id) => ListingCommand::CancelRegistration(CancelRegistration {
                        event_id,
                        registration_id: RegistrationId(id),
                        occurred_at: at(t),
                    }),
                    Op::Withdraw(a) => ListingCommand::WithdrawFromWaitlist(WithdrawFromWaitlist {
                        event_id,
                        attendee_id: attendees[a],
                        occurred_at: at(t),
                    }),
                };

                if let Ok(events) = exec(&mut listing, cmd) {
                    history.extend(events);
                }

                prop_assert!(listing.check_invariants().is_ok(), "{:?}", listing.check_invariants());
                prop_assert!(listing.seats().capacity() >= last_capacity);
                last_capacity = listing.seats().capacity();
            }

            let mut replayed = EventListing::empty(event_id);
            replayed.apply(&ListingEvent::ListingCreated(ListingCreated {
                event_id,
                details: details("Rust meetup"),
                capacity: initial,
                occurred_at: at(0),
            }));
            for e in &history {
                let stored = serde_json::to_value(e).unwrap();
                let decoded: ListingEvent = serde_json::from_value(stored).unwrap();
                replayed.apply(&decoded);
            }
            prop_assert_eq!(replayed, listing);
        }

        /// Property: entries are promoted in `(requested_at, id)` order.
        #[test]
        fn promotions_follow_queue_order(
            skews in prop::collection::vec(0i64..4, 1..10),
            extra in 1u32..10
        ) {
            let mut listing = created(1);
            request(&mut listing, AttendeeId::new(), 0).unwrap();

            let mut queued = Vec::new();
            for (i, skew) in skews.iter().enumerate() {
                let attendee = AttendeeId::new();
                let events = request(&mut listing, attendee, 100 + i as i64 - skew).unwrap();
                if let [ListingEvent::AttendeeWaitlisted(e)] = &events[..] {
                    queued.push(e.entry.clone());
                }
            }
            queued.sort_by_key(|e| (e.requested_at, e.id));

            let events = increase(&mut listing, 1 + extra, 1_000).unwrap();
            let promoted: Vec<AttendeeId> = events
                .iter()
                .filter_map(|e| match e {
                    ListingEvent::AttendeeAdmitted(a) => Some(a.confirmation.registration.attendee_id),
                    _ => None,
                })
                .collect();

            let expected: Vec<AttendeeId> = queued
                .iter()
                .take(extra as usize)
                .map(|e| e.attendee_id)
                .collect();
            prop_assert_eq!(promoted, expected);
        }
    }
}
