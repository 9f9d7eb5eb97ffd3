//! Admission domain module (event-sourced).
//!
//! One [`EventListing`] aggregate per event owns that event's whole admission
//! state: the [`SeatLedger`], the [`WaitlistQueue`] and the
//! [`RegistrationLedger`]. Every command is decided against a draft copy of
//! that state and yields a batch of facts that is committed as one unit, so
//! the three components can never drift apart.
//!
//! This crate contains business rules only (no IO, no storage).

pub mod capacity;
pub mod error;
pub mod ids;
pub mod listing;
pub mod registration;
pub mod waitlist;

pub use capacity::SeatLedger;
pub use error::AdmissionError;
pub use ids::{EventId, RegistrationId, TicketId, WaitlistEntryId};
pub use listing::{
    AGGREGATE_TYPE, AttendeeAdmitted, AttendeeWaitlisted, CancelRegistration, CapacityIncreased,
    CreateListing, DetailsEdited, DrainWaitlist, EditListing, EventDetails, EventListing,
    IncreaseCapacity, ListingCommand, ListingCreated, ListingEvent, RegistrationCancelled,
    RequestAdmission, WaitlistEntryWithdrawn, WithdrawFromWaitlist,
};
pub use registration::{Confirmation, Registration, RegistrationLedger, RegistrationStatus, Ticket};
pub use waitlist::{WaitlistEntry, WaitlistQueue};
