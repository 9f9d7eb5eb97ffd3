use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use seatwise_admission::{EventId, ListingEvent};
use seatwise_events::EventEnvelope;

use super::ProjectionError;
use super::cursor::{StreamCursors, decode_listing_event};
use crate::read_model::ReadModelStore;

/// Queryable catalog row: one event with its current seat figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingReadModel {
    pub event_id: EventId,
    pub title: String,
    pub category: String,
    pub location: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub capacity: u32,
    pub seats_available: u32,
    pub registrations: u32,
    pub waitlisted: u32,
}

impl ListingReadModel {
    /// `registrations * 100 / capacity`, 0 for a zero capacity.
    pub fn occupancy_percent(&self) -> f64 {
        occupancy_percent(u64::from(self.registrations), u64::from(self.capacity))
    }
}

pub(crate) fn occupancy_percent(registrations: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        0.0
    } else {
        registrations as f64 * 100.0 / capacity as f64
    }
}

/// Catalog filter. Text filters are case-insensitive substring matches; the
/// date must match exactly. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    pub category: Option<String>,
    pub location: Option<String>,
    pub date: Option<NaiveDate>,
}

impl ListingFilter {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn matches(&self, listing: &ListingReadModel) -> bool {
        contains_ci(&listing.category, self.category.as_deref())
            && contains_ci(&listing.location, self.location.as_deref())
            && self.date.is_none_or(|d| d == listing.date)
    }
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim) {
        None | Some("") => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

/// Listing catalog projection.
///
/// Consumes published envelopes and keeps one [`ListingReadModel`] per event.
/// Disposable and rebuildable from the event store.
#[derive(Debug)]
pub struct ListingCatalogProjection<S>
where
    S: ReadModelStore<EventId, ListingReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ListingCatalogProjection<S>
where
    S: ReadModelStore<EventId, ListingReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, event_id: EventId) -> Option<ListingReadModel> {
        self.store.get(&event_id)
    }

    /// Listings matching `filter`, ordered by date then time.
    pub fn list(&self, filter: &ListingFilter) -> Vec<ListingReadModel> {
        let mut listings: Vec<_> = self.store.list().into_iter().filter(|l| filter.matches(l)).collect();
        listings.sort_by(|a, b| (a.date, a.time, a.event_id).cmp(&(b.date, b.time, b.event_id)));
        listings
    }

    /// Apply a published envelope. Idempotent per stream.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(event) = decode_listing_event(envelope)? else {
            return Ok(());
        };
        self.cursors.advance(envelope, || self.apply_event(event))?;
        Ok(())
    }

    fn apply_event(&self, event: ListingEvent) -> Result<(), ProjectionError> {
        if let ListingEvent::ListingCreated(e) = event {
            self.store.upsert(
                e.event_id,
                ListingReadModel {
                    event_id: e.event_id,
                    title: e.details.title,
                    category: e.details.category,
                    location: e.details.location,
                    date: e.details.date,
                    time: e.details.time,
                    capacity: e.capacity,
                    seats_available: e.capacity,
                    registrations: 0,
                    waitlisted: 0,
                },
            );
            return Ok(());
        }

        let event_id = event.event_id();
        let mut rm = self
            .store
            .get(&event_id)
            .ok_or_else(|| ProjectionError::MissingReadModel(event_id.to_string()))?;

        match event {
            ListingEvent::ListingCreated(_) => {}
            ListingEvent::DetailsEdited(e) => {
                rm.title = e.details.title;
                rm.category = e.details.category;
                rm.location = e.details.location;
                rm.date = e.details.date;
                rm.time = e.details.time;
            }
            ListingEvent::CapacityIncreased(e) => {
                rm.capacity = e.capacity;
                rm.seats_available = e.seats_available;
            }
            ListingEvent::AttendeeAdmitted(e) => {
                rm.registrations += 1;
                if e.promoted_from.is_some() {
                    rm.waitlisted = rm.waitlisted.saturating_sub(1);
                }
                rm.seats_available = e.seats_available;
            }
            ListingEvent::AttendeeWaitlisted(_) => {
                rm.waitlisted += 1;
            }
            ListingEvent::RegistrationCancelled(e) => {
                rm.registrations = rm.registrations.saturating_sub(1);
                rm.seats_available = e.seats_available;
            }
            ListingEvent::WaitlistEntryWithdrawn(_) => {
                rm.waitlisted = rm.waitlisted.saturating_sub(1);
            }
        }

        self.store.upsert(event_id, rm);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    ///
    /// Envelopes must be in sequence order within each stream.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.clear();
        self.store.clear();

        for env in envelopes {
            self.apply_envelope(&env)?;
        }
        Ok(())
    }
}
