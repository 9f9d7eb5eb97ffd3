//! Aggregate reports over the listing catalog.
//!
//! Pure functions of catalog rows; they never touch the admission path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use seatwise_admission::EventId;

use super::listings::{ListingReadModel, occupancy_percent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReport {
    pub event_id: EventId,
    pub title: String,
    pub category: String,
    pub capacity: u32,
    pub seats_available: u32,
    pub registrations: u32,
    pub waitlisted: u32,
    pub occupancy_percent: f64,
}

impl From<&ListingReadModel> for EventReport {
    fn from(l: &ListingReadModel) -> Self {
        Self {
            event_id: l.event_id,
            title: l.title.clone(),
            category: l.category.clone(),
            capacity: l.capacity,
            seats_available: l.seats_available,
            registrations: l.registrations,
            waitlisted: l.waitlisted,
            occupancy_percent: l.occupancy_percent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub category: String,
    pub events: u32,
    pub total_capacity: u64,
    pub total_registrations: u64,
    pub total_waitlisted: u64,
    /// Registrations over total capacity, not an average of per-event figures.
    pub occupancy_percent: f64,
}

/// One row per category, busiest (most registrations) first, then by name.
pub fn category_reports<'a>(listings: impl IntoIterator<Item = &'a ListingReadModel>) -> Vec<CategoryReport> {
    let mut by_category: BTreeMap<&str, CategoryReport> = BTreeMap::new();

    for l in listings {
        let report = by_category.entry(l.category.as_str()).or_insert_with(|| CategoryReport {
            category: l.category.clone(),
            events: 0,
            total_capacity: 0,
            total_registrations: 0,
            total_waitlisted: 0,
            occupancy_percent: 0.0,
        });
        report.events += 1;
        report.total_capacity += u64::from(l.capacity);
        report.total_registrations += u64::from(l.registrations);
        report.total_waitlisted += u64::from(l.waitlisted);
    }

    let mut reports: Vec<CategoryReport> = by_category
        .into_values()
        .map(|mut r| {
            r.occupancy_percent = occupancy_percent(r.total_registrations, r.total_capacity);
            r
        })
        .collect();
    // Stable sort keeps the name order among ties.
    reports.sort_by(|a, b| b.total_registrations.cmp(&a.total_registrations));
    reports
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallSummary {
    pub events: u32,
    pub total_capacity: u64,
    pub total_registrations: u64,
    pub total_waitlisted: u64,
    /// Mean of per-event occupancy over events with a non-zero capacity.
    pub average_occupancy_percent: f64,
}

impl OverallSummary {
    pub fn from_listings<'a>(listings: impl IntoIterator<Item = &'a ListingReadModel>) -> Self {
        let mut summary = Self::default();
        let mut occupancy_sum = 0.0;
        let mut with_capacity = 0u32;

        for l in listings {
            summary.events += 1;
            summary.total_capacity += u64::from(l.capacity);
            summary.total_registrations += u64::from(l.registrations);
            summary.total_waitlisted += u64::from(l.waitlisted);
            if l.capacity > 0 {
                occupancy_sum += l.occupancy_percent();
                with_capacity += 1;
            }
        }

        if with_capacity > 0 {
            summary.average_occupancy_percent = occupancy_sum / f64::from(with_capacity);
        }
        summary
    }
}
