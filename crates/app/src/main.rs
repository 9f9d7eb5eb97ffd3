use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};

use seatwise_admission::EventDetails;
use seatwise_app::{AdmissionOutcome, EngineConfig, EventManager};
use seatwise_core::AttendeeId;
use seatwise_infra::projections::ListingFilter;

/// Walk through a small admission session and print the resulting reports.
fn main() -> anyhow::Result<()> {
    let config = EngineConfig::from_env().context("loading engine configuration")?;
    seatwise_observability::init_with_filter(config.log_filter.as_deref());

    let manager = EventManager::new(&config);
    let subscription = manager.subscribe();

    let date = NaiveDate::from_ymd_opt(2026, 11, 14).context("invalid demo date")?;
    let time = NaiveTime::from_hms_opt(18, 30, 0).context("invalid demo time")?;
    let event = manager.create_event(
        EventDetails {
            title: "Rust in production".to_string(),
            category: "Conference".to_string(),
            location: "Main auditorium".to_string(),
            date,
            time,
        },
        2,
    )?;

    let attendees: Vec<AttendeeId> = (0..4).map(|_| AttendeeId::new()).collect();
    for attendee in &attendees {
        match manager.request_admission(event.event_id, *attendee)? {
            AdmissionOutcome::Admitted(c) => println!("{attendee}: admitted with ticket {}", c.ticket.id),
            AdmissionOutcome::Waitlisted(e) => println!("{attendee}: waitlisted as entry {}", e.id),
        }
    }

    for promoted in manager.increase_capacity(event.event_id, 3)? {
        println!(
            "{}: promoted with ticket {}",
            promoted.registration.attendee_id, promoted.ticket.id
        );
    }

    println!("committed facts: {}", subscription.drain().len());
    println!(
        "catalog: {}",
        serde_json::to_string_pretty(&manager.list_events(&ListingFilter::default()))?
    );
    println!(
        "event report: {}",
        serde_json::to_string_pretty(&manager.event_report(event.event_id)?)?
    );
    println!(
        "summary: {}",
        serde_json::to_string_pretty(&manager.overall_summary())?
    );

    Ok(())
}
