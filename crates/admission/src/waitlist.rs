//! Per-event FIFO waitlist.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use seatwise_core::AttendeeId;

use crate::error::AdmissionError;
use crate::ids::{EventId, WaitlistEntryId};

/// A pending admission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: WaitlistEntryId,
    pub event_id: EventId,
    pub attendee_id: AttendeeId,
    pub requested_at: DateTime<Utc>,
}

/// Queue position: request time first, entry id on ties.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Position {
    requested_at: DateTime<Utc>,
    id: WaitlistEntryId,
}

impl WaitlistEntry {
    fn position(&self) -> Position {
        Position {
            requested_at: self.requested_at,
            id: self.id,
        }
    }
}

/// Ordered waitlist of one event.
///
/// At most one entry per attendee. Entries leave only by promotion or
/// withdrawal; there is no reordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitlistQueue {
    entries: BTreeMap<Position, WaitlistEntry>,
    positions: HashMap<WaitlistEntryId, Position>,
    by_attendee: HashMap<AttendeeId, WaitlistEntryId>,
    next_id: u64,
}

impl WaitlistQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request for `attendee_id`, stamped with `requested_at`.
    pub fn enqueue(
        &mut self,
        event_id: EventId,
        attendee_id: AttendeeId,
        requested_at: DateTime<Utc>,
    ) -> Result<WaitlistEntry, AdmissionError> {
        if self.by_attendee.contains_key(&attendee_id) {
            return Err(AdmissionError::AlreadyWaitlisted);
        }

        let entry = WaitlistEntry {
            id: WaitlistEntryId(self.next_id + 1),
            event_id,
            attendee_id,
            requested_at,
        };
        self.record(entry.clone());
        Ok(entry)
    }

    /// Insert an entry that was already accepted (replay path).
    pub fn record(&mut self, entry: WaitlistEntry) {
        self.next_id = self.next_id.max(entry.id.0);

        // One entry per attendee and per id; the recorded one wins.
        if let Some(previous) = self.by_attendee.get(&entry.attendee_id).copied() {
            self.remove(previous);
        }
        self.remove(entry.id);
        self.by_attendee.insert(entry.attendee_id, entry.id);

        let position = entry.position();
        self.positions.insert(entry.id, position);
        self.entries.insert(position, entry);
    }

    /// The earliest pending entry, if any.
    pub fn peek_front(&self) -> Option<&WaitlistEntry> {
        self.entries.values().next()
    }

    /// Delete a specific entry. Removing an unknown id is a no-op.
    pub fn remove(&mut self, entry_id: WaitlistEntryId) -> Option<WaitlistEntry> {
        let position = self.positions.remove(&entry_id)?;
        let entry = self.entries.remove(&position)?;
        if self.by_attendee.get(&entry.attendee_id) == Some(&entry_id) {
            self.by_attendee.remove(&entry.attendee_id);
        }
        Some(entry)
    }

    pub fn entry_for(&self, attendee_id: AttendeeId) -> Option<&WaitlistEntry> {
        let id = self.by_attendee.get(&attendee_id)?;
        let position = self.positions.get(id)?;
        self.entries.get(position)
    }

    pub fn contains(&self, attendee_id: AttendeeId) -> bool {
        self.by_attendee.contains_key(&attendee_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in promotion order.
    pub fn iter(&self) -> impl Iterator<Item = &WaitlistEntry> {
        self.entries.values()
    }
}
