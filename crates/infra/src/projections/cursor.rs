//! Per-stream projection cursors.
//!
//! A cursor is the last sequence number a projection applied for one stream.
//! Replays at or below the cursor are ignored, which makes projections safe
//! under at-least-once delivery and lets callers re-feed a whole stream after
//! every transaction.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value as JsonValue;

use seatwise_admission::{AGGREGATE_TYPE, ListingEvent};
use seatwise_core::AggregateId;
use seatwise_events::EventEnvelope;

use super::ProjectionError;

#[derive(Debug, Default)]
pub struct StreamCursors {
    positions: Mutex<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied sequence number for a stream (0 if none).
    pub fn position(&self, aggregate_id: AggregateId) -> u64 {
        self.positions
            .lock()
            .map(|p| p.get(&aggregate_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Run `apply` for `envelope` unless it was already applied.
    ///
    /// The cursor lock is held while `apply` runs, so concurrent feeders see
    /// each envelope exactly once and in stream order. The cursor only moves
    /// when `apply` succeeds. Returns whether the envelope was applied.
    pub fn advance<F>(&self, envelope: &EventEnvelope<JsonValue>, apply: F) -> Result<bool, ProjectionError>
    where
        F: FnOnce() -> Result<(), ProjectionError>,
    {
        let mut positions = self.positions.lock().map_err(|_| ProjectionError::Poisoned)?;

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let last = positions.get(&aggregate_id).copied().unwrap_or(0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay.
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        apply()?;
        positions.insert(aggregate_id, seq);
        Ok(true)
    }

    pub fn clear(&self) {
        if let Ok(mut positions) = self.positions.lock() {
            positions.clear();
        }
    }
}

/// Decode a listing event from a published envelope.
///
/// `None` for envelopes of other stream types. The payload must belong to the
/// stream it was published on.
pub fn decode_listing_event(envelope: &EventEnvelope<JsonValue>) -> Result<Option<ListingEvent>, ProjectionError> {
    if envelope.aggregate_type() != AGGREGATE_TYPE {
        return Ok(None);
    }

    let event: ListingEvent = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

    if event.event_id().0 != envelope.aggregate_id() {
        return Err(ProjectionError::StreamMismatch(format!(
            "payload event_id {} published on stream {}",
            event.event_id(),
            envelope.aggregate_id()
        )));
    }

    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn envelope(aggregate_id: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(Uuid::now_v7(), aggregate_id, "listing", seq, "test", json!({}))
    }

    #[test]
    fn duplicates_are_skipped_and_gaps_rejected() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.advance(&envelope(id, 1), || Ok(())).unwrap());
        assert!(!cursors.advance(&envelope(id, 1), || Ok(())).unwrap());
        assert!(matches!(
            cursors.advance(&envelope(id, 3), || Ok(())),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 3 })
        ));
        assert_eq!(cursors.position(id), 1);
    }

    #[test]
    fn failed_apply_does_not_move_the_cursor() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        let err = cursors
            .advance(&envelope(id, 1), || Err(ProjectionError::Deserialize("bad".to_string())))
            .unwrap_err();

        assert!(matches!(err, ProjectionError::Deserialize(_)));
        assert_eq!(cursors.position(id), 0);
    }

    #[test]
    fn foreign_stream_types_are_ignored() {
        let env = EventEnvelope::new(Uuid::now_v7(), AggregateId::new(), "other", 1, "x", json!({}));
        assert!(decode_listing_event(&env).unwrap().is_none());
    }
}
