//! Command execution pipeline.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate stream from the store
//!   ↓
//! 2. Rehydrate (apply historical events)
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append with an exact expected version
//!   ↓
//! 5. Publish the committed events to the bus
//! ```
//!
//! A publish failure after step 4 is logged and does not fail the command:
//! the facts are committed and subscribers can catch up from the store.
//!
//! Step 4 is the commit point. Everything a command decided lands in one
//! append, so the store either takes all of it or none of it. When another
//! command committed to the same stream between steps 1 and 4, the append is
//! refused and the whole pipeline runs again against the fresh stream, up to
//! the configured number of retries.
//!
//! This module contains no IO itself; it composes infrastructure traits.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use seatwise_core::{Aggregate, AggregateId, ExpectedVersion};
use seatwise_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Retries after the first attempt when an append loses a version race.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 8;

#[derive(Debug, Error)]
pub enum DispatchError<E> {
    /// The aggregate rejected the command. Nothing was written.
    #[error("command rejected: {0:?}")]
    Domain(E),

    /// The stream kept moving under us and the retries ran out.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// A historical payload could not be read back into the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),
}

impl<E> From<EventStoreError> for DispatchError<E> {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// A committed event, in both its stored and typed forms.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<E> {
    pub stored: StoredEvent,
    pub event: E,
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and the bus so tests run entirely in memory.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    conflict_retries: u32,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn conflict_retries(&self) -> u32 {
        self.conflict_retries
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// Returns the committed events in sequence order; an empty vector when
    /// the aggregate decided there was nothing to record. On
    /// [`DispatchError::Domain`] no state has changed.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<Vec<Committed<A::Event>>, DispatchError<A::Error>>
    where
        A: Aggregate,
        A::Event: seatwise_events::Event + Serialize + DeserializeOwned,
    {
        let mut attempt = 0u32;
        loop {
            match self.try_dispatch(aggregate_id, aggregate_type, &command, &make_aggregate) {
                Err(DispatchError::Concurrency(msg)) if attempt < self.conflict_retries => {
                    attempt += 1;
                    tracing::debug!(
                        aggregate_id = %aggregate_id,
                        attempt,
                        reason = %msg,
                        "append lost a version race, retrying"
                    );
                }
                Err(DispatchError::Concurrency(msg)) => {
                    tracing::warn!(
                        aggregate_id = %aggregate_id,
                        attempts = attempt + 1,
                        "giving up after repeated concurrency conflicts"
                    );
                    return Err(DispatchError::Concurrency(msg));
                }
                other => return other,
            }
        }
    }

    fn try_dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: &impl Fn(AggregateId) -> A,
    ) -> Result<Vec<Committed<A::Event>>, DispatchError<A::Error>>
    where
        A: Aggregate,
        A::Event: seatwise_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;

        // 3) Decide
        let decided = aggregate.handle(command).map_err(DispatchError::Domain)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist
        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let stored = self.store.append(uncommitted, expected)?;

        tracing::debug!(
            aggregate_id = %aggregate_id,
            aggregate_type,
            events = stored.len(),
            version = stream_version(&stored),
            "committed"
        );

        // 5) Publish
        for e in &stored {
            if let Err(err) = self.bus.publish(e.to_envelope()) {
                tracing::warn!(
                    aggregate_id = %aggregate_id,
                    sequence_number = e.sequence_number,
                    error = ?err,
                    "publish failed after commit"
                );
            }
        }

        Ok(stored
            .into_iter()
            .zip(decided)
            .map(|(stored, event)| Committed { stored, event })
            .collect())
    }

    /// Rehydrate an aggregate without handling any command.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError<A::Error>>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream<E>(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError<E>> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError<A::Error>>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
