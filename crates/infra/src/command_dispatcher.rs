//! Loading aggregates from their streams and staging the events a command
//! produces.
//!
//! ```text
//! load stream -> validate ordering -> rehydrate -> execute command
//!   -> wrap events (actor, reason, next sequence) -> StreamAppend
//! ```
//!
//! The append is committed together with the rest of the transaction, with
//! the loaded version as the optimistic-concurrency expectation.

use serde::Serialize;
use serde::de::DeserializeOwned;

use stockwise_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, UserId};
use stockwise_events::{Event, EventEnvelope};

use crate::error::{ServiceError, StoreError};
use crate::store::{AuditEnvelope, LedgerStore, StreamAppend};

/// Who is behind the staged events and why.
#[derive(Debug, Clone, Copy)]
pub struct CommandMeta<'a> {
    pub actor: UserId,
    pub reason: Option<&'a str>,
}

/// Rebuilds an aggregate from its stream.
pub fn load<A, S>(store: &S, aggregate_id: AggregateId, mut aggregate: A) -> Result<A, ServiceError>
where
    S: LedgerStore + ?Sized,
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    let history = store.load_stream(aggregate_id)?;
    validate_loaded_stream(aggregate_id, &history)?;
    for envelope in history {
        let event: A::Event = serde_json::from_value(envelope.into_payload()).map_err(StoreError::from)?;
        aggregate.apply(&event);
    }
    Ok(aggregate)
}

/// Executes `command` in place and wraps the resulting events.
///
/// `None` when the command decided nothing.
pub fn stage_command<A>(
    aggregate: &mut A,
    aggregate_id: AggregateId,
    aggregate_type: &str,
    command: &A::Command,
    meta: CommandMeta<'_>,
) -> Result<Option<StreamAppend>, ServiceError>
where
    A: Aggregate<Error = DomainError>,
    A::Event: Event + Serialize,
{
    let loaded = aggregate.version();
    let decided = aggregate.execute(command)?;
    if decided.is_empty() {
        return Ok(None);
    }

    let expected = if loaded == 0 {
        ExpectedVersion::New
    } else {
        ExpectedVersion::Exact(loaded)
    };

    let events = decided
        .into_iter()
        .zip(loaded + 1..)
        .map(|(event, seq)| {
            let envelope = EventEnvelope::wrap(aggregate_id, aggregate_type, seq, event).with_actor(meta.actor);
            let envelope = match meta.reason {
                Some(reason) => envelope.with_reason(reason),
                None => envelope,
            };
            envelope.into_json()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)?;

    Ok(Some(StreamAppend {
        aggregate_id,
        expected,
        events,
    }))
}

fn validate_loaded_stream(aggregate_id: AggregateId, stream: &[AuditEnvelope]) -> Result<(), StoreError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id() != aggregate_id {
            return Err(StoreError::Invariant(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number() <= last {
            return Err(StoreError::Invariant(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number()
            )));
        }
        last = e.sequence_number();
    }
    Ok(())
}
