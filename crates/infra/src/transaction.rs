//! One unit of work: locks held, changes staged, committed or dropped.

use chrono::{DateTime, Utc};
use tracing::warn;

use stockwise_core::UserId;
use stockwise_events::EventBus;
use stockwise_inventory::{MovementId, NewMovement};
use stockwise_materials::NewVariableCost;

use crate::audit::{cost_envelope, movement_envelope};
use crate::error::ServiceError;
use crate::locks::LockGuard;
use crate::rates::RateSource;
use crate::store::{AuditEnvelope, ChangeSet, Committed, LedgerStore, StreamAppend};

/// Dropping a transaction without calling [`Transaction::commit`] discards
/// everything staged and releases its locks.
#[derive(Debug)]
pub struct Transaction<'a> {
    locks: Option<LockGuard<'a>>,
    changes: ChangeSet,
    cost_sources: Vec<Option<RateSource>>,
    actor: UserId,
    reason: String,
}

impl<'a> Transaction<'a> {
    pub fn begin(locks: Option<LockGuard<'a>>, actor: UserId, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            locks,
            changes: ChangeSet::new(at),
            cost_sources: Vec::new(),
            actor,
            reason: reason.into(),
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.changes.at
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn stage_stream(&mut self, append: Option<StreamAppend>) {
        if let Some(append) = append {
            self.changes.streams.push(append);
        }
    }

    pub fn stage_movement(&mut self, movement: NewMovement) -> MovementId {
        let id = MovementId::generate();
        self.changes.movements.push((id, movement));
        id
    }

    pub fn stage_cost(&mut self, cost: NewVariableCost, rate_source: Option<RateSource>) {
        self.changes.costs.push(cost);
        self.cost_sources.push(rate_source);
    }

    /// Commits, releases the locks, then publishes the audit envelopes.
    ///
    /// Publication failures are logged; the commit stands.
    pub fn commit<S, B>(self, store: &S, bus: &B) -> Result<Committed, ServiceError>
    where
        S: LedgerStore + ?Sized,
        B: EventBus<AuditEnvelope> + ?Sized,
    {
        let Transaction {
            locks,
            changes,
            cost_sources,
            actor,
            reason,
        } = self;

        let streamed: Vec<AuditEnvelope> = changes
            .streams
            .iter()
            .flat_map(|s| s.events.iter().cloned())
            .collect();
        let committed = store.commit(changes)?;
        drop(locks);

        let movements = committed.movements.iter().map(movement_envelope);
        let costs = committed
            .costs
            .iter()
            .zip(cost_sources)
            .map(|(cost, source)| cost_envelope(cost, source, actor, &reason));

        for envelope in streamed.into_iter().map(Ok).chain(movements).chain(costs) {
            match envelope {
                Ok(envelope) => {
                    if let Err(error) = bus.publish(envelope) {
                        warn!(?error, "audit publish failed after commit");
                    }
                }
                Err(error) => warn!(%error, "audit envelope could not be serialized"),
            }
        }

        Ok(committed)
    }
}
