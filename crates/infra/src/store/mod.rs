//! Persistence boundary for the ledger, the order streams and cost records.
//!
//! A unit of work is staged as a [`ChangeSet`] and handed to
//! [`LedgerStore::commit`], which applies all of it or none of it.

pub mod in_memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use stockwise_core::{AggregateId, ExpectedVersion};
use stockwise_events::EventEnvelope;
use stockwise_inventory::{BalanceBook, MovementId, NewMovement, StockKey, StockMovement};
use stockwise_materials::{NewVariableCost, VariableCost};

use crate::error::StoreError;

pub use in_memory::InMemoryStore;

/// Event envelope as stored and published on the audit stream.
pub type AuditEnvelope = EventEnvelope<JsonValue>;

/// Per-table serials the display numbers are built from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Counter {
    ProcurementOrder,
    SalesOrder,
    Material,
    Demand,
}

/// Events to append to one aggregate stream.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub aggregate_id: AggregateId,
    pub expected: ExpectedVersion,
    pub events: Vec<AuditEnvelope>,
}

/// Everything one transaction writes.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub streams: Vec<StreamAppend>,
    pub movements: Vec<(MovementId, NewMovement)>,
    pub costs: Vec<NewVariableCost>,
    pub at: DateTime<Utc>,
}

impl ChangeSet {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            streams: Vec::new(),
            movements: Vec::new(),
            costs: Vec::new(),
            at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.streams.iter().all(|s| s.events.is_empty())
            && self.movements.is_empty()
            && self.costs.is_empty()
    }
}

/// What a commit appended, with store-assigned positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Committed {
    pub movements: Vec<StockMovement>,
    pub costs: Vec<VariableCost>,
}

impl Committed {
    pub fn movement(&self, id: MovementId) -> Option<&StockMovement> {
        self.movements.iter().find(|m| m.id() == id)
    }
}

pub trait LedgerStore: Send + Sync {
    /// Events of one aggregate, in sequence order.
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<AuditEnvelope>, StoreError>;

    /// The whole movement log, in append order.
    fn movements(&self) -> Result<Vec<StockMovement>, StoreError>;

    fn movements_for(&self, key: &StockKey) -> Result<Vec<StockMovement>, StoreError>;

    /// The cached per-(material, uom) balances.
    fn balances(&self) -> Result<BalanceBook, StoreError>;

    /// Cached balances and the movement log, read at the same instant.
    fn ledger_snapshot(&self) -> Result<(BalanceBook, Vec<StockMovement>), StoreError>;

    /// Recomputes the cached balances from the log in one step.
    fn rebuild_balances(&self) -> Result<(), StoreError>;

    fn costs(&self) -> Result<Vec<VariableCost>, StoreError>;

    /// Hands out the next serial; serials are never reused.
    fn next_serial(&self, counter: Counter) -> Result<u64, StoreError>;

    /// Appends the change set atomically.
    ///
    /// Fails with [`StoreError::Concurrency`] when a stream is not at its
    /// expected version, with [`StoreError::InsufficientStock`] when a
    /// movement would take a stock key below zero and with
    /// [`StoreError::Invariant`] when a balance would overflow.
    fn commit(&self, changes: ChangeSet) -> Result<Committed, StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<AuditEnvelope>, StoreError> {
        (**self).load_stream(aggregate_id)
    }

    fn movements(&self) -> Result<Vec<StockMovement>, StoreError> {
        (**self).movements()
    }

    fn movements_for(&self, key: &StockKey) -> Result<Vec<StockMovement>, StoreError> {
        (**self).movements_for(key)
    }

    fn balances(&self) -> Result<BalanceBook, StoreError> {
        (**self).balances()
    }

    fn ledger_snapshot(&self) -> Result<(BalanceBook, Vec<StockMovement>), StoreError> {
        (**self).ledger_snapshot()
    }

    fn rebuild_balances(&self) -> Result<(), StoreError> {
        (**self).rebuild_balances()
    }

    fn costs(&self) -> Result<Vec<VariableCost>, StoreError> {
        (**self).costs()
    }

    fn next_serial(&self, counter: Counter) -> Result<u64, StoreError> {
        (**self).next_serial(counter)
    }

    fn commit(&self, changes: ChangeSet) -> Result<Committed, StoreError> {
        (**self).commit(changes)
    }
}
