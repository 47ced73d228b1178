use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwise_core::{AggregateId, UnitOfMeasure, UserId, ValueObject, typed_id};
use stockwise_materials::MaterialId;

use crate::location::LocationId;

typed_id!(MovementId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementAction {
    In,
    Out,
    Adjust,
    Transfer,
}

/// The unit stock is valued and locked by.
///
/// Ordering is total so multi-key postings can lock in a global order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub material: MaterialId,
    pub uom: UnitOfMeasure,
    pub location: LocationId,
}

impl ValueObject for StockKey {}

impl StockKey {
    pub fn new(material: MaterialId, uom: UnitOfMeasure, location: LocationId) -> Self {
        Self {
            material,
            uom,
            location,
        }
    }

    /// Same material and uom at another location.
    pub fn at(self, location: LocationId) -> Self {
        Self { location, ..self }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}@{}", self.material, self.uom, self.location)
    }
}

/// Back-reference from a movement to the order line it fulfils.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderLineRef {
    Procurement { order_id: AggregateId, line_no: u32 },
    Sales { order_id: AggregateId, line_no: u32 },
}

impl OrderLineRef {
    pub fn order_id(&self) -> AggregateId {
        match self {
            OrderLineRef::Procurement { order_id, .. } | OrderLineRef::Sales { order_id, .. } => *order_id,
        }
    }

    pub fn line_no(&self) -> u32 {
        match self {
            OrderLineRef::Procurement { line_no, .. } | OrderLineRef::Sales { line_no, .. } => *line_no,
        }
    }
}

/// A planned movement, not yet appended to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub key: StockKey,
    /// Signed: positive adds stock at the location, negative removes it.
    pub quantity: Decimal,
    pub action: MovementAction,
    pub unit_cost: Decimal,
    pub line: Option<OrderLineRef>,
    pub reason: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Immutable ledger row. Never updated or deleted once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    id: MovementId,
    sequence: u64,
    key: StockKey,
    quantity: Decimal,
    action: MovementAction,
    unit_cost: Decimal,
    line: Option<OrderLineRef>,
    reason: String,
    created_by: UserId,
    created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Called by the store when appending; `sequence` is the log position.
    pub fn record(id: MovementId, sequence: u64, new: NewMovement) -> Self {
        Self {
            id,
            sequence,
            key: new.key,
            quantity: new.quantity,
            action: new.action,
            unit_cost: new.unit_cost,
            line: new.line,
            reason: new.reason,
            created_by: new.created_by,
            created_at: new.created_at,
        }
    }

    pub fn id(&self) -> MovementId {
        self.id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn key(&self) -> StockKey {
        self.key
    }

    pub fn material(&self) -> MaterialId {
        self.key.material
    }

    pub fn uom(&self) -> UnitOfMeasure {
        self.key.uom
    }

    pub fn location(&self) -> LocationId {
        self.key.location
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn action(&self) -> MovementAction {
        self.action
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    pub fn line(&self) -> Option<OrderLineRef> {
        self.line
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
