//! Audit envelopes for records that are not aggregate streams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_core::UserId;
use stockwise_events::{Event, EventEnvelope};
use stockwise_inventory::{InventoryEvent, MovementPosted, StockMovement};
use stockwise_materials::VariableCost;

use crate::rates::RateSource;
use crate::store::AuditEnvelope;

pub const PROCUREMENT_ORDER: &str = "purchasing.order";
pub const SALES_ORDER: &str = "sales.order";
pub const STOCK_MOVEMENT: &str = "inventory.movement";
pub const VARIABLE_COST: &str = "materials.cost";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostEvent {
    Recorded {
        cost: VariableCost,
        /// `None` for costs entered in their final currency.
        rate_source: Option<RateSource>,
        flagged: bool,
    },
}

impl Event for CostEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CostEvent::Recorded { flagged: true, .. } => "materials.cost.recorded_unconverted",
            CostEvent::Recorded { .. } => "materials.cost.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CostEvent::Recorded { cost, .. } => cost.created_at,
        }
    }
}

pub(crate) fn movement_envelope(movement: &StockMovement) -> Result<AuditEnvelope, serde_json::Error> {
    EventEnvelope::wrap(
        movement.id().0,
        STOCK_MOVEMENT,
        movement.sequence(),
        InventoryEvent::MovementPosted(MovementPosted {
            movement: movement.clone(),
        }),
    )
    .with_actor(movement.created_by())
    .with_reason(movement.reason())
    .into_json()
}

pub(crate) fn cost_envelope(
    cost: &VariableCost,
    rate_source: Option<RateSource>,
    actor: UserId,
    reason: &str,
) -> Result<AuditEnvelope, serde_json::Error> {
    let flagged = rate_source.is_some_and(|s| s == RateSource::Unconverted);
    EventEnvelope::wrap(
        cost.material.0,
        VARIABLE_COST,
        cost.seq,
        CostEvent::Recorded {
            cost: cost.clone(),
            rate_source,
            flagged,
        },
    )
    .with_actor(actor)
    .with_reason(reason)
    .into_json()
}
