//! Validation and planning for the four postings.
//!
//! Each planner takes the current state (an order line and/or a stock
//! position read under lock) and returns the movement(s) to append, or the
//! reason the posting is refused. Nothing here touches storage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwise_core::amount::{ensure_price_within, ensure_quantity_within};
use stockwise_core::{DomainError, DomainResult, UnitOfMeasure, UserId};
use stockwise_materials::MaterialId;

use crate::location::LocationId;
use crate::movement::{MovementAction, NewMovement, OrderLineRef, StockKey};
use crate::valuation::{StockPosition, UNIT_COST_SCALE};

/// Who is posting, why and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingContext {
    pub created_by: UserId,
    pub reason: String,
    pub at: DateTime<Utc>,
}

impl PostingContext {
    pub fn new(created_by: UserId, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            created_by,
            reason: reason.into(),
            at,
        }
    }

    fn checked_reason(&self) -> DomainResult<String> {
        let reason = self.reason.trim();
        if reason.is_empty() {
            return Err(DomainError::field("reason", "must not be blank"));
        }
        Ok(reason.to_string())
    }
}

/// The slice of an order line a posting needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfilmentLine {
    pub line: OrderLineRef,
    pub material: MaterialId,
    pub uom: UnitOfMeasure,
    pub quantity: Decimal,
    /// Received (procurement) or sent (sales) so far.
    pub fulfilled: Decimal,
    pub unit_price: Option<Decimal>,
}

impl FulfilmentLine {
    pub fn quantity_left(&self) -> Decimal {
        self.quantity - self.fulfilled
    }

    fn ensure_within_remaining(&self, quantity: Decimal) -> DomainResult<()> {
        let left = self.quantity_left();
        if quantity > left {
            return Err(DomainError::field(
                "quantity",
                format!(
                    "{quantity} exceeds remaining quantity {left} on line {}",
                    self.line.line_no()
                ),
            ));
        }
        Ok(())
    }
}

fn ensure_positive(uom: UnitOfMeasure, quantity: Decimal) -> DomainResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::field("quantity", "must be positive"));
    }
    ensure_quantity_within("quantity", quantity)?;
    uom.ensure_quantity("quantity", quantity)
}

/// Receipt against a procurement line, priced at the line's unit price.
pub fn plan_entry(
    line: &FulfilmentLine,
    location: LocationId,
    quantity: Decimal,
    ctx: &PostingContext,
) -> DomainResult<NewMovement> {
    let reason = ctx.checked_reason()?;
    ensure_positive(line.uom, quantity)?;
    line.ensure_within_remaining(quantity)?;
    let unit_price = line
        .unit_price
        .ok_or_else(|| DomainError::field("unit_price", "line has no unit price"))?;
    ensure_price_within("unit_price", unit_price)?;

    Ok(NewMovement {
        key: StockKey::new(line.material, line.uom, location),
        quantity,
        action: MovementAction::In,
        unit_cost: unit_price.round_dp(UNIT_COST_SCALE),
        line: Some(line.line),
        reason,
        created_by: ctx.created_by,
        created_at: ctx.at,
    })
}

/// Dispatch against a sales line, priced at the location's weighted average.
pub fn plan_exit(
    line: &FulfilmentLine,
    position: &StockPosition,
    quantity: Decimal,
    ctx: &PostingContext,
) -> DomainResult<NewMovement> {
    if position.key.material != line.material || position.key.uom != line.uom {
        return Err(DomainError::invariant(format!(
            "stock position {} does not match line {}",
            position.key,
            line.line.line_no()
        )));
    }
    let reason = ctx.checked_reason()?;
    ensure_positive(line.uom, quantity)?;
    line.ensure_within_remaining(quantity)?;
    if !position.has_movements() {
        return Err(DomainError::field(
            "location",
            "no stock of this material and uom at the location",
        ));
    }
    if quantity > position.available {
        return Err(DomainError::field(
            "quantity",
            format!("only {} available at the location", position.available),
        ));
    }

    Ok(NewMovement {
        key: position.key,
        quantity: -quantity,
        action: MovementAction::Out,
        unit_cost: position.average_cost,
        line: Some(line.line),
        reason,
        created_by: ctx.created_by,
        created_at: ctx.at,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjustmentOutcome {
    /// Counted quantity equals the books; nothing is posted.
    Unchanged,
    Posted(NewMovement),
}

/// Sets the absolute on-hand quantity of a key to `new_quantity`.
pub fn plan_adjustment(
    position: &StockPosition,
    new_quantity: Decimal,
    ctx: &PostingContext,
) -> DomainResult<AdjustmentOutcome> {
    let reason = ctx.checked_reason()?;
    if new_quantity < Decimal::ZERO {
        return Err(DomainError::field("new_quantity", "must not be negative"));
    }
    ensure_quantity_within("new_quantity", new_quantity)?;
    position.key.uom.ensure_quantity("new_quantity", new_quantity)?;

    let delta = new_quantity - position.available;
    if delta.is_zero() {
        return Ok(AdjustmentOutcome::Unchanged);
    }

    Ok(AdjustmentOutcome::Posted(NewMovement {
        key: position.key,
        quantity: delta,
        action: MovementAction::Adjust,
        unit_cost: position.average_cost,
        line: None,
        reason,
        created_by: ctx.created_by,
        created_at: ctx.at,
    }))
}

/// The two legs of a transfer, both priced at the source's average.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub outbound: NewMovement,
    pub inbound: NewMovement,
}

pub fn plan_transfer(
    from: &StockPosition,
    to: LocationId,
    quantity: Decimal,
    ctx: &PostingContext,
) -> DomainResult<TransferPlan> {
    let reason = ctx.checked_reason()?;
    if from.key.location == to {
        return Err(DomainError::field("to_location", "must differ from the source location"));
    }
    ensure_positive(from.key.uom, quantity)?;
    if quantity > from.available {
        return Err(DomainError::field(
            "quantity",
            format!("only {} available at the source location", from.available),
        ));
    }

    let leg = |key: StockKey, quantity: Decimal| NewMovement {
        key,
        quantity,
        action: MovementAction::Transfer,
        unit_cost: from.average_cost,
        line: None,
        reason: reason.clone(),
        created_by: ctx.created_by,
        created_at: ctx.at,
    };

    Ok(TransferPlan {
        outbound: leg(from.key, -quantity),
        inbound: leg(from.key.at(to), quantity),
    })
}
