//! Weighted-average valuation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockwise_core::DomainResult;
use stockwise_core::amount::{checked_add, checked_mul, checked_sum};

use crate::movement::{StockKey, StockMovement};

/// Decimal places unit costs are stored with.
pub const UNIT_COST_SCALE: u32 = 6;

/// `Σ(unit_cost × quantity) / Σ quantity` over the positive-quantity
/// movements given, or zero when there are none.
///
/// Outbound legs never move the average; they are priced at it. A history
/// too large to value is an invariant violation rather than a panic.
pub fn weighted_average_cost<'a, I>(movements: I) -> DomainResult<Decimal>
where
    I: IntoIterator<Item = &'a StockMovement>,
{
    let mut value = Decimal::ZERO;
    let mut quantity = Decimal::ZERO;
    for m in movements.into_iter().filter(|m| m.quantity() > Decimal::ZERO) {
        let leg = checked_mul(m.unit_cost(), m.quantity(), "receipt value")?;
        value = checked_add(value, leg, "stock value")?;
        quantity = checked_add(quantity, m.quantity(), "received quantity")?;
    }

    if quantity.is_zero() {
        Ok(Decimal::ZERO)
    } else {
        Ok((value / quantity).round_dp(UNIT_COST_SCALE))
    }
}

/// On-hand quantity and average cost of one stock key, as of the movements
/// it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPosition {
    pub key: StockKey,
    pub available: Decimal,
    pub average_cost: Decimal,
    pub movement_count: usize,
}

impl StockPosition {
    /// Folds the movements of `key`; movements of other keys are ignored.
    pub fn from_movements<'a, I>(key: StockKey, movements: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = &'a StockMovement>,
    {
        let own: Vec<&StockMovement> = movements.into_iter().filter(|m| m.key() == key).collect();
        Ok(Self {
            key,
            available: checked_sum(own.iter().map(|m| m.quantity()), "available quantity")?,
            average_cost: weighted_average_cost(own.iter().copied())?,
            movement_count: own.len(),
        })
    }

    pub fn has_movements(&self) -> bool {
        self.movement_count > 0
    }

    /// Stock value at the current average, `None` if it does not fit.
    pub fn value(&self) -> Option<Decimal> {
        self.available.checked_mul(self.average_cost)
    }
}
