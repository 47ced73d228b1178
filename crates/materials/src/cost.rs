use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwise_core::{AggregateId, Currency, DomainError, DomainResult, UnitOfMeasure, UserId};

use crate::bom::BomId;
use crate::material::MaterialId;

/// What produced a cost record. Exactly one source per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CostSource {
    /// Emitted when a procurement order is approved.
    ProcurementOrder { order_id: AggregateId },
    /// Entered by hand.
    ManualUser { user_id: UserId },
    /// Rolled up from a bill of materials.
    BillOfMaterials { bom_id: BomId },
}

impl CostSource {
    pub fn label(&self) -> &'static str {
        match self {
            CostSource::ProcurementOrder { .. } => "procurement",
            CostSource::ManualUser { .. } => "user",
            CostSource::BillOfMaterials { .. } => "bom",
        }
    }
}

/// Cost record before the store assigns its sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVariableCost {
    pub material: MaterialId,
    pub cost: Decimal,
    pub currency: Currency,
    pub uom: UnitOfMeasure,
    pub source: CostSource,
}

impl NewVariableCost {
    /// Costs are kept at three decimal places and must not be negative.
    pub fn new(
        material: MaterialId,
        cost: Decimal,
        currency: Currency,
        uom: UnitOfMeasure,
        source: CostSource,
    ) -> DomainResult<Self> {
        if cost < Decimal::ZERO {
            return Err(DomainError::field("cost", "must not be negative"));
        }
        Ok(Self {
            material,
            cost: cost.round_dp(3),
            currency,
            uom,
            source,
        })
    }
}

/// Unit cost of a material in a UOM at some point in time.
///
/// Newer records (higher `seq`) supersede older ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableCost {
    pub seq: u64,
    pub material: MaterialId,
    pub cost: Decimal,
    pub currency: Currency,
    pub uom: UnitOfMeasure,
    pub source: CostSource,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
}

impl VariableCost {
    pub fn from_new(seq: u64, new: NewVariableCost, created_at: DateTime<Utc>) -> Self {
        Self {
            seq,
            material: new.material,
            cost: new.cost,
            currency: new.currency,
            uom: new.uom,
            source: new.source,
            created_at,
            deleted: false,
        }
    }
}

/// Newest live cost record of `material` in `uom`.
pub fn latest_cost_for_uom<'a, I>(costs: I, material: MaterialId, uom: UnitOfMeasure) -> Option<&'a VariableCost>
where
    I: IntoIterator<Item = &'a VariableCost>,
{
    costs
        .into_iter()
        .filter(|c| !c.deleted && c.material == material && c.uom == uom)
        .max_by_key(|c| c.seq)
}
