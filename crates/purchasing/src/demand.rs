//! Internal requests for material, raised ahead of a procurement order.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwise_core::{DomainError, DomainResult, Entity, UnitOfMeasure, UserId, display_number, typed_id};
use stockwise_materials::MaterialId;

typed_id!(DemandId);

const DEMAND_NUMBER_PREFIX: &str = "#";
const DEMAND_NUMBER_WIDTH: usize = 14;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemandStatus {
    #[default]
    Submitted,
    Approved,
    Closed,
}

impl DemandStatus {
    fn next(self) -> Option<DemandStatus> {
        match self {
            DemandStatus::Submitted => Some(DemandStatus::Approved),
            DemandStatus::Approved => Some(DemandStatus::Closed),
            DemandStatus::Closed => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDemand {
    pub material: MaterialId,
    pub quantity: Decimal,
    pub uom: UnitOfMeasure,
    pub deadline: Option<NaiveDate>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialDemand {
    id: DemandId,
    number: Option<String>,
    material: MaterialId,
    quantity: Decimal,
    uom: UnitOfMeasure,
    deadline: Option<NaiveDate>,
    description: String,
    status: DemandStatus,
    created_by: UserId,
    created_at: DateTime<Utc>,
    deleted: bool,
}

impl MaterialDemand {
    pub fn submit(id: DemandId, input: NewDemand, created_by: UserId, created_at: DateTime<Utc>) -> DomainResult<Self> {
        if input.quantity < Decimal::ZERO {
            return Err(DomainError::field("quantity", "must not be negative"));
        }
        input.uom.ensure_quantity("quantity", input.quantity)?;

        Ok(Self {
            id,
            number: None,
            material: input.material,
            quantity: input.quantity,
            uom: input.uom,
            deadline: input.deadline,
            description: input.description,
            status: DemandStatus::Submitted,
            created_by,
            created_at,
            deleted: false,
        })
    }

    /// Same one-time rule as material codes.
    pub fn assign_number(&mut self, year: i32, serial: u64) -> &str {
        self.number
            .get_or_insert_with(|| display_number(DEMAND_NUMBER_PREFIX, year, serial, DEMAND_NUMBER_WIDTH))
    }

    /// Moves one step along submitted → approved → closed.
    pub fn advance(&mut self, to: DemandStatus) -> DomainResult<()> {
        if self.status.next() != Some(to) {
            return Err(DomainError::field(
                "status",
                format!("cannot move a {:?} demand to {:?}", self.status, to),
            ));
        }
        self.status = to;
        Ok(())
    }

    pub fn id_typed(&self) -> DemandId {
        self.id
    }

    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn uom(&self) -> UnitOfMeasure {
        self.uom
    }

    pub fn deadline(&self) -> Option<NaiveDate> {
        self.deadline
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> DemandStatus {
        self.status
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for MaterialDemand {
    type Id = DemandId;

    fn id(&self) -> &DemandId {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn demand(quantity: Decimal, uom: UnitOfMeasure) -> DomainResult<MaterialDemand> {
        MaterialDemand::submit(
            DemandId::generate(),
            NewDemand {
                material: MaterialId::generate(),
                quantity,
                uom,
                deadline: NaiveDate::from_ymd_opt(2025, 6, 1),
                description: "line 3 changeover".to_string(),
            },
            UserId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn walks_the_lifecycle_in_order() {
        let mut d = demand(dec!(4), UnitOfMeasure::Pallet).unwrap();
        assert!(d.advance(DemandStatus::Closed).is_err());
        d.advance(DemandStatus::Approved).unwrap();
        d.advance(DemandStatus::Closed).unwrap();
        assert!(d.advance(DemandStatus::Closed).is_err());
    }

    #[test]
    fn quantity_rules() {
        assert!(demand(dec!(-1), UnitOfMeasure::Kilogram).is_err());
        assert!(demand(dec!(1.5), UnitOfMeasure::Piece).is_err());
        assert!(demand(dec!(0), UnitOfMeasure::Piece).is_ok());
    }

    #[test]
    fn number_uses_hash_prefix() {
        let mut d = demand(dec!(1), UnitOfMeasure::Piece).unwrap();
        assert_eq!(d.assign_number(2025, 7), "#2500000000007");
        assert_eq!(d.assign_number(2026, 8), "#2500000000007");
    }
}
