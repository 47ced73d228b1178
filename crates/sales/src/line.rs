use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwise_core::amount::{ensure_price_within, ensure_quantity_within};
use stockwise_core::commercial::ensure_fraction;
use stockwise_core::{DomainError, DomainResult, PricedLine, UnitOfMeasure};
use stockwise_materials::MaterialId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesLine {
    pub line_no: u32,
    pub material: MaterialId,
    pub uom: UnitOfMeasure,
    pub quantity: Decimal,
    pub quantity_sent: Decimal,
    pub unit_price: Option<Decimal>,
    pub tax_rate: Decimal,
}

impl SalesLine {
    pub fn quantity_left(&self) -> Decimal {
        self.quantity - self.quantity_sent
    }

    pub fn is_fully_sent(&self) -> bool {
        self.quantity_left() <= Decimal::ZERO
    }

    pub(crate) fn validate(&self) -> DomainResult<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::field("quantity", "must be positive"));
        }
        ensure_quantity_within("quantity", self.quantity)?;
        self.uom.ensure_quantity("quantity", self.quantity)?;
        if self.unit_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(DomainError::field("unit_price", "must not be negative"));
        }
        if let Some(price) = self.unit_price {
            ensure_price_within("unit_price", price)?;
        }
        ensure_fraction("tax_rate", self.tax_rate)
    }
}

impl PricedLine for SalesLine {
    fn unit_price(&self) -> Option<Decimal> {
        self.unit_price
    }

    fn quantity(&self) -> Decimal {
        self.quantity
    }

    fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SalesLinePatch {
    pub material: Option<MaterialId>,
    pub uom: Option<UnitOfMeasure>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
}

impl SalesLinePatch {
    pub(crate) fn applied_to(&self, line: &SalesLine) -> DomainResult<SalesLine> {
        let next = SalesLine {
            line_no: line.line_no,
            material: self.material.unwrap_or(line.material),
            uom: self.uom.unwrap_or(line.uom),
            quantity: self.quantity.unwrap_or(line.quantity),
            quantity_sent: line.quantity_sent,
            unit_price: self.unit_price.or(line.unit_price),
            tax_rate: self.tax_rate.unwrap_or(line.tax_rate),
        };
        next.validate()?;
        Ok(next)
    }
}
