use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwise_core::amount::{ensure_price_within, ensure_quantity_within};
use stockwise_core::commercial::ensure_fraction;
use stockwise_core::{DomainError, DomainResult, PricedLine, UnitOfMeasure};
use stockwise_materials::MaterialId;

/// One line of a procurement order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementLine {
    pub line_no: u32,
    pub material: MaterialId,
    pub uom: UnitOfMeasure,
    pub quantity: Decimal,
    pub quantity_received: Decimal,
    /// May stay unset while the order is a draft.
    pub unit_price: Option<Decimal>,
    pub tax_rate: Decimal,
}

impl ProcurementLine {
    pub fn quantity_left(&self) -> Decimal {
        self.quantity - self.quantity_received
    }

    pub fn is_fully_received(&self) -> bool {
        self.quantity_left() <= Decimal::ZERO
    }

    pub(crate) fn validate(&self) -> DomainResult<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(DomainError::field("quantity", "must be positive"));
        }
        ensure_quantity_within("quantity", self.quantity)?;
        self.uom.ensure_quantity("quantity", self.quantity)?;
        if self.quantity < self.quantity_received {
            return Err(DomainError::field(
                "quantity",
                format!("cannot be below the received quantity {}", self.quantity_received),
            ));
        }
        if self.unit_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(DomainError::field("unit_price", "must not be negative"));
        }
        if let Some(price) = self.unit_price {
            ensure_price_within("unit_price", price)?;
        }
        ensure_fraction("tax_rate", self.tax_rate)
    }
}

impl PricedLine for ProcurementLine {
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

/// Draft-only line changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinePatch {
    pub material: Option<MaterialId>,
    pub uom: Option<UnitOfMeasure>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
}

impl LinePatch {
    pub(crate) fn applied_to(&self, line: &ProcurementLine) -> DomainResult<ProcurementLine> {
        let next = ProcurementLine {
            line_no: line.line_no,
            material: self.material.unwrap_or(line.material),
            uom: self.uom.unwrap_or(line.uom),
            quantity: self.quantity.unwrap_or(line.quantity),
            quantity_received: line.quantity_received,
            unit_price: self.unit_price.or(line.unit_price),
            tax_rate: self.tax_rate.unwrap_or(line.tax_rate),
        };
        next.validate()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line() -> ProcurementLine {
        ProcurementLine {
            line_no: 1,
            material: MaterialId::generate(),
            uom: UnitOfMeasure::Box,
            quantity: dec!(10),
            quantity_received: dec!(3),
            unit_price: Some(dec!(2.5)),
            tax_rate: dec!(0.2),
        }
    }

    #[test]
    fn accessors() {
        let l = line();
        assert_eq!(l.quantity_left(), dec!(7));
        assert_eq!(l.total_without_tax(), Some(dec!(25)));
        assert_eq!(l.total_with_tax(), Some(dec!(30)));
        assert!(!l.is_fully_received());
    }

    #[test]
    fn patch_keeps_unset_fields() {
        let l = line();
        let patched = LinePatch {
            quantity: Some(dec!(12)),
            ..LinePatch::default()
        }
        .applied_to(&l)
        .unwrap();
        assert_eq!(patched.quantity, dec!(12));
        assert_eq!(patched.unit_price, l.unit_price);
        assert_eq!(patched.material, l.material);
    }

    #[test]
    fn patch_is_validated() {
        let l = line();
        let bad = [
            LinePatch { quantity: Some(dec!(2.5)), ..LinePatch::default() },
            LinePatch { quantity: Some(dec!(0)), ..LinePatch::default() },
            LinePatch { unit_price: Some(dec!(-1)), ..LinePatch::default() },
            LinePatch { tax_rate: Some(dec!(1.5)), ..LinePatch::default() },
            LinePatch { quantity: Some(dec!(1000000000000000)), ..LinePatch::default() },
            LinePatch { unit_price: Some(dec!(1000000000000000)), ..LinePatch::default() },
        ];
        for patch in bad {
            assert!(patch.applied_to(&l).is_err(), "{patch:?}");
        }
    }
}
