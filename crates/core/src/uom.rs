//! Units of measure.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Closed vocabulary of units a material can be stocked and traded in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitOfMeasure {
    #[serde(rename = "ADT")]
    Piece,
    #[serde(rename = "KG")]
    Kilogram,
    #[serde(rename = "G")]
    Gram,
    #[serde(rename = "L")]
    Liter,
    #[serde(rename = "ML")]
    Milliliter,
    #[serde(rename = "M")]
    Meter,
    #[serde(rename = "BOX")]
    Box,
    #[serde(rename = "PLT")]
    Pallet,
}

impl UnitOfMeasure {
    pub const ALL: [UnitOfMeasure; 8] = [
        UnitOfMeasure::Piece,
        UnitOfMeasure::Kilogram,
        UnitOfMeasure::Gram,
        UnitOfMeasure::Liter,
        UnitOfMeasure::Milliliter,
        UnitOfMeasure::Meter,
        UnitOfMeasure::Box,
        UnitOfMeasure::Pallet,
    ];

    pub fn code(self) -> &'static str {
        match self {
            UnitOfMeasure::Piece => "ADT",
            UnitOfMeasure::Kilogram => "KG",
            UnitOfMeasure::Gram => "G",
            UnitOfMeasure::Liter => "L",
            UnitOfMeasure::Milliliter => "ML",
            UnitOfMeasure::Meter => "M",
            UnitOfMeasure::Box => "BOX",
            UnitOfMeasure::Pallet => "PLT",
        }
    }

    /// Whole-unit UOMs only accept whole quantities.
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            UnitOfMeasure::Piece | UnitOfMeasure::Box | UnitOfMeasure::Pallet
        )
    }

    /// Rejects a fractional `quantity` for whole-unit UOMs.
    pub fn ensure_quantity(self, field: &str, quantity: Decimal) -> DomainResult<()> {
        if self.is_integral() && !quantity.fract().is_zero() {
            return Err(DomainError::field(
                field,
                format!("{} requires a whole quantity, got {quantity}", self.code()),
            ));
        }
        Ok(())
    }
}

impl core::fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for UnitOfMeasure {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnitOfMeasure::ALL
            .into_iter()
            .find(|u| u.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::field("uom", format!("unknown unit of measure '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn whole_units_reject_fractions() {
        let err = UnitOfMeasure::Box
            .ensure_quantity("quantity", dec!(2.5))
            .unwrap_err();
        assert!(err.validation_errors().unwrap().has_field("quantity"));

        assert!(UnitOfMeasure::Pallet.ensure_quantity("quantity", dec!(3)).is_ok());
        assert!(UnitOfMeasure::Piece.ensure_quantity("quantity", dec!(3.000)).is_ok());
    }

    #[test]
    fn measured_units_accept_fractions() {
        assert!(UnitOfMeasure::Kilogram.ensure_quantity("quantity", dec!(0.125)).is_ok());
        assert!(UnitOfMeasure::Liter.ensure_quantity("quantity", dec!(7.5)).is_ok());
    }

    #[test]
    fn codes_parse_back() {
        for uom in UnitOfMeasure::ALL {
            assert_eq!(uom.code().parse::<UnitOfMeasure>().unwrap(), uom);
        }
        assert!("TON".parse::<UnitOfMeasure>().is_err());
    }

    #[test]
    fn serializes_as_code() {
        let json = serde_json::to_string(&UnitOfMeasure::Pallet).unwrap();
        assert_eq!(json, "\"PLT\"");
    }
}
