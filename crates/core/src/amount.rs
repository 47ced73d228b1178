//! Magnitude limits and overflow-checked arithmetic for quantities and money.
//!
//! `Decimal` panics when `*` or `+` overflow. Inputs are bounded at the edges
//! so a single line or movement always fits; folds over many of them still
//! go through [`checked_mul`] / [`checked_add`].

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Largest quantity a line, movement or count may carry: `9_999_999_999.99`.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Largest unit price or unit cost: `999_999_999_999.999999`.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(0xA763_FFFF, 0x0DE0_B6B3, 0, false, 6);

/// Rejects values whose magnitude exceeds `max`.
pub fn ensure_within(field: &str, value: Decimal, max: Decimal) -> DomainResult<()> {
    if value.abs() > max {
        return Err(DomainError::field(field, format!("must not exceed {max}, got {value}")));
    }
    Ok(())
}

pub fn ensure_quantity_within(field: &str, quantity: Decimal) -> DomainResult<()> {
    ensure_within(field, quantity, MAX_QUANTITY)
}

pub fn ensure_price_within(field: &str, price: Decimal) -> DomainResult<()> {
    ensure_within(field, price, MAX_UNIT_PRICE)
}

pub fn overflow(what: &str) -> DomainError {
    DomainError::invariant(format!("arithmetic overflow computing {what}"))
}

pub fn checked_mul(a: Decimal, b: Decimal, what: &str) -> DomainResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| overflow(what))
}

pub fn checked_add(a: Decimal, b: Decimal, what: &str) -> DomainResult<Decimal> {
    a.checked_add(b).ok_or_else(|| overflow(what))
}

pub fn checked_sum<I>(values: I, what: &str) -> DomainResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| checked_add(acc, v, what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn limits_have_the_intended_values() {
        assert_eq!(MAX_QUANTITY, dec!(9999999999.99));
        assert_eq!(MAX_UNIT_PRICE, dec!(999999999999.999999));
    }

    #[test]
    fn bounded_inputs_multiply_without_overflow() {
        assert!(checked_mul(MAX_QUANTITY, MAX_UNIT_PRICE, "value").is_ok());
    }

    #[test]
    fn oversized_values_are_validation_errors() {
        let err = ensure_quantity_within("quantity", dec!(1000000000000000)).unwrap_err();
        assert!(err.validation_errors().unwrap().has_field("quantity"));
        assert!(ensure_quantity_within("quantity", dec!(-1000000000000000)).is_err());
        assert!(ensure_price_within("unit_price", MAX_UNIT_PRICE).is_ok());
    }

    #[test]
    fn overflow_is_reported_not_panicked() {
        match checked_mul(Decimal::MAX, dec!(2), "line total") {
            Err(DomainError::InvariantViolation(msg)) if msg.contains("line total") => {}
            other => panic!("Expected InvariantViolation, got {other:?}"),
        }
        assert!(checked_sum([Decimal::MAX, Decimal::ONE], "subtotal").is_err());
        assert_eq!(checked_sum([dec!(1), dec!(2)], "subtotal").unwrap(), dec!(3));
    }
}
