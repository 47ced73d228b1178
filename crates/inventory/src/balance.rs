//! Aggregate on-hand balance per (material, uom), summed over locations.
//!
//! The balance is a cache of the movement log. It is folded forward on every
//! commit and can be rebuilt or checked against a full replay at any time.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwise_core::UnitOfMeasure;
use stockwise_events::Projection;
use stockwise_materials::MaterialId;

use crate::movement::StockMovement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub material: MaterialId,
    pub uom: UnitOfMeasure,
}

impl BalanceKey {
    pub fn new(material: MaterialId, uom: UnitOfMeasure) -> Self {
        Self { material, uom }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryBalance {
    pub material: MaterialId,
    pub uom: UnitOfMeasure,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceBook {
    balances: BTreeMap<BalanceKey, Decimal>,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_movements<'a, I>(movements: I) -> Self
    where
        I: IntoIterator<Item = &'a StockMovement>,
    {
        let mut book = Self::new();
        book.replay(movements);
        book
    }

    /// Zero when the key has never been posted.
    pub fn quantity(&self, material: MaterialId, uom: UnitOfMeasure) -> Decimal {
        self.balances
            .get(&BalanceKey::new(material, uom))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn get(&self, material: MaterialId, uom: UnitOfMeasure) -> Option<InventoryBalance> {
        self.balances
            .get(&BalanceKey::new(material, uom))
            .map(|quantity| InventoryBalance {
                material,
                uom,
                quantity: *quantity,
            })
    }

    pub fn all(&self) -> Vec<InventoryBalance> {
        self.balances
            .iter()
            .map(|(k, q)| InventoryBalance {
                material: k.material,
                uom: k.uom,
                quantity: *q,
            })
            .collect()
    }

    /// Overwrites a cached value. Only used to repair or to simulate drift.
    pub fn set(&mut self, material: MaterialId, uom: UnitOfMeasure, quantity: Decimal) {
        self.balances.insert(BalanceKey::new(material, uom), quantity);
    }
}

impl Projection<StockMovement> for BalanceBook {
    /// Unchecked; stores check the resulting balance before committing.
    fn apply(&mut self, movement: &StockMovement) {
        *self
            .balances
            .entry(BalanceKey::new(movement.material(), movement.uom()))
            .or_insert(Decimal::ZERO) += movement.quantity();
    }

    fn reset(&mut self) {
        self.balances.clear();
    }
}

/// A cached balance that disagrees with the replayed log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDrift {
    pub material: MaterialId,
    pub uom: UnitOfMeasure,
    pub cached: Decimal,
    pub replayed: Decimal,
}

/// Compares `cached` with a full replay of `movements`.
///
/// Keys missing on either side count as zero.
pub fn reconcile<'a, I>(cached: &BalanceBook, movements: I) -> Vec<BalanceDrift>
where
    I: IntoIterator<Item = &'a StockMovement>,
{
    let replayed = BalanceBook::from_movements(movements);
    let mut keys: Vec<BalanceKey> = cached
        .balances
        .keys()
        .chain(replayed.balances.keys())
        .copied()
        .collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|k| {
            let c = cached.quantity(k.material, k.uom);
            let r = replayed.quantity(k.material, k.uom);
            (c != r).then_some(BalanceDrift {
                material: k.material,
                uom: k.uom,
                cached: c,
                replayed: r,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationId;
    use crate::movement::{MovementAction, MovementId, NewMovement, StockKey};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use stockwise_core::UserId;

    fn movement(key: StockKey, quantity: Decimal) -> StockMovement {
        StockMovement::record(
            MovementId::generate(),
            1,
            NewMovement {
                key,
                quantity,
                action: MovementAction::Adjust,
                unit_cost: dec!(1),
                line: None,
                reason: "count".to_string(),
                created_by: UserId::new(),
                created_at: Utc::now(),
            },
        )
    }

    #[test]
    fn sums_across_locations() {
        let material = MaterialId::generate();
        let a = StockKey::new(material, UnitOfMeasure::Kilogram, LocationId::generate());
        let b = a.at(LocationId::generate());
        let log = vec![movement(a, dec!(10)), movement(b, dec!(2.5)), movement(a, dec!(-4))];

        let book = BalanceBook::from_movements(&log);
        assert_eq!(book.quantity(material, UnitOfMeasure::Kilogram), dec!(8.5));
        assert_eq!(book.quantity(material, UnitOfMeasure::Gram), Decimal::ZERO);
        assert_eq!(book.all().len(), 1);
    }

    #[test]
    fn uoms_are_kept_apart() {
        let material = MaterialId::generate();
        let loc = LocationId::generate();
        let log = vec![
            movement(StockKey::new(material, UnitOfMeasure::Box, loc), dec!(3)),
            movement(StockKey::new(material, UnitOfMeasure::Piece, loc), dec!(36)),
        ];
        let book = BalanceBook::from_movements(&log);
        assert_eq!(book.get(material, UnitOfMeasure::Box).unwrap().quantity, dec!(3));
        assert_eq!(book.get(material, UnitOfMeasure::Piece).unwrap().quantity, dec!(36));
    }

    #[test]
    fn reconcile_reports_only_drifted_keys() {
        let m1 = MaterialId::generate();
        let m2 = MaterialId::generate();
        let loc = LocationId::generate();
        let log = vec![
            movement(StockKey::new(m1, UnitOfMeasure::Piece, loc), dec!(5)),
            movement(StockKey::new(m2, UnitOfMeasure::Piece, loc), dec!(7)),
        ];

        let mut cached = BalanceBook::from_movements(&log);
        assert!(reconcile(&cached, &log).is_empty());

        cached.set(m2, UnitOfMeasure::Piece, dec!(9));
        let drift = reconcile(&cached, &log);
        assert_eq!(
            drift,
            vec![BalanceDrift {
                material: m2,
                uom: UnitOfMeasure::Piece,
                cached: dec!(9),
                replayed: dec!(7),
            }]
        );
    }

    #[test]
    fn reconcile_flags_balances_with_no_movements() {
        let cached = {
            let mut b = BalanceBook::new();
            b.set(MaterialId::generate(), UnitOfMeasure::Liter, dec!(1));
            b
        };
        assert_eq!(reconcile(&cached, &Vec::<StockMovement>::new()).len(), 1);
    }
}
