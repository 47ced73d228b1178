use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;

use stockwise_core::AggregateId;
use stockwise_events::Projection;
use stockwise_inventory::{BalanceBook, BalanceKey, StockKey, StockMovement};
use stockwise_materials::VariableCost;

use super::{AuditEnvelope, ChangeSet, Committed, Counter, LedgerStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct State {
    streams: HashMap<AggregateId, Vec<AuditEnvelope>>,
    log: Vec<StockMovement>,
    by_key: HashMap<StockKey, Vec<usize>>,
    balances: BalanceBook,
    costs: Vec<VariableCost>,
    serials: HashMap<Counter, u64>,
}

impl State {
    fn stream_version(&self, aggregate_id: &AggregateId) -> Option<u64> {
        self.streams
            .get(aggregate_id)
            .and_then(|s| s.last())
            .map(|e| e.sequence_number())
    }

    fn available(&self, key: &StockKey) -> Result<Decimal, StoreError> {
        let Some(idx) = self.by_key.get(key) else {
            return Ok(Decimal::ZERO);
        };
        idx.iter().try_fold(Decimal::ZERO, |total, &i| {
            total
                .checked_add(self.log[i].quantity())
                .ok_or_else(|| StoreError::Invariant(format!("{key} balance overflows")))
        })
    }

    /// Every check a commit needs, done before anything is written.
    fn validate(&self, changes: &ChangeSet) -> Result<(), StoreError> {
        let mut versions: HashMap<AggregateId, Option<u64>> = HashMap::new();
        for append in &changes.streams {
            let current = *versions
                .entry(append.aggregate_id)
                .or_insert_with(|| self.stream_version(&append.aggregate_id));
            if !append.expected.matches(current) {
                return Err(StoreError::Concurrency(format!(
                    "stream {} expected {:?}, found {current:?}",
                    append.aggregate_id, append.expected
                )));
            }

            let mut next = current.unwrap_or(0) + 1;
            for envelope in &append.events {
                if envelope.aggregate_id() != append.aggregate_id {
                    return Err(StoreError::Invariant(format!(
                        "envelope for {} staged on stream {}",
                        envelope.aggregate_id(),
                        append.aggregate_id
                    )));
                }
                if envelope.sequence_number() != next {
                    return Err(StoreError::Invariant(format!(
                        "stream {} expected sequence {next}, got {}",
                        append.aggregate_id,
                        envelope.sequence_number()
                    )));
                }
                next += 1;
            }
            if !append.events.is_empty() {
                versions.insert(append.aggregate_id, Some(next - 1));
            }
        }

        let mut running: HashMap<StockKey, Decimal> = HashMap::new();
        let mut totals: HashMap<BalanceKey, Decimal> = HashMap::new();
        for (_, movement) in &changes.movements {
            let key = movement.key;
            let on_hand = match running.get(&key) {
                Some(q) => *q,
                None => self.available(&key)?,
            };
            let on_hand = on_hand
                .checked_add(movement.quantity)
                .ok_or_else(|| StoreError::Invariant(format!("{key} balance overflows")))?;
            if on_hand < Decimal::ZERO {
                return Err(StoreError::InsufficientStock(format!(
                    "{key} would go negative ({on_hand})"
                )));
            }
            running.insert(key, on_hand);

            // The cached balance folds without checks, so its sum is checked here.
            let book = BalanceKey::new(key.material, key.uom);
            let total = totals
                .get(&book)
                .copied()
                .unwrap_or_else(|| self.balances.quantity(key.material, key.uom));
            let total = total.checked_add(movement.quantity).ok_or_else(|| {
                StoreError::Invariant(format!("balance of {} overflows", key.material))
            })?;
            totals.insert(book, total);
        }
        Ok(())
    }
}

/// Single-process store for tests and embedding.
///
/// One `RwLock` over all tables makes a commit atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites one cached balance, bypassing the ledger.
    #[cfg(test)]
    pub(crate) fn overwrite_balance(
        &self,
        material: stockwise_materials::MaterialId,
        uom: stockwise_core::UnitOfMeasure,
        quantity: Decimal,
    ) -> Result<(), StoreError> {
        self.write()?.balances.set(material, uom, quantity);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }
}

impl LedgerStore for InMemoryStore {
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<AuditEnvelope>, StoreError> {
        Ok(self
            .read()?
            .streams
            .get(&aggregate_id)
            .cloned()
            .unwrap_or_default())
    }

    fn movements(&self) -> Result<Vec<StockMovement>, StoreError> {
        Ok(self.read()?.log.clone())
    }

    fn movements_for(&self, key: &StockKey) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.read()?;
        Ok(state
            .by_key
            .get(key)
            .map(|idx| idx.iter().map(|&i| state.log[i].clone()).collect())
            .unwrap_or_default())
    }

    fn balances(&self) -> Result<BalanceBook, StoreError> {
        Ok(self.read()?.balances.clone())
    }

    fn ledger_snapshot(&self) -> Result<(BalanceBook, Vec<StockMovement>), StoreError> {
        let state = self.read()?;
        Ok((state.balances.clone(), state.log.clone()))
    }

    fn rebuild_balances(&self) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let rebuilt = BalanceBook::from_movements(&state.log);
        state.balances = rebuilt;
        Ok(())
    }

    fn costs(&self) -> Result<Vec<VariableCost>, StoreError> {
        Ok(self.read()?.costs.clone())
    }

    fn next_serial(&self, counter: Counter) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let serial = state.serials.entry(counter).or_insert(0);
        *serial += 1;
        Ok(*serial)
    }

    fn commit(&self, changes: ChangeSet) -> Result<Committed, StoreError> {
        let mut state = self.write()?;
        state.validate(&changes)?;

        for append in changes.streams {
            state
                .streams
                .entry(append.aggregate_id)
                .or_default()
                .extend(append.events);
        }

        let mut committed = Committed::default();
        for (id, new) in changes.movements {
            let position = state.log.len();
            let movement = StockMovement::record(id, position as u64 + 1, new);
            state.balances.apply(&movement);
            state.by_key.entry(movement.key()).or_default().push(position);
            state.log.push(movement.clone());
            committed.movements.push(movement);
        }

        for new in changes.costs {
            let seq = state.costs.len() as u64 + 1;
            let cost = VariableCost::from_new(seq, new, changes.at);
            state.costs.push(cost.clone());
            committed.costs.push(cost);
        }

        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;
    use serde::Serialize;
    use stockwise_core::{Currency, ExpectedVersion, UnitOfMeasure, UserId};
    use stockwise_events::{Event, EventEnvelope};
    use stockwise_inventory::{LocationId, MovementAction, MovementId, NewMovement};
    use stockwise_materials::{CostSource, MaterialId, NewVariableCost};

    use crate::store::StreamAppend;

    #[derive(Debug, Clone, Serialize)]
    struct Noted {
        at: DateTime<Utc>,
    }

    impl Event for Noted {
        fn event_type(&self) -> &'static str {
            "test.noted"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    fn envelope(aggregate_id: AggregateId, seq: u64) -> AuditEnvelope {
        EventEnvelope::wrap(aggregate_id, "test", seq, Noted { at: Utc::now() })
            .into_json()
            .unwrap()
    }

    fn append(aggregate_id: AggregateId, expected: ExpectedVersion, seqs: &[u64]) -> StreamAppend {
        StreamAppend {
            aggregate_id,
            expected,
            events: seqs.iter().map(|s| envelope(aggregate_id, *s)).collect(),
        }
    }

    fn key() -> StockKey {
        StockKey::new(MaterialId::generate(), UnitOfMeasure::Piece, LocationId::generate())
    }

    fn movement(key: StockKey, quantity: Decimal) -> (MovementId, NewMovement) {
        (
            MovementId::generate(),
            NewMovement {
                key,
                quantity,
                action: if quantity > Decimal::ZERO {
                    MovementAction::In
                } else {
                    MovementAction::Out
                },
                unit_cost: dec!(10),
                line: None,
                reason: "test".to_string(),
                created_by: UserId::new(),
                created_at: Utc::now(),
            },
        )
    }

    #[test]
    fn commit_appends_streams_movements_and_costs() {
        let store = InMemoryStore::new();
        let order = AggregateId::new();
        let k = key();

        let mut changes = ChangeSet::new(Utc::now());
        changes.streams.push(append(order, ExpectedVersion::New, &[1, 2]));
        changes.movements.push(movement(k, dec!(5)));
        changes.costs.push(
            NewVariableCost::new(
                k.material,
                dec!(12.5),
                Currency::Try,
                k.uom,
                CostSource::ProcurementOrder { order_id: order },
            )
            .unwrap(),
        );

        let committed = store.commit(changes).unwrap();
        assert_eq!(committed.movements[0].sequence(), 1);
        assert_eq!(committed.costs[0].seq, 1);
        assert_eq!(store.load_stream(order).unwrap().len(), 2);
        assert_eq!(store.movements_for(&k).unwrap().len(), 1);
        assert_eq!(store.balances().unwrap().quantity(k.material, k.uom), dec!(5));
    }

    #[test]
    fn stale_stream_rejects_the_whole_commit() {
        let store = InMemoryStore::new();
        let order = AggregateId::new();
        let mut first = ChangeSet::new(Utc::now());
        first.streams.push(append(order, ExpectedVersion::New, &[1]));
        store.commit(first).unwrap();

        let k = key();
        let mut stale = ChangeSet::new(Utc::now());
        stale.streams.push(append(order, ExpectedVersion::New, &[1]));
        stale.movements.push(movement(k, dec!(3)));

        match store.commit(stale) {
            Err(StoreError::Concurrency(_)) => {}
            other => panic!("Expected Concurrency, got {other:?}"),
        }
        assert!(store.movements().unwrap().is_empty());
        assert_eq!(store.load_stream(order).unwrap().len(), 1);
    }

    #[test]
    fn negative_stock_is_refused() {
        let store = InMemoryStore::new();
        let k = key();
        let mut changes = ChangeSet::new(Utc::now());
        changes.movements.push(movement(k, dec!(2)));
        changes.movements.push(movement(k, dec!(-3)));

        match store.commit(changes) {
            Err(StoreError::InsufficientStock(msg)) if msg.contains("negative") => {}
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
        assert!(store.movements().unwrap().is_empty());
        assert_eq!(store.balances().unwrap().quantity(k.material, k.uom), dec!(0));
    }

    #[test]
    fn overflowing_balance_is_refused() {
        let store = InMemoryStore::new();
        let k = key();
        let mut first = ChangeSet::new(Utc::now());
        first.movements.push(movement(k, Decimal::MAX));
        store.commit(first).unwrap();

        let mut second = ChangeSet::new(Utc::now());
        second.movements.push(movement(k, dec!(1)));
        match store.commit(second) {
            Err(StoreError::Invariant(msg)) if msg.contains("overflows") => {}
            other => panic!("Expected Invariant, got {other:?}"),
        }
        assert_eq!(store.movements().unwrap().len(), 1);
    }

    #[test]
    fn sequence_gaps_are_refused() {
        let store = InMemoryStore::new();
        let order = AggregateId::new();
        let mut changes = ChangeSet::new(Utc::now());
        changes.streams.push(append(order, ExpectedVersion::New, &[1, 3]));
        assert!(matches!(store.commit(changes), Err(StoreError::Invariant(_))));
    }

    #[test]
    fn serials_count_per_table() {
        let store = InMemoryStore::new();
        assert_eq!(store.next_serial(Counter::SalesOrder).unwrap(), 1);
        assert_eq!(store.next_serial(Counter::SalesOrder).unwrap(), 2);
        assert_eq!(store.next_serial(Counter::Material).unwrap(), 1);
    }

    #[test]
    fn rebuild_repairs_overwritten_balance() {
        let store = InMemoryStore::new();
        let k = key();
        let mut changes = ChangeSet::new(Utc::now());
        changes.movements.push(movement(k, dec!(4)));
        store.commit(changes).unwrap();

        store.overwrite_balance(k.material, k.uom, dec!(9)).unwrap();
        let (cached, log) = store.ledger_snapshot().unwrap();
        assert_eq!(cached.quantity(k.material, k.uom), dec!(9));
        assert_eq!(BalanceBook::from_movements(&log).quantity(k.material, k.uom), dec!(4));

        store.rebuild_balances().unwrap();
        assert_eq!(store.balances().unwrap().quantity(k.material, k.uom), dec!(4));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 100,
                ..ProptestConfig::default()
            })]

            /// Whatever is attempted, the cached balance equals the replayed
            /// log and never goes negative.
            #[test]
            fn balance_tracks_log_and_stays_non_negative(
                deltas in prop::collection::vec(-20i64..20, 1..40)
            ) {
                let store = InMemoryStore::new();
                let k = key();
                for delta in deltas.into_iter().filter(|d| *d != 0) {
                    let mut changes = ChangeSet::new(Utc::now());
                    changes.movements.push(movement(k, Decimal::from(delta)));
                    let _ = store.commit(changes);

                    let cached = store.balances().unwrap().quantity(k.material, k.uom);
                    let replayed: Decimal = store.movements().unwrap().iter().map(|m| m.quantity()).sum();
                    prop_assert!(cached >= Decimal::ZERO);
                    prop_assert_eq!(cached, replayed);
                }
            }
        }
    }
}
