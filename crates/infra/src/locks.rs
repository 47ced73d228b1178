//! Row locks for postings and status transitions.
//!
//! All keys a unit of work needs are taken at once, in key order, so two
//! transfers in opposite directions cannot deadlock. Waiting is bounded by the
//! configured timeout; running out of time is a retryable conflict.

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use stockwise_core::AggregateId;
use stockwise_inventory::StockKey;

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    /// One (material, uom, location) stock key.
    Stock(StockKey),
    /// An order header.
    Order(AggregateId),
    /// A uniqueness domain, e.g. location addresses.
    Registry(&'static str),
}

impl core::fmt::Display for LockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LockKey::Stock(key) => write!(f, "stock {key}"),
            LockKey::Order(id) => write!(f, "order {id}"),
            LockKey::Registry(name) => write!(f, "registry {name}"),
        }
    }
}

#[derive(Debug)]
pub struct LockManager {
    held: Mutex<BTreeSet<LockKey>>,
    released: Condvar,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: Mutex::new(BTreeSet::new()),
            released: Condvar::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Blocks until every key is free, then takes them all.
    pub fn acquire<I>(&self, keys: I) -> Result<LockGuard<'_>, ServiceError>
    where
        I: IntoIterator<Item = LockKey>,
    {
        let wanted: BTreeSet<LockKey> = keys.into_iter().collect();
        let deadline = Instant::now() + self.timeout;
        let mut held = self.held()?;

        loop {
            match wanted.iter().find(|k| held.contains(*k)) {
                None => {
                    held.extend(wanted.iter().copied());
                    return Ok(LockGuard {
                        manager: self,
                        keys: wanted,
                    });
                }
                Some(busy) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ServiceError::Conflict(format!(
                            "timed out after {:?} waiting for {busy}",
                            self.timeout
                        )));
                    }
                    let (guard, _) = self
                        .released
                        .wait_timeout(held, deadline - now)
                        .map_err(|_| ServiceError::System("lock table poisoned".to_string()))?;
                    held = guard;
                }
            }
        }
    }

    pub fn is_held(&self, key: &LockKey) -> bool {
        self.held().map(|held| held.contains(key)).unwrap_or(false)
    }

    fn held(&self) -> Result<MutexGuard<'_, BTreeSet<LockKey>>, ServiceError> {
        self.held
            .lock()
            .map_err(|_| ServiceError::System("lock table poisoned".to_string()))
    }
}

/// Releases its keys when dropped.
#[derive(Debug)]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    keys: BTreeSet<LockKey>,
}

impl LockGuard<'_> {
    pub fn keys(&self) -> impl Iterator<Item = &LockKey> {
        self.keys.iter()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut held = match self.manager.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner(),
        };
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.manager.released.notify_all();
    }
}
