//! `stockwise-infra`: storage, locking, collaborators and the transaction
//! orchestration around the pure domain crates.
//!
//! - [`store`]: the [`LedgerStore`] boundary and its in-memory implementation
//! - [`locks`]: time-boxed row locks taken in key order
//! - [`transaction`]: stage, commit atomically, then publish the audit trail
//! - [`services`]: every operation callers run, on [`Stockwise`]

pub mod audit;
pub mod command_dispatcher;
pub mod config;
pub mod error;
pub mod locks;
pub mod rates;
pub mod repository;
pub mod services;
pub mod store;
pub mod transaction;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, StockwiseConfig};
pub use error::{ServiceError, StoreError};
pub use locks::{LockKey, LockManager};
pub use rates::{Conversion, InMemoryRates, RateLookup, RateService, RateSource, ResolvedRate};
pub use repository::{InMemoryRepository, MasterData, Repository};
pub use services::{InMemoryStockwise, Stockwise};
pub use store::{AuditEnvelope, InMemoryStore, LedgerStore};
