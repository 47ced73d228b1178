//! Application services: every operation a caller can run, each as one
//! transaction against the store.
//!
//! [`Stockwise`] owns the store, the audit bus, the lock table, the rate
//! lookup and the master-data repositories. Its operations are split across
//! the submodules by area.

pub mod inventory;
pub mod master_data;
pub mod procurement;
pub mod sales;

use std::sync::Arc;

use chrono::Utc;

use stockwise_auth::Actor;
use stockwise_events::{EventBus, InMemoryEventBus};
use stockwise_inventory::{InventoryLocation, LocationId, MovementId, StockMovement};
use stockwise_materials::{Material, MaterialId};
use stockwise_parties::{Company, CompanyId};

use crate::config::StockwiseConfig;
use crate::error::ServiceError;
use crate::locks::{LockKey, LockManager};
use crate::rates::{RateLookup, RateService};
use crate::repository::{MasterData, live};
use crate::store::{AuditEnvelope, Committed, InMemoryStore, LedgerStore};
use crate::transaction::Transaction;

#[derive(Debug)]
pub struct Stockwise<S, B> {
    store: S,
    bus: B,
    locks: LockManager,
    rates: RateLookup,
    master: MasterData,
    config: StockwiseConfig,
}

/// Fully in-process wiring.
pub type InMemoryStockwise = Stockwise<Arc<InMemoryStore>, Arc<InMemoryEventBus<AuditEnvelope>>>;

impl<S, B> Stockwise<S, B> {
    pub fn new(
        store: S,
        bus: B,
        rates: Arc<dyn RateService>,
        master: MasterData,
        config: StockwiseConfig,
    ) -> Self {
        Self {
            locks: LockManager::new(config.lock_timeout()),
            rates: RateLookup::new(rates, config.rate_lookup_timeout(), config.reference_currency),
            store,
            bus,
            master,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn master(&self) -> &MasterData {
        &self.master
    }

    pub fn config(&self) -> &StockwiseConfig {
        &self.config
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }
}

impl InMemoryStockwise {
    pub fn in_memory(config: StockwiseConfig, rates: Arc<dyn RateService>) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryEventBus::new()),
            rates,
            MasterData::in_memory(),
            config,
        )
    }
}

impl<S, B> Stockwise<S, B>
where
    S: LedgerStore,
    B: EventBus<AuditEnvelope>,
{
    /// Takes `keys` (time-boxed) and opens a transaction under them.
    pub(crate) fn begin<I>(&self, keys: I, actor: &Actor, reason: &str) -> Result<Transaction<'_>, ServiceError>
    where
        I: IntoIterator<Item = LockKey>,
    {
        let guard = self.locks.acquire(keys)?;
        Ok(Transaction::begin(Some(guard), actor.user_id, reason, Utc::now()))
    }

    pub(crate) fn commit(&self, tx: Transaction<'_>) -> Result<Committed, ServiceError> {
        tx.commit(&self.store, &self.bus)
    }

    pub(crate) fn live_material(&self, id: MaterialId) -> Result<Material, ServiceError> {
        live(self.master.materials.as_ref(), &id)?
            .ok_or_else(|| ServiceError::NotFound(format!("material {id}")))
    }

    pub(crate) fn live_location(&self, id: LocationId) -> Result<InventoryLocation, ServiceError> {
        live(self.master.locations.as_ref(), &id)?
            .ok_or_else(|| ServiceError::NotFound(format!("location {id}")))
    }

    pub(crate) fn live_company(&self, id: CompanyId) -> Result<Company, ServiceError> {
        live(self.master.companies.as_ref(), &id)?
            .ok_or_else(|| ServiceError::NotFound(format!("company {id}")))
    }
}

fn posted(committed: &Committed, id: MovementId) -> Result<StockMovement, ServiceError> {
    committed
        .movement(id)
        .cloned()
        .ok_or_else(|| ServiceError::System(format!("movement {id} missing from commit")))
}
