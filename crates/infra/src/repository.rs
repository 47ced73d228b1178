//! Key/value repositories for master data.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use stockwise_core::Entity;
use stockwise_inventory::{InventoryLocation, LocationId};
use stockwise_materials::{Bom, BomId, Material, MaterialId};
use stockwise_parties::{Company, CompanyId, Contact, ContactId};
use stockwise_purchasing::{DemandId, MaterialDemand};

use crate::error::StoreError;

pub trait Repository<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Result<Option<V>, StoreError>;
    fn upsert(&self, key: K, value: V) -> Result<(), StoreError>;
    /// Every record, soft-deleted ones included.
    fn list(&self) -> Result<Vec<V>, StoreError>;
}

impl<K, V, R> Repository<K, V> for Arc<R>
where
    R: Repository<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        (**self).get(key)
    }

    fn upsert(&self, key: K, value: V) -> Result<(), StoreError> {
        (**self).upsert(key, value)
    }

    fn list(&self) -> Result<Vec<V>, StoreError> {
        (**self).list()
    }
}

#[derive(Debug)]
pub struct InMemoryRepository<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> InMemoryRepository<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryRepository<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Repository<K, V> for InMemoryRepository<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn upsert(&self, key: K, value: V) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        map.insert(key, value);
        Ok(())
    }

    fn list(&self) -> Result<Vec<V>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.values().cloned().collect())
    }
}

/// Records that are neither soft-deleted nor missing.
pub fn live<K, V>(repo: &dyn Repository<K, V>, key: &K) -> Result<Option<V>, StoreError>
where
    V: Entity,
{
    Ok(repo.get(key)?.filter(|v| !v.is_deleted()))
}

/// The master-data tables.
#[derive(Clone)]
pub struct MasterData {
    pub materials: Arc<dyn Repository<MaterialId, Material>>,
    pub locations: Arc<dyn Repository<LocationId, InventoryLocation>>,
    pub companies: Arc<dyn Repository<CompanyId, Company>>,
    pub contacts: Arc<dyn Repository<ContactId, Contact>>,
    pub boms: Arc<dyn Repository<BomId, Bom>>,
    pub demands: Arc<dyn Repository<DemandId, MaterialDemand>>,
}

impl MasterData {
    pub fn in_memory() -> Self {
        Self {
            materials: Arc::new(InMemoryRepository::new()),
            locations: Arc::new(InMemoryRepository::new()),
            companies: Arc::new(InMemoryRepository::new()),
            contacts: Arc::new(InMemoryRepository::new()),
            boms: Arc::new(InMemoryRepository::new()),
            demands: Arc::new(InMemoryRepository::new()),
        }
    }
}

impl core::fmt::Debug for MasterData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MasterData").finish_non_exhaustive()
    }
}
