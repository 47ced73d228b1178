//! Materials, locations, the address book, bills of materials, variable
//! costs and material demands.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use stockwise_auth::Actor;
use stockwise_core::{Currency, Entity, UnitOfMeasure};
use stockwise_events::EventBus;
use stockwise_inventory::{InventoryLocation, LocationAddress, LocationId, NewLocation};
use stockwise_materials::{
    Bom, BomId, BomLine, CostSource, Material, MaterialId, NewBom, NewMaterial, NewVariableCost,
    VariableCost, latest_cost_for_uom,
};
use stockwise_parties::{Company, CompanyId, Contact, ContactId, NewCompany, NewContact};
use stockwise_purchasing::{DemandId, DemandStatus, MaterialDemand, NewDemand};

use super::Stockwise;
use crate::error::ServiceError;
use crate::locks::LockKey;
use crate::rates::RateSource;
use crate::repository::{Repository, live};
use crate::store::{AuditEnvelope, Counter, LedgerStore};
use crate::transaction::Transaction;

const LOCATION_ADDRESSES: &str = "location.address";
const COMPANY_LEGAL_NAMES: &str = "company.legal_name";

impl<S, B> Stockwise<S, B>
where
    S: LedgerStore,
    B: EventBus<AuditEnvelope>,
{
    /// Registers a material and assigns its internal code.
    #[instrument(skip_all, fields(user = %actor.user_id))]
    pub fn register_material(&self, actor: &Actor, input: NewMaterial) -> Result<Material, ServiceError> {
        let now = Utc::now();
        let mut material = Material::register(MaterialId::generate(), input, now)?;
        let serial = self.store.next_serial(Counter::Material)?;
        material.assign_internal_code(now.year(), serial);
        self.master.materials.upsert(material.id_typed(), material.clone())?;
        info!(material = %material.id_typed(), code = material.internal_code().unwrap_or_default(), "material registered");
        Ok(material)
    }

    pub fn material(&self, id: MaterialId) -> Result<Material, ServiceError> {
        self.live_material(id)
    }

    pub fn soft_delete_material(&self, actor: &Actor, id: MaterialId) -> Result<Material, ServiceError> {
        set_deleted(self.master.materials.as_ref(), actor, id, true, "material")
    }

    pub fn restore_material(&self, actor: &Actor, id: MaterialId) -> Result<Material, ServiceError> {
        set_deleted(self.master.materials.as_ref(), actor, id, false, "material")
    }

    /// Creates a location; a complete address must be unique among live
    /// locations.
    #[instrument(skip_all, fields(user = %actor.user_id))]
    pub fn create_location(&self, actor: &Actor, input: NewLocation) -> Result<InventoryLocation, ServiceError> {
        let location = InventoryLocation::create(LocationId::generate(), input)?;
        let _registry = self.locks.acquire([LockKey::Registry(LOCATION_ADDRESSES)])?;
        if let Some(address) = location.address() {
            self.ensure_address_free(address, None)?;
        }
        self.master.locations.upsert(location.id_typed(), location.clone())?;
        info!(location = %location.id_typed(), name = location.name(), "location created");
        Ok(location)
    }

    pub fn location(&self, id: LocationId) -> Result<InventoryLocation, ServiceError> {
        self.live_location(id)
    }

    pub fn soft_delete_location(&self, actor: &Actor, id: LocationId) -> Result<InventoryLocation, ServiceError> {
        set_deleted(self.master.locations.as_ref(), actor, id, true, "location")
    }

    /// Fails when another live location took the address meanwhile.
    pub fn restore_location(&self, actor: &Actor, id: LocationId) -> Result<InventoryLocation, ServiceError> {
        let _registry = self.locks.acquire([LockKey::Registry(LOCATION_ADDRESSES)])?;
        let stored = self
            .master
            .locations
            .get(&id)?
            .ok_or_else(|| ServiceError::NotFound(format!("location {id}")))?;
        if let Some(address) = stored.address() {
            self.ensure_address_free(address, Some(id))?;
        }
        set_deleted(self.master.locations.as_ref(), actor, id, false, "location")
    }

    #[instrument(skip_all, fields(user = %actor.user_id))]
    pub fn register_company(&self, actor: &Actor, input: NewCompany) -> Result<Company, ServiceError> {
        let company = Company::register(CompanyId::generate(), input)?;
        let _registry = self.locks.acquire([LockKey::Registry(COMPANY_LEGAL_NAMES)])?;
        self.ensure_legal_name_free(company.legal_name(), None)?;
        self.master.companies.upsert(company.id_typed(), company.clone())?;
        info!(company = %company.id_typed(), "company registered");
        Ok(company)
    }

    pub fn company(&self, id: CompanyId) -> Result<Company, ServiceError> {
        self.live_company(id)
    }

    pub fn soft_delete_company(&self, actor: &Actor, id: CompanyId) -> Result<Company, ServiceError> {
        set_deleted(self.master.companies.as_ref(), actor, id, true, "company")
    }

    pub fn restore_company(&self, actor: &Actor, id: CompanyId) -> Result<Company, ServiceError> {
        let _registry = self.locks.acquire([LockKey::Registry(COMPANY_LEGAL_NAMES)])?;
        let stored = self
            .master
            .companies
            .get(&id)?
            .ok_or_else(|| ServiceError::NotFound(format!("company {id}")))?;
        self.ensure_legal_name_free(stored.legal_name(), Some(id))?;
        set_deleted(self.master.companies.as_ref(), actor, id, false, "company")
    }

    pub fn register_contact(&self, actor: &Actor, input: NewContact) -> Result<Contact, ServiceError> {
        if let Some(company) = input.company {
            self.live_company(company)?;
        }
        let contact = Contact::register(ContactId::generate(), input)?;
        self.master.contacts.upsert(*contact.id(), contact.clone())?;
        info!(user = %actor.user_id, contact = %contact.id(), "contact registered");
        Ok(contact)
    }

    /// Defines a BOM and records its rolled-up cost when positive.
    #[instrument(skip_all, fields(user = %actor.user_id, product = %input.product))]
    pub fn define_bom(&self, actor: &Actor, input: NewBom) -> Result<Bom, ServiceError> {
        self.live_material(input.product)?;
        for line in &input.lines {
            self.live_material(line.component)?;
        }
        let boms = self.live_boms()?;
        let bom = Bom::define(BomId::generate(), input, |m| components_of(&boms, m))?;
        self.master.boms.upsert(bom.id_typed(), bom.clone())?;
        info!(bom = %bom.id_typed(), lines = bom.lines().len(), "bom defined");
        self.record_bom_cost(actor, &bom)?;
        Ok(bom)
    }

    #[instrument(skip_all, fields(user = %actor.user_id, bom = %bom_id))]
    pub fn replace_bom_lines(&self, actor: &Actor, bom_id: BomId, lines: Vec<BomLine>) -> Result<Bom, ServiceError> {
        for line in &lines {
            self.live_material(line.component)?;
        }
        let mut bom = live(self.master.boms.as_ref(), &bom_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("bom {bom_id}")))?;
        let boms = self.live_boms()?;
        bom.replace_lines(lines, |m| components_of(&boms, m))?;
        self.master.boms.upsert(bom_id, bom.clone())?;
        info!(lines = bom.lines().len(), "bom lines replaced");
        self.record_bom_cost(actor, &bom)?;
        Ok(bom)
    }

    /// Rolled-up cost of one unit of the BOM's product.
    pub fn bom_latest_cost(&self, bom_id: BomId) -> Result<Option<Decimal>, ServiceError> {
        let bom = live(self.master.boms.as_ref(), &bom_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("bom {bom_id}")))?;
        let costs = self.store.costs()?;
        Ok(bom.latest_cost(|m, uom| latest_cost_for_uom(&costs, m, uom).map(|c| c.cost)))
    }

    #[instrument(skip_all, fields(user = %actor.user_id, %material, %uom, %cost))]
    pub fn record_manual_cost(
        &self,
        actor: &Actor,
        material: MaterialId,
        cost: Decimal,
        currency: Currency,
        uom: UnitOfMeasure,
        reason: &str,
    ) -> Result<VariableCost, ServiceError> {
        self.live_material(material)?;
        let new = NewVariableCost::new(
            material,
            cost,
            currency,
            uom,
            CostSource::ManualUser {
                user_id: actor.user_id,
            },
        )?;
        self.record_cost(actor, new, None, reason)
    }

    pub fn latest_cost_for_uom(
        &self,
        material: MaterialId,
        uom: UnitOfMeasure,
    ) -> Result<Option<VariableCost>, ServiceError> {
        let costs = self.store.costs()?;
        Ok(latest_cost_for_uom(&costs, material, uom).cloned())
    }

    pub fn costs_of(&self, material: MaterialId) -> Result<Vec<VariableCost>, ServiceError> {
        Ok(self
            .store
            .costs()?
            .into_iter()
            .filter(|c| !c.deleted && c.material == material)
            .collect())
    }

    #[instrument(skip_all, fields(user = %actor.user_id, material = %input.material))]
    pub fn submit_demand(&self, actor: &Actor, input: NewDemand) -> Result<MaterialDemand, ServiceError> {
        self.live_material(input.material)?;
        let now = Utc::now();
        let mut demand = MaterialDemand::submit(DemandId::generate(), input, actor.user_id, now)?;
        let serial = self.store.next_serial(Counter::Demand)?;
        demand.assign_number(now.year(), serial);
        self.master.demands.upsert(demand.id_typed(), demand.clone())?;
        info!(demand = %demand.id_typed(), number = demand.number().unwrap_or_default(), "demand submitted");
        Ok(demand)
    }

    pub fn advance_demand(
        &self,
        actor: &Actor,
        id: DemandId,
        to: DemandStatus,
    ) -> Result<MaterialDemand, ServiceError> {
        let mut demand = live(self.master.demands.as_ref(), &id)?
            .ok_or_else(|| ServiceError::NotFound(format!("demand {id}")))?;
        demand.advance(to)?;
        self.master.demands.upsert(id, demand.clone())?;
        info!(user = %actor.user_id, demand = %id, status = ?to, "demand advanced");
        Ok(demand)
    }

    fn ensure_address_free(&self, address: LocationAddress, except: Option<LocationId>) -> Result<(), ServiceError> {
        let taken = self
            .master
            .locations
            .list()?
            .into_iter()
            .any(|l| !l.is_deleted() && Some(l.id_typed()) != except && l.address() == Some(address));
        if taken {
            return Err(ServiceError::field(
                "address",
                format!("location {} already exists", address.name()),
            ));
        }
        Ok(())
    }

    fn ensure_legal_name_free(&self, legal_name: &str, except: Option<CompanyId>) -> Result<(), ServiceError> {
        let taken = self.master.companies.list()?.into_iter().any(|c| {
            !c.is_deleted() && Some(c.id_typed()) != except && c.legal_name().eq_ignore_ascii_case(legal_name)
        });
        if taken {
            return Err(ServiceError::field("legal_name", "already registered"));
        }
        Ok(())
    }

    fn live_boms(&self) -> Result<Vec<Bom>, ServiceError> {
        Ok(self
            .master
            .boms
            .list()?
            .into_iter()
            .filter(|b| !b.is_deleted())
            .collect())
    }

    /// Records the roll-up in the currency of the product's newest cost.
    fn record_bom_cost(&self, actor: &Actor, bom: &Bom) -> Result<Option<VariableCost>, ServiceError> {
        let costs = self.store.costs()?;
        let Some(total) = bom.latest_cost(|m, uom| latest_cost_for_uom(&costs, m, uom).map(|c| c.cost)) else {
            return Ok(None);
        };
        if total <= Decimal::ZERO {
            return Ok(None);
        }
        let currency = costs
            .iter()
            .filter(|c| !c.deleted && c.material == bom.product())
            .max_by_key(|c| c.seq)
            .map(|c| c.currency)
            .unwrap_or(self.rates.reference());
        let new = NewVariableCost::new(
            bom.product(),
            total,
            currency,
            bom.uom(),
            CostSource::BillOfMaterials { bom_id: bom.id_typed() },
        )?;
        self.record_cost(actor, new, None, "bom cost rolled up").map(Some)
    }

    fn record_cost(
        &self,
        actor: &Actor,
        new: NewVariableCost,
        rate_source: Option<RateSource>,
        reason: &str,
    ) -> Result<VariableCost, ServiceError> {
        let mut tx = Transaction::begin(None, actor.user_id, reason, Utc::now());
        tx.stage_cost(new, rate_source);
        let cost = self
            .commit(tx)?
            .costs
            .pop()
            .ok_or_else(|| ServiceError::System("cost missing from commit".to_string()))?;
        info!(material = %cost.material, cost = %cost.cost, currency = %cost.currency, source = cost.source.label(), "cost recorded");
        Ok(cost)
    }
}

fn components_of(boms: &[Bom], material: MaterialId) -> Option<Vec<MaterialId>> {
    boms.iter()
        .find(|b| b.product() == material)
        .map(Bom::components)
}

fn set_deleted<K, V>(
    repo: &dyn Repository<K, V>,
    actor: &Actor,
    key: K,
    deleted: bool,
    what: &str,
) -> Result<V, ServiceError>
where
    K: core::fmt::Display,
    V: Entity + Clone,
{
    let label = format!("{what} {key}");
    let mut record = repo.get(&key)?.ok_or_else(|| ServiceError::NotFound(label.clone()))?;
    if record.is_deleted() != deleted {
        record.set_deleted(deleted);
        repo.upsert(key, record.clone())?;
        info!(user = %actor.user_id, record = %label, deleted, "deletion flag set");
    }
    Ok(record)
}
