//! Procurement order lifecycle.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use stockwise_auth::{Actor, authorize_opt};
use stockwise_core::{Currency, TermsPatch, UnitOfMeasure};
use stockwise_events::EventBus;
use stockwise_materials::{CostSource, MaterialId, NewVariableCost};
use stockwise_parties::CompanyId;
use stockwise_purchasing::{
    AddLine, AssignNumber, ChangeStatus, CreateOrder, EditLine, LinePatch, ProcurementCommand,
    ProcurementOrder, ProcurementOrderId, ProcurementStatus, RemoveLine, SetDeleted, UpdateHeader,
};

use super::Stockwise;
use crate::audit::PROCUREMENT_ORDER;
use crate::command_dispatcher::{CommandMeta, load, stage_command};
use crate::error::ServiceError;
use crate::locks::LockKey;
use crate::rates::ResolvedRate;
use crate::store::{AuditEnvelope, Counter, LedgerStore};
use crate::transaction::Transaction;

impl<S, B> Stockwise<S, B>
where
    S: LedgerStore,
    B: EventBus<AuditEnvelope>,
{
    /// Creates a draft order and assigns its `PO-#` number.
    #[instrument(skip_all, fields(user = %actor.user_id))]
    pub fn create_procurement_order(
        &self,
        actor: &Actor,
        vendor: Option<CompanyId>,
        terms: TermsPatch,
    ) -> Result<ProcurementOrder, ServiceError> {
        if let Some(vendor) = vendor {
            self.live_company(vendor)?;
        }
        let order_id = ProcurementOrderId::generate();
        let serial = self.store.next_serial(Counter::ProcurementOrder)?;

        let mut tx = self.begin([LockKey::Order(order_id.0)], actor, "order created")?;
        let mut order = ProcurementOrder::empty(order_id);
        let at = tx.at();
        self.stage_procurement(
            &mut tx,
            &mut order,
            actor,
            ProcurementCommand::CreateOrder(CreateOrder {
                order_id,
                vendor,
                terms,
                created_by: actor.user_id,
                occurred_at: at,
            }),
        )?;
        self.stage_procurement(
            &mut tx,
            &mut order,
            actor,
            ProcurementCommand::AssignNumber(AssignNumber {
                order_id,
                year: at.year(),
                serial,
                occurred_at: at,
            }),
        )?;
        self.commit(tx)?;

        info!(order = %order_id, number = order.number().unwrap_or_default(), "procurement order created");
        Ok(order)
    }

    pub fn update_procurement_header(
        &self,
        actor: &Actor,
        order_id: ProcurementOrderId,
        vendor: Option<CompanyId>,
        terms: TermsPatch,
    ) -> Result<ProcurementOrder, ServiceError> {
        if let Some(vendor) = vendor {
            self.live_company(vendor)?;
        }
        self.run_procurement(actor, order_id, "header updated", |at| {
            ProcurementCommand::UpdateHeader(UpdateHeader {
                order_id,
                vendor,
                terms,
                occurred_at: at,
            })
        })
    }

    /// Adds a draft line; returns its line number.
    #[allow(clippy::too_many_arguments)]
    pub fn add_procurement_line(
        &self,
        actor: &Actor,
        order_id: ProcurementOrderId,
        material: MaterialId,
        uom: UnitOfMeasure,
        quantity: Decimal,
        unit_price: Option<Decimal>,
        tax_rate: Decimal,
    ) -> Result<u32, ServiceError> {
        self.live_material(material)?;
        let order = self.run_procurement(actor, order_id, "line added", |at| {
            ProcurementCommand::AddLine(AddLine {
                order_id,
                material,
                uom,
                quantity,
                unit_price,
                tax_rate,
                occurred_at: at,
            })
        })?;
        order
            .lines()
            .iter()
            .map(|l| l.line_no)
            .max()
            .ok_or_else(|| ServiceError::System("added line missing from order".to_string()))
    }

    pub fn edit_procurement_line(
        &self,
        actor: &Actor,
        order_id: ProcurementOrderId,
        line_no: u32,
        patch: LinePatch,
    ) -> Result<ProcurementOrder, ServiceError> {
        if let Some(material) = patch.material {
            self.live_material(material)?;
        }
        self.run_procurement(actor, order_id, "line edited", |at| {
            ProcurementCommand::EditLine(EditLine {
                order_id,
                line_no,
                patch,
                occurred_at: at,
            })
        })
    }

    pub fn remove_procurement_line(
        &self,
        actor: &Actor,
        order_id: ProcurementOrderId,
        line_no: u32,
    ) -> Result<ProcurementOrder, ServiceError> {
        self.run_procurement(actor, order_id, "line removed", |at| {
            ProcurementCommand::RemoveLine(RemoveLine {
                order_id,
                line_no,
                occurred_at: at,
            })
        })
    }

    /// Moves the order along its transition table.
    ///
    /// Approval records one procurement cost per priced material, converted
    /// to the reference currency, unless the order already recorded one.
    #[instrument(skip_all, fields(user = %actor.user_id, order = %order_id, to = %to))]
    pub fn change_procurement_status(
        &self,
        actor: &Actor,
        order_id: ProcurementOrderId,
        to: ProcurementStatus,
        invoice_date: Option<NaiveDate>,
        reason: &str,
    ) -> Result<ProcurementOrder, ServiceError> {
        authorize_opt(actor, to.required_permission().as_ref())?;

        // Rate lookups can be slow, so the approval rate is resolved before
        // the order is locked.
        let rate = if to == ProcurementStatus::Approved {
            let currency = self.order_currency(&self.load_procurement(order_id)?);
            Some(self.rates.resolve(currency, Utc::now().date_naive()))
        } else {
            None
        };

        let mut tx = self.begin([LockKey::Order(order_id.0)], actor, reason)?;
        let mut order = self.load_procurement(order_id)?;
        let from = order.status();
        let at = tx.at();
        self.stage_procurement(
            &mut tx,
            &mut order,
            actor,
            ProcurementCommand::ChangeStatus(ChangeStatus {
                order_id,
                to,
                invoice_date,
                occurred_at: at,
            }),
        )?;
        let costs = match rate {
            Some(rate) => self.stage_approval_costs(&mut tx, &order, rate)?,
            None => 0,
        };
        self.commit(tx)?;

        info!(%from, costs, "procurement order status changed");
        Ok(order)
    }

    pub fn soft_delete_procurement_order(
        &self,
        actor: &Actor,
        order_id: ProcurementOrderId,
        reason: &str,
    ) -> Result<ProcurementOrder, ServiceError> {
        self.set_procurement_deleted(actor, order_id, true, reason)
    }

    pub fn restore_procurement_order(
        &self,
        actor: &Actor,
        order_id: ProcurementOrderId,
        reason: &str,
    ) -> Result<ProcurementOrder, ServiceError> {
        self.set_procurement_deleted(actor, order_id, false, reason)
    }

    /// A live (created, not deleted) order.
    pub fn procurement_order(&self, order_id: ProcurementOrderId) -> Result<ProcurementOrder, ServiceError> {
        let order = self.load_procurement(order_id)?;
        if !order.is_created() || order.is_deleted() {
            return Err(ServiceError::NotFound(format!("procurement order {order_id}")));
        }
        Ok(order)
    }

    pub fn procurement_transitions(
        &self,
        order_id: ProcurementOrderId,
    ) -> Result<&'static [ProcurementStatus], ServiceError> {
        Ok(self.procurement_order(order_id)?.allowed_transitions())
    }

    fn set_procurement_deleted(
        &self,
        actor: &Actor,
        order_id: ProcurementOrderId,
        deleted: bool,
        reason: &str,
    ) -> Result<ProcurementOrder, ServiceError> {
        let order = self.run_procurement(actor, order_id, reason, |at| {
            ProcurementCommand::SetDeleted(SetDeleted {
                order_id,
                deleted,
                occurred_at: at,
            })
        })?;
        info!(order = %order_id, deleted, "procurement order deletion flag set");
        Ok(order)
    }

    /// Lock, load, stage one command, commit.
    fn run_procurement<F>(
        &self,
        actor: &Actor,
        order_id: ProcurementOrderId,
        reason: &str,
        command: F,
    ) -> Result<ProcurementOrder, ServiceError>
    where
        F: FnOnce(DateTime<Utc>) -> ProcurementCommand,
    {
        let mut tx = self.begin([LockKey::Order(order_id.0)], actor, reason)?;
        let mut order = self.load_procurement(order_id)?;
        let command = command(tx.at());
        self.stage_procurement(&mut tx, &mut order, actor, command)?;
        self.commit(tx)?;
        Ok(order)
    }

    fn stage_procurement(
        &self,
        tx: &mut Transaction<'_>,
        order: &mut ProcurementOrder,
        actor: &Actor,
        command: ProcurementCommand,
    ) -> Result<(), ServiceError> {
        let order_id = order.id_typed();
        let reason = tx.reason().to_string();
        tx.stage_stream(stage_command(
            order,
            order_id.0,
            PROCUREMENT_ORDER,
            &command,
            CommandMeta {
                actor: actor.user_id,
                reason: Some(&reason),
            },
        )?);
        Ok(())
    }

    fn load_procurement(&self, order_id: ProcurementOrderId) -> Result<ProcurementOrder, ServiceError> {
        load(&self.store, order_id.0, ProcurementOrder::empty(order_id))
    }

    fn order_currency(&self, order: &ProcurementOrder) -> Currency {
        order.terms().currency.unwrap_or(self.rates.reference())
    }

    /// Stages one cost per priced material, all converted with `rate`.
    fn stage_approval_costs(
        &self,
        tx: &mut Transaction<'_>,
        order: &ProcurementOrder,
        rate: ResolvedRate,
    ) -> Result<usize, ServiceError> {
        let source = CostSource::ProcurementOrder {
            order_id: order.id_typed().0,
        };
        let existing: HashSet<MaterialId> = self
            .store
            .costs()?
            .into_iter()
            .filter(|c| c.source == source)
            .map(|c| c.material)
            .collect();
        let currency = self.order_currency(order);
        let date = tx.at().date_naive();
        let rate = if rate.applies_to(currency, date) {
            rate
        } else {
            self.rates.resolve(currency, date)
        };

        let mut emitted = HashSet::new();
        for line in order.lines() {
            let Some(price) = line.unit_price else {
                continue;
            };
            if existing.contains(&line.material) || !emitted.insert(line.material) {
                continue;
            }
            let conversion = rate.apply(price);
            let cost = NewVariableCost::new(line.material, conversion.amount, conversion.currency, line.uom, source)?;
            tx.stage_cost(cost, Some(conversion.source));
        }
        Ok(emitted.len())
    }
}
