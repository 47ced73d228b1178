//! Sales order lifecycle.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use stockwise_auth::{Actor, authorize, authorize_opt, catalog};
use stockwise_core::{TermsPatch, UnitOfMeasure};
use stockwise_events::EventBus;
use stockwise_materials::MaterialId;
use stockwise_parties::CompanyId;
use stockwise_sales::{
    AddLine, AssignNumber, ChangeStatus, CreateSalesOrder, EditLine, RemoveLine, SalesLinePatch,
    SalesOrder, SalesOrderCommand, SalesOrderId, SalesStatus, SetDeleted, SetDispatchOrdered,
    UpdateHeader,
};

use super::Stockwise;
use crate::audit::SALES_ORDER;
use crate::command_dispatcher::{CommandMeta, load, stage_command};
use crate::error::ServiceError;
use crate::locks::LockKey;
use crate::store::{AuditEnvelope, Counter, LedgerStore};
use crate::transaction::Transaction;

impl<S, B> Stockwise<S, B>
where
    S: LedgerStore,
    B: EventBus<AuditEnvelope>,
{
    /// Creates a draft order and assigns its `SO-#` number.
    #[instrument(skip_all, fields(user = %actor.user_id))]
    pub fn create_sales_order(
        &self,
        actor: &Actor,
        customer: Option<CompanyId>,
        terms: TermsPatch,
    ) -> Result<SalesOrder, ServiceError> {
        if let Some(customer) = customer {
            self.live_company(customer)?;
        }
        let order_id = SalesOrderId::generate();
        let serial = self.store.next_serial(Counter::SalesOrder)?;

        let mut tx = self.begin([LockKey::Order(order_id.0)], actor, "order created")?;
        let mut order = SalesOrder::empty(order_id);
        let at = tx.at();
        self.stage_sales(
            &mut tx,
            &mut order,
            actor,
            SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
                order_id,
                customer,
                terms,
                created_by: actor.user_id,
                occurred_at: at,
            }),
        )?;
        self.stage_sales(
            &mut tx,
            &mut order,
            actor,
            SalesOrderCommand::AssignNumber(AssignNumber {
                order_id,
                year: at.year(),
                serial,
                occurred_at: at,
            }),
        )?;
        self.commit(tx)?;

        info!(order = %order_id, number = order.number().unwrap_or_default(), "sales order created");
        Ok(order)
    }

    pub fn update_sales_header(
        &self,
        actor: &Actor,
        order_id: SalesOrderId,
        customer: Option<CompanyId>,
        terms: TermsPatch,
    ) -> Result<SalesOrder, ServiceError> {
        if let Some(customer) = customer {
            self.live_company(customer)?;
        }
        self.run_sales(actor, order_id, "header updated", |at| {
            SalesOrderCommand::UpdateHeader(UpdateHeader {
                order_id,
                customer,
                terms,
                occurred_at: at,
            })
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_sales_line(
        &self,
        actor: &Actor,
        order_id: SalesOrderId,
        material: MaterialId,
        uom: UnitOfMeasure,
        quantity: Decimal,
        unit_price: Option<Decimal>,
        tax_rate: Decimal,
    ) -> Result<u32, ServiceError> {
        self.live_material(material)?;
        let order = self.run_sales(actor, order_id, "line added", |at| {
            SalesOrderCommand::AddLine(AddLine {
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

    pub fn edit_sales_line(
        &self,
        actor: &Actor,
        order_id: SalesOrderId,
        line_no: u32,
        patch: SalesLinePatch,
    ) -> Result<SalesOrder, ServiceError> {
        if let Some(material) = patch.material {
            self.live_material(material)?;
        }
        self.run_sales(actor, order_id, "line edited", |at| {
            SalesOrderCommand::EditLine(EditLine {
                order_id,
                line_no,
                patch,
                occurred_at: at,
            })
        })
    }

    pub fn remove_sales_line(
        &self,
        actor: &Actor,
        order_id: SalesOrderId,
        line_no: u32,
    ) -> Result<SalesOrder, ServiceError> {
        self.run_sales(actor, order_id, "line removed", |at| {
            SalesOrderCommand::RemoveLine(RemoveLine {
                order_id,
                line_no,
                occurred_at: at,
            })
        })
    }

    #[instrument(skip_all, fields(user = %actor.user_id, order = %order_id, to = %to))]
    pub fn change_sales_status(
        &self,
        actor: &Actor,
        order_id: SalesOrderId,
        to: SalesStatus,
        invoice_date: Option<NaiveDate>,
        invoice_number: Option<String>,
        reason: &str,
    ) -> Result<SalesOrder, ServiceError> {
        authorize_opt(actor, to.required_permission().as_ref())?;
        let before = self.sales_order(order_id)?.status();
        let order = self.run_sales(actor, order_id, reason, |at| {
            SalesOrderCommand::ChangeStatus(ChangeStatus {
                order_id,
                to,
                invoice_date,
                invoice_number,
                occurred_at: at,
            })
        })?;
        info!(from = %before, "sales order status changed");
        Ok(order)
    }

    /// Raises or clears the dispatch instruction on an approved order.
    #[instrument(skip_all, fields(user = %actor.user_id, order = %order_id, dispatch_ordered))]
    pub fn set_dispatch_ordered(
        &self,
        actor: &Actor,
        order_id: SalesOrderId,
        dispatch_ordered: bool,
        reason: &str,
    ) -> Result<SalesOrder, ServiceError> {
        authorize(actor, &catalog::SALES_DISPATCH)?;
        let order = self.run_sales(actor, order_id, reason, |at| {
            SalesOrderCommand::SetDispatchOrdered(SetDispatchOrdered {
                order_id,
                dispatch_ordered,
                occurred_at: at,
            })
        })?;
        info!("dispatch instruction updated");
        Ok(order)
    }

    pub fn soft_delete_sales_order(
        &self,
        actor: &Actor,
        order_id: SalesOrderId,
        reason: &str,
    ) -> Result<SalesOrder, ServiceError> {
        self.set_sales_deleted(actor, order_id, true, reason)
    }

    pub fn restore_sales_order(
        &self,
        actor: &Actor,
        order_id: SalesOrderId,
        reason: &str,
    ) -> Result<SalesOrder, ServiceError> {
        self.set_sales_deleted(actor, order_id, false, reason)
    }

    /// A live (created, not deleted) order.
    pub fn sales_order(&self, order_id: SalesOrderId) -> Result<SalesOrder, ServiceError> {
        let order = load(&self.store, order_id.0, SalesOrder::empty(order_id))?;
        if !order.is_created() || order.is_deleted() {
            return Err(ServiceError::NotFound(format!("sales order {order_id}")));
        }
        Ok(order)
    }

    pub fn sales_transitions(&self, order_id: SalesOrderId) -> Result<&'static [SalesStatus], ServiceError> {
        Ok(self.sales_order(order_id)?.allowed_transitions())
    }

    fn set_sales_deleted(
        &self,
        actor: &Actor,
        order_id: SalesOrderId,
        deleted: bool,
        reason: &str,
    ) -> Result<SalesOrder, ServiceError> {
        let order = self.run_sales(actor, order_id, reason, |at| {
            SalesOrderCommand::SetDeleted(SetDeleted {
                order_id,
                deleted,
                occurred_at: at,
            })
        })?;
        info!(order = %order_id, deleted, "sales order deletion flag set");
        Ok(order)
    }

    fn run_sales<F>(
        &self,
        actor: &Actor,
        order_id: SalesOrderId,
        reason: &str,
        command: F,
    ) -> Result<SalesOrder, ServiceError>
    where
        F: FnOnce(DateTime<Utc>) -> SalesOrderCommand,
    {
        let mut tx = self.begin([LockKey::Order(order_id.0)], actor, reason)?;
        let mut order = load(&self.store, order_id.0, SalesOrder::empty(order_id))?;
        let command = command(tx.at());
        self.stage_sales(&mut tx, &mut order, actor, command)?;
        self.commit(tx)?;
        Ok(order)
    }

    fn stage_sales(
        &self,
        tx: &mut Transaction<'_>,
        order: &mut SalesOrder,
        actor: &Actor,
        command: SalesOrderCommand,
    ) -> Result<(), ServiceError> {
        let order_id = order.id_typed();
        let reason = tx.reason().to_string();
        tx.stage_stream(stage_command(
            order,
            order_id.0,
            SALES_ORDER,
            &command,
            CommandMeta {
                actor: actor.user_id,
                reason: Some(&reason),
            },
        )?);
        Ok(())
    }
}
