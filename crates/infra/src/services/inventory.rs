//! The four ledger postings and the stock queries.

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use stockwise_auth::{Actor, authorize, catalog};
use stockwise_core::UnitOfMeasure;
use stockwise_events::EventBus;
use stockwise_inventory::{
    AdjustmentOutcome, BalanceDrift, InventoryBalance, LocationId, PostingContext,
    StockKey, StockMovement, StockPosition, plan_adjustment, plan_entry, plan_exit, plan_transfer,
    reconcile,
};
use stockwise_materials::MaterialId;
use stockwise_purchasing::{ProcurementCommand, ProcurementOrderId, RecordReceipt};
use stockwise_sales::{RecordDispatch, SalesOrderCommand, SalesOrderId};

use super::{Stockwise, posted};
use crate::audit::{PROCUREMENT_ORDER, SALES_ORDER};
use crate::command_dispatcher::{CommandMeta, stage_command};
use crate::error::ServiceError;
use crate::locks::LockKey;
use crate::store::{AuditEnvelope, LedgerStore};

impl<S, B> Stockwise<S, B>
where
    S: LedgerStore,
    B: EventBus<AuditEnvelope>,
{
    /// Receives `quantity` of a procurement line into `location`, priced at
    /// the line's unit price.
    #[instrument(skip_all, fields(user = %actor.user_id, order = %order_id, line_no, %location, %quantity))]
    pub fn enter_from_procurement_line(
        &self,
        actor: &Actor,
        order_id: ProcurementOrderId,
        line_no: u32,
        location: LocationId,
        quantity: Decimal,
        reason: &str,
    ) -> Result<StockMovement, ServiceError> {
        authorize(actor, &catalog::INVENTORY_TRANSACT)?;
        self.live_location(location)?;
        let preview = self.procurement_order(order_id)?.fulfilment_line(line_no)?;
        self.live_material(preview.material)?;
        let key = StockKey::new(preview.material, preview.uom, location);

        let mut tx = self.begin([LockKey::Order(order_id.0), LockKey::Stock(key)], actor, reason)?;
        let mut order = self.procurement_order(order_id)?;
        let line = order.fulfilment_line(line_no)?;
        ensure_same_key(key, StockKey::new(line.material, line.uom, location))?;

        let ctx = PostingContext::new(actor.user_id, reason, tx.at());
        let movement = plan_entry(&line, location, quantity, &ctx)?;
        let receipt = ProcurementCommand::RecordReceipt(RecordReceipt {
            order_id,
            line_no,
            quantity,
            received_by: actor.user_id,
            occurred_at: tx.at(),
        });
        tx.stage_stream(stage_command(
            &mut order,
            order_id.0,
            PROCUREMENT_ORDER,
            &receipt,
            CommandMeta {
                actor: actor.user_id,
                reason: Some(reason),
            },
        )?);
        let id = tx.stage_movement(movement);

        let movement = posted(&self.commit(tx)?, id)?;
        info!(
            movement = %movement.id(),
            key = %movement.key(),
            unit_cost = %movement.unit_cost(),
            "goods received"
        );
        Ok(movement)
    }

    /// Dispatches `quantity` of a sales line from `location` at the key's
    /// weighted-average cost.
    #[instrument(skip_all, fields(user = %actor.user_id, order = %order_id, line_no, %location, %quantity))]
    pub fn exit_from_sales_line(
        &self,
        actor: &Actor,
        order_id: SalesOrderId,
        line_no: u32,
        location: LocationId,
        quantity: Decimal,
        reason: &str,
    ) -> Result<StockMovement, ServiceError> {
        authorize(actor, &catalog::INVENTORY_TRANSACT)?;
        self.live_location(location)?;
        let preview = self.sales_order(order_id)?.fulfilment_line(line_no)?;
        self.live_material(preview.material)?;
        let key = StockKey::new(preview.material, preview.uom, location);

        let mut tx = self.begin([LockKey::Order(order_id.0), LockKey::Stock(key)], actor, reason)?;
        let mut order = self.sales_order(order_id)?;
        let line = order.fulfilment_line(line_no)?;
        ensure_same_key(key, StockKey::new(line.material, line.uom, location))?;

        let position = self.position(key)?;
        let ctx = PostingContext::new(actor.user_id, reason, tx.at());
        let movement = plan_exit(&line, &position, quantity, &ctx)?;
        let dispatch = SalesOrderCommand::RecordDispatch(RecordDispatch {
            order_id,
            line_no,
            quantity,
            sent_by: actor.user_id,
            occurred_at: tx.at(),
        });
        tx.stage_stream(stage_command(
            &mut order,
            order_id.0,
            SALES_ORDER,
            &dispatch,
            CommandMeta {
                actor: actor.user_id,
                reason: Some(reason),
            },
        )?);
        let id = tx.stage_movement(movement);

        let movement = posted(&self.commit(tx)?, id)?;
        info!(
            movement = %movement.id(),
            key = %movement.key(),
            unit_cost = %movement.unit_cost(),
            "goods dispatched"
        );
        Ok(movement)
    }

    /// Sets the counted on-hand quantity of a key.
    ///
    /// `None` when the count matches the books; nothing is posted then.
    #[instrument(skip_all, fields(user = %actor.user_id, %location, %material, %uom, %new_quantity))]
    pub fn adjustment(
        &self,
        actor: &Actor,
        location: LocationId,
        material: MaterialId,
        uom: UnitOfMeasure,
        new_quantity: Decimal,
        reason: &str,
    ) -> Result<Option<StockMovement>, ServiceError> {
        authorize(actor, &catalog::INVENTORY_TRANSACT)?;
        self.live_location(location)?;
        self.live_material(material)?;
        let key = StockKey::new(material, uom, location);

        let mut tx = self.begin([LockKey::Stock(key)], actor, reason)?;
        let position = self.position(key)?;
        let ctx = PostingContext::new(actor.user_id, reason, tx.at());
        let movement = match plan_adjustment(&position, new_quantity, &ctx)? {
            AdjustmentOutcome::Unchanged => {
                debug!(available = %position.available, "count matches the books, nothing posted");
                return Ok(None);
            }
            AdjustmentOutcome::Posted(movement) => movement,
        };
        let id = tx.stage_movement(movement);

        let movement = posted(&self.commit(tx)?, id)?;
        info!(
            movement = %movement.id(),
            delta = %movement.quantity(),
            "stock adjusted"
        );
        Ok(Some(movement))
    }

    /// Moves stock between locations: an outbound and an inbound leg, both
    /// at the source's average cost.
    #[instrument(skip_all, fields(user = %actor.user_id, %from, %to, %material, %uom, %quantity))]
    #[allow(clippy::too_many_arguments)]
    pub fn transfer(
        &self,
        actor: &Actor,
        from: LocationId,
        to: LocationId,
        material: MaterialId,
        uom: UnitOfMeasure,
        quantity: Decimal,
        reason: &str,
    ) -> Result<(StockMovement, StockMovement), ServiceError> {
        authorize(actor, &catalog::INVENTORY_TRANSACT)?;
        if from == to {
            return Err(ServiceError::field("to_location", "must differ from the source location"));
        }
        self.live_location(from)?;
        self.live_location(to)?;
        self.live_material(material)?;
        let source = StockKey::new(material, uom, from);

        let mut tx = self.begin(
            [LockKey::Stock(source), LockKey::Stock(source.at(to))],
            actor,
            reason,
        )?;
        let position = self.position(source)?;
        let ctx = PostingContext::new(actor.user_id, reason, tx.at());
        let plan = plan_transfer(&position, to, quantity, &ctx)?;
        let outbound = tx.stage_movement(plan.outbound);
        let inbound = tx.stage_movement(plan.inbound);

        let committed = self.commit(tx)?;
        let legs = (posted(&committed, outbound)?, posted(&committed, inbound)?);
        info!(
            outbound = %legs.0.id(),
            inbound = %legs.1.id(),
            unit_cost = %legs.0.unit_cost(),
            "stock transferred"
        );
        Ok(legs)
    }

    pub fn stock_position(
        &self,
        material: MaterialId,
        uom: UnitOfMeasure,
        location: LocationId,
    ) -> Result<StockPosition, ServiceError> {
        self.position(StockKey::new(material, uom, location))
    }

    pub fn weighted_average_cost(
        &self,
        material: MaterialId,
        uom: UnitOfMeasure,
        location: LocationId,
    ) -> Result<Decimal, ServiceError> {
        Ok(self.stock_position(material, uom, location)?.average_cost)
    }

    pub fn movements_for(
        &self,
        material: MaterialId,
        uom: UnitOfMeasure,
        location: LocationId,
    ) -> Result<Vec<StockMovement>, ServiceError> {
        Ok(self.store.movements_for(&StockKey::new(material, uom, location))?)
    }

    /// Cached company-wide balance of a material in one uom.
    pub fn balance(&self, material: MaterialId, uom: UnitOfMeasure) -> Result<Decimal, ServiceError> {
        Ok(self.store.balances()?.quantity(material, uom))
    }

    pub fn balances(&self) -> Result<Vec<InventoryBalance>, ServiceError> {
        Ok(self.store.balances()?.all())
    }

    /// Replays the movement log and reports every cached balance that
    /// disagrees with it.
    #[instrument(skip_all)]
    pub fn reconcile_balances(&self) -> Result<Vec<BalanceDrift>, ServiceError> {
        let (cached, log) = self.store.ledger_snapshot()?;
        let drifts = reconcile(&cached, &log);
        for drift in &drifts {
            warn!(
                material = %drift.material,
                uom = %drift.uom,
                cached = %drift.cached,
                replayed = %drift.replayed,
                "balance drift"
            );
        }
        if drifts.is_empty() {
            info!("balances consistent with the movement log");
        }
        Ok(drifts)
    }

    /// Recomputes every cached balance from the movement log.
    #[instrument(skip_all)]
    pub fn rebuild_balances(&self) -> Result<(), ServiceError> {
        self.store.rebuild_balances()?;
        info!("balances rebuilt");
        Ok(())
    }

    fn position(&self, key: StockKey) -> Result<StockPosition, ServiceError> {
        Ok(StockPosition::from_movements(key, &self.store.movements_for(&key)?)?)
    }
}

fn ensure_same_key(locked: StockKey, current: StockKey) -> Result<(), ServiceError> {
    if locked != current {
        return Err(ServiceError::Conflict(format!(
            "order line moved from {locked} to {current} while waiting for locks"
        )));
    }
    Ok(())
}
