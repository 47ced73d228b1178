use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwise_core::{
    Aggregate, AggregateRoot, CommercialTerms, DomainError, DomainResult, OrderTotals, PaymentTerm,
    TermsPatch, UnitOfMeasure, UserId, ValidationErrors, display_number, typed_id,
};
use stockwise_events::Event;
use stockwise_inventory::{FulfilmentLine, OrderLineRef};
use stockwise_materials::MaterialId;
use stockwise_parties::CompanyId;

use crate::line::{SalesLine, SalesLinePatch};
use crate::status::SalesStatus;

typed_id!(SalesOrderId);

pub const ORDER_NUMBER_PREFIX: &str = "SO-#";
pub const ORDER_NUMBER_WIDTH: usize = 16;

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrder {
    id: SalesOrderId,
    number: Option<String>,
    customer: Option<CompanyId>,
    terms: CommercialTerms,
    status: SalesStatus,
    lines: Vec<SalesLine>,
    next_line_no: u32,
    invoice_date: Option<NaiveDate>,
    invoice_number: Option<String>,
    dispatch_ordered: bool,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl SalesOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SalesOrderId) -> Self {
        Self {
            id,
            number: None,
            customer: None,
            terms: CommercialTerms::default(),
            status: SalesStatus::Draft,
            lines: Vec::new(),
            next_line_no: 1,
            invoice_date: None,
            invoice_number: None,
            dispatch_ordered: false,
            created_by: None,
            created_at: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    pub fn customer(&self) -> Option<CompanyId> {
        self.customer
    }

    pub fn terms(&self) -> &CommercialTerms {
        &self.terms
    }

    pub fn status(&self) -> SalesStatus {
        self.status
    }

    pub fn lines(&self) -> &[SalesLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&SalesLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    pub fn invoice_date(&self) -> Option<NaiveDate> {
        self.invoice_date
    }

    pub fn invoice_number(&self) -> Option<&str> {
        self.invoice_number.as_deref()
    }

    pub fn dispatch_ordered(&self) -> bool {
        self.dispatch_ordered
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn allowed_transitions(&self) -> &'static [SalesStatus] {
        self.status.allowed_transitions()
    }

    pub fn totals(&self) -> DomainResult<OrderTotals> {
        OrderTotals::compute(&self.lines, &self.terms)
    }

    pub fn all_sent(&self) -> bool {
        self.lines.iter().all(SalesLine::is_fully_sent)
    }

    /// Last day the customer may pay, once the order is invoiced.
    pub fn last_payment_date(&self) -> Option<NaiveDate> {
        let term = self.terms.payment_term?;
        term.last_payment_date(self.invoice_date?, self.terms.due_in_days)
    }

    pub fn fulfilment_line(&self, line_no: u32) -> DomainResult<FulfilmentLine> {
        self.ensure_live()?;
        self.ensure_accepts_dispatch()?;
        let line = self.find_line(line_no)?;
        Ok(FulfilmentLine {
            line: OrderLineRef::Sales {
                order_id: self.id.0,
                line_no,
            },
            material: line.material,
            uom: line.uom,
            quantity: line.quantity,
            fulfilled: line.quantity_sent,
            unit_price: line.unit_price,
        })
    }
}

impl AggregateRoot for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSalesOrder {
    pub order_id: SalesOrderId,
    pub customer: Option<CompanyId>,
    pub terms: TermsPatch,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignNumber {
    pub order_id: SalesOrderId,
    pub year: i32,
    pub serial: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateHeader (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateHeader {
    pub order_id: SalesOrderId,
    pub customer: Option<CompanyId>,
    pub terms: TermsPatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub order_id: SalesOrderId,
    pub material: MaterialId,
    pub uom: UnitOfMeasure,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub tax_rate: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLine {
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub patch: SalesLinePatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus. Billing needs an invoice date and number, either
/// here or already on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub order_id: SalesOrderId,
    pub to: SalesStatus,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetDispatchOrdered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDispatchOrdered {
    pub order_id: SalesOrderId,
    pub dispatch_ordered: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordDispatch. Issued by the ledger in the posting transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDispatch {
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub quantity: Decimal,
    pub sent_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDeleted {
    pub order_id: SalesOrderId,
    pub deleted: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderCommand {
    CreateSalesOrder(CreateSalesOrder),
    AssignNumber(AssignNumber),
    UpdateHeader(UpdateHeader),
    AddLine(AddLine),
    EditLine(EditLine),
    RemoveLine(RemoveLine),
    ChangeStatus(ChangeStatus),
    SetDispatchOrdered(SetDispatchOrdered),
    RecordDispatch(RecordDispatch),
    SetDeleted(SetDeleted),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderCreated {
    pub order_id: SalesOrderId,
    pub customer: Option<CompanyId>,
    pub terms: CommercialTerms,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberAssigned {
    pub order_id: SalesOrderId,
    pub number: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderUpdated {
    pub order_id: SalesOrderId,
    pub customer: Option<CompanyId>,
    pub terms: CommercialTerms,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChanged {
    pub order_id: SalesOrderId,
    pub line: SalesLine,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub order_id: SalesOrderId,
    pub from: SalesStatus,
    pub to: SalesStatus,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOrderChanged {
    pub order_id: SalesOrderId,
    pub dispatch_ordered: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsDispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsDispatched {
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub quantity: Decimal,
    pub sent_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionChanged {
    pub order_id: SalesOrderId,
    pub deleted: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderEvent {
    SalesOrderCreated(SalesOrderCreated),
    NumberAssigned(NumberAssigned),
    HeaderUpdated(HeaderUpdated),
    LineAdded(LineChanged),
    LineEdited(LineChanged),
    LineRemoved(LineRemoved),
    StatusChanged(StatusChanged),
    DispatchOrderChanged(DispatchOrderChanged),
    GoodsDispatched(GoodsDispatched),
    DeletionChanged(DeletionChanged),
}

impl Event for SalesOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesOrderEvent::SalesOrderCreated(_) => "sales.order.created",
            SalesOrderEvent::NumberAssigned(_) => "sales.order.number_assigned",
            SalesOrderEvent::HeaderUpdated(_) => "sales.order.header_updated",
            SalesOrderEvent::LineAdded(_) => "sales.order.line_added",
            SalesOrderEvent::LineEdited(_) => "sales.order.line_edited",
            SalesOrderEvent::LineRemoved(_) => "sales.order.line_removed",
            SalesOrderEvent::StatusChanged(_) => "sales.order.status_changed",
            SalesOrderEvent::DispatchOrderChanged(_) => "sales.order.dispatch_ordered",
            SalesOrderEvent::GoodsDispatched(_) => "sales.order.goods_dispatched",
            SalesOrderEvent::DeletionChanged(e) if e.deleted => "sales.order.deleted",
            SalesOrderEvent::DeletionChanged(_) => "sales.order.restored",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesOrderEvent::SalesOrderCreated(e) => e.occurred_at,
            SalesOrderEvent::NumberAssigned(e) => e.occurred_at,
            SalesOrderEvent::HeaderUpdated(e) => e.occurred_at,
            SalesOrderEvent::LineAdded(e) | SalesOrderEvent::LineEdited(e) => e.occurred_at,
            SalesOrderEvent::LineRemoved(e) => e.occurred_at,
            SalesOrderEvent::StatusChanged(e) => e.occurred_at,
            SalesOrderEvent::DispatchOrderChanged(e) => e.occurred_at,
            SalesOrderEvent::GoodsDispatched(e) => e.occurred_at,
            SalesOrderEvent::DeletionChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalesOrder {
    type Command = SalesOrderCommand;
    type Event = SalesOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesOrderEvent::SalesOrderCreated(e) => {
                self.id = e.order_id;
                self.customer = e.customer;
                self.terms = e.terms.clone();
                self.status = SalesStatus::Draft;
                self.lines.clear();
                self.next_line_no = 1;
                self.created_by = Some(e.created_by);
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            SalesOrderEvent::NumberAssigned(e) => {
                self.number = Some(e.number.clone());
            }
            SalesOrderEvent::HeaderUpdated(e) => {
                self.customer = e.customer;
                self.terms = e.terms.clone();
            }
            SalesOrderEvent::LineAdded(e) => {
                self.next_line_no = self.next_line_no.max(e.line.line_no + 1);
                self.lines.push(e.line.clone());
            }
            SalesOrderEvent::LineEdited(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line.line_no) {
                    *line = e.line.clone();
                }
            }
            SalesOrderEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            SalesOrderEvent::StatusChanged(e) => {
                self.status = e.to;
                if e.invoice_date.is_some() {
                    self.invoice_date = e.invoice_date;
                }
                if e.invoice_number.is_some() {
                    self.invoice_number = e.invoice_number.clone();
                }
            }
            SalesOrderEvent::DispatchOrderChanged(e) => {
                self.dispatch_ordered = e.dispatch_ordered;
            }
            SalesOrderEvent::GoodsDispatched(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.quantity_sent += e.quantity;
                }
            }
            SalesOrderEvent::DeletionChanged(e) => {
                self.deleted = e.deleted;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesOrderCommand::CreateSalesOrder(cmd) => self.handle_create(cmd),
            SalesOrderCommand::AssignNumber(cmd) => self.handle_assign_number(cmd),
            SalesOrderCommand::UpdateHeader(cmd) => self.handle_update_header(cmd),
            SalesOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            SalesOrderCommand::EditLine(cmd) => self.handle_edit_line(cmd),
            SalesOrderCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            SalesOrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            SalesOrderCommand::SetDispatchOrdered(cmd) => self.handle_set_dispatch_ordered(cmd),
            SalesOrderCommand::RecordDispatch(cmd) => self.handle_record_dispatch(cmd),
            SalesOrderCommand::SetDeleted(cmd) => self.handle_set_deleted(cmd),
        }
    }
}

/// Only a subset of payment terms is offered to customers.
fn ensure_sales_term(terms: &CommercialTerms) -> DomainResult<()> {
    match terms.payment_term {
        Some(term) if !PaymentTerm::SALES.contains(&term) => Err(DomainError::field(
            "payment_term",
            format!("{term:?} is not offered on sales orders"),
        )),
        _ => Ok(()),
    }
}

impl SalesOrder {
    fn ensure_order_id(&self, order_id: SalesOrderId) -> DomainResult<()> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self) -> DomainResult<()> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found(format!("sales order {}", self.id)));
        }
        Ok(())
    }

    fn ensure_target(&self, order_id: SalesOrderId) -> DomainResult<()> {
        self.ensure_live()?;
        self.ensure_order_id(order_id)
    }

    fn ensure_draft(&self) -> DomainResult<()> {
        if self.status != SalesStatus::Draft {
            return Err(DomainError::field(
                "status",
                format!("sales order is {}; only draft orders can be edited", self.status),
            ));
        }
        Ok(())
    }

    fn ensure_accepts_dispatch(&self) -> DomainResult<()> {
        if !self.status.accepts_dispatch() {
            return Err(DomainError::field(
                "status",
                format!("cannot dispatch goods on a {} sales order", self.status),
            ));
        }
        Ok(())
    }

    fn find_line(&self, line_no: u32) -> DomainResult<&SalesLine> {
        self.line(line_no).ok_or_else(|| {
            DomainError::not_found(format!("line {line_no} of sales order {}", self.id))
        })
    }

    fn handle_create(&self, cmd: &CreateSalesOrder) -> DomainResult<Vec<SalesOrderEvent>> {
        if self.created {
            return Err(DomainError::conflict("sales order already exists"));
        }
        let terms = CommercialTerms::default().patched(&cmd.terms)?;
        ensure_sales_term(&terms)?;

        Ok(vec![SalesOrderEvent::SalesOrderCreated(SalesOrderCreated {
            order_id: cmd.order_id,
            customer: cmd.customer,
            terms,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_number(&self, cmd: &AssignNumber) -> DomainResult<Vec<SalesOrderEvent>> {
        self.ensure_target(cmd.order_id)?;
        if self.number.is_some() {
            return Err(DomainError::conflict("sales order already has a number"));
        }

        Ok(vec![SalesOrderEvent::NumberAssigned(NumberAssigned {
            order_id: cmd.order_id,
            number: display_number(ORDER_NUMBER_PREFIX, cmd.year, cmd.serial, ORDER_NUMBER_WIDTH),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_header(&self, cmd: &UpdateHeader) -> DomainResult<Vec<SalesOrderEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.ensure_draft()?;
        let terms = self.terms.patched(&cmd.terms)?;
        ensure_sales_term(&terms)?;

        Ok(vec![SalesOrderEvent::HeaderUpdated(HeaderUpdated {
            order_id: cmd.order_id,
            customer: cmd.customer.or(self.customer),
            terms,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> DomainResult<Vec<SalesOrderEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.ensure_draft()?;

        let line = SalesLine {
            line_no: self.next_line_no,
            material: cmd.material,
            uom: cmd.uom,
            quantity: cmd.quantity,
            quantity_sent: Decimal::ZERO,
            unit_price: cmd.unit_price,
            tax_rate: cmd.tax_rate,
        };
        line.validate()?;

        Ok(vec![SalesOrderEvent::LineAdded(LineChanged {
            order_id: cmd.order_id,
            line,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit_line(&self, cmd: &EditLine) -> DomainResult<Vec<SalesOrderEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.ensure_draft()?;
        let line = cmd.patch.applied_to(self.find_line(cmd.line_no)?)?;

        Ok(vec![SalesOrderEvent::LineEdited(LineChanged {
            order_id: cmd.order_id,
            line,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> DomainResult<Vec<SalesOrderEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.ensure_draft()?;
        self.find_line(cmd.line_no)?;

        Ok(vec![SalesOrderEvent::LineRemoved(LineRemoved {
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> DomainResult<Vec<SalesOrderEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.status.ensure_transition(cmd.to)?;

        let mut invoice_date = None;
        let mut invoice_number = None;
        match cmd.to {
            SalesStatus::Submitted => self.check_submission()?,
            SalesStatus::Billed => {
                invoice_date = cmd.invoice_date.or(self.invoice_date);
                invoice_number = cmd
                    .invoice_number
                    .clone()
                    .or_else(|| self.invoice_number.clone())
                    .filter(|n| !n.trim().is_empty());

                let mut errors = ValidationErrors::new();
                if invoice_date.is_none() {
                    errors.push("invoice_date", "required to bill the order");
                }
                if invoice_number.is_none() {
                    errors.push("invoice_number", "required to bill the order");
                }
                errors.into_result()?;
            }
            _ => {}
        }

        Ok(vec![SalesOrderEvent::StatusChanged(StatusChanged {
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.to,
            invoice_date,
            invoice_number,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn check_submission(&self) -> DomainResult<()> {
        let mut errors = ValidationErrors::new();
        if self.lines.is_empty() {
            errors.push("lines", "at least one line is required");
        }
        for (i, line) in self.lines.iter().enumerate() {
            if line.unit_price.is_none() {
                errors.push(format!("lines[{i}].unit_price"), "is required");
            }
        }
        if self.customer.is_none() {
            errors.push("customer", "is required");
        }
        self.terms.check_submission(&mut errors);
        errors.into_result()
    }

    fn handle_set_dispatch_ordered(&self, cmd: &SetDispatchOrdered) -> DomainResult<Vec<SalesOrderEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.ensure_accepts_dispatch()?;
        if self.dispatch_ordered == cmd.dispatch_ordered {
            return Ok(Vec::new());
        }

        Ok(vec![SalesOrderEvent::DispatchOrderChanged(DispatchOrderChanged {
            order_id: cmd.order_id,
            dispatch_ordered: cmd.dispatch_ordered,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_dispatch(&self, cmd: &RecordDispatch) -> DomainResult<Vec<SalesOrderEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.ensure_accepts_dispatch()?;
        let line = self.find_line(cmd.line_no)?;

        if cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::field("quantity", "must be positive"));
        }
        if cmd.quantity > line.quantity_left() {
            return Err(DomainError::field(
                "quantity",
                format!("exceeds remaining quantity {}", line.quantity_left()),
            ));
        }

        Ok(vec![SalesOrderEvent::GoodsDispatched(GoodsDispatched {
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            quantity: cmd.quantity,
            sent_by: cmd.sent_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_deleted(&self, cmd: &SetDeleted) -> DomainResult<Vec<SalesOrderEvent>> {
        if !self.created {
            return Err(DomainError::not_found(format!("sales order {}", self.id)));
        }
        self.ensure_order_id(cmd.order_id)?;
        if self.deleted == cmd.deleted {
            return Ok(Vec::new());
        }

        Ok(vec![SalesOrderEvent::DeletionChanged(DeletionChanged {
            order_id: cmd.order_id,
            deleted: cmd.deleted,
            occurred_at: cmd.occurred_at,
        })])
    }
}
