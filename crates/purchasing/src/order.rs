use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockwise_core::{
    Aggregate, AggregateRoot, CommercialTerms, DomainError, DomainResult, OrderTotals, TermsPatch,
    UnitOfMeasure, UserId, ValidationErrors, display_number, typed_id,
};
use stockwise_events::Event;
use stockwise_inventory::{FulfilmentLine, OrderLineRef};
use stockwise_materials::MaterialId;
use stockwise_parties::CompanyId;

use crate::line::{LinePatch, ProcurementLine};
use crate::status::ProcurementStatus;

typed_id!(ProcurementOrderId);

/// Display prefix and width of procurement order numbers.
pub const ORDER_NUMBER_PREFIX: &str = "PO-#";
pub const ORDER_NUMBER_WIDTH: usize = 16;

/// Aggregate root: ProcurementOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcurementOrder {
    id: ProcurementOrderId,
    number: Option<String>,
    vendor: Option<CompanyId>,
    terms: CommercialTerms,
    status: ProcurementStatus,
    lines: Vec<ProcurementLine>,
    next_line_no: u32,
    invoice_date: Option<NaiveDate>,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl ProcurementOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProcurementOrderId) -> Self {
        Self {
            id,
            number: None,
            vendor: None,
            terms: CommercialTerms::default(),
            status: ProcurementStatus::Draft,
            lines: Vec::new(),
            next_line_no: 1,
            invoice_date: None,
            created_by: None,
            created_at: None,
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProcurementOrderId {
        self.id
    }

    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    pub fn vendor(&self) -> Option<CompanyId> {
        self.vendor
    }

    pub fn terms(&self) -> &CommercialTerms {
        &self.terms
    }

    pub fn status(&self) -> ProcurementStatus {
        self.status
    }

    pub fn lines(&self) -> &[ProcurementLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&ProcurementLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    pub fn invoice_date(&self) -> Option<NaiveDate> {
        self.invoice_date
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

    pub fn allowed_transitions(&self) -> &'static [ProcurementStatus] {
        self.status.allowed_transitions()
    }

    pub fn totals(&self) -> DomainResult<OrderTotals> {
        OrderTotals::compute(&self.lines, &self.terms)
    }

    pub fn all_received(&self) -> bool {
        self.lines.iter().all(ProcurementLine::is_fully_received)
    }

    /// The line as the ledger sees it, or why goods cannot be received on it.
    pub fn fulfilment_line(&self, line_no: u32) -> DomainResult<FulfilmentLine> {
        self.ensure_live()?;
        self.ensure_accepts_receipts()?;
        let line = self.find_line(line_no)?;
        Ok(FulfilmentLine {
            line: OrderLineRef::Procurement {
                order_id: self.id.0,
                line_no,
            },
            material: line.material,
            uom: line.uom,
            quantity: line.quantity,
            fulfilled: line.quantity_received,
            unit_price: line.unit_price,
        })
    }
}

impl AggregateRoot for ProcurementOrder {
    type Id = ProcurementOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: ProcurementOrderId,
    pub vendor: Option<CompanyId>,
    pub terms: TermsPatch,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignNumber (once, after the store has allocated a serial).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignNumber {
    pub order_id: ProcurementOrderId,
    pub year: i32,
    pub serial: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateHeader (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateHeader {
    pub order_id: ProcurementOrderId,
    pub vendor: Option<CompanyId>,
    pub terms: TermsPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub order_id: ProcurementOrderId,
    pub material: MaterialId,
    pub uom: UnitOfMeasure,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub tax_rate: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditLine (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLine {
    pub order_id: ProcurementOrderId,
    pub line_no: u32,
    pub patch: LinePatch,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub order_id: ProcurementOrderId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus. `invoice_date` is the payload of the move to billed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub order_id: ProcurementOrderId,
    pub to: ProcurementStatus,
    pub invoice_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordReceipt. Issued by the ledger in the posting transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReceipt {
    pub order_id: ProcurementOrderId,
    pub line_no: u32,
    pub quantity: Decimal,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SoftDelete / Restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDeleted {
    pub order_id: ProcurementOrderId,
    pub deleted: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcurementCommand {
    CreateOrder(CreateOrder),
    AssignNumber(AssignNumber),
    UpdateHeader(UpdateHeader),
    AddLine(AddLine),
    EditLine(EditLine),
    RemoveLine(RemoveLine),
    ChangeStatus(ChangeStatus),
    RecordReceipt(RecordReceipt),
    SetDeleted(SetDeleted),
}

/// Event: OrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: ProcurementOrderId,
    pub vendor: Option<CompanyId>,
    pub terms: CommercialTerms,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: NumberAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberAssigned {
    pub order_id: ProcurementOrderId,
    pub number: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: HeaderUpdated. Carries the full header after the patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderUpdated {
    pub order_id: ProcurementOrderId,
    pub vendor: Option<CompanyId>,
    pub terms: CommercialTerms,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded / LineEdited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChanged {
    pub order_id: ProcurementOrderId,
    pub line: ProcurementLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub order_id: ProcurementOrderId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub order_id: ProcurementOrderId,
    pub from: ProcurementStatus,
    pub to: ProcurementStatus,
    pub invoice_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub order_id: ProcurementOrderId,
    pub line_no: u32,
    pub quantity: Decimal,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeletionChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionChanged {
    pub order_id: ProcurementOrderId,
    pub deleted: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcurementEvent {
    OrderCreated(OrderCreated),
    NumberAssigned(NumberAssigned),
    HeaderUpdated(HeaderUpdated),
    LineAdded(LineChanged),
    LineEdited(LineChanged),
    LineRemoved(LineRemoved),
    StatusChanged(StatusChanged),
    GoodsReceived(GoodsReceived),
    DeletionChanged(DeletionChanged),
}

impl Event for ProcurementEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProcurementEvent::OrderCreated(_) => "purchasing.order.created",
            ProcurementEvent::NumberAssigned(_) => "purchasing.order.number_assigned",
            ProcurementEvent::HeaderUpdated(_) => "purchasing.order.header_updated",
            ProcurementEvent::LineAdded(_) => "purchasing.order.line_added",
            ProcurementEvent::LineEdited(_) => "purchasing.order.line_edited",
            ProcurementEvent::LineRemoved(_) => "purchasing.order.line_removed",
            ProcurementEvent::StatusChanged(_) => "purchasing.order.status_changed",
            ProcurementEvent::GoodsReceived(_) => "purchasing.order.goods_received",
            ProcurementEvent::DeletionChanged(e) if e.deleted => "purchasing.order.deleted",
            ProcurementEvent::DeletionChanged(_) => "purchasing.order.restored",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProcurementEvent::OrderCreated(e) => e.occurred_at,
            ProcurementEvent::NumberAssigned(e) => e.occurred_at,
            ProcurementEvent::HeaderUpdated(e) => e.occurred_at,
            ProcurementEvent::LineAdded(e) | ProcurementEvent::LineEdited(e) => e.occurred_at,
            ProcurementEvent::LineRemoved(e) => e.occurred_at,
            ProcurementEvent::StatusChanged(e) => e.occurred_at,
            ProcurementEvent::GoodsReceived(e) => e.occurred_at,
            ProcurementEvent::DeletionChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProcurementOrder {
    type Command = ProcurementCommand;
    type Event = ProcurementEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProcurementEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.vendor = e.vendor;
                self.terms = e.terms.clone();
                self.status = ProcurementStatus::Draft;
                self.lines.clear();
                self.next_line_no = 1;
                self.created_by = Some(e.created_by);
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ProcurementEvent::NumberAssigned(e) => {
                self.number = Some(e.number.clone());
            }
            ProcurementEvent::HeaderUpdated(e) => {
                self.vendor = e.vendor;
                self.terms = e.terms.clone();
            }
            ProcurementEvent::LineAdded(e) => {
                self.next_line_no = self.next_line_no.max(e.line.line_no + 1);
                self.lines.push(e.line.clone());
            }
            ProcurementEvent::LineEdited(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line.line_no) {
                    *line = e.line.clone();
                }
            }
            ProcurementEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            ProcurementEvent::StatusChanged(e) => {
                self.status = e.to;
                if e.invoice_date.is_some() {
                    self.invoice_date = e.invoice_date;
                }
            }
            ProcurementEvent::GoodsReceived(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.quantity_received += e.quantity;
                }
            }
            ProcurementEvent::DeletionChanged(e) => {
                self.deleted = e.deleted;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProcurementCommand::CreateOrder(cmd) => self.handle_create(cmd),
            ProcurementCommand::AssignNumber(cmd) => self.handle_assign_number(cmd),
            ProcurementCommand::UpdateHeader(cmd) => self.handle_update_header(cmd),
            ProcurementCommand::AddLine(cmd) => self.handle_add_line(cmd),
            ProcurementCommand::EditLine(cmd) => self.handle_edit_line(cmd),
            ProcurementCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            ProcurementCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            ProcurementCommand::RecordReceipt(cmd) => self.handle_record_receipt(cmd),
            ProcurementCommand::SetDeleted(cmd) => self.handle_set_deleted(cmd),
        }
    }
}

impl ProcurementOrder {
    fn ensure_order_id(&self, order_id: ProcurementOrderId) -> DomainResult<()> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_live(&self) -> DomainResult<()> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found(format!("procurement order {}", self.id)));
        }
        Ok(())
    }

    fn ensure_target(&self, order_id: ProcurementOrderId) -> DomainResult<()> {
        self.ensure_live()?;
        self.ensure_order_id(order_id)
    }

    fn ensure_draft(&self) -> DomainResult<()> {
        if self.status != ProcurementStatus::Draft {
            return Err(DomainError::field(
                "status",
                format!("procurement order is {}; only draft orders can be edited", self.status),
            ));
        }
        Ok(())
    }

    fn ensure_accepts_receipts(&self) -> DomainResult<()> {
        if !self.status.accepts_receipts() {
            return Err(DomainError::field(
                "status",
                format!("cannot receive goods on a {} procurement order", self.status),
            ));
        }
        Ok(())
    }

    fn find_line(&self, line_no: u32) -> DomainResult<&ProcurementLine> {
        self.line(line_no).ok_or_else(|| {
            DomainError::not_found(format!("line {line_no} of procurement order {}", self.id))
        })
    }

    fn handle_create(&self, cmd: &CreateOrder) -> DomainResult<Vec<ProcurementEvent>> {
        if self.created {
            return Err(DomainError::conflict("procurement order already exists"));
        }
        let terms = CommercialTerms::default().patched(&cmd.terms)?;

        Ok(vec![ProcurementEvent::OrderCreated(OrderCreated {
            order_id: cmd.order_id,
            vendor: cmd.vendor,
            terms,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_number(&self, cmd: &AssignNumber) -> DomainResult<Vec<ProcurementEvent>> {
        self.ensure_target(cmd.order_id)?;
        if self.number.is_some() {
            return Err(DomainError::conflict("procurement order already has a number"));
        }

        Ok(vec![ProcurementEvent::NumberAssigned(NumberAssigned {
            order_id: cmd.order_id,
            number: display_number(ORDER_NUMBER_PREFIX, cmd.year, cmd.serial, ORDER_NUMBER_WIDTH),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_header(&self, cmd: &UpdateHeader) -> DomainResult<Vec<ProcurementEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.ensure_draft()?;
        let terms = self.terms.patched(&cmd.terms)?;

        Ok(vec![ProcurementEvent::HeaderUpdated(HeaderUpdated {
            order_id: cmd.order_id,
            vendor: cmd.vendor.or(self.vendor),
            terms,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> DomainResult<Vec<ProcurementEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.ensure_draft()?;

        let line = ProcurementLine {
            line_no: self.next_line_no,
            material: cmd.material,
            uom: cmd.uom,
            quantity: cmd.quantity,
            quantity_received: Decimal::ZERO,
            unit_price: cmd.unit_price,
            tax_rate: cmd.tax_rate,
        };
        line.validate()?;

        Ok(vec![ProcurementEvent::LineAdded(LineChanged {
            order_id: cmd.order_id,
            line,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit_line(&self, cmd: &EditLine) -> DomainResult<Vec<ProcurementEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.ensure_draft()?;
        let line = cmd.patch.applied_to(self.find_line(cmd.line_no)?)?;

        Ok(vec![ProcurementEvent::LineEdited(LineChanged {
            order_id: cmd.order_id,
            line,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> DomainResult<Vec<ProcurementEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.ensure_draft()?;
        self.find_line(cmd.line_no)?;

        Ok(vec![ProcurementEvent::LineRemoved(LineRemoved {
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> DomainResult<Vec<ProcurementEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.status.ensure_transition(cmd.to)?;

        let mut invoice_date = None;
        match cmd.to {
            ProcurementStatus::Submitted => self.check_submission()?,
            ProcurementStatus::Billed => {
                invoice_date = cmd.invoice_date.or(self.invoice_date);
                if invoice_date.is_none() {
                    return Err(DomainError::field("invoice_date", "required to bill the order"));
                }
            }
            _ => {}
        }

        Ok(vec![ProcurementEvent::StatusChanged(StatusChanged {
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.to,
            invoice_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Everything a submitted order must carry. Reports every problem at once.
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
        if self.vendor.is_none() {
            errors.push("vendor", "is required");
        }
        self.terms.check_submission(&mut errors);
        errors.into_result()
    }

    fn handle_record_receipt(&self, cmd: &RecordReceipt) -> DomainResult<Vec<ProcurementEvent>> {
        self.ensure_target(cmd.order_id)?;
        self.ensure_accepts_receipts()?;
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

        Ok(vec![ProcurementEvent::GoodsReceived(GoodsReceived {
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            quantity: cmd.quantity,
            received_by: cmd.received_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_deleted(&self, cmd: &SetDeleted) -> DomainResult<Vec<ProcurementEvent>> {
        if !self.created {
            return Err(DomainError::not_found(format!("procurement order {}", self.id)));
        }
        self.ensure_order_id(cmd.order_id)?;
        if self.deleted == cmd.deleted {
            return Ok(Vec::new());
        }

        Ok(vec![ProcurementEvent::DeletionChanged(DeletionChanged {
            order_id: cmd.order_id,
            deleted: cmd.deleted,
            occurred_at: cmd.occurred_at,
        })])
    }
}
