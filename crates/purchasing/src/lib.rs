//! Procurement: purchase orders from draft to paid, and the material
//! demands that precede them.
//!
//! Orders are event-sourced aggregates; goods receipts arrive from the
//! inventory ledger as [`RecordReceipt`] commands inside the posting
//! transaction.

pub mod demand;
pub mod line;
pub mod order;
pub mod status;

pub use demand::{DemandId, DemandStatus, MaterialDemand, NewDemand};
pub use line::{LinePatch, ProcurementLine};
pub use order::{
    AddLine, AssignNumber, ChangeStatus, CreateOrder, EditLine, ProcurementCommand,
    ProcurementEvent, ProcurementOrder, ProcurementOrderId, RecordReceipt, RemoveLine, SetDeleted,
    UpdateHeader,
};
pub use status::ProcurementStatus;
