//! Sales orders from draft to paid.
//!
//! Dispatches arrive from the inventory ledger as [`RecordDispatch`]
//! commands inside the posting transaction.

pub mod line;
pub mod order;
pub mod status;

pub use line::{SalesLine, SalesLinePatch};
pub use order::{
    AddLine, AssignNumber, ChangeStatus, CreateSalesOrder, EditLine, RecordDispatch, RemoveLine,
    SalesOrder, SalesOrderCommand, SalesOrderEvent, SalesOrderId, SetDeleted, SetDispatchOrdered,
    UpdateHeader,
};
pub use status::SalesStatus;
