//! Inventory ledger and valuation.
//!
//! The append-only [`StockMovement`] log is the single source of truth for
//! on-hand quantity and weighted-average cost per (material, uom, location).
//! This crate holds the pure parts:
//!
//! - [`valuation`]: weighted-average cost and stock positions
//! - [`ledger`]: validation and planning of the four postings
//! - [`balance`]: the per-(material, uom) balance projection
//!
//! Transactions, locking and persistence live in `stockwise-infra`.

pub mod balance;
pub mod events;
pub mod ledger;
pub mod location;
pub mod movement;
pub mod valuation;

pub use balance::{BalanceBook, BalanceDrift, BalanceKey, InventoryBalance, reconcile};
pub use events::{InventoryEvent, MovementPosted};
pub use ledger::{
    AdjustmentOutcome, FulfilmentLine, PostingContext, TransferPlan, plan_adjustment, plan_entry,
    plan_exit, plan_transfer,
};
pub use location::{Facility, InventoryLocation, LocationAddress, LocationId, LocationType, NewLocation};
pub use movement::{MovementAction, MovementId, NewMovement, OrderLineRef, StockKey, StockMovement};
pub use valuation::{StockPosition, UNIT_COST_SCALE, weighted_average_cost};
