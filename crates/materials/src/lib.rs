//! Materials master data: materials, bills of materials and variable costs.
//!
//! Pure domain logic; lookups across records are passed in as closures so the
//! storage layer stays outside this crate.

pub mod bom;
pub mod cost;
pub mod material;

pub use bom::{Bom, BomId, BomLine, NewBom};
pub use cost::{CostSource, NewVariableCost, VariableCost, latest_cost_for_uom};
pub use material::{Material, MaterialCategory, MaterialId, NewMaterial};
