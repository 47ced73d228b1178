//! `stockwise-core`: shared domain vocabulary.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error model, aggregate traits, units of measure, currencies,
//! commercial terms and display numbering.

pub mod aggregate;
pub mod amount;
pub mod commercial;
pub mod currency;
pub mod entity;
pub mod error;
pub mod id;
pub mod numbering;
pub mod uom;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use amount::{MAX_QUANTITY, MAX_UNIT_PRICE};
pub use commercial::{
    CommercialTerms, Incoterm, OrderTotals, PaymentMethod, PaymentTerm, PricedLine, TermsPatch,
};
pub use currency::Currency;
pub use entity::Entity;
pub use error::{DomainError, DomainResult, FieldError, ValidationErrors};
pub use id::{AggregateId, UserId};
pub use numbering::display_number;
pub use uom::UnitOfMeasure;
pub use value_object::ValueObject;
