//! Value object marker: equality by value, not identity.

/// Immutable value compared by its attributes (stock keys, commercial terms).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
