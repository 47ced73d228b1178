//! Entity trait: master-data records with identity and soft delete.

/// A record identified by id that outlives changes to its attributes.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Soft-deleted records stay stored but are hidden from lookups and
    /// cannot be referenced by new postings.
    fn is_deleted(&self) -> bool;

    fn set_deleted(&mut self, deleted: bool);
}
