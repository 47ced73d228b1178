/// A read model folded from an append-only stream of records.
///
/// `apply` must be deterministic so the model can be rebuilt from scratch by
/// replaying the stream (see `replay`).
pub trait Projection<M> {
    fn apply(&mut self, record: &M);

    /// Discard all state before a rebuild.
    fn reset(&mut self);

    fn replay<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a M>,
        M: 'a,
    {
        self.reset();
        for record in records {
            self.apply(record);
        }
    }
}
