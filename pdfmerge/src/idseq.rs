/// A type used retrieve sequential object numbers.
pub struct IdSeq {
    next_id: u32,
}

impl IdSeq {
    /// Constructs a new `IdSeq` starting with `next_id` as the next ID in its sequence.
    pub fn new(next_id: u32) -> Self {
        IdSeq { next_id }
    }

    /// Retrieves the next id.
    pub fn next(&mut self) -> u32 {
        let next = self.next_id;
        self.next_id += 1;
        next
    }

    /// Returns the amount of IDs that have been handed-out.
    ///
    /// The `count` is always relative to a sequence start of `1`, regardless of whether the
    /// sequence was initiated with a higher `next_id`.
    pub fn count(&self) -> u32 {
        self.next_id - 1
    }
}
