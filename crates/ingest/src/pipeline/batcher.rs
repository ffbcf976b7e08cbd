//! Fixed-capacity batcher

/// Sealed, immutable group of records handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<R> {
    /// Production sequence number, starting at 0
    pub seq: u64,
    records: Vec<R>,
}

impl<R> Batch<R> {
    /// Records in source order
    #[must_use]
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Accumulates records and seals a batch as soon as capacity is reached
#[derive(Debug)]
pub struct Batcher<R> {
    capacity: usize,
    buffer: Vec<R>,
    next_seq: u64,
}

impl<R> Batcher<R> {
    /// Create a batcher; a zero capacity is treated as one
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Vec::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Append a record; returns the sealed batch when the buffer fills
    pub fn push(&mut self, record: R) -> Option<Batch<R>> {
        self.buffer.push(record);
        if self.buffer.len() >= self.capacity {
            let full = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.capacity));
            Some(self.seal(full))
        } else {
            None
        }
    }

    /// Seal the non-empty remainder at end of stream
    pub fn finish(&mut self) -> Option<Batch<R>> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(self.seal(rest))
    }

    /// Records waiting in the open buffer
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Batches sealed so far
    #[must_use]
    pub const fn sealed(&self) -> u64 {
        self.next_seq
    }

    fn seal(&mut self, records: Vec<R>) -> Batch<R> {
        let seq = self.next_seq;
        self.next_seq += 1;
        Batch { seq, records }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_thousand_rows_make_three_batches() {
        let mut batcher = Batcher::new(4000);
        let mut batches: Vec<Batch<u32>> = (0..10_000).filter_map(|i| batcher.push(i)).collect();
        batches.extend(batcher.finish());

        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![4000, 4000, 2000]);
        assert_eq!(batches.iter().map(|b| b.seq).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(batches[2].records()[0], 8000);
    }

    #[test]
    fn test_exact_multiple_has_no_remainder() {
        let mut batcher = Batcher::new(2);
        assert!(batcher.push(1).is_none());
        assert!(batcher.push(2).is_some());
        assert_eq!(batcher.pending(), 0);
        assert!(batcher.finish().is_none());
        assert_eq!(batcher.sealed(), 1);
    }

    #[test]
    fn test_zero_capacity_behaves_as_one() {
        let mut batcher = Batcher::new(0);
        assert_eq!(batcher.push("a").map(|b| b.len()), Some(1));
    }
}
