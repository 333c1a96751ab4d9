use std::collections::HashMap;

/// Releases items in sequence order regardless of arrival order.
///
/// Items are keyed by a 0-based sequence number; `push` returns every item that became
/// deliverable, in order.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    pending: HashMap<u64, T>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    /// Empty buffer expecting sequence 0 first.
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: HashMap::new(),
        }
    }

    /// Next sequence number that will be released.
    pub fn next_seq(&self) -> u64 {
        self.next
    }

    /// Number of items parked waiting for an earlier sequence.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Insert `item` at `seq` and drain everything that is now contiguous.
    ///
    /// Sequences below `next_seq()` or already parked are ignored and returned as `Err(item)`.
    pub fn push(&mut self, seq: u64, item: T) -> Result<Vec<T>, T> {
        if seq < self.next || self.pending.contains_key(&seq) {
            return Err(item);
        }
        self.pending.insert(seq, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        Ok(ready)
    }

    /// Drop everything still parked, returning how many items were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/reorder.rs"]
mod tests;
