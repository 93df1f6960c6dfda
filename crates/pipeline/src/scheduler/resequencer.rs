//! Index-keyed reorder buffer

use std::collections::BTreeMap;

/// Releases items strictly in index order starting from zero.
///
/// Items arriving early are parked until every lower index has arrived.
#[derive(Debug)]
pub struct Resequencer<T> {
    next: usize,
    pending: BTreeMap<usize, T>,
}

impl<T> Default for Resequencer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Resequencer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Accept `item` for `index` and return the contiguous run now releasable.
    ///
    /// Indices already released or already pending are ignored.
    pub fn push(&mut self, index: usize, item: T) -> Vec<T> {
        if index < self.next || self.pending.contains_key(&index) {
            return Vec::new();
        }
        self.pending.insert(index, item);

        let mut ready = Vec::new();
        while let Some(item) = self.pending.remove(&self.next) {
            ready.push(item);
            self.next += 1;
        }
        ready
    }

    /// Next index expected for release
    pub fn next_index(&self) -> usize {
        self.next
    }

    /// Items parked waiting for a gap to fill
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_passes_through() {
        let mut r = Resequencer::new();
        assert_eq!(r.push(0, "a"), vec!["a"]);
        assert_eq!(r.push(1, "b"), vec!["b"]);
        assert_eq!(r.next_index(), 2);
    }

    #[test]
    fn test_out_of_order_is_held() {
        let mut r = Resequencer::new();
        assert!(r.push(2, 'c').is_empty());
        assert!(r.push(1, 'b').is_empty());
        assert_eq!(r.pending(), 2);
        assert_eq!(r.push(0, 'a'), vec!['a', 'b', 'c']);
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn test_reverse_arrival() {
        let mut r = Resequencer::new();
        let mut released = Vec::new();
        for i in (0..5).rev() {
            released.extend(r.push(i, i));
        }
        assert_eq!(released, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_duplicates_ignored() {
        let mut r = Resequencer::new();
        assert_eq!(r.push(0, 10), vec![10]);
        assert!(r.push(0, 99).is_empty());
        assert!(r.push(2, 30).is_empty());
        assert!(r.push(2, 99).is_empty());
        assert_eq!(r.push(1, 20), vec![20, 30]);
    }
}
