//! # Bounded FIFO History
//!
//! Fixed-capacity history with oldest-first eviction. The tracker keeps one
//! of these per monitored stream, so memory per stream is constant no
//! matter how long the session runs.
//!
//! ## Eviction Policy
//!
//! | Event | Effect |
//! |-------|--------|
//! | `push` below capacity | append |
//! | `push` at capacity | pop front, then append |
//! | `clear` | drop everything, keep the eviction counter |
//!
//! ## Example
//!
//! ```rust
//! use aegis_monitor::BoundedHistory;
//!
//! let mut history = BoundedHistory::new(3);
//! for v in 1..=5 {
//!     history.push(v);
//! }
//! assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
//! assert_eq!(history.evicted_count(), 2);
//! ```

use std::collections::VecDeque;

/// A FIFO that never holds more than `capacity` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedHistory<T> {
    capacity: usize,
    entries: VecDeque<T>,
    evicted_count: u64,
}

impl<T> BoundedHistory<T> {
    /// Creates an empty history. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            evicted_count: 0,
        }
    }

    /// Maximum number of entries.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the next push will evict.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Entries evicted over the lifetime of this history.
    #[inline]
    #[must_use]
    pub const fn evicted_count(&self) -> u64 {
        self.evicted_count
    }

    /// Appends an entry, evicting the oldest one if at capacity.
    ///
    /// # Returns
    ///
    /// The evicted entry, if any.
    pub fn push(&mut self, entry: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.evicted_count += 1;
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.entries.iter()
    }

    /// Iterates the newest `n` entries, oldest first. Yields fewer when the
    /// history is shorter than `n`.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> + '_ {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut history = BoundedHistory::new(2);
        assert_eq!(history.push('a'), None);
        assert_eq!(history.push('b'), None);
        assert!(history.is_full());
        assert_eq!(history.push('c'), Some('a'));
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest(), Some(&'c'));
    }

    #[test]
    fn test_recent_window() {
        let mut history = BoundedHistory::new(10);
        for v in 0..6 {
            history.push(v);
        }
        assert_eq!(history.recent(3).copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(history.recent(50).count(), 6);
        assert_eq!(history.recent(0).count(), 0);
    }

    #[test]
    fn test_zero_capacity_raised() {
        let mut history = BoundedHistory::new(0);
        assert_eq!(history.capacity(), 1);
        history.push(1);
        history.push(2);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_clear_keeps_counter() {
        let mut history = BoundedHistory::new(1);
        history.push(1);
        history.push(2);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.evicted_count(), 1);
    }
}
