//! Atomic version counter for single-writer state blocks

use std::sync::atomic::{AtomicU64, Ordering};

/// Version counter using even/odd versioning
///
/// An even value is a committed version. A writer moves the counter to the
/// next odd value while it stages changes, then to the next even value on
/// commit, or back to the previous even value if it abandons the write.
/// The odd state doubles as the "writer present" flag.
#[derive(Debug)]
pub struct VersionCounter {
    counter: AtomicU64,
}

impl VersionCounter {
    /// Create a new version counter starting at 0 (even)
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Get current version with acquire ordering
    pub fn load(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Begin write operation - move to odd version
    ///
    /// Returns `None` if a write is already in progress.
    pub fn try_begin_write(&self) -> Option<u64> {
        let current = self.counter.load(Ordering::Acquire);
        if Self::is_writing(current) {
            return None;
        }
        self.counter
            .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| current + 1)
    }

    /// Complete write operation - move to the next even version
    pub fn end_write(&self) -> u64 {
        let current = self.counter.load(Ordering::Acquire);
        debug_assert!(Self::is_writing(current));
        let next = current + 1;
        self.counter.store(next, Ordering::Release);
        next
    }

    /// Abandon write operation - return to the previous even version
    pub fn abort_write(&self) -> u64 {
        let current = self.counter.load(Ordering::Acquire);
        debug_assert!(Self::is_writing(current));
        let previous = current - 1;
        self.counter.store(previous, Ordering::Release);
        previous
    }

    /// Check if version is stable (even)
    pub fn is_stable(version: u64) -> bool {
        version % 2 == 0
    }

    /// Check if version indicates write in progress (odd)
    pub fn is_writing(version: u64) -> bool {
        version % 2 == 1
    }
}

impl Default for VersionCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_counter_creation() {
        let counter = VersionCounter::new();
        assert_eq!(counter.load(), 0);
        assert!(VersionCounter::is_stable(counter.load()));
    }

    #[test]
    fn test_write_cycle() {
        let counter = VersionCounter::new();

        let v1 = counter.try_begin_write().unwrap();
        assert_eq!(v1, 1);
        assert!(VersionCounter::is_writing(v1));

        let v2 = counter.end_write();
        assert_eq!(v2, 2);
        assert!(VersionCounter::is_stable(v2));
    }

    #[test]
    fn test_second_writer_is_refused() {
        let counter = VersionCounter::new();
        assert!(counter.try_begin_write().is_some());
        assert!(counter.try_begin_write().is_none());
    }

    #[test]
    fn test_abort_restores_previous_version() {
        let counter = VersionCounter::new();
        counter.try_begin_write().unwrap();
        counter.end_write();

        counter.try_begin_write().unwrap();
        assert_eq!(counter.abort_write(), 2);
        assert_eq!(counter.load(), 2);
        assert_eq!(counter.try_begin_write(), Some(3));
    }
}
