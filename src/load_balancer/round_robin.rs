// src/load_balancer/round_robin.rs
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counter whose value modulo the backend count picks the next backend.
///
/// Every call to [`advance`](Self::advance) is a single `fetch_add`, so no two
/// callers ever observe the same value and concurrent requests never wait on
/// each other to pick a backend.
#[derive(Debug, Default)]
pub struct RotationCursor {
    counter: AtomicU64,
}

impl RotationCursor {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(value: u64) -> Self {
        Self {
            counter: AtomicU64::new(value),
        }
    }

    /// Increments the cursor and returns the new value.
    pub fn advance(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn advance_returns_post_increment_value() {
        let cursor = RotationCursor::new();
        assert_eq!(cursor.advance(), 1);
        assert_eq!(cursor.advance(), 2);
        assert_eq!(cursor.current(), 2);
    }

    #[test]
    fn starting_value_is_respected() {
        let cursor = RotationCursor::starting_at(41);
        assert_eq!(cursor.advance(), 42);
    }

    #[test]
    fn concurrent_advances_are_distinct_and_gap_free() {
        let cursor = Arc::new(RotationCursor::starting_at(1_000));
        let threads = 8;
        let per_thread = 500;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let cursor = cursor.clone();
                std::thread::spawn(move || {
                    (0..per_thread).map(|_| cursor.advance()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        seen.sort_unstable();

        let expected: Vec<u64> = (1_001..=1_000 + (threads * per_thread) as u64).collect();
        assert_eq!(seen, expected);
    }
}
