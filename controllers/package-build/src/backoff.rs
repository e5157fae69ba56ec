//! # Fibonacci Backoff
//!
//! Progressive retry delays for failed reconciliations. Grows more slowly than
//! exponential backoff so a briefly unavailable API server is retried promptly
//! while a persistently failing resource settles at the cap.
//!
//! Sequence with the controller's defaults: 1s, 1s, 2s, 3s, 5s, 8s, ... 60s (max).

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at `max_seconds`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_seconds: u64,
    prev_seconds: u64,
    current_seconds: u64,
    max_seconds: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with the given minimum and maximum in seconds
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            min_seconds,
            prev_seconds: 0,
            current_seconds: min_seconds,
            max_seconds,
        }
    }

    /// Get the next backoff delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_seconds;

        let next = self.prev_seconds + self.current_seconds;
        self.prev_seconds = self.current_seconds;
        self.current_seconds = next.min(self.max_seconds);

        Duration::from_secs(result)
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_seconds = 0;
        self.current_seconds = self.min_seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(backoff: &mut FibonacciBackoff, n: usize) -> Vec<u64> {
        (0..n).map(|_| backoff.next_backoff().as_secs()).collect()
    }

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::new(1, 60);
        assert_eq!(seconds(&mut backoff, 10), vec![1, 1, 2, 3, 5, 8, 13, 21, 34, 55]);
    }

    #[test]
    fn test_fibonacci_backoff_max_cap() {
        let mut backoff = FibonacciBackoff::new(1, 60);
        seconds(&mut backoff, 10);

        // 34 + 55 would be 89
        assert_eq!(seconds(&mut backoff, 3), vec![60, 60, 60]);
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::new(1, 60);
        assert_eq!(seconds(&mut backoff, 4), vec![1, 1, 2, 3]);

        backoff.reset();

        assert_eq!(seconds(&mut backoff, 3), vec![1, 1, 2]);
    }
}
