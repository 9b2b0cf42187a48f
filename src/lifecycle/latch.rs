//! Countdown latch used to wait out in-flight requests.
//!
//! # Responsibilities
//! - Hold the number of requests that still have to finish
//! - Release every waiter once that number reaches zero
//! - Bound the wait with a timeout; timing out is a normal outcome
//!
//! # Design Decisions
//! - Built on a `watch` channel: waiters observe the count, signalers
//!   mutate it, no wakeups are lost between check and sleep
//! - Signaling at zero is a no-op; the count never goes negative

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

/// A one-shot countdown latch.
///
/// Created with a fixed count, decremented by [`signal`](Self::signal), and
/// awaited by [`wait`](Self::wait). A latch created with a count of zero is
/// already released.
#[derive(Debug)]
pub struct DrainLatch {
    /// Number of outstanding signals, published to waiters.
    remaining: watch::Sender<u64>,
}

impl DrainLatch {
    /// Create a latch pre-loaded with `count`.
    pub fn new(count: u64) -> Self {
        let (tx, _) = watch::channel(count);
        Self { remaining: tx }
    }

    /// Decrement the latch by one.
    ///
    /// Once the count reaches zero all waiters are released. Extra signals
    /// after that point are no-ops.
    pub fn signal(&self) {
        self.remaining.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Wait until the latch reaches zero or `timeout` elapses.
    ///
    /// Returns `true` if the latch reached zero, `false` on timeout. The
    /// caller is expected to log a timeout and carry on; it is never an
    /// error.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.remaining.subscribe();
        // Bound to a local: the wait result borrows `rx` and must drop first.
        let drained = match time::timeout(timeout, rx.wait_for(|remaining| *remaining == 0)).await {
            Ok(Ok(_)) => true,
            // The channel can only close if the latch is dropped mid-wait;
            // treated like a timeout so the shutdown sequence keeps moving.
            Ok(Err(_)) => false,
            Err(_) => false,
        };
        drained
    }

    /// Current count, for logging and tests.
    pub fn remaining(&self) -> u64 {
        *self.remaining.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn zero_sized_latch_is_already_released() {
        let latch = DrainLatch::new(0);
        assert!(latch.wait(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn waiter_released_when_count_reaches_zero() {
        let latch = Arc::new(DrainLatch::new(2));
        let waiter = {
            let latch = Arc::clone(&latch);
            tokio::spawn(async move { latch.wait(Duration::from_secs(5)).await })
        };

        latch.signal();
        assert_eq!(latch.remaining(), 1);
        latch.signal();

        assert!(waiter.await.unwrap());
        assert_eq!(latch.remaining(), 0);
    }

    #[tokio::test]
    async fn wait_times_out_when_signals_are_missing() {
        let latch = DrainLatch::new(1);
        assert!(!latch.wait(Duration::from_millis(50)).await);
        assert_eq!(latch.remaining(), 1);
    }

    #[tokio::test]
    async fn one_signal_of_two_does_not_release_the_waiter() {
        let latch = DrainLatch::new(2);
        latch.signal();

        assert!(!latch.wait(Duration::from_millis(50)).await);
        assert_eq!(latch.remaining(), 1);

        latch.signal();
        assert!(latch.wait(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn signals_beyond_zero_are_no_ops() {
        let latch = DrainLatch::new(1);
        latch.signal();
        latch.signal();
        latch.signal();
        assert_eq!(latch.remaining(), 0);
        assert!(latch.wait(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn all_waiters_released_together() {
        let latch = Arc::new(DrainLatch::new(1));
        let mut waiters = Vec::new();
        for _ in 0..4 {
            let latch = Arc::clone(&latch);
            waiters.push(tokio::spawn(async move {
                latch.wait(Duration::from_secs(5)).await
            }));
        }

        latch.signal();
        for waiter in waiters {
            assert!(waiter.await.unwrap());
        }
    }

    #[tokio::test]
    async fn wait_observes_signals_sent_before_subscribing() {
        let latch = DrainLatch::new(1);
        latch.signal();
        // The waiter subscribes after the count already hit zero.
        assert!(latch.wait(Duration::from_millis(10)).await);
    }
}
