//! Coalescing wake-up signal between contributors and the control loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Single-slot, edge-triggered "recompute requested" flag.
///
/// Any number of [`raise`](Self::raise) calls before the next consume collapse
/// into one wake. A raise that lands after the consume schedules the next wake.
#[derive(Debug, Default)]
pub struct UpdateSignal {
    pending: AtomicBool,
    notify: Notify,
}

impl UpdateSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Never blocks.
    pub fn raise(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    pub fn is_raised(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Clear the flag without waiting. Returns whether it was set.
    pub fn try_consume(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Wait up to `timeout` for the flag. Returns true (and clears the flag)
    /// if it was set, false on timeout.
    pub async fn await_and_consume(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.try_consume() {
                return true;
            }
            // A stale permit can wake us with the flag already consumed;
            // loop and check again.
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return self.try_consume();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const SHORT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn repeated_raises_coalesce_into_one_wake() {
        let signal = UpdateSignal::new();
        for _ in 0..10 {
            signal.raise();
        }
        assert!(signal.await_and_consume(SHORT).await);
        assert!(!signal.await_and_consume(SHORT).await);
    }

    #[tokio::test]
    async fn times_out_without_raise() {
        let signal = UpdateSignal::new();
        assert!(!signal.await_and_consume(SHORT).await);
        assert!(!signal.is_raised());
    }

    #[tokio::test]
    async fn raise_after_consume_schedules_next_wake() {
        let signal = UpdateSignal::new();
        signal.raise();
        assert!(signal.await_and_consume(SHORT).await);
        signal.raise();
        assert!(signal.is_raised());
        assert!(signal.await_and_consume(SHORT).await);
    }

    #[tokio::test]
    async fn waiter_is_woken_by_raise_from_another_task() {
        let signal = Arc::new(UpdateSignal::new());
        let raiser = Arc::clone(&signal);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            raiser.raise();
        });
        assert!(signal.await_and_consume(Duration::from_secs(5)).await);
        handle.await.unwrap();
        assert!(!signal.is_raised());
    }

    #[test]
    fn try_consume_clears_flag() {
        let signal = UpdateSignal::new();
        assert!(!signal.try_consume());
        signal.raise();
        signal.raise();
        assert!(signal.try_consume());
        assert!(!signal.try_consume());
    }
}
