//! Cooperative cancellation for streamed fetches.
//!
//! The interrupt listener only ever flips the shared flag; it never terminates
//! the process. Readers either poll the flag or await [`AbortFlag::triggered`],
//! which also wakes a transfer stalled on a silent connection.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Shared {
    raised: AtomicBool,
    wake: Notify,
}

/// Shared, cloneable abort flag set by the interrupt listener.
#[derive(Clone, Debug, Default)]
pub struct AbortFlag {
    shared: Arc<Shared>,
}

impl AbortFlag {
    /// Create a flag in the cleared state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the in-flight streamed fetch.
    pub fn trigger(&self) {
        self.shared.raised.store(true, Ordering::SeqCst);
        self.shared.wake.notify_waiters();
    }

    /// Clear any earlier request so it cannot cancel the next fetch.
    pub fn reset(&self) {
        self.shared.raised.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested since the last reset.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.shared.raised.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation has been requested.
    ///
    /// Returns immediately when the flag is already raised.
    pub async fn triggered(&self) {
        loop {
            let mut notified = pin!(self.shared.wake.notified());
            // Register before checking so a concurrent trigger cannot be missed.
            notified.as_mut().enable();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

/// Spawn the background task translating interrupt signals into abort requests.
#[must_use = "the listener runs until its handle is aborted"]
pub fn spawn_interrupt_listener(flag: AbortFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "interrupt listener stopped");
                break;
            }
            tracing::debug!("interrupt received; aborting current transfer");
            flag.trigger();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clones_share_state() {
        let flag = AbortFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_triggered());

        flag.trigger();
        assert!(observer.is_triggered());

        observer.reset();
        assert!(!flag.is_triggered());
    }

    #[tokio::test]
    async fn triggered_wakes_a_pending_waiter() {
        let flag = AbortFlag::new();
        let waiter = tokio::spawn({
            let flag = flag.clone();
            async move { flag.triggered().await }
        });
        tokio::task::yield_now().await;

        flag.trigger();
        let woke = tokio::time::timeout(Duration::from_secs(5), waiter).await;
        assert!(matches!(woke, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn triggered_returns_immediately_when_already_raised() {
        let flag = AbortFlag::new();
        flag.trigger();
        let woke = tokio::time::timeout(Duration::from_secs(5), flag.triggered()).await;
        assert!(woke.is_ok());
    }

    #[tokio::test]
    async fn listener_can_be_cancelled() {
        let handle = spawn_interrupt_listener(AbortFlag::new());
        handle.abort();
        let result = handle.await;
        assert!(result.is_err_and(|err| err.is_cancelled()));
    }
}
