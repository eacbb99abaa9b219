use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::timeout;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Responded,
    TimedOut,
}

/// Single-use rendezvous between a dispatch run waiting on one offer and the
/// response handler answering it.
///
/// A signal sent before `wait` starts is kept and consumed by the next
/// `wait`; a signal sent after the waiter gave up is ignored. The engine
/// creates one coordinator per offer and drops it once `wait` returns.
#[derive(Debug)]
pub struct OfferCoordinator {
    courier_id: Uuid,
    notify: Notify,
    signaled: AtomicBool,
}

impl OfferCoordinator {
    /// Coordinator for the offer held by `courier_id`.
    pub fn new(courier_id: Uuid) -> Self {
        Self {
            courier_id,
            notify: Notify::new(),
            signaled: AtomicBool::new(false),
        }
    }

    pub fn courier_id(&self) -> Uuid {
        self.courier_id
    }

    pub async fn wait(&self, limit: Duration) -> WaitOutcome {
        match timeout(limit, self.notify.notified()).await {
            Ok(()) => WaitOutcome::Responded,
            Err(_) => WaitOutcome::TimedOut,
        }
    }

    pub fn signal(&self) {
        if !self.signaled.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }
}
