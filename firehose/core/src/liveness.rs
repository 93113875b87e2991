//! Connection liveness: `Active` until retired, then `Retiring` for good.
//!
//! The state is an atomic so the manager and the read loop never race on
//! it. A [`Notify`] wakes a read loop that is parked on a silent socket, a
//! full queue or a retry delay, so retirement is observed promptly.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Notify;

const ACTIVE: u8 = 0;
const RETIRING: u8 = 1;

/// Lifecycle state of a stream connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LivenessState {
    /// Connected or reconnecting, delivering records
    Active,
    /// Asked to stop; the read loop exits at its next boundary
    Retiring,
}

/// Shared liveness flag of one stream connection
#[derive(Debug)]
pub struct Liveness {
    state: AtomicU8,
    notify: Notify,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    /// A new, active flag
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ACTIVE),
            notify: Notify::new(),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> LivenessState {
        match self.state.load(Ordering::SeqCst) {
            ACTIVE => LivenessState::Active,
            _ => LivenessState::Retiring,
        }
    }

    /// Whether the connection has been retired
    #[must_use]
    pub fn is_retiring(&self) -> bool {
        self.state() == LivenessState::Retiring
    }

    /// Transition to `Retiring`
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn retire(&self) -> bool {
        let transitioned = self
            .state
            .compare_exchange(ACTIVE, RETIRING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if transitioned {
            self.notify.notify_waiters();
        }
        transitioned
    }

    /// Resolves once the connection is retiring
    pub async fn retired(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a retire() in between is not missed
            notified.as_mut().enable();
            if self.is_retiring() {
                return;
            }
            notified.await;
        }
    }
}
