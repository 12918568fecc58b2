//! Interrupt handling (SIGINT/SIGTERM)
//!
//! On the first interrupt the shared [`CancelToken`] is set: the orchestrator
//! stops submitting, makes a best-effort attempt to stop the open job, and the
//! run ends with exit code 80.
//!
//! On a second interrupt the immediate-exit callback runs. Library code never
//! exits the process itself; the binary passes a callback that does.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::cancel::CancelToken;

/// Signal handler state
#[derive(Debug)]
pub struct SignalState {
    token: CancelToken,
    signal_count: AtomicU8,
}

impl SignalState {
    pub fn new(token: CancelToken) -> Self {
        Self {
            token,
            signal_count: AtomicU8::new(0),
        }
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of signals received
    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Record one signal and decide what to do about it
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);

        match count {
            0 => {
                self.token.cancel();
                SignalAction::InitiateCancellation
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: cancel the run
    InitiateCancellation,
    /// Second signal: exit without waiting for the job to stop
    ImmediateExit,
    /// Third+ signal
    Ignore,
}

/// Installs the process interrupt handler
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new(token: CancelToken) -> Self {
        Self {
            state: Arc::new(SignalState::new(token)),
        }
    }

    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install the handler; call once at startup.
    pub fn install<F>(&self, on_immediate_exit: F) -> Result<(), ctrlc::Error>
    where
        F: Fn() + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::InitiateCancellation => {
                tracing::warn!("interrupt received, stopping after the current request (press Ctrl-C again to exit now)");
            }
            SignalAction::ImmediateExit => {
                tracing::warn!("second interrupt received, exiting without stopping the open job");
                on_immediate_exit();
            }
            SignalAction::Ignore => {}
        })
    }
}
