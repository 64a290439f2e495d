//! One-shot stop notification shared by the capture workers.
//!
//! Triggering drops the only sender, which disconnects every receiver at
//! once: sleeping workers wake immediately instead of waiting out their
//! interval, and later checks see the signal without any extra state.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

#[derive(Clone, Debug)]
pub struct StopSignal {
    tx: Arc<Mutex<Option<Sender<()>>>>,
    rx: Receiver<()>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }

    /// Fire the signal. Further calls are no-ops.
    pub fn trigger(&self) {
        self.tx.lock().take();
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep up to `timeout`; returns true as soon as the signal fires.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if timeout.is_zero() {
            return self.is_triggered();
        }
        matches!(self.rx.recv_timeout(timeout), Err(RecvTimeoutError::Disconnected))
    }

    /// Receiver for use in `crossbeam_channel::select!`; becomes ready
    /// (disconnected) when the signal fires.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
