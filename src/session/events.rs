//! Events emitted by a capture session.
//!
//! Every subscriber gets its own bounded queue and sees the events emitted
//! after it subscribed. Delivery is best-effort: a full queue drops the event
//! for that subscriber only, so a slow consumer can never stall the capture
//! loop. Events emitted with no subscriber are discarded.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

use super::store::ProcessingReport;

const EVENT_QUEUE: usize = 1024;

/// What went wrong, for [`SessionEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Grab,
    Encode,
    Write,
    Audio,
    HandOff,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: String,
        window_title: String,
        audio: bool,
    },
    FrameSaved {
        path: PathBuf,
        index: u64,
    },
    AudioFinalized {
        path: PathBuf,
        duration: Duration,
    },
    Error {
        kind: ErrorKind,
        detail: String,
    },
    Stopped {
        session_id: String,
        frames: u64,
        dropped: u64,
    },
    HandOff(ProcessingReport),
}

type Subscribers = Arc<Mutex<Vec<Sender<SessionEvent>>>>;

/// Producer side handed to workers.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    subscribers: Option<Subscribers>,
}

impl EventSink {
    /// Sink that discards everything.
    pub fn disabled() -> Self {
        Self { subscribers: None }
    }

    pub fn emit(&self, event: SessionEvent) {
        let Some(subscribers) = &self.subscribers else {
            return;
        };
        let mut subscribers = subscribers.lock();
        // Dropped receivers unsubscribe
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                trace!("Event queue full, dropping {:?}", event);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn error(&self, kind: ErrorKind, detail: impl Into<String>) {
        self.emit(SessionEvent::Error {
            kind,
            detail: detail.into(),
        });
    }
}

/// Fan-out point owned by a session.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Subscribers,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> EventSink {
        EventSink {
            subscribers: Some(Arc::clone(&self.subscribers)),
        }
    }

    /// New queue receiving every event emitted from now on.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = bounded(EVENT_QUEUE);
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
