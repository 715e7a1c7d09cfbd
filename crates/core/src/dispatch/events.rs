use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::searcher::DeliveryMode;
use crate::wanted::MediaKind;

/// Notifications emitted by dispatch. Consumers (notifiers, the
/// post-processor scheduler) live outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    Snatched {
        book_id: String,
        media_kind: MediaKind,
        title: String,
        provider: String,
        mode: DeliveryMode,
        download_id: String,
    },
    DownloadFailed {
        book_id: String,
        media_kind: MediaKind,
        title: String,
        url: String,
        reason: String,
    },
    /// Completed downloads for this item should be looked for.
    PostProcessRequested { book_id: String, media_kind: MediaKind },
}

/// Envelope wrapping a dispatch event with metadata
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: DispatchEvent,
}

/// Handle for emitting dispatch events
///
/// This is cheaply cloneable and can be shared across tasks. Emitting never
/// fails the caller; a full or closed channel is logged.
#[derive(Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventHandle {
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    /// Create a handle together with the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Emit an event, waiting for channel capacity.
    pub async fn emit(&self, event: DispatchEvent) {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit dispatch event: {}", e);
        }
    }

    /// Try to emit an event without waiting
    ///
    /// Returns true if the event was sent successfully, false otherwise.
    pub fn try_emit(&self, event: DispatchEvent) -> bool {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit dispatch event: {}", e);
                false
            }
        }
    }
}
