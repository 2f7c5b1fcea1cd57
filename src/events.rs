//! Notifications pushed to the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// Phase reported by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Fetching,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub status: SyncPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

impl SyncStatus {
    pub fn new(status: SyncPhase, message: Option<String>) -> Self {
        Self {
            status,
            message,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    /// Progress of a sync attempt.
    SyncStatus(SyncStatus),
    /// Stored data changed; clients should re-read it.
    DataChanged,
}

impl Notification {
    /// Channel name used when the notification is sent over the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SyncStatus(_) => "sync-status",
            Self::DataChanged => "data-changed",
        }
    }
}

/// Fan-out channel for [`Notification`]s. Publishing never blocks and never
/// fails; with no subscribers the notification is dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::trace!("No subscribers for notification");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
