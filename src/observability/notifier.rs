//! Notification fan-out
//!
//! Best-effort delivery to every subscriber's unbounded channel. A closed
//! receiver is pruned on the next publish.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::events::IndexNotification;

/// Receiving half handed to subscribers
pub type NotificationReceiver = mpsc::UnboundedReceiver<IndexNotification>;

/// Publishes notifications to subscribers
#[derive(Debug, Default)]
pub struct Notifier {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<IndexNotification>>>,
}

impl Notifier {
    /// Create a new notifier with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber and returns its receiver
    pub fn subscribe(&self) -> NotificationReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    /// Publishes a notification, logging it at the matching level.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, notification: IndexNotification) -> usize {
        match &notification {
            IndexNotification::Error {
                index_id,
                kind,
                message,
                ..
            } => {
                warn!(index_id = %index_id, code = kind.code(), "{}", message);
            }
            other => {
                debug!(index_id = %other.index_id(), event = other.as_str(), "index notification");
            }
        }

        let Ok(mut subscribers) = self.subscribers.lock() else {
            return 0;
        };
        subscribers.retain(|tx| tx.send(notification.clone()).is_ok());
        subscribers.len()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}
