//! Transient visual notifications.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

/// Oldest toasts are dropped beyond this many.
const MAX_VISIBLE: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Visible toasts, published to subscribers on every change.
///
/// Each pushed toast removes itself after the queue's time-to-live when a
/// tokio runtime is available; otherwise it stays until [`ToastQueue::dismiss`].
#[derive(Debug, Clone)]
pub struct ToastQueue {
    tx: Arc<watch::Sender<Vec<Toast>>>,
    ttl: Duration,
}

impl ToastQueue {
    pub fn new(ttl: Duration) -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            tx: Arc::new(tx),
            ttl,
        }
    }

    /// Show a toast and schedule its dismissal.
    pub fn push(&self, title: impl Into<String>, body: impl Into<String>) -> Uuid {
        let toast = Toast {
            id: Uuid::new_v4(),
            title: title.into(),
            body: body.into(),
            created_at: Utc::now(),
        };
        let id = toast.id;

        self.tx.send_modify(|toasts| {
            toasts.push(toast);
            if toasts.len() > MAX_VISIBLE {
                let excess = toasts.len() - MAX_VISIBLE;
                toasts.drain(..excess);
            }
        });

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let queue = self.clone();
                handle.spawn(async move {
                    tokio::time::sleep(queue.ttl).await;
                    queue.dismiss(id);
                });
            }
            Err(_) => tracing::debug!("No runtime, toast {} stays until dismissed", id),
        }

        id
    }

    /// Remove a toast early. Returns whether it was still visible.
    pub fn dismiss(&self, id: Uuid) -> bool {
        self.tx.send_if_modified(|toasts| {
            let before = toasts.len();
            toasts.retain(|toast| toast.id != id);
            toasts.len() != before
        })
    }

    pub fn visible(&self) -> Vec<Toast> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Toast>> {
        self.tx.subscribe()
    }
}
