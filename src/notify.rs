//! Outbound notifications
//!
//! The resolver publishes a `conflict:resolved` notice for every successful
//! resolution. Delivery is best effort: a subscriber that has gone away is
//! logged and dropped, and never fails the publisher.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::resolve::ResolutionStrategy;

/// Topic published after a conflict is resolved
pub const CONFLICT_RESOLVED_TOPIC: &str = "conflict:resolved";

/// Payload of a `conflict:resolved` notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolvedNotice {
    pub conflict_id: String,
    pub strategy: ResolutionStrategy,
    /// ID of the resolved event
    pub resolution_id: String,
}

/// A published message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    pub payload: Value,
}

/// Publish side of a notification channel
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver `payload` to every subscriber of `topic`
    ///
    /// Implementations isolate and log per-subscriber failures themselves.
    async fn publish(&self, topic: &str, payload: Value);
}

/// Channel that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopChannel;

#[async_trait]
impl NotificationChannel for NoopChannel {
    async fn publish(&self, _topic: &str, _payload: Value) {}
}

struct Subscriber {
    id: u64,
    /// `None` receives every topic
    topic: Option<String>,
    sender: mpsc::UnboundedSender<Notification>,
}

/// In-process publish/subscribe bus
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one topic
    pub fn subscribe(&self, topic: &str) -> mpsc::UnboundedReceiver<Notification> {
        self.add_subscriber(Some(topic.to_string()))
    }

    /// Subscribe to every topic
    pub fn subscribe_all(&self) -> mpsc::UnboundedReceiver<Notification> {
        self.add_subscriber(None)
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn add_subscriber(&self, topic: Option<String>) -> mpsc::UnboundedReceiver<Notification> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push(Subscriber { id, topic, sender });
        receiver
    }
}

#[async_trait]
impl NotificationChannel for EventBus {
    async fn publish(&self, topic: &str, payload: Value) {
        let mut subscribers = self.subscribers.lock();
        let mut delivered = 0usize;

        subscribers.retain(|sub| {
            if sub.topic.as_deref().is_some_and(|t| t != topic) {
                return true;
            }

            let notification = Notification {
                topic: topic.to_string(),
                payload: payload.clone(),
            };

            match sub.sender.send(notification) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    tracing::warn!(
                        subscriber = sub.id,
                        topic = %topic,
                        "Subscriber closed, dropping it"
                    );
                    false
                }
            }
        });

        tracing::trace!(topic = %topic, delivered, "Published notification");
    }
}
