//! Live subscriber set and fan-out.

use std::collections::HashMap;

use axum::extract::ws::Utf8Bytes;
use hubrelay_core::OutboundMessage;
use metrics::{counter, gauge};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::subscriber::{Subscriber, SubscriberId};
use crate::metrics::{BROADCAST_EVICTIONS_TOTAL, BROADCAST_MESSAGES_TOTAL, WS_CONNECTIONS_ACTIVE};

/// Why [`SubscriberRegistry::add`] refused a subscriber.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// A subscriber with this id is already registered.
    #[error("subscriber {0} is already registered")]
    Duplicate(SubscriberId),
    /// The registry holds its maximum number of subscribers.
    #[error("subscriber limit of {limit} reached")]
    AtCapacity {
        /// Configured maximum.
        limit: usize,
    },
}

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Subscribers the frame was enqueued for.
    pub delivered: usize,
    /// Subscribers removed because enqueueing failed.
    pub evicted: usize,
}

/// The set of live subscribers.
///
/// Fan-out runs under the read lock; membership changes take the write lock.
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    max_subscribers: usize,
}

impl SubscriberRegistry {
    /// Create an empty registry admitting at most `max_subscribers`.
    pub fn new(max_subscribers: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            max_subscribers,
        }
    }

    /// Register a subscriber for future broadcasts.
    ///
    /// Once this returns, every later broadcast sees the subscriber.
    pub async fn add(&self, subscriber: Subscriber) -> Result<(), AdmissionError> {
        let mut subs = self.subscribers.write().await;
        if subs.contains_key(subscriber.id()) {
            return Err(AdmissionError::Duplicate(subscriber.id().clone()));
        }
        if subs.len() >= self.max_subscribers {
            return Err(AdmissionError::AtCapacity {
                limit: self.max_subscribers,
            });
        }
        let _ = subs.insert(subscriber.id().clone(), subscriber);
        gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
        Ok(())
    }

    /// Deregister a subscriber. Returns `false` if it was not a member.
    pub async fn remove(&self, id: &SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(id).is_some();
        if removed {
            gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        }
        removed
    }

    /// Enqueue `message` for every registered subscriber.
    ///
    /// A subscriber whose queue is full or closed is evicted; the others
    /// still receive the frame.
    pub async fn broadcast(&self, message: &OutboundMessage) -> BroadcastReport {
        match message.to_json() {
            Ok(json) => self.broadcast_frame(Utf8Bytes::from(json)).await,
            Err(e) => {
                warn!(user = message.user(), error = %e, "failed to serialize outbound message");
                BroadcastReport::default()
            }
        }
    }

    async fn broadcast_frame(&self, frame: Utf8Bytes) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        {
            let subs = self.subscribers.read().await;
            for subscriber in subs.values() {
                match subscriber.try_deliver(frame.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        warn!(subscriber_id = %subscriber.id(), error = %e, "evicting subscriber");
                        failed.push(subscriber.id().clone());
                    }
                }
            }
        }

        if !failed.is_empty() {
            let mut subs = self.subscribers.write().await;
            for id in &failed {
                if subs.remove(id).is_some() {
                    report.evicted += 1;
                    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
                }
            }
        }

        counter!(BROADCAST_MESSAGES_TOTAL).increment(1);
        if report.evicted > 0 {
            counter!(BROADCAST_EVICTIONS_TOTAL).increment(report.evicted as u64);
        }
        debug!(
            recipients = report.delivered,
            evicted = report.evicted,
            "broadcast complete"
        );
        report
    }

    /// Whether `id` is registered.
    pub async fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(id)
    }

    /// Number of registered subscribers.
    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Whether no subscriber is registered.
    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }

    /// Configured admission limit.
    pub fn max_subscribers(&self) -> usize {
        self.max_subscribers
    }
}
