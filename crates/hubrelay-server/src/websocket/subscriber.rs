//! A single admitted WebSocket subscriber.

use std::fmt;

use axum::extract::ws::Utf8Bytes;
use hubrelay_core::RelayError;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique subscriber identifier (`sub_<uuid-v7>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(String);

impl SubscriberId {
    /// Generate a fresh, time-ordered id.
    pub fn new() -> Self {
        Self(format!("sub_{}", Uuid::now_v7()))
    }

    /// Borrow the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry-side half of a subscriber: the sending end of its bounded
/// outbound queue.
///
/// Dropping the `Subscriber` closes the queue, which ends the session that
/// holds the receiving end.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Utf8Bytes>,
}

impl Subscriber {
    /// Create a subscriber with a bounded queue of `capacity` frames.
    ///
    /// A capacity of zero is raised to one.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        Self::with_id(SubscriberId::new(), capacity)
    }

    pub(crate) fn with_id(id: SubscriberId, capacity: usize) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { id, tx }, rx)
    }

    /// Subscriber id.
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Enqueue a frame without waiting.
    ///
    /// Fails when the queue is full or the session has gone away.
    pub fn try_deliver(&self, frame: Utf8Bytes) -> Result<(), RelayError> {
        self.tx
            .try_send(frame)
            .map_err(|_| RelayError::SubscriberSendFailure {
                subscriber_id: self.id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_prefix_and_is_unique() {
        let a = SubscriberId::new();
        let b = SubscriberId::new();
        assert!(a.as_str().starts_with("sub_"));
        assert_eq!(a.to_string(), a.as_str());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn deliver_enqueues_frame() {
        let (sub, mut rx) = Subscriber::channel(4);
        sub.try_deliver(Utf8Bytes::from_static("hello")).unwrap();
        assert_eq!(rx.recv().await.unwrap().as_str(), "hello");
    }

    #[test]
    fn full_queue_fails() {
        let (sub, _rx) = Subscriber::channel(1);
        sub.try_deliver(Utf8Bytes::from_static("one")).unwrap();
        let err = sub.try_deliver(Utf8Bytes::from_static("two")).unwrap_err();
        assert_eq!(
            err,
            RelayError::SubscriberSendFailure {
                subscriber_id: sub.id().to_string()
            }
        );
    }

    #[test]
    fn closed_queue_fails() {
        let (sub, rx) = Subscriber::channel(8);
        drop(rx);
        assert!(sub.try_deliver(Utf8Bytes::from_static("x")).is_err());
    }

    #[test]
    fn zero_capacity_is_raised() {
        let (sub, _rx) = Subscriber::channel(0);
        assert!(sub.try_deliver(Utf8Bytes::from_static("x")).is_ok());
    }

    #[tokio::test]
    async fn dropping_subscriber_closes_receiver() {
        let (sub, mut rx) = Subscriber::channel(4);
        sub.try_deliver(Utf8Bytes::from_static("last")).unwrap();
        drop(sub);
        assert_eq!(rx.recv().await.unwrap().as_str(), "last");
        assert!(rx.recv().await.is_none());
    }
}
