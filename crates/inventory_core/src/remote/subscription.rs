//! Latest-value snapshot channel between a remote adapter and the engine.

use super::RemoteSnapshot;
use std::sync::Arc;
use tokio::sync::watch;

type Slot = Option<Arc<RemoteSnapshot>>;

/// Creates a connected sink/subscription pair.
pub fn snapshot_channel() -> (SnapshotSink, RemoteSubscription) {
    let (tx, rx) = watch::channel(None);
    (SnapshotSink { tx }, RemoteSubscription { rx })
}

/// Adapter side of a subscription.
///
/// Publishing replaces any snapshot the subscriber has not consumed yet, so a
/// fast remote cannot grow memory on a slow subscriber.
#[derive(Debug)]
pub struct SnapshotSink {
    tx: watch::Sender<Slot>,
}

impl SnapshotSink {
    /// Publishes a full snapshot. Returns `false` once the subscriber is gone.
    pub fn publish(&self, snapshot: RemoteSnapshot) -> bool {
        self.tx.send(Some(Arc::new(snapshot))).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Engine side of a remote change feed.
#[derive(Debug)]
pub struct RemoteSubscription {
    rx: watch::Receiver<Slot>,
}

impl RemoteSubscription {
    /// Waits for the next unseen snapshot.
    ///
    /// Returns `None` when the adapter ended the feed.
    pub async fn next(&mut self) -> Option<Arc<RemoteSnapshot>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(snapshot) = self.rx.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }

    /// Explicitly unsubscribes; equivalent to dropping the subscription.
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::snapshot_channel;
    use crate::remote::RemoteDocument;
    use serde_json::json;

    #[tokio::test]
    async fn slow_subscriber_only_sees_latest_snapshot() {
        let (sink, mut subscription) = snapshot_channel();
        assert!(sink.publish(vec![RemoteDocument::new("a", json!({}))]));
        assert!(sink.publish(vec![
            RemoteDocument::new("a", json!({})),
            RemoteDocument::new("b", json!({})),
        ]));

        let snapshot = subscription.next().await.unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn feed_ends_when_sink_is_dropped() {
        let (sink, mut subscription) = snapshot_channel();
        drop(sink);
        assert!(subscription.next().await.is_none());
    }

    #[test]
    fn dropping_subscription_closes_sink() {
        let (sink, subscription) = snapshot_channel();
        subscription.close();
        assert!(sink.is_closed());
        assert!(!sink.publish(Vec::new()));
    }
}
