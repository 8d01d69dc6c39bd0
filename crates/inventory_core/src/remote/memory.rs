//! In-process remote mirror.
//!
//! Behaves like a shared document collection: every mutation, whether it
//! comes through `RemoteMirror` or through the raw document helpers used to
//! simulate other clients, fans the full collection out to all subscribers.

use super::subscription::{snapshot_channel, SnapshotSink};
use super::{
    RemoteDocument, RemoteError, RemoteMirror, RemoteResult, RemoteSnapshot, RemoteSubscription,
};
use crate::model::item::{Item, ItemId};
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Default)]
struct MirrorState {
    documents: BTreeMap<String, Value>,
    sinks: Vec<SnapshotSink>,
    offline: bool,
    writes: u64,
}

impl MirrorState {
    fn snapshot(&self) -> RemoteSnapshot {
        self.documents
            .iter()
            .map(|(id, body)| RemoteDocument::new(id.clone(), body.clone()))
            .collect()
    }

    fn broadcast(&mut self) {
        let snapshot = self.snapshot();
        self.sinks.retain(|sink| sink.publish(snapshot.clone()));
    }

    fn ensure_online(&self) -> RemoteResult<()> {
        if self.offline {
            return Err(RemoteError::Unavailable("mirror is offline".to_string()));
        }
        Ok(())
    }
}

/// Shared in-memory document collection.
#[derive(Default)]
pub struct MemoryRemoteMirror {
    state: Mutex<MirrorState>,
}

impl MemoryRemoteMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a connectivity loss; puts and deletes fail while offline.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Writes a raw document as another client would, bypassing validation.
    pub fn put_document(&self, id: impl Into<String>, body: Value) {
        let mut state = self.state.lock();
        state.documents.insert(id.into(), body);
        state.broadcast();
    }

    /// Deletes a document as another client would.
    pub fn delete_document(&self, id: &str) {
        let mut state = self.state.lock();
        if state.documents.remove(id).is_some() {
            state.broadcast();
        }
    }

    /// Re-sends the current collection to every subscriber.
    ///
    /// Models the at-least-once delivery of real change feeds.
    pub fn redeliver(&self) {
        self.state.lock().broadcast();
    }

    pub fn document(&self, id: &str) -> Option<Value> {
        self.state.lock().documents.get(id).cloned()
    }

    /// Decodes the stored document for `id` as an item, if it is well formed.
    pub fn item(&self, id: ItemId) -> Option<Item> {
        let body = self.document(&id.to_string())?;
        serde_json::from_value(body).ok()
    }

    pub fn len(&self) -> usize {
        self.state.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().documents.is_empty()
    }

    /// Number of successful writes received through `RemoteMirror`.
    pub fn write_count(&self) -> u64 {
        self.state.lock().writes
    }

    /// Number of live subscriptions; closed ones are pruned on access.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.sinks.retain(|sink| !sink.is_closed());
        state.sinks.len()
    }
}

#[async_trait]
impl RemoteMirror for MemoryRemoteMirror {
    async fn put(&self, item: &Item) -> RemoteResult<()> {
        let body =
            serde_json::to_value(item).map_err(|err| RemoteError::Encode(err.to_string()))?;
        let mut state = self.state.lock();
        state.ensure_online()?;
        state.documents.insert(item.id.to_string(), body);
        state.writes += 1;
        state.broadcast();
        debug!("event=remote_put module=remote status=ok id={}", item.id);
        Ok(())
    }

    async fn delete(&self, id: ItemId) -> RemoteResult<()> {
        let mut state = self.state.lock();
        state.ensure_online()?;
        state.writes += 1;
        if state.documents.remove(&id.to_string()).is_some() {
            state.broadcast();
        }
        debug!("event=remote_delete module=remote status=ok id={}", id);
        Ok(())
    }

    async fn subscribe(&self) -> RemoteResult<RemoteSubscription> {
        let mut state = self.state.lock();
        let (sink, subscription) = snapshot_channel();
        sink.publish(state.snapshot());
        state.sinks.push(sink);
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryRemoteMirror;
    use crate::model::item::Item;
    use crate::remote::{RemoteError, RemoteMirror};

    #[tokio::test]
    async fn subscriber_gets_current_collection_on_join() {
        let mirror = MemoryRemoteMirror::new();
        let item = Item::new("Cable", 1, 2.5, 1);
        mirror.put(&item).await.unwrap();

        let mut subscription = mirror.subscribe().await.unwrap();
        let snapshot = subscription.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, item.id.to_string());
    }

    #[tokio::test]
    async fn offline_mirror_rejects_writes() {
        let mirror = MemoryRemoteMirror::new();
        mirror.set_offline(true);
        let err = mirror.put(&Item::new("Cable", 1, 2.5, 1)).await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));
        assert!(mirror.is_empty());
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned() {
        let mirror = MemoryRemoteMirror::new();
        let subscription = mirror.subscribe().await.unwrap();
        assert_eq!(mirror.subscriber_count(), 1);
        drop(subscription);
        assert_eq!(mirror.subscriber_count(), 0);
    }
}
