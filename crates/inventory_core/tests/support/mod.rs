#![allow(dead_code)]

use async_trait::async_trait;
use inventory_core::remote::{snapshot_channel, SnapshotSink};
use inventory_core::{
    Item, ItemId, LocalStore, ManualClock, MutationKind, RemoteDocument, RemoteError,
    RemoteMirror, RemoteResult, RemoteSnapshot, RemoteSubscription, SyncConfig, SyncEngine,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

pub const WAIT: Duration = Duration::from_secs(5);

/// Remote mirror whose writes wait on a gate and whose feed is driven by hand.
pub struct ScriptedMirror {
    gate: Semaphore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    log: Mutex<Vec<(MutationKind, ItemId)>>,
    sink: Mutex<Option<SnapshotSink>>,
}

impl ScriptedMirror {
    /// Writes complete as soon as they arrive.
    pub fn open() -> Self {
        Self::with_permits(Semaphore::MAX_PERMITS)
    }

    /// Writes block until `release` lets them through.
    pub fn gated() -> Self {
        Self::with_permits(0)
    }

    fn with_permits(permits: usize) -> Self {
        Self {
            gate: Semaphore::new(permits),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
        }
    }

    pub fn release(&self, writes: usize) {
        self.gate.add_permits(writes);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Completed writes in the order the mirror applied them.
    pub fn log(&self) -> Vec<(MutationKind, ItemId)> {
        self.log.lock().clone()
    }

    /// Delivers `snapshot` to the engine's subscription once it exists.
    pub async fn publish(&self, snapshot: RemoteSnapshot) {
        eventually(|| self.sink.lock().is_some()).await;
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.publish(snapshot);
        }
    }

    async fn write(&self, kind: MutationKind, id: ItemId) -> RemoteResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|err| RemoteError::Unavailable(err.to_string()));
        if let Ok(permit) = permit {
            permit.forget();
            tokio::task::yield_now().await;
            self.log.lock().push((kind, id));
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RemoteMirror for ScriptedMirror {
    async fn put(&self, item: &Item) -> RemoteResult<()> {
        self.write(MutationKind::Put, item.id).await
    }

    async fn delete(&self, id: ItemId) -> RemoteResult<()> {
        self.write(MutationKind::Delete, id).await
    }

    async fn subscribe(&self) -> RemoteResult<RemoteSubscription> {
        let (sink, subscription) = snapshot_channel();
        *self.sink.lock() = Some(sink);
        Ok(subscription)
    }
}

pub async fn start_scripted(
    mirror: Arc<ScriptedMirror>,
    config: SyncConfig,
) -> (SyncEngine, Arc<ManualClock>) {
    let store = Arc::new(LocalStore::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(10_000));
    let remote: Arc<dyn RemoteMirror> = mirror;
    let engine = SyncEngine::start_with_clock(store, remote, config, clock.clone())
        .await
        .unwrap();
    (engine, clock)
}

pub fn document(item: &Item) -> RemoteDocument {
    RemoteDocument::new(item.id.to_string(), serde_json::to_value(item).unwrap())
}

/// Polls `condition` until it holds, failing the test after `WAIT`.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
