//! Bidirectional sync engine.
//!
//! # Responsibility
//! - Accept validated catalog mutations, commit them locally, then queue them
//!   for the remote mirror (local-first write path).
//! - Own the single remote subscription that feeds the ingestion path.
//! - Tie every background task to the engine's lifetime.
//!
//! # Invariants
//! - A mutation request returns only after its local write committed or failed.
//! - Remote outcomes never fail or revert a local write.
//! - After `shutdown()` returns, no engine task is still writing to the store,
//!   including when several callers shut down concurrently.
//! - A local delete stays in effect until the remote mirror has settled it.

use super::clock::{Clock, SystemClock};
use super::events::SyncEvent;
use super::ingest::run_ingestion;
use super::outbound::{Mutation, OutboundPool};
use super::pending::PendingDeletes;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::item::{Item, ItemId};
use crate::remote::RemoteMirror;
use crate::repo::item_repo::RepoResult;
use crate::store::local_store::LocalStore;
use crate::view::catalog::CatalogView;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Local-first sync engine over one `LocalStore` and one `RemoteMirror`.
pub struct SyncEngine {
    store: Arc<LocalStore>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    outbound: OutboundPool,
    pending: Arc<PendingDeletes>,
    events: broadcast::Sender<SyncEvent>,
    ingestion: Mutex<Option<JoinHandle<()>>>,
    ingest_cancel: CancellationToken,
    lifetime: CancellationToken,
    // Held for the whole shutdown; `true` once it completed.
    shutdown_done: AsyncMutex<bool>,
}

impl SyncEngine {
    /// Starts the engine using the system clock.
    ///
    /// Spawns the outbound worker pool and the ingestion loop on the current
    /// tokio runtime.
    pub async fn start(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteMirror>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        Self::start_with_clock(store, remote, config, Arc::new(SystemClock)).await
    }

    /// Starts the engine with an explicit time source.
    pub async fn start_with_clock(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteMirror>,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> SyncResult<Self> {
        config.validate()?;

        let (events, _) = broadcast::channel(config.event_channel_capacity);
        let lifetime = CancellationToken::new();
        let ingest_cancel = lifetime.child_token();
        let pending = Arc::new(PendingDeletes::new());

        let outbound = OutboundPool::spawn(
            Arc::clone(&remote),
            Arc::clone(&pending),
            &config,
            events.clone(),
            lifetime.child_token(),
        );
        let ingestion = tokio::spawn(run_ingestion(
            Arc::clone(&store),
            remote,
            Arc::clone(&pending),
            events.clone(),
            ingest_cancel.clone(),
            config.resubscribe_backoff(),
        ));

        info!(
            "event=engine_start module=sync status=ok outbound_workers={} queue_capacity={}",
            config.outbound_workers, config.outbound_queue_capacity
        );

        Ok(Self {
            store,
            clock,
            config,
            outbound,
            pending,
            events,
            ingestion: Mutex::new(Some(ingestion)),
            ingest_cancel,
            lifetime,
            shutdown_done: AsyncMutex::new(false),
        })
    }

    /// Creates a new item and queues it for the remote mirror.
    ///
    /// # Errors
    /// - `SyncError::Validation` for an empty name, negative quantity or
    ///   non-positive price; nothing is written.
    /// - `SyncError::LocalWrite` when the local store rejects the write.
    /// - `SyncError::EngineClosed` after `shutdown()`.
    pub async fn add_item(
        &self,
        name: impl Into<String>,
        quantity: i64,
        unit_price: f64,
    ) -> SyncResult<Item> {
        let item = Item::new(name, quantity, unit_price, self.clock.now_ms());
        self.write(&item, "add").await
    }

    /// Replaces an existing item (or re-creates it) with a fresh timestamp.
    ///
    /// The stamp is the current time, raised above the stored version when
    /// the clock lags behind it, so a local edit always supersedes what the
    /// device last saw.
    pub async fn update_item(&self, item: &Item) -> SyncResult<Item> {
        let mut item = item.clone();
        item.updated_at = self.clock.now_ms();
        self.write(&item, "update").await
    }

    /// Deletes an item locally and propagates the delete remotely.
    pub async fn delete_item(&self, item: &Item) -> SyncResult<()> {
        self.delete_item_by_id(item.id).await
    }

    /// Deletes by id. Deleting an unknown id still propagates remotely.
    ///
    /// Until the mirror acknowledges the delete and stops listing the
    /// document, remote versions stamped at or before the delete are ignored.
    pub async fn delete_item_by_id(&self, id: ItemId) -> SyncResult<()> {
        self.ensure_open()?;
        let now = self.clock.now_ms();
        let deleted_at = match self.store.get(id)? {
            Some(stored) => now.max(stored.updated_at),
            None => now,
        };
        self.pending.record(id, deleted_at);
        let removed = self.store.delete(id)?;
        info!(
            "event=item_delete module=sync status=ok id={} existed={}",
            id, removed
        );
        self.enqueue(Mutation::Delete(id)).await;
        Ok(())
    }

    pub fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        self.store.get(id)
    }

    /// Live, ordered view of the local catalog.
    pub fn observe_catalog(&self) -> CatalogView {
        CatalogView::new(self.store.observe())
    }

    /// Feed of asynchronous remote-path outcomes.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        !self.lifetime.is_cancelled() && !self.outbound.is_closed()
    }

    /// Local deletes not yet settled with the remote mirror.
    pub fn pending_deletes(&self) -> &PendingDeletes {
        &self.pending
    }

    /// Stops ingestion, drains queued remote writes and joins every task.
    ///
    /// Workers that do not finish within `shutdown_drain_timeout_ms` are
    /// cancelled. Calling this more than once is harmless; concurrent callers
    /// all return after the first one finished.
    pub async fn shutdown(&self) {
        let mut done = self.shutdown_done.lock().await;
        if *done {
            return;
        }
        info!("event=engine_shutdown module=sync status=start");

        self.ingest_cancel.cancel();
        let ingestion = self.ingestion.lock().take();
        if let Some(handle) = ingestion {
            if let Err(err) = handle.await {
                warn!(
                    "event=engine_shutdown module=sync status=error task=ingestion error={}",
                    err
                );
            }
        }

        let workers = self.outbound.close();
        let drain = async {
            for worker in workers {
                if let Err(err) = worker.await {
                    warn!(
                        "event=engine_shutdown module=sync status=error task=outbound error={}",
                        err
                    );
                }
            }
        };
        let drained = tokio::time::timeout(self.config.shutdown_drain_timeout(), drain)
            .await
            .is_ok();
        self.lifetime.cancel();
        *done = true;

        info!(
            "event=engine_shutdown module=sync status=ok drained={}",
            drained
        );
    }

    async fn write(&self, item: &Item, op: &'static str) -> SyncResult<Item> {
        item.validate()?;
        self.ensure_open()?;

        let written = self.store.upsert_monotonic(item)?;
        self.pending.clear(written.id);
        info!(
            "event=item_{} module=sync status=ok id={} updated_at={}",
            op, written.id, written.updated_at
        );
        self.enqueue(Mutation::Put(written.clone())).await;
        Ok(written)
    }

    // The local write has already committed; losing the race with shutdown
    // only costs the remote copy, which is reported like any remote failure.
    async fn enqueue(&self, mutation: Mutation) {
        let (kind, id) = (mutation.kind(), mutation.id());
        if let Err(err) = self.outbound.submit(mutation).await {
            warn!(
                "event=outbound_enqueue module=sync status=error op={} id={} error={}",
                kind.as_str(),
                id,
                err
            );
        }
    }

    fn ensure_open(&self) -> SyncResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(SyncError::EngineClosed)
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
