//! Write path forwarding: local mutations to the remote mirror.
//!
//! # Responsibility
//! - Queue committed local mutations for remote propagation.
//! - Run a fixed pool of worker lanes owned by the engine.
//!
//! # Invariants
//! - At most `outbound_workers` remote writes are in flight at once.
//! - Mutations of one item always go through the same lane, in order.
//! - Remote failures are logged and broadcast, never returned to callers.
//! - An acknowledged remote delete is reported to the pending-delete ledger.

use super::events::{MutationKind, SyncEvent};
use super::pending::PendingDeletes;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::item::{Item, ItemId};
use crate::remote::RemoteMirror;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A committed local change waiting to be mirrored remotely.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Put(Item),
    Delete(ItemId),
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Put(_) => MutationKind::Put,
            Self::Delete(_) => MutationKind::Delete,
        }
    }

    pub fn id(&self) -> ItemId {
        match self {
            Self::Put(item) => item.id,
            Self::Delete(id) => *id,
        }
    }
}

/// Bounded pool of outbound worker lanes.
pub(crate) struct OutboundPool {
    lanes: RwLock<Option<Vec<mpsc::Sender<Mutation>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl OutboundPool {
    pub(crate) fn spawn(
        remote: Arc<dyn RemoteMirror>,
        pending: Arc<PendingDeletes>,
        config: &SyncConfig,
        events: broadcast::Sender<SyncEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let mut lanes = Vec::with_capacity(config.outbound_workers);
        let mut workers = Vec::with_capacity(config.outbound_workers);

        for lane in 0..config.outbound_workers {
            let (tx, rx) = mpsc::channel(config.outbound_queue_capacity);
            lanes.push(tx);
            workers.push(tokio::spawn(run_lane(
                lane,
                rx,
                Arc::clone(&remote),
                Arc::clone(&pending),
                events.clone(),
                cancel.clone(),
            )));
        }

        Self {
            lanes: RwLock::new(Some(lanes)),
            workers: Mutex::new(workers),
        }
    }

    /// Queues a mutation, waiting for room when its lane is full.
    pub(crate) async fn submit(&self, mutation: Mutation) -> SyncResult<()> {
        let lane = {
            let lanes = self.lanes.read();
            let lanes = lanes.as_ref().ok_or(SyncError::EngineClosed)?;
            lanes[lane_index(mutation.id(), lanes.len())].clone()
        };
        lane.send(mutation)
            .await
            .map_err(|_| SyncError::EngineClosed)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lanes.read().is_none()
    }

    /// Stops accepting mutations and hands back the workers to join.
    ///
    /// Workers keep draining what is already queued until their lane is empty.
    pub(crate) fn close(&self) -> Vec<JoinHandle<()>> {
        self.lanes.write().take();
        std::mem::take(&mut *self.workers.lock())
    }
}

fn lane_index(id: ItemId, lanes: usize) -> usize {
    (id.as_u128() % lanes as u128) as usize
}

async fn run_lane(
    lane: usize,
    mut queue: mpsc::Receiver<Mutation>,
    remote: Arc<dyn RemoteMirror>,
    pending: Arc<PendingDeletes>,
    events: broadcast::Sender<SyncEvent>,
    cancel: CancellationToken,
) {
    debug!("event=outbound_lane module=sync status=start lane={}", lane);
    loop {
        let mutation = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = queue.recv() => match next {
                Some(mutation) => mutation,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = forward(remote.as_ref(), &pending, &mutation, &events) => {}
        }
    }
    debug!("event=outbound_lane module=sync status=stopped lane={}", lane);
}

async fn forward(
    remote: &dyn RemoteMirror,
    pending: &PendingDeletes,
    mutation: &Mutation,
    events: &broadcast::Sender<SyncEvent>,
) {
    let (kind, id) = (mutation.kind(), mutation.id());
    let result = match mutation {
        Mutation::Put(item) => remote.put(item).await,
        Mutation::Delete(id) => remote.delete(*id).await,
    };

    let event = match result {
        Ok(()) => {
            if kind == MutationKind::Delete {
                pending.acknowledge(id);
            }
            debug!(
                "event=remote_write module=sync status=ok op={} id={}",
                kind.as_str(),
                id
            );
            SyncEvent::RemoteWriteSucceeded { kind, id }
        }
        Err(error) => {
            warn!(
                "event=remote_write module=sync status=error op={} id={} error={}",
                kind.as_str(),
                id,
                error
            );
            SyncEvent::RemoteWriteFailed { kind, id, error }
        }
    };
    let _ = events.send(event);
}

#[cfg(test)]
mod tests {
    use super::lane_index;
    use uuid::Uuid;

    #[test]
    fn lane_index_is_stable_and_in_range() {
        let id = Uuid::new_v4();
        let first = lane_index(id, 4);
        assert!(first < 4);
        assert_eq!(first, lane_index(id, 4));
        assert_eq!(lane_index(id, 1), 0);
    }
}
