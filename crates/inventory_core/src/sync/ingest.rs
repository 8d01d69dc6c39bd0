//! Ingestion path: remote change feed into the local store.
//!
//! # Responsibility
//! - Decode remote documents into items, skipping malformed ones.
//! - Merge each snapshot into `LocalStore` under last-writer-wins.
//! - Keep exactly one subscription alive for the engine's lifetime.
//!
//! # Invariants
//! - A remote version is applied only if the item is absent locally or the
//!   remote `updated_at` is strictly greater; ties keep the local row.
//! - Absence from a snapshot never deletes a local item.
//! - A remote version no newer than a pending local delete is held back, so a
//!   stale redelivery cannot resurrect a deleted item.
//! - Snapshots are applied one at a time; no per-document tasks are spawned.

use super::events::SyncEvent;
use super::pending::PendingDeletes;
use crate::model::item::Item;
use crate::remote::{RemoteDocument, RemoteMirror, RemoteSnapshot, RemoteSubscription};
use crate::repo::item_repo::RepoResult;
use crate::store::local_store::LocalStore;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// A remote document that failed shape validation and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRemoteRecord {
    pub document_id: String,
    pub reason: String,
}

impl Display for MalformedRemoteRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "malformed remote document {}: {}",
            self.document_id, self.reason
        )
    }
}

impl Error for MalformedRemoteRecord {}

/// Outcome of merging one remote snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub applied: usize,
    /// Well-formed documents not newer than the local copy.
    pub discarded: usize,
    /// Well-formed documents superseded by a pending local delete.
    pub held_back: usize,
    pub malformed: Vec<MalformedRemoteRecord>,
}

/// Decodes one remote document into a validated item.
///
/// A body without an `id` field takes the document id; a body whose `id`
/// disagrees with the document id is rejected.
pub fn decode_document(document: &RemoteDocument) -> Result<Item, MalformedRemoteRecord> {
    let malformed = |reason: String| MalformedRemoteRecord {
        document_id: document.id.clone(),
        reason,
    };

    let mut body = document.body.clone();
    let fields = body
        .as_object_mut()
        .ok_or_else(|| malformed("document body is not an object".to_string()))?;
    match fields.get("id") {
        None => {
            fields.insert("id".to_string(), Value::String(document.id.clone()));
        }
        Some(Value::String(id)) if *id == document.id => {}
        Some(other) => {
            return Err(malformed(format!(
                "body id {other} does not match document id"
            )));
        }
    }

    let item: Item = serde_json::from_value(body).map_err(|err| malformed(err.to_string()))?;
    item.validate().map_err(|err| malformed(err.to_string()))?;
    Ok(item)
}

/// Merges a full remote snapshot into the local store.
///
/// Malformed documents are reported and skipped. The well-formed remainder
/// is merged in one atomic batch; an `Err` means nothing was applied.
pub fn ingest_snapshot(store: &LocalStore, snapshot: &[RemoteDocument]) -> RepoResult<IngestReport> {
    ingest_snapshot_with_pending(store, snapshot, &PendingDeletes::new())
}

/// Merges a snapshot while honoring locally deleted ids.
///
/// Acknowledged deletes whose document is gone from `snapshot` are settled
/// afterwards.
pub fn ingest_snapshot_with_pending(
    store: &LocalStore,
    snapshot: &[RemoteDocument],
    pending: &PendingDeletes,
) -> RepoResult<IngestReport> {
    let mut report = IngestReport {
        documents: snapshot.len(),
        ..IngestReport::default()
    };
    let mut candidates = Vec::with_capacity(snapshot.len());

    for document in snapshot {
        match decode_document(document) {
            Ok(item) => candidates.push(item),
            Err(record) => {
                warn!(
                    "event=ingest_record module=sync status=skipped document_id={} reason={}",
                    record.document_id, record.reason
                );
                report.malformed.push(record);
            }
        }
    }

    let outcomes = store.merge_newer_unless(&candidates, |item| pending.holds_back(item))?;
    for outcome in outcomes {
        match outcome {
            Some(true) => report.applied += 1,
            Some(false) => report.discarded += 1,
            None => report.held_back += 1,
        }
    }
    pending.settle(snapshot);
    Ok(report)
}

enum FeedEnd {
    Cancelled,
    Ended,
}

/// Long-lived ingestion loop owned by the engine.
///
/// Resubscribes after `backoff` whenever the feed fails or ends, and exits
/// promptly once `cancel` fires, dropping (and so closing) the subscription.
pub(crate) async fn run_ingestion(
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteMirror>,
    pending: Arc<PendingDeletes>,
    events: broadcast::Sender<SyncEvent>,
    cancel: CancellationToken,
    backoff: Duration,
) {
    info!("event=ingest_loop module=sync status=start");

    loop {
        let subscribed = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = remote.subscribe() => result,
        };

        let lost = match subscribed {
            Ok(mut subscription) => {
                debug!("event=ingest_subscribe module=sync status=ok");
                match consume_feed(&store, &pending, &mut subscription, &events, &cancel).await {
                    FeedEnd::Cancelled => break,
                    FeedEnd::Ended => {
                        warn!("event=ingest_subscribe module=sync status=ended");
                        None
                    }
                }
            }
            Err(err) => {
                warn!(
                    "event=ingest_subscribe module=sync status=error error={}",
                    err
                );
                Some(err)
            }
        };
        let _ = events.send(SyncEvent::SubscriptionLost { error: lost });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
    }

    info!("event=ingest_loop module=sync status=stopped");
}

async fn consume_feed(
    store: &Arc<LocalStore>,
    pending: &Arc<PendingDeletes>,
    subscription: &mut RemoteSubscription,
    events: &broadcast::Sender<SyncEvent>,
    cancel: &CancellationToken,
) -> FeedEnd {
    loop {
        let snapshot = tokio::select! {
            biased;
            _ = cancel.cancelled() => return FeedEnd::Cancelled,
            next = subscription.next() => match next {
                Some(snapshot) => snapshot,
                None => return FeedEnd::Ended,
            },
        };
        apply_snapshot(store, pending, snapshot, events).await;
    }
}

async fn apply_snapshot(
    store: &Arc<LocalStore>,
    pending: &Arc<PendingDeletes>,
    snapshot: Arc<RemoteSnapshot>,
    events: &broadcast::Sender<SyncEvent>,
) {
    let store = Arc::clone(store);
    let pending = Arc::clone(pending);
    let outcome = tokio::task::spawn_blocking(move || {
        ingest_snapshot_with_pending(&store, snapshot.as_slice(), &pending)
    })
    .await;

    let event = match outcome {
        Ok(Ok(report)) => {
            debug!(
                "event=ingest_snapshot module=sync status=ok documents={} applied={} discarded={} held_back={} malformed={}",
                report.documents,
                report.applied,
                report.discarded,
                report.held_back,
                report.malformed.len()
            );
            SyncEvent::SnapshotIngested(report)
        }
        Ok(Err(err)) => {
            error!(
                "event=ingest_snapshot module=sync status=error error={}",
                err
            );
            SyncEvent::IngestFailed {
                error: err.to_string(),
            }
        }
        Err(err) => {
            error!(
                "event=ingest_snapshot module=sync status=error error_code=task_failed error={}",
                err
            );
            SyncEvent::IngestFailed {
                error: err.to_string(),
            }
        }
    };
    let _ = events.send(event);
}
