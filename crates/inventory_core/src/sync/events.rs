//! Asynchronous outcomes of the engine's background work.
//!
//! Remote-path results never reach the caller of a mutation; they are logged
//! and broadcast here so hosts (and tests) can react to them.

use super::ingest::IngestReport;
use crate::model::item::ItemId;
use crate::remote::RemoteError;

/// Kind of mutation forwarded to the remote mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Put,
    Delete,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    RemoteWriteSucceeded {
        kind: MutationKind,
        id: ItemId,
    },
    /// Propagation failed; the local write stays in place.
    RemoteWriteFailed {
        kind: MutationKind,
        id: ItemId,
        error: RemoteError,
    },
    SnapshotIngested(IngestReport),
    /// A whole snapshot could not be merged locally; the next one is retried.
    IngestFailed {
        error: String,
    },
    /// The change feed failed or ended; the engine resubscribes after backoff.
    SubscriptionLost {
        error: Option<RemoteError>,
    },
}
