//! Remote document collection boundary.
//!
//! # Responsibility
//! - Define the contract the sync engine expects from the shared remote
//!   collection: put, delete and a full-collection change feed.
//! - Provide the subscription plumbing adapters use to feed snapshots in.
//!
//! # Invariants
//! - Remote failures never roll back local writes; callers only log them.
//! - A subscription always yields the latest full snapshot, and holds at most
//!   one undelivered snapshot regardless of how fast the remote changes.
//! - Dropping a `RemoteSubscription` unsubscribes it.

pub mod memory;
pub mod subscription;

use crate::model::item::{Item, ItemId};
use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use memory::MemoryRemoteMirror;
pub use subscription::{snapshot_channel, RemoteSubscription, SnapshotSink};

/// One raw document as stored remotely, keyed by its document id.
///
/// The body is kept untyped: documents may come from other clients and are
/// only decoded into `Item` during ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub id: String,
    pub body: Value,
}

impl RemoteDocument {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }
}

/// Full state of the remote collection at one point in time.
pub type RemoteSnapshot = Vec<RemoteDocument>;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Propagation failure reported by a remote adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Connectivity problem; the adapter may retry later.
    Unavailable(String),
    /// The remote refused the document.
    Rejected { id: String, message: String },
    /// Encoding the outgoing document failed.
    Encode(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "remote unavailable: {message}"),
            Self::Rejected { id, message } => {
                write!(f, "remote rejected document {id}: {message}")
            }
            Self::Encode(message) => write!(f, "failed to encode remote document: {message}"),
        }
    }
}

impl Error for RemoteError {}

/// Shared multi-writer document collection mirrored by the engine.
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Writes the full document for `item`, replacing any previous version.
    async fn put(&self, item: &Item) -> RemoteResult<()>;

    /// Deletes the document keyed by `id`; deleting a missing document is ok.
    async fn delete(&self, id: ItemId) -> RemoteResult<()>;

    /// Starts a change feed that yields the full collection after every
    /// remote mutation, from any writer.
    async fn subscribe(&self) -> RemoteResult<RemoteSubscription>;
}
