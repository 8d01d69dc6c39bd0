//! Core of the inventory client: a local-first catalog kept in sync with a
//! shared remote document collection.
//! This crate is the single source of truth for catalog invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod remote;
pub mod repo;
pub mod store;
pub mod sync;
pub mod view;

pub use config::{ConfigError, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use logging::{init_logging, logging_status, LogLevel, LoggingError};
pub use model::item::{Item, ItemId, ItemValidationError};
pub use remote::{
    MemoryRemoteMirror, RemoteDocument, RemoteError, RemoteMirror, RemoteResult, RemoteSnapshot,
    RemoteSubscription,
};
pub use repo::item_repo::{ItemRepository, RepoError, RepoResult, SqliteItemRepository};
pub use store::local_store::{CatalogSnapshot, LocalStore};
pub use sync::clock::{Clock, ManualClock, SystemClock};
pub use sync::engine::SyncEngine;
pub use sync::events::{MutationKind, SyncEvent};
pub use sync::ingest::{
    decode_document, ingest_snapshot, ingest_snapshot_with_pending, IngestReport,
    MalformedRemoteRecord,
};
pub use sync::outbound::Mutation;
pub use sync::pending::PendingDeletes;
pub use view::catalog::{CatalogSummary, CatalogView};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
