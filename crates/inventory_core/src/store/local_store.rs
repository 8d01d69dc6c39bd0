//! Durable local catalog with live snapshots.
//!
//! # Responsibility
//! - Own the single SQLite connection holding the on-device catalog.
//! - Publish an immutable ordered snapshot to observers after each change.
//!
//! # Invariants
//! - Writers are serialized; readers never see a partially applied item.
//! - A snapshot is taken inside the same transaction as the write that
//!   produced it, so published snapshots follow commit order.
//! - Late subscribers observe the latest snapshot immediately.

use crate::db::{open_db, open_db_in_memory};
use crate::model::item::{Item, ItemId};
use crate::repo::item_repo::{ItemRepository, RepoResult, SqliteItemRepository};
use log::{debug, error};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Immutable ordered view of the whole catalog.
pub type CatalogSnapshot = Arc<Vec<Item>>;

/// Local, durable, observable catalog table.
pub struct LocalStore {
    conn: Mutex<Connection>,
    snapshots: watch::Sender<CatalogSnapshot>,
}

impl LocalStore {
    /// Opens (or creates) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::from_connection(open_db(path)?)
    }

    /// Opens a store that lives only as long as this instance.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::from_connection(open_db_in_memory()?)
    }

    /// Wraps an already migrated connection and loads the initial snapshot.
    pub fn from_connection(conn: Connection) -> RepoResult<Self> {
        let initial = SqliteItemRepository::new(&conn).list_items()?;
        let (snapshots, _) = watch::channel(Arc::new(initial));
        Ok(Self {
            conn: Mutex::new(conn),
            snapshots,
        })
    }

    /// Inserts or fully replaces the row keyed by `item.id`.
    ///
    /// Returns whether the table changed. Re-applying an identical item is a
    /// no-op and does not notify observers.
    pub fn upsert(&self, item: &Item) -> RepoResult<bool> {
        self.mutate("upsert", |repo| repo.upsert_item(item))
    }

    /// Upserts `item`, raising `updated_at` above the stored row if needed.
    ///
    /// Returns the item exactly as written. The read and the write happen
    /// under one lock, so a concurrent merge cannot slip in between.
    pub fn upsert_monotonic(&self, item: &Item) -> RepoResult<Item> {
        let mut written = item.clone();
        self.mutate("upsert", |repo| {
            if let Some(stored) = repo.get_item(written.id)? {
                written.updated_at = written
                    .updated_at
                    .max(stored.updated_at.saturating_add(1));
            }
            repo.upsert_item(&written)
        })?;
        Ok(written)
    }

    /// Removes the row keyed by `id`. Absent rows are not an error.
    pub fn delete(&self, id: ItemId) -> RepoResult<bool> {
        self.mutate("delete", |repo| repo.delete_item(id))
    }

    /// Applies each item only if it is absent locally or strictly newer.
    ///
    /// The whole batch commits atomically and notifies observers once.
    /// Returns one flag per input item telling whether it was applied.
    pub fn merge_newer(&self, items: &[Item]) -> RepoResult<Vec<bool>> {
        let outcomes = self.merge_newer_unless(items, |_| false)?;
        Ok(outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or(false))
            .collect())
    }

    /// Like `merge_newer`, but skips every item `hold_back` selects.
    ///
    /// `hold_back` runs under the write lock, so it sees any bookkeeping
    /// recorded before a concurrent local write took the lock. Skipped items
    /// yield `None`.
    pub fn merge_newer_unless(
        &self,
        items: &[Item],
        hold_back: impl Fn(&Item) -> bool,
    ) -> RepoResult<Vec<Option<bool>>> {
        let mut outcomes = Vec::with_capacity(items.len());
        self.mutate("merge", |repo| {
            for item in items {
                let outcome = if hold_back(item) {
                    None
                } else {
                    Some(repo.upsert_item_if_newer(item)?)
                };
                outcomes.push(outcome);
            }
            Ok(outcomes.iter().any(|outcome| *outcome == Some(true)))
        })?;
        Ok(outcomes)
    }

    pub fn get(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let conn = self.conn.lock();
        SqliteItemRepository::new(&conn).get_item(id)
    }

    /// Full scan ordered by `name`, ties broken by `id`.
    pub fn list_all(&self) -> RepoResult<Vec<Item>> {
        let conn = self.conn.lock();
        SqliteItemRepository::new(&conn).list_items()
    }

    /// Latest published snapshot without touching the database.
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Subscribes to snapshots; the current one is available right away.
    pub fn observe(&self) -> watch::Receiver<CatalogSnapshot> {
        self.snapshots.subscribe()
    }

    fn mutate(
        &self,
        op: &'static str,
        write: impl FnOnce(&SqliteItemRepository<'_>) -> RepoResult<bool>,
    ) -> RepoResult<bool> {
        let mut conn = self.conn.lock();
        let result = write_and_snapshot(&mut conn, write);

        match result {
            Ok((changed, items)) => {
                if let Some(items) = items {
                    debug!(
                        "event=store_write module=store status=ok op={} rows={}",
                        op,
                        items.len()
                    );
                    self.snapshots.send_replace(Arc::new(items));
                }
                Ok(changed)
            }
            Err(err) => {
                error!(
                    "event=store_write module=store status=error op={} error={}",
                    op, err
                );
                Err(err)
            }
        }
    }
}

fn write_and_snapshot(
    conn: &mut Connection,
    write: impl FnOnce(&SqliteItemRepository<'_>) -> RepoResult<bool>,
) -> RepoResult<(bool, Option<Vec<Item>>)> {
    let tx = conn.transaction()?;
    let (changed, items) = {
        let repo = SqliteItemRepository::new(&tx);
        let changed = write(&repo)?;
        let items = if changed {
            Some(repo.list_items()?)
        } else {
            None
        };
        (changed, items)
    };
    tx.commit()?;
    Ok((changed, items))
}
