//! Local deletes not yet settled with the remote mirror.
//!
//! # Responsibility
//! - Remember every locally deleted id together with its delete stamp.
//! - Hold back remote versions that predate a pending delete.
//!
//! # Invariants
//! - An entry is recorded before the local row is removed.
//! - An entry is dropped only after the remote delete was acknowledged and a
//!   later snapshot no longer carries the document, or when the id is
//!   written locally again.
//! - A remote version stamped after the delete is never held back.

use crate::model::item::{Item, ItemId};
use crate::remote::RemoteDocument;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy)]
struct PendingDelete {
    deleted_at: i64,
    acknowledged: bool,
}

/// Ledger of local deletes awaiting remote settlement.
#[derive(Debug, Default)]
pub struct PendingDeletes {
    entries: Mutex<HashMap<ItemId, PendingDelete>>,
}

impl PendingDeletes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a local delete. Re-deleting keeps the latest stamp.
    pub fn record(&self, id: ItemId, deleted_at: i64) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(id).or_insert(PendingDelete {
            deleted_at,
            acknowledged: false,
        });
        entry.deleted_at = entry.deleted_at.max(deleted_at);
        entry.acknowledged = false;
    }

    /// Forgets the delete because the id was written locally again.
    pub fn clear(&self, id: ItemId) {
        self.entries.lock().remove(&id);
    }

    /// Marks the remote delete for `id` as applied by the mirror.
    pub fn acknowledge(&self, id: ItemId) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.acknowledged = true;
        }
    }

    /// Whether `item` is a remote version the local delete supersedes.
    pub fn holds_back(&self, item: &Item) -> bool {
        self.entries
            .lock()
            .get(&item.id)
            .is_some_and(|entry| item.updated_at <= entry.deleted_at)
    }

    /// Drops acknowledged entries whose document is gone from `snapshot`.
    pub fn settle(&self, snapshot: &[RemoteDocument]) {
        let present: HashSet<&str> = snapshot.iter().map(|doc| doc.id.as_str()).collect();
        self.entries.lock().retain(|id, entry| {
            !entry.acknowledged || present.contains(id.to_string().as_str())
        });
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::PendingDeletes;
    use crate::model::item::Item;
    use crate::remote::RemoteDocument;
    use serde_json::json;

    #[test]
    fn holds_back_only_versions_up_to_the_delete_stamp() {
        let pending = PendingDeletes::new();
        let stale = Item::new("Mouse", 3, 20.0, 100);
        pending.record(stale.id, 150);

        let mut newer = stale.clone();
        newer.updated_at = 151;
        assert!(pending.holds_back(&stale));
        assert!(!pending.holds_back(&newer));
        assert!(!pending.holds_back(&Item::new("Cable", 1, 1.0, 1)));
    }

    #[test]
    fn settles_only_after_acknowledgement_and_absence() {
        let pending = PendingDeletes::new();
        let item = Item::new("Mouse", 3, 20.0, 100);
        let present = vec![RemoteDocument::new(item.id.to_string(), json!({}))];
        pending.record(item.id, 150);

        pending.settle(&[]);
        assert!(pending.contains(item.id));

        pending.acknowledge(item.id);
        pending.settle(&present);
        assert!(pending.contains(item.id));

        pending.settle(&[]);
        assert!(pending.is_empty());
    }

    #[test]
    fn local_rewrite_clears_the_entry() {
        let pending = PendingDeletes::new();
        let item = Item::new("Mouse", 3, 20.0, 100);
        pending.record(item.id, 150);
        pending.clear(item.id);
        assert!(!pending.holds_back(&item));
        assert_eq!(pending.len(), 0);
    }
}
