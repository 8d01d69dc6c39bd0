//! Live catalog projection.
//!
//! # Responsibility
//! - Re-derive the ordered catalog from `LocalStore` snapshots.
//! - Compute the summary figures shown next to the list.
//!
//! # Invariants
//! - No merge logic lives here; the view only reads published snapshots.
//! - The first `changed()` on a new view yields the current snapshot.

use crate::model::item::{Item, ItemId};
use crate::store::local_store::CatalogSnapshot;
use tokio::sync::watch;

/// Aggregate figures over the whole catalog.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CatalogSummary {
    pub total_items: usize,
    /// Sum of `quantity * unit_price` over all items.
    pub total_stock_value: f64,
}

impl CatalogSummary {
    pub fn from_items(items: &[Item]) -> Self {
        Self {
            total_items: items.len(),
            total_stock_value: items.iter().map(Item::stock_value).sum(),
        }
    }
}

/// Continuously updated, ordered view of the local catalog.
#[derive(Debug, Clone)]
pub struct CatalogView {
    snapshots: watch::Receiver<CatalogSnapshot>,
}

impl CatalogView {
    pub fn new(mut snapshots: watch::Receiver<CatalogSnapshot>) -> Self {
        snapshots.mark_changed();
        Self { snapshots }
    }

    /// Latest snapshot, ordered by name then id.
    pub fn current(&self) -> CatalogSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Waits for the next snapshot not yet returned by this view.
    ///
    /// Returns `None` once the underlying store has been dropped.
    pub async fn changed(&mut self) -> Option<CatalogSnapshot> {
        self.snapshots.changed().await.ok()?;
        Some(self.snapshots.borrow_and_update().clone())
    }

    pub fn find(&self, id: ItemId) -> Option<Item> {
        self.snapshots
            .borrow()
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary::from_items(&self.snapshots.borrow())
    }
}
