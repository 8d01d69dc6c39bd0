//! Item domain model.
//!
//! # Responsibility
//! - Define the canonical catalog record shared by local and remote stores.
//! - Own shape validation for every write path (local mutation or remote ingest).
//!
//! # Invariants
//! - `id` is stable and never reused for another item.
//! - `updated_at` is the only conflict signal between stores.
//! - An item is always written as one unit; there are no partial updates.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier joining the local row and the remote document.
pub type ItemId = Uuid;

/// Catalog entry tracked on device and mirrored remotely.
///
/// Serialized with camelCase keys, which is also the remote document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    /// Non-empty display label.
    pub name: String,
    pub quantity: i64,
    /// Older clients wrote this field as `price`.
    #[serde(alias = "price")]
    pub unit_price: f64,
    /// Unix epoch milliseconds of the last write, from whichever side wrote it.
    pub updated_at: i64,
}

/// Shape violations rejected before any write.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValidationError {
    EmptyName,
    NegativeQuantity(i64),
    InvalidUnitPrice(f64),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "item name must not be empty"),
            Self::NegativeQuantity(value) => {
                write!(f, "item quantity must be >= 0, got {value}")
            }
            Self::InvalidUnitPrice(value) => {
                write!(f, "item unit price must be a positive number, got {value}")
            }
        }
    }
}

impl Error for ItemValidationError {}

impl Item {
    /// Creates an item with a freshly generated id.
    pub fn new(name: impl Into<String>, quantity: i64, unit_price: f64, updated_at: i64) -> Self {
        Self::with_id(Uuid::new_v4(), name, quantity, unit_price, updated_at)
    }

    /// Creates an item with a caller-provided id.
    ///
    /// Used when identity already exists, e.g. documents from another client.
    pub fn with_id(
        id: ItemId,
        name: impl Into<String>,
        quantity: i64,
        unit_price: f64,
        updated_at: i64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            quantity,
            unit_price,
            updated_at,
        }
    }

    /// Checks the structural rules shared by every write path.
    ///
    /// # Errors
    /// - `EmptyName` when `name` is empty or whitespace only.
    /// - `NegativeQuantity` when `quantity < 0`.
    /// - `InvalidUnitPrice` when `unit_price` is not finite or not `> 0`.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.name.trim().is_empty() {
            return Err(ItemValidationError::EmptyName);
        }
        if self.quantity < 0 {
            return Err(ItemValidationError::NegativeQuantity(self.quantity));
        }
        if !self.unit_price.is_finite() || self.unit_price <= 0.0 {
            return Err(ItemValidationError::InvalidUnitPrice(self.unit_price));
        }
        Ok(())
    }

    /// Value of the stock on hand for this item.
    pub fn stock_value(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }

    /// Returns whether `other` should replace `self` under last-writer-wins.
    ///
    /// Ties keep `self`, so re-applying the same version is a no-op.
    pub fn is_superseded_by(&self, other: &Item) -> bool {
        other.updated_at > self.updated_at
    }
}
