//! Item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide point lookup, ordered scan and atomic upsert/delete over `items`.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Item::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Every write is a single statement, so a row is never partially updated.

use crate::db::DbError;
use crate::model::item::{Item, ItemId, ItemValidationError};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    name,
    quantity,
    unit_price,
    updated_at
FROM items";

// The trailing WHERE turns a no-op replace into zero changed rows.
const UPSERT_SQL: &str = "INSERT INTO items (id, name, quantity, unit_price, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        quantity = excluded.quantity,
        unit_price = excluded.unit_price,
        updated_at = excluded.updated_at
     WHERE items.name IS NOT excluded.name
        OR items.quantity IS NOT excluded.quantity
        OR items.unit_price IS NOT excluded.unit_price
        OR items.updated_at IS NOT excluded.updated_at;";

const UPSERT_IF_NEWER_SQL: &str = "INSERT INTO items (id, name, quantity, unit_price, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        quantity = excluded.quantity,
        unit_price = excluded.unit_price,
        updated_at = excluded.updated_at
     WHERE excluded.updated_at > items.updated_at;";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for item persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ItemValidationError),
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the catalog table.
pub trait ItemRepository {
    /// Inserts or fully replaces a row. Returns whether the table changed.
    fn upsert_item(&self, item: &Item) -> RepoResult<bool>;
    /// Writes `item` only when absent or strictly newer than the stored row.
    fn upsert_item_if_newer(&self, item: &Item) -> RepoResult<bool>;
    /// Removes a row. Returns whether a row existed.
    fn delete_item(&self, id: ItemId) -> RepoResult<bool>;
    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>>;
    /// Full scan ordered by `name`, then `id`.
    fn list_items(&self) -> RepoResult<Vec<Item>>;
}

/// SQLite-backed item repository.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn write(&self, sql: &str, item: &Item) -> RepoResult<bool> {
        item.validate()?;
        let changed = self.conn.execute(
            sql,
            params![
                item.id.to_string(),
                item.name.as_str(),
                item.quantity,
                item.unit_price,
                item.updated_at,
            ],
        )?;
        Ok(changed > 0)
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn upsert_item(&self, item: &Item) -> RepoResult<bool> {
        self.write(UPSERT_SQL, item)
    }

    fn upsert_item_if_newer(&self, item: &Item) -> RepoResult<bool> {
        self.write(UPSERT_IF_NEWER_SQL, item)
    }

    fn delete_item(&self, id: ItemId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM items WHERE id = ?1;", [id.to_string()])?;
        Ok(changed > 0)
    }

    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{ITEM_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }

        Ok(None)
    }

    fn list_items(&self) -> RepoResult<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{ITEM_SELECT_SQL} ORDER BY name ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();

        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }

        Ok(items)
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in items.id"))
    })?;

    let item = Item {
        id,
        name: row.get("name")?,
        quantity: row.get("quantity")?,
        unit_price: row.get("unit_price")?,
        updated_at: row.get("updated_at")?,
    };
    item.validate()?;
    Ok(item)
}
