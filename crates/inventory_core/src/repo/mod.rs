//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for the catalog table.
//! - Isolate SQLite query details from the store and sync layers.
//!
//! # Invariants
//! - Repository writes enforce `Item::validate()` before persistence.

pub mod item_repo;
