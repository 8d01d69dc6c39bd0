//! Catalog domain model.
//!
//! # Responsibility
//! - Define the data structures shared by the local store, the remote mirror
//!   boundary and the sync engine.
//!
//! # Invariants
//! - Every catalog entry is identified by a stable `ItemId`.
//! - Deletion is a hard delete propagated explicitly, never inferred.

pub mod item;
