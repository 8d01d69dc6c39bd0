//! Synchronization between the local store and the remote mirror.
//!
//! # Responsibility
//! - Write path: commit locally, then forward through a bounded worker pool.
//! - Ingestion path: merge the remote change feed under last-writer-wins.
//!
//! # Invariants
//! - No transaction spans both stores; consistency is eventual.
//! - Items missing from a remote snapshot are never deleted locally.

pub mod clock;
pub mod engine;
pub mod events;
pub mod ingest;
pub mod outbound;
pub mod pending;
