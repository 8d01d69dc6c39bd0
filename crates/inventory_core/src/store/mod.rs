//! On-device catalog store.
//!
//! # Responsibility
//! - Expose the durable catalog as an explicitly constructed, shareable handle.
//! - Publish live snapshots for projections such as `CatalogView`.

pub mod local_store;
