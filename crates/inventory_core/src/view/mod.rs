//! Read-only projections for presentation code.

pub mod catalog;
