//! Caller-facing errors of the sync engine.
//!
//! # Invariants
//! - Only local-path failures surface here; remote failures are reported
//!   asynchronously as `SyncEvent`s and never fail a caller's request.

use crate::config::ConfigError;
use crate::model::item::ItemValidationError;
use crate::repo::item_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug)]
pub enum SyncError {
    /// Malformed mutation request; nothing was written.
    Validation(ItemValidationError),
    /// Local persistence failed; previously committed rows are intact.
    LocalWrite(RepoError),
    /// Engine configuration was rejected at startup.
    Config(ConfigError),
    /// The engine was shut down before the mutation could be queued remotely.
    EngineClosed,
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::LocalWrite(err) => write!(f, "local write failed: {err}"),
            Self::Config(err) => write!(f, "{err}"),
            Self::EngineClosed => write!(f, "sync engine is shut down"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::LocalWrite(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::EngineClosed => None,
        }
    }
}

impl From<ItemValidationError> for SyncError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ConfigError> for SyncError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<RepoError> for SyncError {
    fn from(value: RepoError) -> Self {
        // Validation is checked before writing, but the repository re-checks;
        // keep the caller-visible category stable either way.
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::LocalWrite(other),
        }
    }
}
