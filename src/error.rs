use std::path::PathBuf;
use thiserror::Error;

use crate::types::SourceKind;

pub type Result<T> = std::result::Result<T, FinderError>;

#[derive(Debug, Error)]
pub enum FinderError {
    /// Network failure, timeout or non-success status from one source
    #[error("{site} unavailable: {reason}")]
    SourceUnavailable { site: SourceKind, reason: String },

    #[error("dedup store {path:?} is corrupt: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("failed to write dedup store {path:?}: {reason}")]
    StoreWrite { path: PathBuf, reason: String },

    #[error("notification failed: {0}")]
    NotificationSend(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FinderError {
    /// Store failures end the run with a non-zero exit; everything else is
    /// recovered where it happens.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FinderError::StoreCorrupt { .. } | FinderError::StoreWrite { .. } | FinderError::Config(_)
        )
    }
}
