//! Feed loading error types.

use std::time::Duration;

use super::source::FeedTable;

/// Errors that leave the engine without a (new) feed snapshot.
///
/// Malformed rows and out-of-region rows are not errors; they are skipped and
/// counted in the load statistics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataLoadError {
    /// A required table is absent from the source
    #[error("required feed file {file} is missing")]
    Missing { file: FeedTable },

    /// A table exists but cannot be read or parsed as a whole
    #[error("failed to read feed file {file}: {cause}")]
    Unreadable { file: FeedTable, cause: String },

    /// Loading took longer than the configured deadline
    #[error("feed load timed out after {0:?}")]
    Timeout(Duration),

    /// The blocking load task panicked or was cancelled
    #[error("feed load task failed: {0}")]
    Task(String),

    /// The feed configuration cannot produce a usable index
    #[error("invalid feed configuration: {0}")]
    InvalidConfig(String),
}

impl DataLoadError {
    /// The table that caused the failure, if any.
    pub fn file(&self) -> Option<FeedTable> {
        match self {
            DataLoadError::Missing { file } | DataLoadError::Unreadable { file, .. } => Some(*file),
            DataLoadError::Timeout(_)
            | DataLoadError::Task(_)
            | DataLoadError::InvalidConfig(_) => None,
        }
    }
}
