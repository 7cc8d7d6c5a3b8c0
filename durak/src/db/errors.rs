//! Persistence error types.

use std::time::Duration;
use thiserror::Error;

use super::{models::RoomPin, timeouts::TimeoutError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Room {0} not found")]
    NotFound(RoomPin),

    #[error("Room {0} already exists")]
    AlreadyExists(RoomPin),

    /// The stored history no longer ends at the sequence number the commit
    /// was built on.
    #[error("Room {pin} history has moved past seq {expected}")]
    Conflict { pin: RoomPin, expected: u64 },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the write may have been applied even though it reported
    /// failure.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Timeout(_) | Self::Conflict { .. }
        )
    }

    /// Whether retrying the same operation later may succeed. A conflicted
    /// room is reloaded from the store, so the retry meets fresh state.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Timeout(_) | Self::Conflict { .. } | Self::Unavailable(_)
        )
    }

    /// A client-safe error message that doesn't leak storage details.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Serialization(_) | Self::Unavailable(_) => {
                "Internal server error".to_string()
            }
            Self::Timeout(_) => "Storage is busy, try again".to_string(),
            Self::Conflict { pin, .. } => format!("Room {pin} changed underneath the request"),
            _ => self.to_string(),
        }
    }
}

impl From<TimeoutError> for StoreError {
    fn from(error: TimeoutError) -> Self {
        match error {
            TimeoutError::Timeout(duration) => Self::Timeout(duration),
            TimeoutError::Database(e) => Self::Database(e),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
