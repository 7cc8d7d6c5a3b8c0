//! Timeout wrappers for storage operations.

use std::{future::Future, time::Duration};
use tokio::time::timeout;

use super::errors::StoreError;

/// Default timeout for single queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for schema setup (30 seconds)
pub const LONG_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type TimeoutResult<T> = Result<T, TimeoutError>;

/// Run a sqlx future, giving up after `duration`.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> TimeoutResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(TimeoutError::Database(e)),
        Err(_) => Err(TimeoutError::Timeout(duration)),
    }
}

/// Run any store operation, giving up after `duration`.
///
/// Used by room actors so a stalled store cannot hold a room forever.
pub async fn with_store_timeout<F, T>(duration: Duration, future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    timeout(duration, future)
        .await
        .unwrap_or(Err(StoreError::Timeout(duration)))
}
