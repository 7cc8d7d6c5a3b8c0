//! Room actor runtime configuration.

use std::time::Duration;

use crate::db::timeouts::DEFAULT_TRANSACTION_TIMEOUT;

/// Runtime limits shared by every room actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// Bounded inbox size per room.
    pub inbox_capacity: usize,

    /// How long a request may wait for a room before it is answered `Busy`.
    pub lock_timeout: Duration,

    /// Upper bound on a single store operation made while holding a room.
    /// Defaults above the Postgres store's own transaction timeout, so a
    /// commit normally reports its own outcome before the room gives up on it.
    pub store_timeout: Duration,

    /// Per-subscriber broadcast buffer.
    pub subscriber_capacity: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 64,
            lock_timeout: Duration::from_secs(2),
            store_timeout: DEFAULT_TRANSACTION_TIMEOUT + Duration::from_secs(2),
            subscriber_capacity: 32,
        }
    }
}

impl RoomConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.inbox_capacity == 0 {
            return Err("Room inbox capacity must be at least 1".to_string());
        }

        if self.subscriber_capacity == 0 {
            return Err("Subscriber capacity must be at least 1".to_string());
        }

        if self.lock_timeout.is_zero() {
            return Err("Room lock timeout must be positive".to_string());
        }

        if self.store_timeout.is_zero() {
            return Err("Store timeout must be positive".to_string());
        }

        Ok(())
    }
}
