//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use durak::{
    RoomConfig,
    db::{DatabaseConfig, timeouts::DEFAULT_TRANSACTION_TIMEOUT},
};
use std::{net::SocketAddr, str::FromStr, time::Duration};

/// Where room records are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// In-process only; rooms are lost on restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid {
                var: "STORAGE".to_string(),
                reason: format!("Unknown backend '{other}', expected 'postgres' or 'memory'"),
            }),
        }
    }
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus exporter address, disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    pub storage: StorageBackend,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Room actor limits
    pub room: RoomConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `storage_override` - Optional storage backend override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        storage_override: Option<StorageBackend>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_env_var("SERVER_BIND")?.unwrap_or_else(default_bind),
        };
        let metrics_bind = parse_env_var("METRICS_BIND")?;

        let storage = match storage_override {
            Some(storage) => storage,
            None => parse_env_var("STORAGE")?.unwrap_or(StorageBackend::Postgres),
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        let defaults = RoomConfig::default();
        let room = RoomConfig {
            inbox_capacity: parse_env_or("ROOM_INBOX_CAPACITY", defaults.inbox_capacity),
            lock_timeout: millis_env_or("ROOM_LOCK_TIMEOUT_MS", defaults.lock_timeout),
            store_timeout: millis_env_or("STORE_TIMEOUT_MS", defaults.store_timeout),
            subscriber_capacity: parse_env_or(
                "ROOM_SUBSCRIBER_CAPACITY",
                defaults.subscriber_capacity,
            ),
        };

        Ok(ServerConfig {
            bind,
            metrics_bind,
            storage,
            database,
            room,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.room.validate().map_err(|reason| ConfigError::Invalid {
            var: "ROOM_*".to_string(),
            reason,
        })?;

        if self.room.store_timeout >= self.room.lock_timeout * 10 {
            log::warn!(
                "STORE_TIMEOUT_MS ({:?}) is far above ROOM_LOCK_TIMEOUT_MS ({:?}); \
                 queued moves will time out behind slow commits",
                self.room.store_timeout,
                self.room.lock_timeout
            );
        }

        if self.storage == StorageBackend::Postgres {
            // A room must not give up on a commit the database may still apply.
            if self.room.store_timeout < DEFAULT_TRANSACTION_TIMEOUT {
                return Err(ConfigError::Invalid {
                    var: "STORE_TIMEOUT_MS".to_string(),
                    reason: format!(
                        "Must be at least the database transaction timeout ({DEFAULT_TRANSACTION_TIMEOUT:?})"
                    ),
                });
            }

            if self.database.database_url.is_empty() {
                return Err(ConfigError::MissingRequired {
                    var: "DATABASE_URL".to_string(),
                    hint: "Set it or run with STORAGE=memory".to_string(),
                });
            }

            if self.database.min_connections > self.database.max_connections {
                return Err(ConfigError::Invalid {
                    var: "DB_MIN_CONNECTIONS".to_string(),
                    reason: format!(
                        "Cannot exceed DB_MAX_CONNECTIONS ({})",
                        self.database.max_connections
                    ),
                });
            }
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from SERVER_BIND ({})", self.bind),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6969))
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn millis_env_or(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(default, Duration::from_millis)
}

/// `Ok(None)` when unset, an error when set but unparsable.
fn parse_env_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|e| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("'{value}': {e}"),
        }),
        Err(_) => Ok(None),
    }
}
