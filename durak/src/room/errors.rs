//! Room error types.

use thiserror::Error;

use crate::{
    db::{InvalidPin, RoomPin, StoreError},
    game::{InvariantViolation, MoveError, SettingsError},
    net::ErrorPayload,
};

#[derive(Debug, Error)]
pub enum RoomError {
    /// The move broke a game rule. Sent to the submitter only.
    #[error(transparent)]
    Rejected(#[from] MoveError),

    /// The room did not get to the request in time.
    #[error("Room {0} is busy, try again")]
    Busy(RoomPin),

    #[error("Room {0} not found")]
    NotFound(RoomPin),

    #[error("Room {pin} is unusable: {reason}")]
    Unusable { pin: RoomPin, reason: String },

    /// The mutation produced a broken state. The room is now unusable.
    #[error("Room {pin} violated an invariant: {source}")]
    Invariant {
        pin: RoomPin,
        #[source]
        source: InvariantViolation,
    },

    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("Room {0} is closed")]
    Closed(RoomPin),

    #[error(transparent)]
    InvalidPin(#[from] InvalidPin),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),
}

impl RoomError {
    /// Whether the same request may succeed if sent again later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Busy(_) => true,
            Self::Persistence(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Snake-case error kind used as the `type` of error payloads.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected(e) => e.kind(),
            Self::Busy(_) => "busy",
            Self::NotFound(_) => "not_found",
            Self::Unusable { .. } => "unusable",
            Self::Invariant { .. } => "invariant_violation",
            Self::Persistence(_) => "persistence",
            Self::Closed(_) => "closed",
            Self::InvalidPin(_) => "invalid_pin",
            Self::Settings(_) => "invalid_settings",
        }
    }

    /// A client-safe error message that doesn't leak storage or state
    /// internals.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Persistence(e) => e.client_message(),
            Self::Invariant { pin, .. } => {
                format!("Room {pin} hit an internal error and was suspended")
            }
            Self::Unusable { pin, .. } => format!("Room {pin} is suspended"),
            _ => self.to_string(),
        }
    }
}

impl From<&RoomError> for ErrorPayload {
    fn from(error: &RoomError) -> Self {
        match error {
            RoomError::Rejected(e) => ErrorPayload::from(e),
            other => {
                let payload = ErrorPayload::new(other.kind(), other.client_message());
                if other.is_retryable() {
                    payload.with_details(serde_json::json!({ "retryable": true }))
                } else {
                    payload
                }
            }
        }
    }
}

pub type RoomResult<T> = Result<T, RoomError>;
