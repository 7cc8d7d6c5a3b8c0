//! Persisted room records.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::{
    game::{Game, GameSettings, RosterEntry},
    history::HistoryEntry,
};

pub const PIN_LENGTH: usize = 6;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("room pin must be {PIN_LENGTH} digits, got {0:?}")]
pub struct InvalidPin(pub String);

/// Six-digit room identifier.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomPin(String);

impl RoomPin {
    pub fn parse(s: &str) -> Result<Self, InvalidPin> {
        if s.len() == PIN_LENGTH && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidPin(s.to_string()))
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(format!("{:06}", rng.random_range(0..1_000_000)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomPin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomPin {
    type Err = InvalidPin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomPin {
    type Error = InvalidPin;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomPin> for String {
    fn from(pin: RoomPin) -> Self {
        pin.0
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoomStatus {
    #[default]
    Active,
    /// The room's state can no longer be trusted; mutations are refused.
    Unusable { reason: String },
    /// Victory reached. Kept for its history; no longer resumed.
    Finished,
    Closed,
}

impl RoomStatus {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Unusable { reason } => write!(f, "unusable ({reason})"),
            Self::Finished => write!(f, "finished"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Everything stored for a room: settings, roster, latest game state and the
/// full ordered history.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub pin: RoomPin,
    pub settings: GameSettings,
    pub roster: Vec<RosterEntry>,
    pub game: Game,
    pub history: Vec<HistoryEntry>,
    pub status: RoomStatus,
}
