//! Game engine error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entities::{Card, PlayerId};

/// A rejected move. The game state is untouched whenever one of these is
/// returned.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MoveError {
    #[error("invalid card: {reason}")]
    InvalidCard { reason: String },

    #[error("it is not your turn")]
    NotYourTurn,

    #[error("the table already holds the maximum number of attacks")]
    TableFull,

    #[error("{card} does not match any rank on the table")]
    RankMismatch { card: Card },

    #[error("the defender does not hold enough cards to answer another attack")]
    InsufficientDefenderCards,

    #[error("cannot transfer: {reason}")]
    InvalidTransfer { reason: String },

    #[error("{card} is not in your hand")]
    CardNotOwned { card: Card },

    #[error("player {player} is not in play")]
    UnknownPlayer { player: PlayerId },

    #[error("the game is over")]
    GameOver,
}

impl MoveError {
    pub(crate) fn invalid_card(reason: impl Into<String>) -> Self {
        Self::InvalidCard {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_transfer(reason: impl Into<String>) -> Self {
        Self::InvalidTransfer {
            reason: reason.into(),
        }
    }

    /// Snake-case kind used as the `type` of outbound error payloads.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCard { .. } => "invalid_card",
            Self::NotYourTurn => "not_your_turn",
            Self::TableFull => "table_full",
            Self::RankMismatch { .. } => "rank_mismatch",
            Self::InsufficientDefenderCards => "insufficient_defender_cards",
            Self::InvalidTransfer { .. } => "invalid_transfer",
            Self::CardNotOwned { .. } => "card_not_owned",
            Self::UnknownPlayer { .. } => "unknown_player",
            Self::GameOver => "game_over",
        }
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SettingsError {
    #[error("max players must be between {min} and {max}, got {got}")]
    MaxPlayers { got: usize, min: usize, max: usize },

    #[error("a short deck supports at most {max} players, got {got}")]
    ShortDeckTooManyPlayers { got: usize, max: usize },

    #[error("round timeout must be between {min} and {max} seconds, got {got}")]
    RoundTimeout { got: u64, min: u64, max: u64 },

    #[error("roster must hold between {min} and {max} players, got {got}")]
    RosterSize { got: usize, min: usize, max: usize },

    #[error("player {0} appears more than once in the roster")]
    DuplicatePlayer(PlayerId),

    #[error("{0} is dealt more than once or is not part of the deck")]
    ArrangedCard(Card),
}

/// Broken structural guarantee of a game. A room whose game reports one of
/// these stops accepting mutations.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum InvariantViolation {
    #[error("card conservation broken: expected {expected} cards, found {found}")]
    CardCount { expected: usize, found: usize },

    #[error("{0} appears more than once")]
    DuplicateCard(Card),

    #[error("{0} does not belong to this deck")]
    ForeignCard(Card),

    #[error("table holds {0} attacks")]
    TableOverflow(usize),

    #[error("role assignment broken: {0}")]
    Roles(String),

    #[error("rotation broken: {0}")]
    Rotation(String),

    #[error("move application panicked: {0}")]
    Panicked(String),
}
