//! Rule constants shared across the game engine.

/// Cards each player is dealt and replenished up to.
pub const HAND_SIZE: usize = 6;

/// Maximum number of attack cards on the table in a single round.
pub const MAX_TABLE_CARDS: usize = 6;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 8;

/// A 36-card deck cannot deal six hands to more than six players.
pub const MAX_SHORT_DECK_PLAYERS: usize = 6;

pub const MIN_ROUND_TIMEOUT_SECS: u64 = 60;
pub const MAX_ROUND_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ROUND_TIMEOUT_SECS: u64 = 120;
