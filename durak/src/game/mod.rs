//! Durak rules engine.
//!
//! This module provides:
//! - The card domain (ranks, suits, deck, trump comparison)
//! - The game state machine and its invariants
//! - Move validation and application
//! - Per-player and spectator views

pub mod constants;
pub mod entities;
pub mod errors;
pub mod moves;
pub mod state_machine;
pub mod views;

pub use entities::{Card, Player, PlayerId, Rank, Role, Suit, TablePair, TableTop};
pub use errors::{InvariantViolation, MoveError, SettingsError};
pub use moves::Move;
pub use state_machine::{FirstAttacker, Game, GameSettings, RosterEntry};
pub use views::{HandView, OpaqueState, PlayerView, project_for_player, project_for_spectator};
