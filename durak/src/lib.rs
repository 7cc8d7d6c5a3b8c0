//! # Durak
//!
//! A server-authoritative engine for the Durak card game.
//!
//! The rules are a pure state machine: [`game::Game::apply`] validates a move
//! against the current state and returns the actions it produced, or a
//! [`game::MoveError`] with the state untouched. Every room is owned by a
//! single actor task that serializes mutations, persists each accepted move
//! together with its history entries, and broadcasts per-recipient views.
//!
//! ## Core Modules
//!
//! - [`game`]: Card domain, state machine, move validation, views
//! - [`history`]: Append-only action log and deterministic replay
//! - [`room`]: Room actors, manager and the mutation pipeline
//! - [`db`]: Room persistence (PostgreSQL and in-memory)
//! - [`net`]: Wire message shapes
//!
//! ## Example
//!
//! ```
//! use durak::{Game, GameSettings, Move, RosterEntry};
//!
//! let roster = [RosterEntry::new(1, "alice"), RosterEntry::new(2, "bob")];
//! let mut game = Game::deal_seeded(GameSettings::default(), &roster, 7).unwrap();
//!
//! let attacker = game.attacker().unwrap();
//! let card = *game.player(attacker).unwrap().hand.iter().next().unwrap();
//! let actions = game.apply(attacker, &Move::Place { card }).unwrap();
//! assert_eq!(actions.len(), 1);
//! assert!(game.check_invariants().is_ok());
//! ```

/// Room persistence.
pub mod db;

/// Core game logic, entities, and state machine.
pub mod game;
pub use game::{
    Card, Game, GameSettings, Move, MoveError, OpaqueState, PlayerId, Rank, Role, RosterEntry,
    Suit, constants,
};

/// Action log and replay.
pub mod history;
pub use history::{Action, History, HistoryEntry};

/// Wire message shapes.
pub mod net;

/// Per-room actors.
pub mod room;
pub use room::{RoomConfig, RoomError, RoomManager};
