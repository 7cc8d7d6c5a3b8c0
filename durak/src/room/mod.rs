//! Per-room serialization of game mutations using the actor model.
//!
//! This module implements:
//! - RoomActor: the only task that reads or writes a room's game
//! - RoomManager: starts, resumes and addresses room actors by pin
//! - Message-based communication with tokio channels
//!
//! ## Architecture
//!
//! Each loaded room runs in its own Tokio task behind a bounded mpsc inbox.
//! A request waits at most `lock_timeout` to be queued and carries a
//! deadline; requests dequeued too late are answered `Busy` untouched.
//! Accepted moves are persisted before they become visible, so a failed
//! commit leaves the room as it was.
//!
//! ## Example
//!
//! ```no_run
//! use durak::db::MemoryRoomStore;
//! use durak::room::{RoomConfig, RoomManager, StartRoom};
//! use durak::game::RosterEntry;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = RoomManager::new(Arc::new(MemoryRoomStore::new()), RoomConfig::default());
//!     let pin = manager
//!         .start_room(StartRoom {
//!             roster: vec![RosterEntry::new(1, "alice"), RosterEntry::new(2, "bob")],
//!             ..Default::default()
//!         })
//!         .await
//!         .unwrap();
//!     let view = manager.spectator_view(&pin).await.unwrap();
//!     println!("{} cards left to draw", view.deck_size);
//! }
//! ```

pub mod actor;
pub mod config;
pub mod errors;
pub mod manager;
pub mod messages;

pub use actor::{Room, RoomActor, RoomHandle};
pub use config::RoomConfig;
pub use errors::{RoomError, RoomResult};
pub use manager::{RoomManager, StartRoom};
pub use messages::{MoveOutcome, RoomMessage, SubscriberId};
