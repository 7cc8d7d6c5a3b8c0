//! Transport-independent message shapes exchanged with clients.

/// Inbound move requests and outbound broadcast/error payloads.
pub mod messages;

pub use messages::{ActionBroadcast, ErrorPayload, MoveRequest, ServerMessage};
