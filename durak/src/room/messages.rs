//! Room actor message types.

use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};

use super::{actor::Room, errors::RoomError};
use crate::{
    game::{OpaqueState, PlayerId, moves::Move},
    history::HistoryEntry,
    net::ServerMessage,
};

pub type SubscriberId = u64;

/// Read-only access to a room, run inside its actor. Receives `Busy` instead
/// of the room if it was dequeued past its deadline.
pub type InspectFn = Box<dyn FnOnce(Result<&Room, RoomError>) + Send>;

/// Messages that can be sent to a `RoomActor`.
pub enum RoomMessage {
    /// Validate and apply a move. Answered `Busy` without being applied if
    /// dequeued after `deadline`.
    Submit {
        player: PlayerId,
        mv: Move,
        deadline: Instant,
        response: oneshot::Sender<Result<MoveOutcome, RoomError>>,
    },

    Inspect { deadline: Instant, inspect: InspectFn },

    /// Start receiving broadcasts. `viewer` is `None` for spectators.
    Subscribe {
        viewer: Option<PlayerId>,
        sender: mpsc::Sender<ServerMessage>,
        response: oneshot::Sender<SubscriberId>,
    },

    Unsubscribe { id: SubscriberId },

    /// Mark the room closed and stop the actor.
    Close {
        response: oneshot::Sender<Result<(), RoomError>>,
    },
}

/// Result of an accepted move, for its submitter.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub entries: Vec<HistoryEntry>,
    pub state: OpaqueState,
}
