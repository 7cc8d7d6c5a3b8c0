use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    db::RoomPin,
    game::{MoveError, OpaqueState, PlayerId, moves::Move},
    history::HistoryEntry,
};

/// A move submitted by a player, tagged with the room and identity it
/// claims.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub room_pin: RoomPin,
    pub player_id: PlayerId,
    #[serde(rename = "move")]
    pub mv: Move,
}

/// Actions produced by one accepted move, plus the resulting state as seen
/// by the recipient.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ActionBroadcast {
    pub actions: Vec<HistoryEntry>,
    pub update: OpaqueState,
}

/// Error sent to the submitter of a failed request only.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorPayload {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&MoveError> for ErrorPayload {
    fn from(error: &MoveError) -> Self {
        let payload = Self::new(error.kind(), error.to_string());
        // Everything but the tag, e.g. the offending card.
        match serde_json::to_value(error) {
            Ok(Value::Object(mut fields)) => {
                fields.remove("type");
                if fields.is_empty() {
                    payload
                } else {
                    payload.with_details(Value::Object(fields))
                }
            }
            _ => payload,
        }
    }
}

/// Frames pushed to a connected client.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full state push, sent on connect.
    State(OpaqueState),
    Broadcast(ActionBroadcast),
    Error(ErrorPayload),
}
