//! Room API handlers.
//!
//! # Examples
//!
//! Start a room:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/rooms \
//!   -H "Content-Type: application/json" \
//!   -d '{"roster": [{"id": 1, "name": "alice"}, {"id": 2, "name": "bob"}]}'
//! ```
//!
//! Place a card:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/rooms/123456/moves \
//!   -H "Content-Type: application/json" \
//!   -d '{"roomPin": "123456", "playerId": 1, "move": {"type": "place", "card": "6 of Spades"}}'
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use durak::{
    OpaqueState, PlayerId, RoomError,
    db::RoomPin,
    history::HistoryEntry,
    net::{ActionBroadcast, MoveRequest},
    room::StartRoom,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::{logging, metrics};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRoomResponse {
    pub room_pin: RoomPin,
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub player: Option<PlayerId>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub since: Option<u64>,
}

fn parse_pin(pin: &str) -> Result<RoomPin, ApiError> {
    RoomPin::parse(pin).map_err(|e| ApiError::from(RoomError::InvalidPin(e)))
}

/// Deal a new game into a room.
///
/// Returns `201 Created` with the room pin, or `400 Bad Request` when the
/// settings or roster are invalid.
pub async fn start_room(
    State(state): State<AppState>,
    Json(request): Json<StartRoom>,
) -> Result<(StatusCode, Json<StartRoomResponse>), ApiError> {
    let room_pin = state.room_manager.start_room(request).await?;
    metrics::rooms_started_total();
    Ok((StatusCode::CREATED, Json(StartRoomResponse { room_pin })))
}

/// Current state of a room, as seen by `player` or by a spectator.
pub async fn get_room(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<OpaqueState>, ApiError> {
    let pin = parse_pin(&pin)?;
    let view = match query.player {
        Some(player) => state.room_manager.player_view(&pin, player).await?,
        None => state.room_manager.spectator_view(&pin).await?,
    };
    Ok(Json(view))
}

/// Submit a move.
///
/// The body's `roomPin` must match the path. The response carries the
/// entries the move produced and the submitter's view of the new state.
pub async fn submit_move(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<ActionBroadcast>, ApiError> {
    let pin = parse_pin(&pin)?;
    if request.room_pin != pin {
        return Err(ApiError::bad_request(
            "room_mismatch",
            format!("move for room {} sent to room {pin}", request.room_pin),
        ));
    }

    let (player, mv) = (request.player_id, request.mv);
    let result = state.room_manager.handle_request(request).await;
    logging::log_move(
        &pin,
        player,
        &mv,
        result.as_ref().map(|outcome| outcome.entries.len()),
    );

    match result {
        Ok(outcome) => {
            metrics::move_accepted(mv.kind());
            Ok(Json(ActionBroadcast {
                actions: outcome.entries,
                update: outcome.state,
            }))
        }
        Err(e) => {
            metrics::move_failed(mv.kind(), &e);
            Err(e.into())
        }
    }
}

/// History entries recorded after `since`, or the full history.
pub async fn get_history(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let pin = parse_pin(&pin)?;
    let entries = state.room_manager.history_since(&pin, query.since).await?;
    Ok(Json(entries))
}
