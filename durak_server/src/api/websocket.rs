//! WebSocket handler for live room updates.
//!
//! A connection subscribes to one room. The server pushes the current state
//! on connect and a broadcast after every accepted move, each projected for
//! the connection's viewer. Seated players may also submit moves over the
//! same socket; failures are answered on that socket only.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/{pin}?player=<id>` (omit `player` to
//!    spectate)
//! 2. Server subscribes to the room before upgrading, so unknown rooms
//!    answer `404` instead of a dead socket
//! 3. A send task forwards room messages and error replies
//! 4. On disconnect the subscription is dropped
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws/123456?player=1');
//!
//! ws.onmessage = (event) => {
//!   const data = JSON.parse(event.data);
//!   switch (data.event) {
//!     case 'state': render(data); break;
//!     case 'broadcast': animate(data.actions); render(data.update); break;
//!     case 'error': showError(data.message); break;
//!   }
//! };
//!
//! ws.send(JSON.stringify({ type: 'place', card: '6 of Spades' }));
//! ```

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use durak::{
    Move, PlayerId, RoomError,
    db::RoomPin,
    net::{ErrorPayload, ServerMessage},
    room::SubscriberId,
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing::Instrument;

use super::{ApiError, AppState};
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub player: Option<PlayerId>,
}

/// Upgrade to a WebSocket subscribed to room `pin`.
///
/// # Response
///
/// - `101 Switching Protocols` on success
/// - `400 Bad Request` for a malformed pin or a player not seated in the room
/// - `404 Not Found` for an unknown room
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(pin): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let pin = RoomPin::parse(&pin).map_err(|e| ApiError::from(RoomError::InvalidPin(e)))?;

    if let Some(player) = query.player {
        state.room_manager.player_view(&pin, player).await?;
    }
    let (id, updates) = state.room_manager.subscribe(&pin, query.player).await?;

    // The socket outlives the upgrade request; keep its span for move logs.
    let span = tracing::Span::current();
    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, pin, query.player, id, updates, state).instrument(span)
    }))
}

/// Drive an established connection until either side goes away.
async fn handle_socket(
    socket: WebSocket,
    pin: RoomPin,
    player: Option<PlayerId>,
    id: SubscriberId,
    mut updates: mpsc::Receiver<ServerMessage>,
    state: AppState,
) {
    let (mut sender, mut receiver) = socket.split();

    let active = state.ws_connections.fetch_add(1, Ordering::Relaxed) + 1;
    metrics::websocket_connections_total();
    metrics::websocket_connections_active(active);
    info!("WebSocket connected: room={}, player={:?}", pin, player);

    // Replies to this socket's own failed requests.
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(32);

    let send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(message) = updates.recv() => message,
                Some(reply) = reply_rx.recv() => reply,
                else => break,
            };

            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            metrics::websocket_messages_sent();
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                metrics::websocket_messages_received();
                if let Some(reply) = handle_client_message(&text, &pin, player, &state).await
                    && reply_tx.send(reply).await.is_err()
                {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                debug!("WebSocket closed by client: room={}", pin);
                break;
            }
            Err(e) => {
                warn!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    state.room_manager.unsubscribe(&pin, id).await;

    let active = state.ws_connections.fetch_sub(1, Ordering::Relaxed) - 1;
    metrics::websocket_connections_active(active);
    info!("WebSocket disconnected: room={}, player={:?}", pin, player);
}

/// Submit a move sent as text. Returns the error reply, if any; accepted
/// moves reach this socket through the room broadcast.
async fn handle_client_message(
    text: &str,
    pin: &RoomPin,
    player: Option<PlayerId>,
    state: &AppState,
) -> Option<ServerMessage> {
    let Some(player) = player else {
        return Some(ServerMessage::Error(ErrorPayload::new(
            "spectator",
            "Spectators cannot submit moves",
        )));
    };

    let mv = match serde_json::from_str::<Move>(text) {
        Ok(mv) => mv,
        Err(e) => {
            debug!("Failed to parse move from player {}: {}", player, e);
            return Some(ServerMessage::Error(ErrorPayload::new(
                "invalid_message",
                format!("Invalid move: {e}"),
            )));
        }
    };

    let result = state.room_manager.submit_move(pin, player, mv).await;
    logging::log_move(
        pin,
        player,
        &mv,
        result.as_ref().map(|outcome| outcome.entries.len()),
    );

    match result {
        Ok(_) => {
            metrics::move_accepted(mv.kind());
            None
        }
        Err(e) => {
            metrics::move_failed(mv.kind(), &e);
            Some(ServerMessage::Error(ErrorPayload::from(&e)))
        }
    }
}
