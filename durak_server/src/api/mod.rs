//! HTTP/WebSocket API for the Durak server.
//!
//! A thin transport over [`RoomManager`]: every handler resolves a room pin,
//! forwards to the room's actor and maps the result to JSON. Player identity
//! is taken as claimed.
//!
//! # Modules
//!
//! - [`rooms`]: Start rooms, read views and history, submit moves
//! - [`websocket`]: Broadcast stream plus move submission over one socket
//! - [`request_id`]: Request correlation
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /health                              - Health check
//! POST /api/v1/rooms                        - Start a room
//! GET  /api/v1/rooms/{pin}?player=<id>      - Player or spectator view
//! POST /api/v1/rooms/{pin}/moves            - Submit a move
//! GET  /api/v1/rooms/{pin}/history?since=N  - History entries after N
//! GET  /ws/{pin}?player=<id>                - WebSocket
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use durak::{RoomConfig, RoomManager, db::MemoryRoomStore};
//! use durak_server::api::{AppState, create_router};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = RoomManager::new(Arc::new(MemoryRoomStore::new()), RoomConfig::default());
//! let app = create_router(AppState::new(manager, None));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod request_id;
pub mod rooms;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use durak::{RoomError, RoomManager, db::Database, net::ErrorPayload};
use serde_json::json;
use std::sync::{Arc, atomic::AtomicU64};
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers and WebSocket connections.
#[derive(Clone)]
pub struct AppState {
    pub room_manager: Arc<RoomManager>,
    /// Present when rooms are stored in PostgreSQL
    pub database: Option<Database>,
    /// Open WebSocket connections
    pub ws_connections: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(room_manager: RoomManager, database: Option<Database>) -> Self {
        Self {
            room_manager: Arc::new(room_manager),
            database,
            ws_connections: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// An error response: a status code and an [`ErrorPayload`] body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub payload: ErrorPayload,
}

impl ApiError {
    pub fn bad_request(kind: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            payload: ErrorPayload::new(kind, message),
        }
    }
}

impl From<RoomError> for ApiError {
    fn from(error: RoomError) -> Self {
        Self {
            status: status_for(&error),
            payload: ErrorPayload::from(&error),
        }
    }
}

/// HTTP status for a room error.
pub fn status_for(error: &RoomError) -> StatusCode {
    match error {
        RoomError::Rejected(_) | RoomError::InvalidPin(_) | RoomError::Settings(_) => {
            StatusCode::BAD_REQUEST
        }
        RoomError::NotFound(_) => StatusCode::NOT_FOUND,
        RoomError::Busy(_) => StatusCode::CONFLICT,
        RoomError::Closed(_) => StatusCode::GONE,
        RoomError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        RoomError::Unusable { .. } | RoomError::Invariant { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.payload)).into_response()
    }
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/rooms", post(rooms::start_room))
        .route("/rooms/{pin}", get(rooms::get_room))
        .route("/rooms/{pin}/moves", post(rooms::submit_move))
        .route("/rooms/{pin}/history", get(rooms::get_history));

    Router::new()
        .route("/health", get(health_check))
        .route("/ws/{pin}", get(websocket::websocket_handler))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the store is reachable, `503 Service Unavailable`
/// otherwise. Memory-backed servers are always healthy.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.database {
        Some(db) => db.health_check().await.is_ok(),
        None => true,
    };

    let room_count = state.room_manager.active_room_count().await;
    crate::metrics::active_rooms(room_count);

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": state.database.as_ref().map(|_| db_healthy),
        "rooms": {
            "active_count": room_count
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
