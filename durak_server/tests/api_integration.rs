//! Integration tests for the HTTP API.
//!
//! The router runs in-process against `MemoryRoomStore`; no database or
//! socket is needed.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use durak::{
    Card, Game, GameSettings, PlayerId, RoomConfig, RoomManager, RosterEntry,
    db::MemoryRoomStore,
};
use durak_server::api::{AppState, create_router, request_id::REQUEST_ID_HEADER};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method

const SEED: u64 = 7;

fn roster() -> Vec<RosterEntry> {
    vec![RosterEntry::new(1, "alice"), RosterEntry::new(2, "bob")]
}

fn create_test_server() -> Router {
    let manager = RoomManager::new(Arc::new(MemoryRoomStore::new()), RoomConfig::default());
    create_router(AppState::new(manager, None))
}

/// Attacker of the game dealt with [`SEED`] and a card they can open with.
fn opening() -> (PlayerId, Card) {
    let game = Game::deal_seeded(GameSettings::default(), &roster(), SEED).unwrap();
    let attacker = game.attacker().unwrap();
    let card = *game.player(attacker).unwrap().hand.iter().next().unwrap();
    (attacker, card)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn start_room(app: &Router, pin: &str) {
    let (status, body) = send(
        app,
        post(
            "/api/v1/rooms",
            json!({
                "pin": pin,
                "roster": [{"id": 1, "name": "alice"}, {"id": 2, "name": "bob"}],
                "seed": SEED,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["roomPin"], pin);
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let app = create_test_server();
    start_room(&app, "100000").await;

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rooms"]["active_count"], 1);
    assert!(body["database"].is_null());
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = create_test_server();
    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "trace-me")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-me");
}

#[tokio::test]
async fn test_request_id_is_generated_when_missing() {
    let app = create_test_server();
    let response = app.oneshot(get("/health")).await.unwrap();
    let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

// ============================================================================
// Room Tests
// ============================================================================

#[tokio::test]
async fn test_start_room_with_random_pin() {
    let app = create_test_server();
    let (status, body) = send(
        &app,
        post(
            "/api/v1/rooms",
            json!({"roster": [{"id": 1, "name": "alice"}, {"id": 2, "name": "bob"}]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let pin = body["roomPin"].as_str().unwrap();
    assert_eq!(pin.len(), 6);
    assert!(pin.chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn test_start_room_rejects_single_player() {
    let app = create_test_server();
    let (status, body) = send(
        &app,
        post("/api/v1/rooms", json!({"roster": [{"id": 1, "name": "alice"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "invalid_settings");
}

#[tokio::test]
async fn test_player_and_spectator_views() {
    let app = create_test_server();
    start_room(&app, "200000").await;

    let (status, view) = send(&app, get("/api/v1/rooms/200000?player=1")).await;
    assert_eq!(status, StatusCode::OK);
    let players = view["players"].as_array().unwrap();
    assert_eq!(players.len(), 2);
    assert_eq!(players[0]["cards"].as_array().unwrap().len(), 6);
    assert_eq!(players[1]["cardCount"], 6);
    assert_eq!(view["deckSize"], 24);

    let (status, view) = send(&app, get("/api/v1/rooms/200000")).await;
    assert_eq!(status, StatusCode::OK);
    for player in view["players"].as_array().unwrap() {
        assert_eq!(player["cardCount"], 6);
        assert!(player.get("cards").is_none());
    }
}

#[tokio::test]
async fn test_view_for_unseated_player_is_rejected() {
    let app = create_test_server();
    start_room(&app, "210000").await;

    let (status, body) = send(&app, get("/api/v1/rooms/210000?player=99")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "unknown_player");
}

#[tokio::test]
async fn test_unknown_and_malformed_rooms() {
    let app = create_test_server();

    let (status, body) = send(&app, get("/api/v1/rooms/999999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["type"], "not_found");

    let (status, body) = send(&app, get("/api/v1/rooms/12ab56")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "invalid_pin");
}

// ============================================================================
// Move Tests
// ============================================================================

#[tokio::test]
async fn test_submit_move_and_read_history() {
    let app = create_test_server();
    start_room(&app, "300000").await;
    let (attacker, card) = opening();

    let (status, body) = send(
        &app,
        post(
            "/api/v1/rooms/300000/moves",
            json!({
                "roomPin": "300000",
                "playerId": attacker,
                "move": {"type": "place", "card": card.to_string()},
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let actions = body["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["seq"], 1);
    assert_eq!(body["update"]["tableTop"][card.to_string()], Value::Null);

    let (status, history) = send(&app, get("/api/v1/rooms/300000/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 2);

    let (_, tail) = send(&app, get("/api/v1/rooms/300000/history?since=0")).await;
    assert_eq!(tail.as_array().unwrap().len(), 1);
    assert_eq!(tail[0]["seq"], 1);
}

#[tokio::test]
async fn test_illegal_move_returns_error_payload() {
    let app = create_test_server();
    start_room(&app, "400000").await;
    let (attacker, _) = opening();
    let defender = if attacker == 1 { 2 } else { 1 };

    let (status, body) = send(
        &app,
        post(
            "/api/v1/rooms/400000/moves",
            json!({"roomPin": "400000", "playerId": defender, "move": {"type": "pass"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["type"].is_string());
    assert!(body["message"].is_string());

    let (_, history) = send(&app, get("/api/v1/rooms/400000/history")).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_move_for_another_room_is_rejected() {
    let app = create_test_server();
    start_room(&app, "500000").await;

    let (status, body) = send(
        &app,
        post(
            "/api/v1/rooms/500000/moves",
            json!({"roomPin": "500001", "playerId": 1, "move": {"type": "pass"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "room_mismatch");
}

#[tokio::test]
async fn test_malformed_move_request() {
    let app = create_test_server();
    start_room(&app, "600000").await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/rooms/600000/moves")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"roomPin":"600000","playerId":1,"move":{"type":"shuffle"}}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}
