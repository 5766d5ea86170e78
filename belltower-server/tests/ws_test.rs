use axum::body::Body;
use axum::http::{Request, StatusCode};
use belltower_core::sync::{ChangeKind, DisplayMessage, ServerMessage, Stream};
use belltower_server::config::Config;
use belltower_server::{build_router, db, AppState};
use diesel::prelude::*;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Serves the full router on an ephemeral port. Returns the base address.
async fn spawn_server() -> (TempDir, AppState, String) {
    let dir = tempfile::tempdir().unwrap();
    let db_url = dir.path().join("belltower.db");
    let pool = db::open(db_url.to_str().unwrap()).unwrap();
    let config: Config = toml::from_str(Config::default_template()).unwrap();
    let state = AppState::new(pool, config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (dir, state, addr.to_string())
}

/// REST writes go through the same state, so their events hit the served hub.
async fn post(state: &AppState, path: &str, body: Value) -> Value {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn connect(addr: &str) -> Socket {
    let (socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    socket
}

async fn send(socket: &mut Socket, msg: DisplayMessage) {
    let json = serde_json::to_string(&msg).unwrap();
    socket.send(Message::Text(json)).await.unwrap();
}

async fn next_message(socket: &mut Socket) -> ServerMessage {
    loop {
        let msg = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no message within 5s")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Nothing arrives within a short window.
async fn assert_silent(socket: &mut Socket) {
    let res = timeout(Duration::from_millis(300), socket.next()).await;
    assert!(res.is_err(), "unexpected message: {:?}", res);
}

async fn subscribe(socket: &mut Socket, screen_id: &str, streams: Vec<Stream>) -> Vec<Stream> {
    send(
        socket,
        DisplayMessage::Subscribe {
            screen_id: screen_id.to_string(),
            streams,
        },
    )
    .await;
    match next_message(socket).await {
        ServerMessage::Subscribed { screen_id: id, streams } => {
            assert_eq!(id, screen_id);
            streams
        }
        other => panic!("expected subscribed, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_subscribe_unknown_screen_is_rejected() {
    let (_dir, _state, addr) = spawn_server().await;
    let mut socket = connect(&addr).await;

    send(
        &mut socket,
        DisplayMessage::Subscribe {
            screen_id: "room_404".to_string(),
            streams: Vec::new(),
        },
    )
    .await;

    match next_message(&mut socket).await {
        ServerMessage::Error { message } => assert!(message.contains("room_404")),
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_changes_reach_only_their_screen() {
    let (_dir, state, addr) = spawn_server().await;
    post(&state, "/api/screens", json!({ "id": "room_101" })).await;
    post(&state, "/api/screens", json!({ "id": "room_102" })).await;

    let mut room_101 = connect(&addr).await;
    let mut room_102 = connect(&addr).await;
    // Empty stream list means everything
    assert_eq!(subscribe(&mut room_101, "room_101", Vec::new()).await, Stream::ALL.to_vec());
    subscribe(&mut room_102, "room_102", Vec::new()).await;

    post(
        &state,
        "/api/commands",
        json!({ "screen_id": "room_101", "cmd": "ring", "payload": {} }),
    )
    .await;
    match next_message(&mut room_101).await {
        ServerMessage::Change { event } => {
            assert_eq!(event.stream, Stream::Commands);
            assert_eq!(event.kind, ChangeKind::Insert);
            assert_eq!(event.record.unwrap()["cmd"], "ring");
        }
        other => panic!("expected change, got {:?}", other),
    }

    post(
        &state,
        "/api/assets",
        json!({ "screen_id": "room_101", "type": "image", "url": "https://cdn/a.jpg" }),
    )
    .await;
    match next_message(&mut room_101).await {
        ServerMessage::Change { event } => {
            assert_eq!(event.stream, Stream::Assets);
            assert_eq!(event.screen_id.as_deref(), Some("room_101"));
        }
        other => panic!("expected change, got {:?}", other),
    }

    assert_silent(&mut room_102).await;

    // Broadcast commands go to every subscriber
    post(&state, "/api/commands", json!({ "cmd": "reload" })).await;
    for socket in [&mut room_101, &mut room_102] {
        match next_message(socket).await {
            ServerMessage::Change { event } => {
                assert_eq!(event.stream, Stream::Commands);
                assert!(event.screen_id.is_none());
            }
            other => panic!("expected change, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_resubscribe_replaces_filter() {
    let (_dir, state, addr) = spawn_server().await;
    post(&state, "/api/screens", json!({ "id": "room_101" })).await;

    let mut socket = connect(&addr).await;
    subscribe(&mut socket, "room_101", vec![Stream::Commands]).await;
    subscribe(&mut socket, "room_101", vec![Stream::Assets]).await;

    post(
        &state,
        "/api/commands",
        json!({ "screen_id": "room_101", "cmd": "ring" }),
    )
    .await;
    assert_silent(&mut socket).await;

    post(
        &state,
        "/api/assets",
        json!({ "screen_id": "room_101", "type": "video", "url": "https://cdn/v.mp4" }),
    )
    .await;
    match next_message(&mut socket).await {
        ServerMessage::Change { event } => assert_eq!(event.stream, Stream::Assets),
        other => panic!("expected change, got {:?}", other),
    }
    // Exactly one copy; the old forwarder is gone
    assert_silent(&mut socket).await;
}

#[tokio::test]
async fn test_heartbeat_is_acked_and_recorded() {
    use belltower_server::schema::screens::dsl;

    let (_dir, state, addr) = spawn_server().await;
    post(&state, "/api/screens", json!({ "id": "room_101" })).await;

    let mut socket = connect(&addr).await;
    send(
        &mut socket,
        DisplayMessage::Heartbeat {
            screen_id: "room_101".to_string(),
            cpu_usage_percent: 12.5,
            memory_usage_mb: 256.0,
        },
    )
    .await;
    assert!(matches!(next_message(&mut socket).await, ServerMessage::HeartbeatAck));

    let mut conn = state.db.get().unwrap();
    let last_seen: Option<chrono::NaiveDateTime> = dsl::screens
        .filter(dsl::id.eq("room_101"))
        .select(dsl::last_seen)
        .first(&mut conn)
        .unwrap();
    assert!(last_seen.is_some());
}
