use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use belltower_core::sync::{DisplayMessage, ServerMessage, Stream};
use chrono::Utc;
use diesel::prelude::*;
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::{broadcast, mpsc::UnboundedSender};
use tokio::task::JoinHandle;

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerMessage>();

    let state_clone = state.clone();

    // Forward queued messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        let mut forwarder: Option<JoinHandle<()>> = None;
        let mut subscribed_screen: Option<String> = None;

        while let Some(Ok(msg)) = receiver.next().await {
            let Message::Text(text) = msg else {
                continue;
            };
            let display_msg = match serde_json::from_str::<DisplayMessage>(&text) {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!("Ignoring malformed display message: {}", e);
                    continue;
                }
            };

            match display_msg {
                DisplayMessage::Subscribe { screen_id, streams } => {
                    match screen_exists(&state_clone, &screen_id) {
                        Ok(true) => {}
                        Ok(false) => {
                            let _ = tx.send(ServerMessage::Error {
                                message: format!("Unknown screen: {}", screen_id),
                            });
                            continue;
                        }
                        Err(e) => {
                            tracing::error!("Subscribe lookup failed: {}", e);
                            let _ = tx.send(ServerMessage::Error { message: e });
                            continue;
                        }
                    }

                    // A re-subscribe replaces the previous filter.
                    if let Some(handle) = forwarder.take() {
                        handle.abort();
                    }
                    let streams = if streams.is_empty() {
                        Stream::ALL.to_vec()
                    } else {
                        streams
                    };
                    forwarder = Some(tokio::spawn(forward_changes(
                        state_clone.hub.subscribe(),
                        tx.clone(),
                        screen_id.clone(),
                        streams.clone(),
                    )));

                    tracing::info!("Screen {} subscribed to {:?}", screen_id, streams);
                    subscribed_screen = Some(screen_id.clone());
                    let _ = tx.send(ServerMessage::Subscribed { screen_id, streams });
                }
                DisplayMessage::Heartbeat {
                    screen_id,
                    cpu_usage_percent,
                    memory_usage_mb,
                } => {
                    if let Err(e) = touch_last_seen(&state_clone, &screen_id) {
                        tracing::error!("Failed to record heartbeat for {}: {}", screen_id, e);
                    }
                    let _ = tx.send(ServerMessage::HeartbeatAck);

                    tracing::debug!(
                        "Screen {} heartbeat: cpu={:.1}%, mem={:.1}MB",
                        screen_id,
                        cpu_usage_percent,
                        memory_usage_mb
                    );
                }
            }
        }

        if let Some(handle) = forwarder {
            handle.abort();
        }
        subscribed_screen
    });

    let subscribed_screen = tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
            None
        }
        res = (&mut recv_task) => {
            send_task.abort();
            res.ok().flatten()
        }
    };

    if let Some(screen_id) = subscribed_screen {
        tracing::info!("Screen {} disconnected", screen_id);
    }
}

/// Relays hub events that belong to one subscriber until its socket goes away.
async fn forward_changes(
    mut changes: broadcast::Receiver<belltower_core::sync::ChangeEvent>,
    tx: UnboundedSender<ServerMessage>,
    screen_id: String,
    streams: Vec<Stream>,
) {
    loop {
        match changes.recv().await {
            Ok(event) => {
                if !event.is_visible_to(&screen_id, &streams) {
                    continue;
                }
                if tx.send(ServerMessage::Change { event }).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Screen {} lagged, {} change(s) dropped", screen_id, skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn screen_exists(state: &AppState, screen: &str) -> Result<bool, String> {
    use crate::schema::screens::dsl;

    let mut conn = state
        .db
        .get()
        .map_err(|_| "Database connection error".to_string())?;

    let count: i64 = dsl::screens
        .filter(dsl::id.eq(screen))
        .count()
        .get_result(&mut conn)
        .map_err(|e| format!("Failed to look up screen: {}", e))?;

    Ok(count > 0)
}

fn touch_last_seen(state: &AppState, screen: &str) -> Result<(), String> {
    use crate::schema::screens::dsl;

    let mut conn = state
        .db
        .get()
        .map_err(|_| "Database connection error".to_string())?;

    diesel::update(dsl::screens.filter(dsl::id.eq(screen)))
        .set(dsl::last_seen.eq(Utc::now().naive_utc()))
        .execute(&mut conn)
        .map_err(|e| format!("Failed to update last_seen: {}", e))?;

    Ok(())
}
