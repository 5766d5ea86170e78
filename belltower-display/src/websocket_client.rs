use anyhow::Result;
use belltower_core::sync::{ChangeEvent, DisplayMessage, ServerMessage, Stream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use crate::channel::{RealtimeTransport, Subscription};
use crate::heartbeat::HeartbeatManager;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(300);

/// Change feed over the server's `/ws` endpoint.
#[derive(Clone)]
pub struct WebSocketTransport {
    server_url: String,
    heartbeat_interval_secs: u64,
    initial_delay: Duration,
    max_delay: Duration,
}

impl WebSocketTransport {
    pub fn new(server_url: String, heartbeat_interval_secs: u64) -> Self {
        Self {
            server_url,
            heartbeat_interval_secs,
            initial_delay: INITIAL_RECONNECT_DELAY,
            max_delay: MAX_RECONNECT_DELAY,
        }
    }

    pub fn with_backoff(mut self, initial_delay: Duration, max_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay;
        self
    }

    async fn connect_and_run(
        self,
        screen_id: String,
        streams: Vec<Stream>,
        events: UnboundedSender<ChangeEvent>,
        cancel: CancellationToken,
    ) {
        let mut delay = self.initial_delay;

        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => break,
                res = self.connect(&screen_id, &streams, &events, &cancel) => res,
            };

            match attempt {
                Ok(true) => delay = self.initial_delay,
                Ok(false) => {}
                Err(e) => tracing::error!("Connection error: {}", e),
            }

            if cancel.is_cancelled() || events.is_closed() {
                break;
            }

            tracing::info!("Reconnecting in {:?}...", delay);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
            delay = (delay * 2).min(self.max_delay);
        }

        tracing::info!("Realtime transport for {} stopped", screen_id);
    }

    /// One connection lifetime. Returns whether the subscription was confirmed.
    /// A server `error` ends the attempt unconfirmed so the backoff loop retries.
    async fn connect(
        &self,
        screen_id: &str,
        streams: &[Stream],
        events: &UnboundedSender<ChangeEvent>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        tracing::info!("Connecting to server: {}", self.server_url);

        let (ws_stream, _) = connect_async(&self.server_url).await?;
        tracing::info!("WebSocket connection established");

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<DisplayMessage>();

        // Single writer; heartbeats and the subscribe request share it
        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if let Ok(json) = serde_json::to_string(&msg) {
                    if write.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            }
        });

        out_tx.send(DisplayMessage::Subscribe {
            screen_id: screen_id.to_string(),
            streams: streams.to_vec(),
        })?;

        let heartbeat_cancel = cancel.child_token();
        let heartbeat = HeartbeatManager::new(
            screen_id.to_string(),
            self.heartbeat_interval_secs,
            out_tx.clone(),
        );
        tokio::spawn(heartbeat.start(heartbeat_cancel.clone()));

        let mut confirmed = false;
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    let server_msg = match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(m) => m,
                        Err(e) => {
                            tracing::debug!("Ignoring unknown server message: {}", e);
                            continue;
                        }
                    };
                    match server_msg {
                        ServerMessage::Subscribed { screen_id, streams } => {
                            tracing::info!("Subscribed {} to {:?}", screen_id, streams);
                            confirmed = true;
                        }
                        ServerMessage::Change { event } => {
                            if events.send(event).is_err() {
                                // Session is gone
                                break;
                            }
                        }
                        ServerMessage::HeartbeatAck => {}
                        ServerMessage::Error { message } => {
                            tracing::error!("Server rejected subscription: {}", message);
                            confirmed = false;
                            break;
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed connection");
                    break;
                }
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        heartbeat_cancel.cancel();
        writer.abort();
        Ok(confirmed)
    }
}

impl RealtimeTransport for WebSocketTransport {
    fn subscribe(&self, screen_id: &str, streams: &[Stream]) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(self.clone().connect_and_run(
            screen_id.to_string(),
            streams.to_vec(),
            tx,
            cancel.clone(),
        ));

        Subscription::new(rx, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use belltower_core::sync::ChangeKind;
    use serde_json::json;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::{accept_async, WebSocketStream};

    async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = listener.accept().await.unwrap();
        accept_async(stream).await.unwrap()
    }

    /// Reads until the display subscribes, skipping heartbeats.
    async fn expect_subscribe(ws: &mut WebSocketStream<TcpStream>) -> String {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                if let Ok(DisplayMessage::Subscribe { screen_id, .. }) = serde_json::from_str(&text) {
                    return screen_id;
                }
            }
        }
        panic!("display never subscribed");
    }

    async fn reply(ws: &mut WebSocketStream<TcpStream>, msg: ServerMessage) {
        let json = serde_json::to_string(&msg).unwrap();
        ws.send(Message::Text(json)).await.unwrap();
    }

    async fn confirm_and_ring(ws: &mut WebSocketStream<TcpStream>, screen_id: String) {
        reply(
            ws,
            ServerMessage::Subscribed {
                screen_id: screen_id.clone(),
                streams: Stream::ALL.to_vec(),
            },
        )
        .await;
        reply(
            ws,
            ServerMessage::Change {
                event: ChangeEvent::new(
                    Stream::Commands,
                    ChangeKind::Insert,
                    Some(screen_id),
                    Some(json!({ "cmd": "ring" })),
                ),
            },
        )
        .await;
    }

    fn transport(listener: &TcpListener) -> WebSocketTransport {
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        WebSocketTransport::new(url, 30)
            .with_backoff(Duration::from_millis(50), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_change_messages_reach_subscription() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut subscription = transport(&listener).subscribe("room_101", &Stream::ALL);

        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            let screen_id = expect_subscribe(&mut ws).await;
            assert_eq!(screen_id, "room_101");
            confirm_and_ring(&mut ws, screen_id).await;
            ws
        });

        let event = timeout(Duration::from_secs(5), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.stream, Stream::Commands);
        assert_eq!(event.record.unwrap()["cmd"], "ring");

        subscription.release();
        drop(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_subscribe_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut subscription = transport(&listener).subscribe("room_101", &Stream::ALL);

        let server = tokio::spawn(async move {
            // First attempt: the screen does not exist yet
            let mut ws = accept(&listener).await;
            expect_subscribe(&mut ws).await;
            reply(
                &mut ws,
                ServerMessage::Error {
                    message: "Unknown screen: room_101".to_string(),
                },
            )
            .await;
            // The display hangs up on its own
            while let Some(Ok(msg)) = ws.next().await {
                if matches!(msg, Message::Close(_)) {
                    break;
                }
            }

            let mut ws = accept(&listener).await;
            let screen_id = expect_subscribe(&mut ws).await;
            confirm_and_ring(&mut ws, screen_id).await;
            ws
        });

        let event = timeout(Duration::from_secs(5), subscription.next())
            .await
            .expect("no event after the retry")
            .unwrap();
        assert_eq!(event.screen_id.as_deref(), Some("room_101"));

        subscription.release();
        drop(server.await.unwrap());
    }
}
