use belltower_core::sync::{ChangeEvent, ChangeKind, Stream};
use serde::Serialize;
use tokio::sync::broadcast;

const HUB_CAPACITY: usize = 256;

/// Fan-out of row-level change events to every connected display.
#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(
            "Publishing {:?}/{:?} for screen {:?}",
            event.stream,
            event.kind,
            event.screen_id
        );
        // No receivers just means no display is connected right now.
        let _ = self.tx.send(event);
    }

    /// Publishes a change carrying `record` serialized as JSON.
    pub fn publish_row<T: Serialize>(
        &self,
        stream: Stream,
        kind: ChangeKind,
        screen_id: Option<String>,
        record: Option<&T>,
    ) {
        let record = record.and_then(|r| match serde_json::to_value(r) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!("Failed to serialize {:?} change record: {}", stream, e);
                None
            }
        });
        self.publish(ChangeEvent::new(stream, kind, screen_id, record));
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let hub = ChangeHub::new();
        let mut rx = hub.subscribe();

        hub.publish_row(
            Stream::Commands,
            ChangeKind::Insert,
            Some("room_101".to_string()),
            Some(&json!({"cmd": "ring"})),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.stream, Stream::Commands);
        assert_eq!(event.record.unwrap()["cmd"], "ring");
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let hub = ChangeHub::new();
        hub.publish_row::<serde_json::Value>(Stream::Assets, ChangeKind::Delete, None, None);
    }
}
