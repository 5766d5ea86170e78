use serde::{Deserialize, Serialize};

/// Row-level change streams a display can subscribe to. Each maps to one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Commands,
    Assets,
    Schedules,
}

impl Stream {
    pub const ALL: [Stream; 3] = [Stream::Commands, Stream::Assets, Stream::Schedules];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub stream: Stream,
    pub kind: ChangeKind,
    /// Screen the row belongs to. `None` only for broadcast commands.
    pub screen_id: Option<String>,
    /// The row after the change; `None` for deletes.
    #[serde(default)]
    pub record: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn new(
        stream: Stream,
        kind: ChangeKind,
        screen_id: Option<String>,
        record: Option<serde_json::Value>,
    ) -> Self {
        Self {
            stream,
            kind,
            screen_id,
            record,
        }
    }

    /// Whether a subscriber for `screen_id` listening on `streams` should receive this event.
    pub fn is_visible_to(&self, screen_id: &str, streams: &[Stream]) -> bool {
        if !streams.contains(&self.stream) {
            return false;
        }
        match &self.screen_id {
            Some(id) => id == screen_id,
            None => self.stream == Stream::Commands,
        }
    }
}

// Server → Display messages
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "subscribed")]
    Subscribed {
        screen_id: String,
        streams: Vec<Stream>,
    },
    #[serde(rename = "change")]
    Change { event: ChangeEvent },
    #[serde(rename = "heartbeat_ack")]
    HeartbeatAck,
    #[serde(rename = "error")]
    Error { message: String },
}

// Display → Server messages
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DisplayMessage {
    #[serde(rename = "subscribe")]
    Subscribe {
        screen_id: String,
        streams: Vec<Stream>,
    },
    #[serde(rename = "heartbeat")]
    Heartbeat {
        screen_id: String,
        cpu_usage_percent: f64,
        memory_usage_mb: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_screen_scoped_visibility() {
        let event = ChangeEvent::new(
            Stream::Assets,
            ChangeKind::Delete,
            Some("room_101".to_string()),
            None,
        );

        assert!(event.is_visible_to("room_101", &Stream::ALL));
        assert!(!event.is_visible_to("room_102", &Stream::ALL));
        assert!(!event.is_visible_to("room_101", &[Stream::Commands, Stream::Schedules]));
    }

    #[test]
    fn test_broadcast_command_reaches_every_screen() {
        let event = ChangeEvent::new(
            Stream::Commands,
            ChangeKind::Insert,
            None,
            Some(json!({"cmd": "ring"})),
        );

        assert!(event.is_visible_to("room_101", &Stream::ALL));
        assert!(event.is_visible_to("gym", &[Stream::Commands]));
        assert!(!event.is_visible_to("gym", &[Stream::Assets]));
    }

    #[test]
    fn test_message_wire_format() {
        let msg = DisplayMessage::Subscribe {
            screen_id: "room_101".to_string(),
            streams: vec![Stream::Commands, Stream::Schedules],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({"type": "subscribe", "screen_id": "room_101", "streams": ["commands", "schedules"]})
        );

        let incoming = r#"{"type":"change","event":{"stream":"commands","kind":"insert","screen_id":null,"record":{"cmd":"reload"}}}"#;
        match serde_json::from_str::<ServerMessage>(incoming).unwrap() {
            ServerMessage::Change { event } => {
                assert_eq!(event.stream, Stream::Commands);
                assert_eq!(event.kind, ChangeKind::Insert);
                assert_eq!(event.screen_id, None);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
