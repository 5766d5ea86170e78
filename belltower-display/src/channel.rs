use belltower_core::models::{Command, CommandKind};
use belltower_core::sync::{ChangeEvent, ChangeKind, Stream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

/// Source of row-level change events for one screen.
pub trait RealtimeTransport: Send + Sync {
    fn subscribe(&self, screen_id: &str, streams: &[Stream]) -> Subscription;
}

/// Live handle on a screen's change streams. Released explicitly on teardown;
/// dropping it cancels the underlying transport too.
pub struct Subscription {
    events: UnboundedReceiver<ChangeEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(events: UnboundedReceiver<ChangeEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Next event, or `None` once the transport has shut down.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    pub fn release(self) {
        self.cancel.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// What a screen session does in response to a change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    RefetchAssets,
    RefetchSchedules,
    Ring,
    Reload,
    Ignore,
}

pub fn dispatch(event: &ChangeEvent) -> Reaction {
    match event.stream {
        Stream::Assets => Reaction::RefetchAssets,
        Stream::Schedules => Reaction::RefetchSchedules,
        Stream::Commands => {
            if event.kind != ChangeKind::Insert {
                return Reaction::Ignore;
            }
            let Some(record) = &event.record else {
                tracing::warn!("Command insert without a record");
                return Reaction::Ignore;
            };
            let command: Command = match serde_json::from_value(record.clone()) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("Unreadable command record: {}", e);
                    return Reaction::Ignore;
                }
            };
            match command.kind() {
                CommandKind::Ring => Reaction::Ring,
                CommandKind::Reload => Reaction::Reload,
                CommandKind::Other(cmd) => {
                    tracing::debug!("Ignoring unknown command '{}'", cmd);
                    Reaction::Ignore
                }
            }
        }
    }
}
