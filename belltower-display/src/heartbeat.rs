use belltower_core::sync::DisplayMessage;
use std::time::Duration;
use sysinfo::System;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

pub struct HeartbeatManager {
    screen_id: String,
    interval_secs: u64,
    sender: UnboundedSender<DisplayMessage>,
}

impl HeartbeatManager {
    pub fn new(screen_id: String, interval_secs: u64, sender: UnboundedSender<DisplayMessage>) -> Self {
        Self {
            screen_id,
            interval_secs: interval_secs.max(1),
            sender,
        }
    }

    /// Sends heartbeats until the connection drops or `cancel` fires.
    pub async fn start(self, cancel: CancellationToken) {
        let mut tick = interval(Duration::from_secs(self.interval_secs));
        let mut sys = System::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }

            let heartbeat = self.collect_heartbeat_data(&mut sys);
            if self.sender.send(heartbeat).is_err() {
                tracing::debug!("Heartbeat channel closed");
                break;
            }
        }
    }

    fn collect_heartbeat_data(&self, sys: &mut System) -> DisplayMessage {
        sys.refresh_cpu();
        sys.refresh_memory();

        // Average across cores (sysinfo 0.30 API)
        let cpu_usage = if !sys.cpus().is_empty() {
            sys.cpus().iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / sys.cpus().len() as f32
        } else {
            0.0
        } as f64;

        let memory_usage = (sys.used_memory() as f64) / (1024.0 * 1024.0);

        DisplayMessage::Heartbeat {
            screen_id: self.screen_id.clone(),
            cpu_usage_percent: cpu_usage,
            memory_usage_mb: memory_usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_heartbeat_carries_screen_id() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let manager = HeartbeatManager::new("room_101".to_string(), 60, tx);

        let task = tokio::spawn(manager.start(cancel.clone()));

        // The first interval tick completes immediately.
        match rx.recv().await.unwrap() {
            DisplayMessage::Heartbeat {
                screen_id,
                memory_usage_mb,
                ..
            } => {
                assert_eq!(screen_id, "room_101");
                assert!(memory_usage_mb >= 0.0);
            }
            other => panic!("unexpected message: {:?}", other),
        }

        cancel.cancel();
        task.await.unwrap();
    }
}
