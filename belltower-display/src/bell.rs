use std::process::Stdio;
use tokio::process::Command;

/// Something that can sound the bell. Playback is fire-and-forget:
/// failures are logged by the implementation and never reported back.
pub trait BellPlayer: Send + Sync {
    fn ring(&self);
}

/// Plays the bell sound through a short-lived, audio-only mpv process so it
/// never interrupts the media playlist.
pub struct MpvBell {
    sound_path: String,
}

impl MpvBell {
    pub fn new(sound_path: String) -> Self {
        Self { sound_path }
    }
}

impl BellPlayer for MpvBell {
    fn ring(&self) {
        tracing::info!("Ringing bell");
        let sound_path = self.sound_path.clone();

        tokio::spawn(async move {
            let result = Command::new("mpv")
                .arg("--no-video")
                .arg("--really-quiet")
                .arg(&sound_path)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;

            match result {
                Ok(status) if status.success() => {}
                Ok(status) => tracing::error!("Bell playback exited with {}", status),
                Err(e) => tracing::error!("Failed to play bell {}: {}", sound_path, e),
            }
        });
    }
}
