use anyhow::Result;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use crate::playlist::MediaSurface;

/// Starts a fullscreen idle mpv with its IPC socket at `socket_path`.
pub fn spawn_mpv(socket_path: &str) -> Result<Child> {
    if Path::new(socket_path).exists() {
        let _ = std::fs::remove_file(socket_path);
    }

    let child = Command::new("mpv")
        .arg("--idle")
        .arg("--fullscreen")
        .arg("--force-window")
        .arg("--keep-open=no")
        .arg(format!("--input-ipc-server={}", socket_path))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // Wait for socket to be created
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_secs(10) {
        if Path::new(socket_path).exists() {
            return Ok(child);
        }
        thread::sleep(Duration::from_millis(100));
    }

    tracing::warn!("mpv socket {} did not appear within 10s", socket_path);
    Ok(child)
}

pub struct MpvClient {
    socket_path: String,
}

impl MpvClient {
    pub fn new(socket_path: String) -> Self {
        Self { socket_path }
    }

    /// Loads `url` replacing whatever is on screen. Images stay up until replaced.
    fn load(&self, url: &str, image: bool) -> Result<()> {
        let mut args = vec!["loadfile".to_string(), url.to_string(), "replace".to_string()];

        // mpv 0.38+ takes an insertion index before the per-file options.
        if image {
            args.push("0".to_string());
            args.push("image-display-duration=inf".to_string());
        }

        self.send_command(json!({ "command": args }))?;
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.send_command(json!({
            "command": ["stop"]
        }))?;
        Ok(())
    }

    pub fn show_text(&self, text: &str, duration_ms: u64) -> Result<()> {
        self.send_command(json!({
            "command": ["show-text", text, duration_ms]
        }))?;
        Ok(())
    }

    pub fn is_idle(&self) -> Result<bool> {
        let response = self.send_command(json!({
            "command": ["get_property", "idle-active"]
        }))?;

        response["data"]
            .as_bool()
            .ok_or_else(|| anyhow::anyhow!("Invalid response"))
    }

    pub fn send_command(&self, cmd: Value) -> Result<Value> {
        let mut stream = UnixStream::connect(&self.socket_path)?;
        stream.set_write_timeout(Some(Duration::from_secs(1)))?;
        stream.set_read_timeout(Some(Duration::from_secs(1)))?;

        let cmd_str = format!("{}\n", serde_json::to_string(&cmd)?);
        tracing::debug!(target: "belltower_display::mpv_client", "Sending command: {}", cmd_str.trim());

        stream.write_all(cmd_str.as_bytes())?;

        // mpv interleaves async events with replies; skip until ours arrives
        let mut reader = BufReader::new(stream);
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                anyhow::bail!("mpv closed the IPC socket");
            }
            let value: Value = serde_json::from_str(&line)?;
            if value.get("event").is_none() {
                if let Some(err) = value["error"].as_str() {
                    if err != "success" {
                        anyhow::bail!("mpv error: {}", err);
                    }
                }
                return Ok(value);
            }
        }
    }
}

impl MediaSurface for MpvClient {
    fn show_image(&self, url: &str) -> Result<()> {
        self.load(url, true)
    }

    fn play_video(&self, url: &str) -> Result<()> {
        self.load(url, false)
    }

    fn is_finished(&self) -> Result<bool> {
        self.is_idle()
    }

    fn clear(&self, message: &str) -> Result<()> {
        self.stop()?;
        self.show_text(message, 60_000)
    }

    fn show_status(&self, text: &str) -> Result<()> {
        self.show_text(text, 1_500)
    }
}
