use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub screen_id: String,
    pub server_url: String,
    /// Overrides the timezone stored on the screen row.
    pub timezone: Option<String>,
    pub bell_sound_path: String,
    pub mpv_socket_path: String,
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_require_start_gesture")]
    pub require_start_gesture: bool,
}

fn default_require_start_gesture() -> bool {
    true
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// REST base derived from the websocket URL, e.g. `ws://host:8080/ws` -> `http://host:8080`.
    pub fn api_base_url(&self) -> String {
        let base_url = self
            .server_url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        base_url
            .split("/ws")
            .next()
            .unwrap_or(&base_url)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn default_template() -> &'static str {
        r#"screen_id = "room_101"
server_url = "ws://127.0.0.1:8080/ws"
# timezone = "America/New_York"
bell_sound_path = "/usr/share/belltower/bell.mp3"
mpv_socket_path = "/tmp/belltower-mpv-socket"
heartbeat_interval_secs = 30
require_start_gesture = true
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(Config::default_template()).unwrap();
        assert_eq!(config.screen_id, "room_101");
        assert!(config.timezone.is_none());
        assert!(config.require_start_gesture);
    }

    #[test]
    fn test_api_base_url() {
        let mut config: Config = toml::from_str(Config::default_template()).unwrap();
        assert_eq!(config.api_base_url(), "http://127.0.0.1:8080");

        config.server_url = "wss://signage.school.example/ws".to_string();
        assert_eq!(config.api_base_url(), "https://signage.school.example");
    }
}
