use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub uploads: UploadConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub https: Option<HttpsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpsConfig {
    pub enabled: bool,
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Credentials for the hosted media service that displays pull assets from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_folder")]
    pub folder: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    pub retention_hours: i64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self { retention_hours: 24 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_upload_folder() -> String {
    "signage_assets".to_string()
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_template() -> &'static str {
        r#"[server]
host = "0.0.0.0"
port = 8080

[server.https]
enabled = false
cert_path = "certs/cert.pem"
key_path = "certs/key.pem"

[database]
# URL for the SQLite database. Ensure the directory exists.
url = "sqlite://belltower.db"

[uploads]
folder = "signage_assets"
cloud_name = "change-me"
api_key = "change-me"
api_secret = "change-me-in-production"

[commands]
# Command rows are one-shot signals; older rows are pruned.
retention_hours = 24

[logging]
level = "info"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(Config::default_template()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.uploads.folder, "signage_assets");
        assert_eq!(config.commands.retention_hours, 24);
        assert!(!config.server.https.unwrap().enabled);
    }

    #[test]
    fn test_optional_sections_default() {
        let config: Config = toml::from_str(
            r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
url = "belltower.db"

[uploads]
cloud_name = "demo"
api_key = "key"
api_secret = "secret"

[logging]
level = "debug"
"#,
        )
        .unwrap();
        assert_eq!(config.uploads.folder, "signage_assets");
        assert_eq!(config.commands.retention_hours, 24);
        assert!(config.server.https.is_none());
    }
}
