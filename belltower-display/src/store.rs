use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use belltower_core::models::{Asset, Schedule, Screen};
use reqwest::{Client, Url};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Read access to the rows a screen renders from.
#[async_trait]
pub trait ScreenStore: Send + Sync {
    async fn fetch_screen(&self, screen_id: &str) -> Result<Screen>;
    async fn fetch_schedules(&self, screen_id: &str) -> Result<Vec<Schedule>>;
    async fn fetch_assets(&self, screen_id: &str) -> Result<Vec<Asset>>;
}

/// Row store reached over the server's REST API.
pub struct HttpStore {
    client: Client,
    base_url: Url,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            bail!("Not a usable server address: {}", base_url);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// `{base}/api/{segments..}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("GET {} returned {}", url, response.status()));
        }
        response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to decode {}: {}", url, e))
    }
}

#[async_trait]
impl ScreenStore for HttpStore {
    async fn fetch_screen(&self, screen_id: &str) -> Result<Screen> {
        self.get_json(self.endpoint(&["screens", screen_id])).await
    }

    async fn fetch_schedules(&self, screen_id: &str) -> Result<Vec<Schedule>> {
        self.get_json(self.endpoint(&["screens", screen_id, "schedules"]))
            .await
    }

    async fn fetch_assets(&self, screen_id: &str) -> Result<Vec<Asset>> {
        let mut assets: Vec<Asset> = self
            .get_json(self.endpoint(&["screens", screen_id, "assets"]))
            .await?;
        assets.sort_by_key(|a| a.order);
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::net::TcpListener;

    #[test]
    fn test_endpoint_encodes_screen_id() {
        let store = HttpStore::new("http://127.0.0.1:8080").unwrap();
        assert_eq!(
            store.endpoint(&["screens", "room_101", "schedules"]).as_str(),
            "http://127.0.0.1:8080/api/screens/room_101/schedules"
        );
        assert_eq!(
            store.endpoint(&["screens", "room 1/b", "assets"]).as_str(),
            "http://127.0.0.1:8080/api/screens/room%201%2Fb/assets"
        );
    }

    #[test]
    fn test_rejects_unusable_base() {
        assert!(HttpStore::new("not a url").is_err());
        assert!(HttpStore::new("mailto:office@school.example").is_err());
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        // Accepts connections and never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let store =
            HttpStore::with_timeout(&format!("http://{}", addr), Duration::from_millis(200)).unwrap();
        let started = Instant::now();
        assert!(store.fetch_schedules("room_101").await.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
