use anyhow::Result;
use belltower_core::models::{Asset, AssetKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub const NO_MEDIA_MESSAGE: &str = "No Media Scheduled";

/// Grace period before polling a video for completion, so a freshly loaded
/// file is not mistaken for a finished one.
const VIDEO_START_GRACE: Duration = Duration::from_millis(500);
const VIDEO_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Where media and status text end up on screen.
pub trait MediaSurface: Send + Sync {
    fn show_image(&self, url: &str) -> Result<()>;
    fn play_video(&self, url: &str) -> Result<()>;
    /// Whether the current video has finished playing.
    fn is_finished(&self) -> Result<bool>;
    fn clear(&self, message: &str) -> Result<()>;
    fn show_status(&self, text: &str) -> Result<()>;
}

/// Asset list handed to the playlist task. Bumping `restart_epoch` restarts
/// playback from the first item.
#[derive(Debug, Clone, Default)]
pub struct PlaylistFeed {
    pub assets: Vec<Asset>,
    pub restart_epoch: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaylistCursor {
    index: usize,
}

impl PlaylistCursor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current<'a>(&self, assets: &'a [Asset]) -> Option<&'a Asset> {
        assets.get(self.index)
    }

    /// Moves to the next item, wrapping at the end.
    pub fn advance(&mut self, len: usize) {
        self.index = if len == 0 { 0 } else { (self.index + 1) % len };
    }

    /// Keeps the position across a list change when it is still in range.
    pub fn retain(&mut self, len: usize) {
        if self.index >= len {
            self.index = 0;
        }
    }

    pub fn restart(&mut self) {
        self.index = 0;
    }
}

fn render(surface: &dyn MediaSurface, asset: &Asset) {
    tracing::info!("Showing {} {} ({})", asset.kind, asset.id, asset.url);
    let result = match asset.kind {
        AssetKind::Image => surface.show_image(&asset.url),
        AssetKind::Video => surface.play_video(&asset.url),
    };
    if let Err(e) = result {
        tracing::error!("Failed to show asset {}: {}", asset.id, e);
    }
}

async fn wait_for_end(surface: &dyn MediaSurface, asset: &Asset) {
    match asset.kind {
        AssetKind::Image => {
            sleep(Duration::from_secs(asset.duration.max(1) as u64)).await;
        }
        AssetKind::Video => {
            sleep(VIDEO_START_GRACE).await;
            loop {
                match surface.is_finished() {
                    Ok(true) => return,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!("Lost track of video {}: {}", asset.id, e);
                        return;
                    }
                }
                sleep(VIDEO_POLL_INTERVAL).await;
            }
        }
    }
}

/// Loops over the screen's assets until cancelled. Images dwell for their
/// duration, videos advance when playback ends.
pub async fn run_playlist(
    surface: Arc<dyn MediaSurface>,
    mut feed: watch::Receiver<PlaylistFeed>,
    cancel: CancellationToken,
) {
    let mut cursor = PlaylistCursor::default();
    let (mut assets, mut epoch) = {
        let current = feed.borrow_and_update();
        (current.assets.clone(), current.restart_epoch)
    };
    let mut showing: Option<Asset> = None;

    loop {
        let asset = cursor.current(&assets).cloned();

        match &asset {
            Some(asset) if showing.as_ref() != Some(asset) => {
                render(surface.as_ref(), asset);
                showing = Some(asset.clone());
            }
            Some(_) => {}
            None => {
                showing = None;
                if let Err(e) = surface.clear(NO_MEDIA_MESSAGE) {
                    tracing::error!("Failed to clear screen: {}", e);
                }
            }
        }

        let changed = tokio::select! {
            _ = cancel.cancelled() => break,
            changed = feed.changed() => changed,
            _ = async {
                match &asset {
                    Some(a) => wait_for_end(surface.as_ref(), a).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                cursor.advance(assets.len());
                // Force a re-render even for a single-item list.
                showing = None;
                continue;
            }
        };

        if changed.is_err() {
            // Session dropped the sender
            break;
        }

        let update = feed.borrow_and_update().clone();
        if update.restart_epoch != epoch {
            epoch = update.restart_epoch;
            cursor.restart();
            showing = None;
        } else {
            cursor.retain(update.assets.len());
        }
        assets = update.assets;
        tracing::debug!("Playlist updated: {} item(s)", assets.len());
    }

    tracing::info!("Playlist stopped");
}
