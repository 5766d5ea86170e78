mod bell;
mod channel;
mod config;
mod heartbeat;
mod mpv_client;
mod playlist;
mod session;
mod store;
mod websocket_client;

use anyhow::Result;
use belltower_core::sync::Stream;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bell::MpvBell;
use crate::channel::RealtimeTransport;
use crate::config::Config;
use crate::mpv_client::MpvClient;
use crate::playlist::{run_playlist, MediaSurface, PlaylistFeed};
use crate::session::{wait_for_start_gesture, ScreenSession};
use crate::store::HttpStore;
use crate::websocket_client::WebSocketTransport;

#[derive(Parser)]
#[command(version, author = "BELLTOWER AUTHORS", about = "Belltower Display\nLicensed under AGPLv3\nCreated by BELLTOWER AUTHORS", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Generate a default configuration template to stdout
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", Config::default_template());
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "belltower_display=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(&cli.config)?;
    tracing::info!("Loaded configuration for screen: {}", config.screen_id);

    let mut mpv = mpv_client::spawn_mpv(&config.mpv_socket_path)?;
    let surface: Arc<dyn MediaSurface> = Arc::new(MpvClient::new(config.mpv_socket_path.clone()));

    let (playlist_tx, playlist_rx) = watch::channel(PlaylistFeed::default());
    let mut session = ScreenSession::new(
        config.screen_id.clone(),
        Arc::new(HttpStore::new(&config.api_base_url())?),
        Arc::new(MpvBell::new(config.bell_sound_path.clone())),
        playlist_tx,
    )
    .with_status_surface(surface.clone())
    .with_timezone(config.timezone.clone());

    if config.require_start_gesture && console::user_attended() {
        if !wait_for_start_gesture(config.screen_id.clone()).await? {
            tracing::info!("Start declined, exiting");
            let _ = mpv.kill();
            return Ok(());
        }
    }
    session.start().await;

    let shutdown = CancellationToken::new();
    let playlist_task = tokio::spawn(run_playlist(surface, playlist_rx, shutdown.child_token()));

    let transport = WebSocketTransport::new(
        config.server_url.clone(),
        config.heartbeat_interval_secs,
    );
    let subscription = transport.subscribe(&config.screen_id, &Stream::ALL);

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down");
                shutdown.cancel();
            }
        });
    }

    session.run(subscription, shutdown.clone()).await;

    shutdown.cancel();
    let _ = playlist_task.await;
    if let Err(e) = mpv.kill() {
        tracing::debug!("mpv already gone: {}", e);
    }

    Ok(())
}
