use anyhow::Result;
use belltower_server::config::Config;
use belltower_server::services::command_pruner;
use belltower_server::{build_router, db, AppState};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_PATH: &str = "server-config.toml";

#[derive(Parser)]
#[command(version, author = "BELLTOWER AUTHORS", about = "Belltower Server\nLicensed under AGPLv3\nCreated by BELLTOWER AUTHORS", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Generate a default configuration template to stdout
    #[arg(long)]
    generate_config: bool,
}

fn run_onboarding() -> Result<()> {
    use dialoguer::{theme::ColorfulTheme, Input};

    println!("Welcome to Belltower Server!");
    println!("No configuration file was found, let's create one.\n");

    let theme = ColorfulTheme::default();

    let host: String = Input::with_theme(&theme)
        .with_prompt("Server Host")
        .default("0.0.0.0".to_string())
        .interact_text()?;

    let port: u16 = Input::with_theme(&theme)
        .with_prompt("Server Port")
        .default(8080)
        .interact_text()?;

    let db_url: String = Input::with_theme(&theme)
        .with_prompt("Database URL")
        .default("sqlite://belltower.db".to_string())
        .interact_text()?;

    let cloud_name: String = Input::with_theme(&theme)
        .with_prompt("Media cloud name")
        .interact_text()?;

    let api_key: String = Input::with_theme(&theme)
        .with_prompt("Media API key")
        .interact_text()?;

    let api_secret: String = Input::with_theme(&theme)
        .with_prompt("Media API secret")
        .interact_text()?;

    let config_content = format!(
        r#"[server]
host = "{}"
port = {}

[server.https]
enabled = false
cert_path = "certs/cert.pem"
key_path = "certs/key.pem"

[database]
url = "{}"

[uploads]
folder = "signage_assets"
cloud_name = "{}"
api_key = "{}"
api_secret = "{}"

[commands]
retention_hours = 24

[logging]
level = "info"
"#,
        host, port, db_url, cloud_name, api_key, api_secret
    );

    // Validate before writing.
    toml::from_str::<Config>(&config_content)?;

    println!("\nGenerating configuration file: {}", DEFAULT_CONFIG_PATH);
    std::fs::write(DEFAULT_CONFIG_PATH, &config_content)?;
    println!("Configuration saved successfully!");
    println!("----------------------------------------\n");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", Config::default_template());
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Onboarding only when the default path is missing and someone is at the terminal
    if std::fs::metadata(&config_path).is_err() && cli.config.is_none() && console::user_attended()
    {
        if let Err(e) = run_onboarding() {
            eprintln!("Onboarding failed: {}", e);
            std::process::exit(1);
        }
    }

    if std::fs::metadata(&config_path).is_err() {
        eprintln!("Error: Configuration file '{}' not found.", config_path);
        eprintln!("Run with --generate-config to see a template.");
        std::process::exit(1);
    }

    let config = Config::load(&config_path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("belltower_server={},tower_http=debug", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Loaded configuration from {}", config_path);

    let db_pool = db::open(&config.database.url)?;
    tracing::info!("Database initialized");

    let state = AppState::new(db_pool, config.clone());

    tokio::spawn(command_pruner::run(state.clone()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = build_router(state);

    let listener_address: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid host/port: {}", e))?;

    if let Some(https_config) = &config.server.https {
        if https_config.enabled {
            use axum_server::tls_rustls::RustlsConfig;

            tracing::info!("Starting server in HTTPS mode on {}", addr);

            if !std::path::Path::new(&https_config.cert_path).exists() {
                anyhow::bail!("Certificate file not found: {}", https_config.cert_path);
            }
            if !std::path::Path::new(&https_config.key_path).exists() {
                anyhow::bail!("Key file not found: {}", https_config.key_path);
            }

            let tls_config =
                RustlsConfig::from_pem_file(&https_config.cert_path, &https_config.key_path)
                    .await?;

            axum_server::bind_rustls(listener_address, tls_config)
                .serve(app.into_make_service())
                .await?;

            return Ok(());
        }
    }

    let listener = tokio::net::TcpListener::bind(listener_address).await?;
    tracing::info!("Server listening on {} (HTTP)", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
