use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use inkwell::assets::staging::StagingDir;
use inkwell::assets::CloudinaryClient;
use inkwell::auth::google::GoogleIdentityProvider;
use inkwell::auth::tokens::TokenService;
use inkwell::config::{Cli, Config};
use inkwell::db;
use inkwell::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;
    config.validate()?;

    // Staging directory for uploads waiting on the asset host
    let staging = StagingDir::new(config.staging_path());
    staging.ensure().await?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    // External clients, built once and shared by every request
    let assets = CloudinaryClient::new(&config.assets)?;
    if config.assets.cloud_name.is_empty() {
        tracing::warn!("No asset host cloud configured; image uploads will fail");
    }
    let identity = GoogleIdentityProvider::new(&config.oauth);

    let state = AppState {
        db: pool,
        tokens: Arc::new(TokenService::new(&config.auth)),
        assets: Arc::new(assets),
        identity: Arc::new(identity),
        staging,
        config: config.clone(),
    };

    let app = inkwell::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
