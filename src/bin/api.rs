use equity_dossier::{api::start_server, Config, DossierService};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    let config = Config::from_env()?;

    if config.chat_api_key.is_none() {
        eprintln!("⚠️  PPLX_API_KEY not set in .env");
        eprintln!("📌 Document uploads will return a key-missing placeholder");
    }

    info!("🚀 Equity Dossier - API Server");
    info!("📍 Port: {}", config.port);

    let service = Arc::new(DossierService::from_config(&config)?);

    info!("✅ Dossier service initialized");
    info!("📡 Starting API server...");

    start_server(service, config.port).await?;

    Ok(())
}
