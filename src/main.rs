use stex::config::Config;
use stex::services::SqliteStore;
use stex::AppState;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stex=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!("Starting stex on {}:{}", config.host, config.port);
    info!(
        "Database {}, tracked indices: {}",
        config.database_path,
        config.index_codes.join(",")
    );

    let store = SqliteStore::new(&config.database_path)?;
    info!("Signal rows on disk: {}", store.signal_count()?);

    let addr = format!("{}:{}", config.host, config.port);
    let app = stex::app(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("stex listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
