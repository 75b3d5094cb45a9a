use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use agora::auth::token::TokenStore;
use agora::cache::{Cache, MemoryCache};
use agora::config::{Cli, Config};
use agora::content;
use agora::routes;
use agora::state::AppState;
use agora::store::sqlite::{create_pool, run_migrations};
use agora::store::{DynStore, SqliteStore};

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

    // Initialize the document store
    let pool = create_pool(config.db_path())?;
    run_migrations(&pool)?;
    let store: DynStore = Arc::new(SqliteStore::new(pool));

    // Optional read-through cache
    let cache: Option<Arc<dyn Cache>> = if config.cache.enabled {
        Some(Arc::new(MemoryCache::new()))
    } else {
        tracing::info!("Cache disabled, all reads go to the store");
        None
    };

    // Seed the configured admin account
    content::users::ensure_admin(&store, &config.admin).await?;

    // Build app state
    let state = AppState {
        store,
        cache,
        tokens: Arc::new(Mutex::new(TokenStore::new())),
        config: config.clone(),
    };

    // Build router
    let app = Router::new()
        .merge(routes::users::router())
        .merge(routes::posts::router())
        .merge(routes::comments::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
