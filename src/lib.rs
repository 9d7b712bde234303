pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

use axum::Router;
use std::sync::Arc;

use crate::api::{
    cors_layer, create_router, AppState, CookieSessionResolver, HeaderSessionResolver,
    SessionResolver,
};
use crate::config::{AppConfig, AuthMode};
use crate::store::traits::SessionStore;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{Error, Result};

// Export logic types
pub use logic::{AccessGate, AlignedTokens, AlignmentEngine, ExplanationResolver, Explorer};

// Export all model types
pub use model::*;

// Export store types
pub use store::{InMemoryStore, PostgresStore, Store};

/// Pick the session resolver for the configured auth mode
pub fn session_resolver<S: SessionStore + 'static>(
    config: &AppConfig,
    store: Arc<S>,
) -> Arc<dyn SessionResolver> {
    match config.auth.mode {
        AuthMode::Header => Arc::new(HeaderSessionResolver),
        AuthMode::Session => Arc::new(CookieSessionResolver::new(
            store,
            config.auth.session_cookie.clone(),
        )),
    }
}

/// Assemble the HTTP application over any store
pub fn build_app<S: Store + 'static>(
    store: Arc<S>,
    sessions: Arc<dyn SessionResolver>,
    allowed_origins: &[String],
) -> Router {
    create_router()
        .with_state(Arc::new(AppState::new(store, sessions)))
        .layer(cors_layer(allowed_origins))
}

/// Connect, migrate, optionally seed, and serve until shutdown
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    let database_url = config.database_url()?;
    log::info!("connecting to PostgreSQL");
    let postgres_store = PostgresStore::new(&database_url, config.max_connections()).await?;

    log::info!("running database migrations");
    postgres_store.migrate().await?;

    let store = Arc::new(postgres_store);

    if config.load_seed_data {
        log::info!("loading seed data");
        seed::load_seed_data(store.as_ref()).await?;
    }

    let sessions = session_resolver(&config, Arc::clone(&store));
    let app = build_app(store, sessions, &config.server.allowed_origins);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!(
        "interp-atlas listening on http://{} (auth mode: {:?})",
        bind_address,
        config.auth.mode
    );

    serve(listener, app).await?;

    Ok(())
}
