//! Courier API server binary entrypoint.

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use courier_common::config::AppConfig;
use courier_common::db::create_pool;
use courier_common::types::Channel;
use courier_dispatch::fault::RandomFaults;
use courier_dispatch::senders::{ChatSender, EmailSender};
use courier_dispatch::{Dispatcher, PgStore, RetryPolicy, SenderRegistry};

use courier_api::routes::create_router;
use courier_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("courier_api=debug,courier_dispatch=debug,tower_http=debug")),
        )
        .init();

    tracing::info!("Starting Courier API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool and apply migrations
    let pool = create_pool(&config).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database pool created, migrations applied");

    // Register one sender per channel; registration happens only here.
    let faults = Arc::new(RandomFaults::new(config.fault_probability));
    let mut registry = SenderRegistry::new();
    registry.register(
        Channel::Email,
        Arc::new(EmailSender::new(config.email_latency(), faults.clone())),
    );
    registry.register(
        Channel::Chat,
        Arc::new(ChatSender::new(config.chat_latency(), faults)),
    );

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(PgStore::new(pool.clone())),
        Arc::new(registry),
        RetryPolicy::new(config.max_attempts, config.base_delay()),
    ));

    // Build application state and router
    let state = AppState::new(pool, dispatcher);
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    tracing::info!("API server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
