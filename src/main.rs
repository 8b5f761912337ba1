//! Modgate - moderation and approval engine

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modgate::{
    api::{self, AppState},
    config::Config,
    db::{self, repositories::SqlxUserRepository},
    services::{create_directory, create_notification_client},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modgate=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Modgate...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Collaborators
    let directory = create_directory(&config.directory, SqlxUserRepository::boxed(pool.clone()))?;
    match config.directory.base_url.as_deref() {
        Some(url) => tracing::info!("Directory: {}", url),
        None => tracing::info!("Directory: local database"),
    }
    let notifications = create_notification_client(&config.notification)?;
    if config.notification.base_url.is_none() {
        tracing::info!("No notification service configured, notifications are logged only");
    }

    // Build application state
    let state = AppState::new(
        pool,
        directory,
        notifications,
        config.notification.timeout(),
    );

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
