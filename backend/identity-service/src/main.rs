/// Identity Service Main Entry Point
///
/// Starts the HTTP server with:
/// - PostgreSQL connection pool
/// - Token codec built from the configured key material
/// - CORS, security headers and request logging around JWT-gated API routes
use actix_web::HttpServer;
use anyhow::{Context, Result};
use identity_service::{
    config::Settings, db::PgAuthRepository, http, services::AuthService, AppState,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "identity_service=info,actix_middleware=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Identity Service");

    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    let codec = settings
        .jwt
        .key_material()
        .context("Failed to load JWT key material")?
        .into_codec(&settings.jwt.validation_policy())
        .context("Failed to initialize JWT codec")?;
    info!(algorithm = %codec.algorithm(), "JWT codec initialized");

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!(
        "Database pool initialized with {} max connections",
        settings.database.max_connections
    );

    let auth = AuthService::from_settings(
        Arc::new(PgAuthRepository::new(db_pool)),
        Arc::clone(&codec),
        &settings.jwt,
    );

    let state = AppState {
        auth,
        codec,
        token_prefix: settings.jwt.bearer_prefix(),
    };

    let origins = settings.server.cors_allowed_origins.clone();
    let (host, port) = settings.server.bind_address();
    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || http::build_app(state.clone(), &origins))
    .bind((host, port))
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server terminated with error")?;

    info!("Identity Service shut down");
    Ok(())
}
