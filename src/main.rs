//! Complaint Desk
//!
//! A web application where users file complaints and administrators triage,
//! assign and resolve them.
//!
//! ## Features
//!
//! - **Token auth**: stateless HS256 bearer tokens, user and admin guards
//! - **Complaint lifecycle**: ownership-scoped CRUD and admin triage
//! - **Notifications**: best-effort email on submission, update and assignment
//! - **Retention**: periodic archive sweep of old complaints

mod config;
mod db;
mod error;
mod handlers;
mod models;
mod routes;
mod services;
mod validation;

use chrono::Duration;
use db::Stores;
use handlers::AppState;
use services::{ComplaintService, LogMailer, TokenService};
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "complaint_desk=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Complaint Desk");
    tracing::info!("Environment: {:?}", config.environment);

    let stores = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::create_pool(url).await?;
            tracing::info!("Running database migrations...");
            db::run_migrations(&pool).await?;
            Stores::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on exit");
            Stores::in_memory()
        }
    };

    if config.admin_email.is_none() {
        tracing::warn!("ADMIN_EMAIL not set, admin notifications are disabled");
    }

    let archive_after = Duration::try_days(config.archive_after_days)
        .ok_or_else(|| config::ConfigError::Invalid("ARCHIVE_AFTER_DAYS out of range".to_string()))?;

    // Create application state
    let state = AppState::new(
        stores,
        TokenService::new(config.jwt_secret.as_bytes()),
        Arc::new(LogMailer::new(config.mail_from.clone())),
        config.admin_email.clone(),
        archive_after,
        config.is_production(),
    );

    spawn_archive_sweep(state.complaints.clone(), archive_after, config.archive_interval);

    // Build CORS layer
    let cors = if config.is_production() {
        CorsLayer::new()
            .allow_origin(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    };

    let app = routes::build_router(state)
        .fallback_service(ServeDir::new(&config.frontend_dir))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(cors);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Frontend served from: {}", config.frontend_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Periodically archive complaints older than `archive_after`.
/// The first sweep runs immediately at startup.
fn spawn_archive_sweep(
    complaints: ComplaintService,
    archive_after: Duration,
    every: std::time::Duration,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = complaints.archive_sweep(archive_after).await {
                tracing::error!("Archive sweep failed: {}", e);
            }
        }
    });
}

/// Wait for Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
