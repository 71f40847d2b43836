use identity_service::{
    build_router,
    config::AuthConfig,
    db,
    repository::PgRepository,
    services::{InviteNotifier, JwtService, LogNotifier, SmtpNotifier},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

    let jwt = JwtService::new(&config.jwt).map_err(AppError::ConfigError)?;
    tracing::info!("JWT service initialized");

    let notifier: Arc<dyn InviteNotifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp)?),
        None => {
            tracing::warn!("SMTP_HOST not set, invite e-mails will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let repo = Arc::new(PgRepository::new(pool));
    let state = AppState::new(
        repo,
        jwt,
        notifier,
        config.invite.clone(),
        config.security.clone(),
    );
    let app = build_router(state);

    let addr = config.common.socket_addr();
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
