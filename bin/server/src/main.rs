use rootcause::prelude::Report;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tkj_learning_server::{
    app,
    auth::{AppState, GoogleClient, db::PgUserStore},
    config::ServerConfig,
    error::StartupError,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Report<StartupError>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| StartupError::Configuration {
        details: e.to_string(),
    })?;
    tracing::info!(
        session = ?config.session,
        "Loaded configuration"
    );

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| StartupError::Database {
            details: e.to_string(),
        })?;

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|e| StartupError::Database {
            details: e.to_string(),
        })?;

    // Initialize OIDC client
    tracing::info!("Discovering Google OpenID configuration...");
    let allow_email_account_linking = config.google.allow_email_account_linking();
    let google = GoogleClient::discover(config.google)
        .await
        .map_err(|e| StartupError::IdentityProvider {
            details: e.to_string(),
        })?;

    let app_state = Arc::new(AppState::new(
        Arc::new(PgUserStore::new(db_pool)),
        Arc::new(google),
        config.session,
        allow_email_account_linking,
    ));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| StartupError::Serve {
            details: format!("failed to bind {}: {e}", config.listen_addr),
        })?;

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app::router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => tracing::warn!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::warn!("Received SIGTERM, shutting down"),
    }
}
