//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use fulfillment::Collaborators;
use inventory::{InventoryLedger, PostgresTransactionLog};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Builds the ledger, persisting transactions to PostgreSQL when configured.
async fn build_ledger(config: &Config) -> InventoryLedger {
    let Some(url) = &config.database_url else {
        tracing::info!("DATABASE_URL not set, keeping the inventory log in memory");
        return InventoryLedger::default();
    };

    let pool = sqlx::PgPool::connect(url)
        .await
        .expect("failed to connect to database");
    let log = PostgresTransactionLog::new(pool);
    log.run_migrations()
        .await
        .expect("failed to run migrations");
    tracing::info!("inventory log backed by PostgreSQL");
    InventoryLedger::new(Arc::new(log))
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Build the ledger and application state
    let ledger = build_ledger(&config).await;
    let state = api::create_state(ledger, Collaborators::default(), config.fulfillment());

    // 4. Build the application
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
