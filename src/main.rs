use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber;

use quotagate::config::QuotagateConfig;
use quotagate::directory::PostgresDirectory;
use quotagate::http::{admit, with_logging, AdmissionGate, GateServer};
use quotagate::ratelimit::SharedRateLimiter;
use quotagate::store::RedisStore;

/// Distributed admission gate for a protected resource server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    info!("Starting Quotagate Admission Gate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => QuotagateConfig::from_file(path)?,
        None => QuotagateConfig::default(),
    };
    info!(listen_addr = %config.server.listen_addr, "Configuration loaded");

    let store = RedisStore::connect(&config.store.url, config.store.op_timeout()).await?;
    info!(url = %config.store.url, "Counter store connected");

    let directory = Arc::new(
        PostgresDirectory::connect(&config.directory.url, config.directory.query_timeout())
            .await?,
    );
    info!("Principal directory connected");

    let limiter =
        SharedRateLimiter::with_retry_budget(store, config.rate_limiting.write_retry_budget);
    let gate = Arc::new(AdmissionGate::new(
        limiter,
        directory,
        &config.rate_limiting,
    ));

    let app = protected_router()
        .layer(axum::middleware::from_fn_with_state(
            gate,
            admit::<RedisStore>,
        ))
        .layer(axum::middleware::from_fn(with_logging));

    let server = GateServer::new(config.server.listen_addr, app);
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Quotagate Admission Gate stopped");
    Ok(())
}

/// The resource being protected. Stands in for the real downstream handler.
fn protected_router() -> axum::Router {
    use axum::routing::get;
    axum::Router::new().route("/rank", get(rank))
}

async fn rank() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
