use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use limitd::config::{LimitdConfig, StorageBackend};
use limitd::grpc::GrpcServer;
use limitd::ratelimit::RateLimiter;
use limitd::storage::{MemoryStore, RateLimitStore, RedisStore};

#[derive(Debug, Parser)]
#[command(name = "limitd", version, about = "Distributed rate limiting service")]
struct Args {
    /// Path to a configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Starting Limitd Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = LimitdConfig::load(args.config.as_deref())?;
    info!(
        grpc_addr = %config.server.grpc_addr,
        backend = ?config.storage.backend,
        "Configuration loaded"
    );

    // Wire up the configured storage backend
    let store: Arc<dyn RateLimitStore> = match config.storage.backend {
        StorageBackend::Redis => {
            let redis = &config.storage.redis;
            Arc::new(
                RedisStore::connect(
                    &redis.url,
                    redis.key_prefix.clone(),
                    redis.consistency,
                    redis.connect_timeout(),
                )
                .await?,
            )
        }
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };

    let limiter = Arc::new(RateLimiter::new(store));
    info!("Rate limiter initialized");

    // Create and start the gRPC server
    let grpc_server = GrpcServer::new(config.server.grpc_addr, limiter.clone());

    // Run the server with graceful shutdown on Ctrl+C or SIGTERM
    grpc_server.serve_with_shutdown(shutdown_signal()).await?;

    // Release the storage connection on the way out
    limiter.close().await?;

    info!("Limitd Rate Limiting Service stopped");
    Ok(())
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
