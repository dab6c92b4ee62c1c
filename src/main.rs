//! probe-server: a diagnostic HTTP server
//!
//! Exposes a fixed set of endpoints for observing how clients and
//! infrastructure react to server-side conditions:
//! - Echo of request bodies, headers and query parameters
//! - Memory and CPU pressure with a configurable number of 10 MiB blocks
//! - An induced panic and an induced process exit
//! - Fixed and caller-chosen response delays
//!
//! Configuration via CLI arguments or TOML file. SIGINT/SIGTERM trigger a
//! graceful shutdown.

mod config;
mod handlers;
mod lifecycle;
mod response;
mod router;
mod server;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        workers = ?config.workers,
        max_block_count = ?config.max_block_count,
        shutdown_grace = config.shutdown_grace,
        "Starting probe-server"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.build()?;

    runtime.block_on(async move {
        let server = Server::new(config);

        let shutdown = server.shutdown_handle();
        tokio::spawn(async move {
            lifecycle::watch_signals(&shutdown).await;
        });

        server.run().await
    })?;

    info!("Server stopped");
    Ok(())
}
