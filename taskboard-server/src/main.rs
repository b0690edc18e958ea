//! `taskboard-server` -- authoritative task server for board clients.
//!
//! # Usage
//!
//! ```bash
//! # Demo board on 0.0.0.0:9100
//! cargo run --bin taskboard-server
//!
//! # Custom address and seed file
//! cargo run --bin taskboard-server -- --bind 127.0.0.1:9100 --seed-file board.toml
//! ```

use std::sync::Arc;

use clap::Parser;
use taskboard_server::config::{ServerCliArgs, ServerConfig};
use taskboard_server::seed;
use taskboard_server::server::{self, ServerState};

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let records = match &config.seed_file {
        Some(path) => seed::load_seed(path),
        None => seed::demo_records(),
    };
    let records = match records {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "failed to load seed");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %config.bind_addr, tasks = records.len(), "starting task server");

    let state = Arc::new(ServerState::with_config(records, config.max_frame_size));
    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "task server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "task server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start task server");
            std::process::exit(1);
        }
    }
}
