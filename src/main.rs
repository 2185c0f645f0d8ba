//! Router proxy
//!
//! A reverse proxy that decides each request's upstream at request time.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ routing::Resolver ──┬─▶ Resolved / NoMatch(default)
//!                     (axum)          (string | object |  │       │
//!                                      callback | table)  │       ▼
//!                                                         │   http::forward ──▶ Upstream
//!                                                         │   (TLS iff "https:")
//!                                                         └─▶ Failed
//!                                                                 │
//!     Client Response ◀──────────── error hook (502) ◀────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use router_proxy::config::load_config;
use router_proxy::lifecycle::startup;
use router_proxy::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "router-proxy")]
#[command(about = "Reverse proxy with dynamic target routing", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        // Router normalization is part of the check.
        return match router_proxy::HttpServer::new(config) {
            Ok(_) => {
                println!("{}: ok", cli.config.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", cli.config.display(), e);
                ExitCode::FAILURE
            }
        };
    }

    init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "router-proxy starting"
    );

    if let Err(e) = startup::run(config).await {
        tracing::error!(error = %e, "Startup failed");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
