//! Mini-app gateway binary.
//!
//! ```text
//!  Client ──▶ TraceLayer span
//!              └─▶ request_id → access_log → cors → panic_recovery
//!                    → content_type → session → [abuse_guard] → handler
//!                                                    │
//!                                  MessageStore / UserStore
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tokio::net::TcpListener;

use miniapp_gateway::config::{self, AppConfig};
use miniapp_gateway::lifecycle::{shutdown_on_signal, Shutdown};
use miniapp_gateway::net::load_tls_config;
use miniapp_gateway::observability::{logging, metrics};
use miniapp_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "miniapp-gateway")]
#[command(about = "Authentication and abuse protection for a chat mini-app backend", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Environment overrides apply either way.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the server (default)
    Serve,
    /// Print a fresh cookie encryption key
    Keygen {
        /// Key length in bytes: 16, 24 or 32
        #[arg(short, long, default_value_t = 32)]
        length: usize,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Keygen { length } => {
            if ![16, 24, 32].contains(&length) {
                return Err(format!("key length must be 16, 24 or 32, got {}", length).into());
            }
            let key: String = OsRng
                .sample_iter(&Alphanumeric)
                .take(length)
                .map(char::from)
                .collect();
            println!("{}", key);
            Ok(())
        }
        Command::CheckConfig => {
            config::load_config(cli.config.as_deref())?;
            println!("configuration OK");
            Ok(())
        }
        Command::Serve => {
            let config = config::load_config(cli.config.as_deref())?;
            serve(config).await
        }
    }
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "miniapp-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        cors_origins = config.cors.allowed_origins.len(),
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );
    if config.auth.allow_dev_bypass {
        tracing::warn!("Dev handshake bypass is ENABLED; never run this in production");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    shutdown_on_signal(Arc::clone(&shutdown));

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await?;
            let addr = bind_address.parse()?;
            server.run_tls(addr, rustls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
