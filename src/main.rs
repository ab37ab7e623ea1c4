//! Agent platform gateway.
//!
//! Routes every inbound request before application logic runs: dynamic-port
//! POSTs reach sibling worker processes, `/api/*` families are rewritten to
//! the agent and dev servers, WebSocket upgrades are tunnelled, and
//! everything else passes through to the application server.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────┐
//!                      │                    GATEWAY                    │
//!   Client Request     │  ┌─────────┐   ┌──────────┐   ┌───────────┐   │
//!   ───────────────────┼─▶│   net   │──▶│   http   │──▶│  routing  │   │
//!                      │  │listener │   │  server  │   │   table   │   │
//!                      │  └─────────┘   └──────────┘   └─────┬─────┘   │
//!                      │                                     │         │
//!                      │              ┌──────────────────────┤         │
//!                      │              ▼                      ▼         │
//!                      │     ┌─────────────────┐   ┌─────────────────┐ │
//!   Client Response    │     │ forward / ws    │◀──│ upstream        │ │
//!   ◀──────────────────┼─────│ tunnel          │   │ transport cache │ │──▶ Upstreams
//!                      │     └─────────────────┘   └─────────────────┘ │
//!                      │                                               │
//!                      │  config · observability · security · lifecycle │
//!                      └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use agent_proxy::config::resolve_config;
use agent_proxy::lifecycle;
use agent_proxy::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "agent-proxy")]
#[command(about = "Request-routing gateway for the agent platform", long_about = None)]
struct Cli {
    /// TOML configuration file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding both file and PORT.
    #[arg(short, long)]
    port: Option<u16>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match resolve_config(cli.config.as_deref(), |key| std::env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("agent-proxy: configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }

    if cli.check {
        println!("configuration ok");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("agent-proxy: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address(),
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        "agent-proxy starting"
    );

    match lifecycle::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "agent-proxy stopped with an error");
            ExitCode::FAILURE
        }
    }
}
