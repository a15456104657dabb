//! TCP round-robin load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────┐
//!                  │                  TCP BALANCER                  │
//!                  │                                                │
//!   Client ────────┼─▶ net::listener ──▶ proxy::session ──┐         │
//!                  │     (accept loop)    (select, dial)  │         │
//!                  │                          │           ▼         │
//!                  │                          │   load_balancer::pool│
//!                  │                          ▼     (round-robin)   │
//!   Client ◀───────┼──── relay ◀──────────── relay ─────────────────┼──▶ Backend
//!                  │  backend→client      client→backend            │
//!                  │                                                │
//!                  │  config · observability · resilience · lifecycle│
//!                  └────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tcp_balancer::config::{self, BackendConfig, ProxyConfig};
use tcp_balancer::lifecycle::{signals, Shutdown};
use tcp_balancer::load_balancer::BackendPool;
use tcp_balancer::net::Listener;
use tcp_balancer::observability::{logging, metrics};
use tcp_balancer::proxy::{Proxy, SessionSettings};

#[derive(Parser)]
#[command(name = "tcp-balancer")]
#[command(about = "Round-robin TCP load balancer", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    listen: Option<String>,

    /// Override the backend list (repeatable, host:port).
    #[arg(short, long = "backend")]
    backends: Vec<String>,

    /// Override observability.log_level.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Resolve the effective configuration: file (or defaults), then flags.
    fn resolve(&self) -> Result<ProxyConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if !self.backends.is_empty() {
            config.backends = self
                .backends
                .iter()
                .map(|address| BackendConfig::new("", address.clone()))
                .collect();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }

        config::validation::validate_config(&config).map_err(config::ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve()?;

    logging::init(&config.observability)?;

    tracing::info!("tcp-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    let pool = Arc::new(BackendPool::from_config(
        &config.backends,
        config.balancer.initial_cursor,
    )?);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = pool.len(),
        connect_timeout_ms = config.timeouts.connect_ms,
        "Configuration loaded"
    );
    for (index, backend) in pool.snapshot().iter().enumerate() {
        tracing::info!(index, name = %backend.name, addr = %backend.addr, "Backend registered");
    }

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        if let Err(e) = metrics::init_metrics(addr) {
            tracing::error!(error = %e, "Failed to start metrics exporter");
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    let proxy = Arc::new(Proxy::new(pool, SessionSettings::from(&config.timeouts)));

    let shutdown = Shutdown::new();
    let accept_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        match signals::wait_for_signal().await {
            Ok(signal) => {
                tracing::info!(?signal, "Signal received");
                shutdown.trigger();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                // Dropping the sender would read as a shutdown; keep it alive.
                std::future::pending::<()>().await;
            }
        }
    });

    listener.run(Arc::clone(&proxy), accept_shutdown).await?;

    let live = proxy.tracker().active_count();
    if live > 0 {
        tracing::info!(sessions = live, "Waiting for live sessions to finish");
        if !proxy.tracker().wait_idle(config.timeouts.shutdown()).await {
            tracing::warn!(
                sessions = proxy.tracker().active_count(),
                "Shutdown grace elapsed, abandoning live sessions"
            );
        }
    }

    for backend in proxy.pool().snapshot() {
        tracing::info!(name = %backend.name, connections = backend.connections, "Backend totals");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
