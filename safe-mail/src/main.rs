//! safe-mail server
//!
//! # Usage
//!
//! ```bash
//! safe-mail                      # ./config.toml if present, else defaults
//! safe-mail --config prod.toml   # explicit config file
//! PORT=8080 safe-mail            # port override
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use safe_mail::{
    config::SafeMailConfig,
    jobs::{CancellationToken, QuotaResetJob},
    observability,
    router::router,
    state::AppState,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "safe-mail")]
#[command(version)]
#[command(about = "Quota-gated bulk mail relay", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overrides configuration and PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    observability::init()?;

    let mut config = cli.config.as_deref().map_or_else(SafeMailConfig::load, |path| {
        SafeMailConfig::load_from(path).with_context(|| format!("failed to load {}", path.display()))
    })?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;

    info!(
        hourly_limit = config.quota.hourly_limit,
        window_secs = config.quota.window_secs,
        batch_size = config.dispatch.batch_size,
        batch_delay_ms = config.dispatch.batch_delay_ms,
        smtp_host = %config.smtp.host,
        "Configuration loaded"
    );

    let state = AppState::new(config)?;

    let token = CancellationToken::new();
    let reset_job = QuotaResetJob::new(state.quota().clone()).spawn(token.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Safe mail server running");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    token.cancel();
    reset_job.await?;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
