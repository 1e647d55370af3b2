//! markidea daemon - pushes user repositories to their remotes
//!
//! The daemon:
//! - Rebuilds the push task list at startup, on SIGHUP and periodically
//! - Runs non-overlapping sync sweeps on a fixed period
//! - Stops on Ctrl+C or SIGTERM

mod error;
mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use libmarkidea_core::config::{load_config, load_or_default, ServiceConfig};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use error::DaemonError;
use scheduler::{GitPusher, RemoteSyncScheduler};

#[derive(Parser)]
#[command(name = "markidea-daemon", about = "markidea remote sync daemon", version)]
struct Cli {
    /// Path to config.toml (defaults to <data-dir>/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory (defaults to ~/.markidea)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_service_config(cli: &Cli) -> Result<ServiceConfig, DaemonError> {
    let config = match &cli.config {
        Some(path) => load_config(path)?.ok_or_else(|| {
            DaemonError::Config(format!("config file {} does not exist", path.display()))
        })?,
        None => {
            let data_dir = cli.data_dir.clone().unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".markidea")
            });
            load_or_default(&data_dir)?
        }
    };
    config.ensure_layout()?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("markidea-daemon starting");

    let config = match load_service_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(e.exit_code());
        }
    };
    info!(notes_dir = %config.notes_dir.display(), db = %config.db_path.display(), "configuration loaded");

    let scheduler = Arc::new(RemoteSyncScheduler::new(config, GitPusher));
    if let Err(e) = scheduler.spawn_refresh().await {
        let err = DaemonError::Task(e.to_string());
        warn!("Initial task refresh did not complete: {}", err);
    }

    tokio::select! {
        _ = Arc::clone(&scheduler).run() => {}
        _ = refresh_on_hangup(Arc::clone(&scheduler)) => {}
        _ = shutdown_signal() => {
            info!("shutdown requested, stopping scheduler");
        }
    }

    info!("markidea-daemon stopped");
}

/// Rebuild the task list whenever SIGHUP arrives
async fn refresh_on_hangup<P: scheduler::RemotePusher>(scheduler: Arc<RemoteSyncScheduler<P>>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::hangup()) {
            Ok(mut hangups) => {
                while hangups.recv().await.is_some() {
                    info!("SIGHUP received, rebuilding push task list");
                    scheduler.spawn_refresh();
                }
            }
            Err(e) => warn!("Failed to install SIGHUP handler: {}", e),
        }
    }

    #[cfg(not(unix))]
    let _ = &scheduler;

    std::future::pending::<()>().await
}

/// Resolves on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = sigterm => {}
    }
}
