mod api;
mod authz;
mod config;
mod handlers;
mod metrics;
mod reply;
mod server;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use clap::{Parser, Subcommand};
use gather_remote::{HttpAuthenticator, HttpLeadershipOracle};
use gather_store_sqlite::SqliteStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use server::GatherServer;

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "gather-server")]
#[command(about = "Encounter scheduling and proposal service")]
struct Cli {
    /// Database URL (sqlite://path/to/gather.db?mode=rwc)
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "sqlite://gather.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve {
        /// Server address
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: SocketAddr,
    },
}

// ────────────────────────────────────── Serve ──────────────────────────────────────

async fn cmd_serve(database_url: &str, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    // Validate configuration BEFORE opening the database
    let config = ServerConfig::from_env()?;

    let store = Arc::new(SqliteStore::open(database_url).await?);
    let authenticator =
        HttpAuthenticator::new(config.user_service_url.clone(), config.remote_timeout)?;
    let leadership =
        HttpLeadershipOracle::new(config.group_service_url.clone(), config.remote_timeout)?;

    let shutdown = CancellationToken::new();
    let server = GatherServer::new_sqlite(store, Arc::new(authenticator), Arc::new(leadership))
        .with_page_size(config.page_size)
        .with_shutdown(shutdown.clone());

    let prometheus = metrics::init_metrics();
    let app = api::router(server).route(
        "/metrics",
        get(move || std::future::ready(prometheus.render())),
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        user_service = %config.user_service_url,
        group_service = %config.group_service_url,
        page_size = config.page_size,
        "gather-server listening"
    );

    // Cancelling the token aborts in-flight remote calls; axum then drains.
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("gather-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down gracefully");
        }
        _ = sigint.recv() => {
            tracing::info!("received SIGINT, shutting down gracefully");
        }
    }
}

// ────────────────────────────────────── Main ──────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { addr } => cmd_serve(&cli.database_url, addr).await?,
    }

    Ok(())
}
