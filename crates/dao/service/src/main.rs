//! DAO governance daemon
//!
//! Serves the proposal listing, account inspection, phase triggers, and tx
//! injection over REST. Tally loops run in the background until shutdown.

use clap::Parser;
use dao_service::config::DaoServiceConfig;
use dao_service::{build_router, ServiceState};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// DAO daemon CLI
#[derive(Debug, Parser)]
#[command(name = "daod", version, about = "DAO governance REST service")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "DAO_CONFIG")]
    config: Option<String>,

    /// REST socket address to bind; overrides the configured one
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Address governance transactions are submitted from
    #[arg(long)]
    address: Option<String>,

    /// Node id stamped on governance transactions
    #[arg(long)]
    node_id: Option<String>,

    /// Log level
    #[arg(long, env = "DAO_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json: bool,

    /// Seed a genesis network account into the in-memory ledger
    #[arg(long, default_value_t = false)]
    seed_genesis: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = DaoServiceConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }
    if let Some(address) = cli.address {
        config.node.address = address;
    }
    if let Some(node_id) = cli.node_id {
        config.node.node_id = node_id;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let state = ServiceState::bootstrap(&config, cli.seed_genesis).await?;
    let scheduler = state.scheduler.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr).await?;
    info!(
        node_id = %config.node.node_id,
        "dao-service REST listening on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("dao-service shutting down");
    scheduler.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("received terminate signal, initiating graceful shutdown");
        }
    }
}
