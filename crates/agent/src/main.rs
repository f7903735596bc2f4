//! vxmesh node agent - Main Entry Point
//!
//! Runs the HTTP management surface on a node, backed by the local
//! iproute2 backend and the on-disk tunnel store.

use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use vxmesh_common::FileTunnelStore;
use vxmesh_core::{IprouteBackend, TunnelManager};

mod config;
mod server;

use config::AgentConfig;
use server::{agent_router, AppState};

/// vxmesh node agent
#[derive(Parser)]
#[command(name = "vxmesh-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "/etc/vxmesh/agent.toml")]
    config: std::path::PathBuf,

    /// Override the listen address
    #[arg(long)]
    listen: Option<String>,

    /// Override the node id
    #[arg(long)]
    node_id: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let mut config = AgentConfig::load(&args.config)?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if let Some(node_id) = args.node_id {
        config.node_id = Some(node_id);
    }
    let node_id = config.effective_node_id();

    let backend = IprouteBackend::new();
    let requirements = backend.check_requirements();
    if !requirements.satisfied() {
        warn!(
            "Host requirements not satisfied: {:?}; tunnel operations may fail",
            requirements
        );
    }

    let store = FileTunnelStore::new(&config.store_path);
    let manager = Arc::new(TunnelManager::new(Arc::new(backend), Arc::new(store))?);

    if config.auto_recover {
        let report = manager.recover();
        if report.recovered > 0 || report.failed > 0 {
            info!(
                "Startup recovery: {} recovered, {} failed",
                report.recovered, report.failed
            );
        }
    }

    let state = Arc::new(AppState {
        node_id: node_id.clone(),
        manager,
        api_token: config.api_token.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("vxmesh agent {} listening on {}", node_id, config.listen);
    axum::serve(listener, agent_router(state)).await?;

    Ok(())
}
