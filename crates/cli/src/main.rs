//! vxmesh CLI - Main Entry Point
//!
//! Command-line interface for managing VxLAN tunnels, topologies and the
//! remote node inventory.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use commands::{deploy, node, topology, tunnel};

/// vxmesh - VxLAN overlay tunnel provisioning and topology orchestration
#[derive(Parser)]
#[command(name = "vxmesh")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Tunnel store file
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Node inventory file
    #[arg(long, global = true)]
    inventory: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage local tunnels
    #[command(subcommand)]
    Tunnel(tunnel::TunnelCommands),

    /// Plan, validate and create topologies
    #[command(subcommand)]
    Topology(topology::TopologyCommands),

    /// Manage the remote node inventory
    #[command(subcommand)]
    Node(node::NodeCommands),

    /// Deploy a topology across registered nodes
    Deploy(deploy::DeployArgs),

    /// Probe host requirements for VxLAN provisioning
    Check,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let store_path = cli
        .store
        .unwrap_or_else(vxmesh_common::default_tunnel_store_path);
    let inventory_path = cli
        .inventory
        .unwrap_or_else(vxmesh_common::default_inventory_path);

    match cli.command {
        Commands::Tunnel(command) => tunnel::handle(command, &store_path, cli.format)?,
        Commands::Topology(command) => topology::handle(command, &store_path, cli.format)?,
        Commands::Node(command) => node::handle(command, &inventory_path, cli.format).await?,
        Commands::Deploy(args) => deploy::handle(args, &inventory_path, cli.format).await?,
        Commands::Check => {
            let report = vxmesh_core::IprouteBackend::new().check_requirements();
            output::print_value(&report, cli.format);
            if !report.satisfied() {
                anyhow::bail!("host requirements not satisfied");
            }
        }
        Commands::Version => {
            println!("vxmesh {}", vxmesh_common::VERSION);
        }
    }

    Ok(())
}
