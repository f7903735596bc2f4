//! Topology Commands

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vxmesh_common::{FileTunnelStore, PlannedTunnel, TopologyConfig, TopologyType};
use vxmesh_core::{topology, IprouteBackend, TopologyService, TunnelManager};

use crate::output::{print_error, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum TopologyCommands {
    /// Plan a topology without creating anything (dry run)
    Plan {
        /// Topology type (hub-spoke, full-mesh, partial-mesh)
        topology: TopologyType,

        /// Topology configuration file (JSON)
        #[arg(long)]
        config: PathBuf,
    },

    /// Validate a topology configuration, reporting every violation
    Validate {
        /// Topology type (hub-spoke, full-mesh, partial-mesh)
        topology: TopologyType,

        /// Topology configuration file (JSON)
        #[arg(long)]
        config: PathBuf,
    },

    /// Plan and create every tunnel of a topology locally
    Create {
        /// Topology type (hub-spoke, full-mesh, partial-mesh)
        topology: TopologyType,

        /// Topology configuration file (JSON)
        #[arg(long)]
        config: PathBuf,
    },
}

/// Planned tunnel display wrapper
#[derive(Serialize)]
pub struct PlannedDisplay {
    pub tunnel_id: String,
    pub vni: u32,
    pub local_node: String,
    pub remote_node: String,
    pub local_ip: String,
    pub remote_ip: String,
    pub interface: String,
}

impl From<&PlannedTunnel> for PlannedDisplay {
    fn from(planned: &PlannedTunnel) -> Self {
        Self {
            tunnel_id: planned.tunnel_id.clone(),
            vni: planned.spec.vni,
            local_node: planned.local_node.clone(),
            remote_node: planned.remote_node.clone(),
            local_ip: planned.spec.local_ip.to_string(),
            remote_ip: planned.spec.remote_ip.to_string(),
            interface: planned.spec.interface_name.clone(),
        }
    }
}

impl TableDisplay for PlannedDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["TUNNEL", "VNI", "LOCAL NODE", "REMOTE NODE", "LOCAL IP", "REMOTE IP", "INTERFACE"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.tunnel_id.clone(),
            self.vni.to_string(),
            self.local_node.clone(),
            self.remote_node.clone(),
            self.local_ip.clone(),
            self.remote_ip.clone(),
            self.interface.clone(),
        ]
    }
}

fn load_config(path: &Path) -> Result<TopologyConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading topology config {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing topology config {}", path.display()))
}

pub fn handle(command: TopologyCommands, store_path: &Path, format: OutputFormat) -> Result<()> {
    match command {
        TopologyCommands::Plan { topology: kind, config } => {
            let config = load_config(&config)?;
            let plan = topology::plan(kind, &config)?;
            let items: Vec<PlannedDisplay> = plan.tunnels.iter().map(PlannedDisplay::from).collect();
            print_list(&items, format);
        }

        TopologyCommands::Validate { topology: kind, config } => {
            let config = load_config(&config)?;
            let errors = topology::validate_config(kind, &config);
            if errors.is_empty() {
                print_success("Configuration is valid");
            } else {
                for error in &errors {
                    print_error(error);
                }
                anyhow::bail!("{} validation error(s)", errors.len());
            }
        }

        TopologyCommands::Create { topology: kind, config } => {
            let config = load_config(&config)?;
            let manager = Arc::new(TunnelManager::new(
                Arc::new(IprouteBackend::new()),
                Arc::new(FileTunnelStore::new(store_path)),
            )?);
            let service = TopologyService::new(manager);
            let report = service.create(kind, &config)?;
            print_success(&format!(
                "Topology {} applied: {} created, {} skipped",
                kind,
                report.created.len(),
                report.skipped.len()
            ));
        }
    }

    Ok(())
}
