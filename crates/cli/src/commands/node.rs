//! Node Commands

use anyhow::{bail, Result};
use clap::Subcommand;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use vxmesh_common::{ConnectionType, RemoteNode};
use vxmesh_orchestrator::{NodeInventory, NodeOrchestrator, TransportExecutor};

use crate::output::{print_list, print_success, print_value, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum NodeCommands {
    /// Register a remote node
    Add {
        /// Node identifier
        node_id: String,

        /// Hostname or address
        #[arg(long)]
        hostname: String,

        /// Transport (shell, http-agent)
        #[arg(long, default_value = "shell")]
        connection_type: String,

        /// SSH or agent port
        #[arg(long)]
        port: u16,

        /// SSH username (shell transport)
        #[arg(long)]
        username: Option<String>,

        /// SSH private key path (shell transport)
        #[arg(long)]
        ssh_key_path: Option<String>,

        /// Bearer token (http-agent transport)
        #[arg(long)]
        api_token: Option<String>,
    },

    /// Remove a registered node
    Remove {
        /// Node identifier
        node_id: String,
    },

    /// List registered nodes
    List,

    /// Query live tunnel state on a node
    Status {
        /// Node identifier
        node_id: String,

        /// Remote call timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
}

/// Node display wrapper for serialization
#[derive(Serialize)]
pub struct NodeDisplay {
    pub node_id: String,
    pub hostname: String,
    pub connection_type: String,
    pub port: u16,
    pub username: String,
}

impl From<&RemoteNode> for NodeDisplay {
    fn from(node: &RemoteNode) -> Self {
        Self {
            node_id: node.node_id.clone(),
            hostname: node.hostname.clone(),
            connection_type: node.connection_type.to_string(),
            port: node.port,
            username: node.username.clone().unwrap_or_default(),
        }
    }
}

impl TableDisplay for NodeDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["NODE", "HOSTNAME", "TRANSPORT", "PORT", "USER"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.node_id.clone(),
            self.hostname.clone(),
            self.connection_type.clone(),
            self.port.to_string(),
            self.username.clone(),
        ]
    }
}

fn parse_connection_type(value: &str) -> Result<ConnectionType> {
    match value {
        "shell" => Ok(ConnectionType::Shell),
        "http-agent" => Ok(ConnectionType::HttpAgent),
        other => bail!("unknown connection type '{}'", other),
    }
}

pub async fn handle(
    command: NodeCommands,
    inventory_path: &Path,
    format: OutputFormat,
) -> Result<()> {
    let inventory = Arc::new(NodeInventory::load(inventory_path)?);

    match command {
        NodeCommands::Add {
            node_id,
            hostname,
            connection_type,
            port,
            username,
            ssh_key_path,
            api_token,
        } => {
            let node = RemoteNode {
                node_id: node_id.clone(),
                hostname,
                connection_type: parse_connection_type(&connection_type)?,
                port,
                username,
                ssh_key_path,
                api_token,
            };
            inventory.add(node)?;
            print_success(&format!("Node {} registered", node_id));
        }

        NodeCommands::Remove { node_id } => {
            inventory.remove(&node_id)?;
            print_success(&format!("Node {} removed", node_id));
        }

        NodeCommands::List => {
            let nodes = inventory.list();
            let items: Vec<NodeDisplay> = nodes.iter().map(NodeDisplay::from).collect();
            print_list(&items, format);
        }

        NodeCommands::Status { node_id, timeout } => {
            let executor = Arc::new(TransportExecutor::new(Duration::from_secs(timeout)));
            let orchestrator = NodeOrchestrator::new(inventory, executor);
            let report = orchestrator.node_status(&node_id).await?;
            print_value(&report, format);
        }
    }

    Ok(())
}
