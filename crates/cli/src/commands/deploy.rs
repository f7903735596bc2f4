//! Deploy Command

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use vxmesh_common::TopologyType;
use vxmesh_orchestrator::{
    DeployNodeConfig, NodeInventory, NodeOrchestrator, PairReport, TransportExecutor,
};

use crate::output::{print_list, print_success, print_warning, OutputFormat, TableDisplay};

/// Deploy a topology across registered nodes
#[derive(Args)]
pub struct DeployArgs {
    /// Deployment file (JSON: topology type plus per-node configs)
    #[arg(long)]
    config: PathBuf,

    /// Remote call timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,
}

/// On-disk deployment description
#[derive(Debug, Deserialize)]
struct DeployFile {
    topology: TopologyType,
    nodes: Vec<DeployNodeConfig>,
}

/// Pair display wrapper for serialization
#[derive(Serialize)]
pub struct PairDisplay {
    pub hub: String,
    pub spoke: String,
    pub vni: u32,
    pub result: String,
}

impl From<&PairReport> for PairDisplay {
    fn from(pair: &PairReport) -> Self {
        Self {
            hub: pair.hub_node.clone(),
            spoke: pair.spoke_node.clone(),
            vni: pair.vni,
            result: if pair.success {
                "ok".to_string()
            } else {
                "failed".to_string()
            },
        }
    }
}

impl TableDisplay for PairDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["HUB", "SPOKE", "VNI", "RESULT"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.hub.clone(),
            self.spoke.clone(),
            self.vni.to_string(),
            self.result.clone(),
        ]
    }
}

pub async fn handle(args: DeployArgs, inventory_path: &Path, format: OutputFormat) -> Result<()> {
    let content = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading deployment file {}", args.config.display()))?;
    let deploy: DeployFile = serde_json::from_str(&content)
        .with_context(|| format!("parsing deployment file {}", args.config.display()))?;

    let inventory = Arc::new(NodeInventory::load(inventory_path)?);
    let executor = Arc::new(TransportExecutor::new(Duration::from_secs(args.timeout)));
    let orchestrator = NodeOrchestrator::new(inventory, executor);

    let report = orchestrator
        .deploy_topology(deploy.topology, &deploy.nodes)
        .await?;

    let items: Vec<PairDisplay> = report.pairs.iter().map(PairDisplay::from).collect();
    print_list(&items, format);

    if report.failed == 0 {
        print_success(&format!("All {} pair(s) provisioned", report.succeeded));
    } else {
        print_warning(&format!(
            "{} pair(s) provisioned, {} failed",
            report.succeeded, report.failed
        ));
        anyhow::bail!("deployment completed with failures");
    }

    Ok(())
}
