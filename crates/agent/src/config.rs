//! Agent configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Node agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Node identifier reported in status responses
    pub node_id: Option<String>,

    /// HTTP listen address
    pub listen: String,

    /// Tunnel store file
    pub store_path: PathBuf,

    /// Bearer token required on management endpoints when set
    pub api_token: Option<String>,

    /// Re-assert persisted tunnels against the kernel at startup
    pub auto_recover: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            listen: "0.0.0.0:8080".to_string(),
            store_path: vxmesh_common::default_tunnel_store_path(),
            api_token: None,
            auto_recover: true,
        }
    }
}

impl AgentConfig {
    /// Load configuration from file, falling back to defaults
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Effective node id, falling back to the host name
    pub fn effective_node_id(&self) -> String {
        self.node_id.clone().unwrap_or_else(|| {
            std::env::var("HOSTNAME").unwrap_or_else(|_| "vxmesh-node".to_string())
        })
    }
}
