//! Node inventory
//!
//! Registry of the remote nodes the orchestrator may address, persisted as
//! a whole-file JSON mapping. Owned state per instance; independent
//! inventories do not interfere.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};
use vxmesh_common::{Error, RemoteNode, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct InventoryDocument {
    #[serde(default)]
    nodes: HashMap<String, RemoteNode>,
}

/// Registry of registered remote nodes
pub struct NodeInventory {
    path: Option<PathBuf>,
    nodes: RwLock<HashMap<String, RemoteNode>>,
}

impl NodeInventory {
    /// Load an inventory from disk; a missing file starts empty
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let nodes = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let doc: InventoryDocument = serde_json::from_str(&content)?;
            doc.nodes
        } else {
            debug!("Inventory file {} absent, starting empty", path.display());
            HashMap::new()
        };
        if !nodes.is_empty() {
            info!("Loaded {} node configuration(s)", nodes.len());
        }
        Ok(Self {
            path: Some(path),
            nodes: RwLock::new(nodes),
        })
    }

    /// Ephemeral inventory that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// Register or replace a node, persisting the mapping
    pub fn add(&self, node: RemoteNode) -> Result<()> {
        let mut nodes = self.nodes.write();
        info!("Registered node {} ({})", node.node_id, node.connection_type);
        nodes.insert(node.node_id.clone(), node);
        self.persist(&nodes)
    }

    /// Remove a node, failing when it is not registered
    pub fn remove(&self, node_id: &str) -> Result<RemoteNode> {
        let mut nodes = self.nodes.write();
        let node = nodes
            .remove(node_id)
            .ok_or_else(|| Error::node_not_found(node_id))?;
        self.persist(&nodes)?;
        info!("Removed node {}", node_id);
        Ok(node)
    }

    pub fn get(&self, node_id: &str) -> Option<RemoteNode> {
        self.nodes.read().get(node_id).cloned()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.read().contains_key(node_id)
    }

    /// All registered nodes, ordered by id
    pub fn list(&self) -> Vec<RemoteNode> {
        let mut nodes: Vec<RemoteNode> = self.nodes.read().values().cloned().collect();
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    fn persist(&self, nodes: &HashMap<String, RemoteNode>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let doc = InventoryDocument {
            nodes: nodes.clone(),
        };
        let content = serde_json::to_string_pretty(&doc)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");

        let inventory = NodeInventory::load(&path).unwrap();
        inventory
            .add(RemoteNode::shell("cpe-1", "192.0.2.10", 22))
            .unwrap();
        inventory
            .add(RemoteNode::http_agent("cpe-2", "192.0.2.11", 8080))
            .unwrap();

        let reloaded = NodeInventory::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        let listed = reloaded.list();
        assert_eq!(listed[0].node_id, "cpe-1");
        assert_eq!(listed[1].node_id, "cpe-2");
    }

    #[test]
    fn test_remove_unknown_node() {
        let inventory = NodeInventory::in_memory();
        assert!(matches!(
            inventory.remove("ghost"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");

        let inventory = NodeInventory::load(&path).unwrap();
        inventory
            .add(RemoteNode::shell("cpe-1", "192.0.2.10", 22))
            .unwrap();
        inventory.remove("cpe-1").unwrap();

        assert!(NodeInventory::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = NodeInventory::load(dir.path().join("nope.json")).unwrap();
        assert!(inventory.is_empty());
    }
}
