//! Durable tunnel configuration store
//!
//! The store contract is a whole-mapping replace: `load` returns the full
//! id-to-spec mapping and `save` rewrites it. Incremental updates are the
//! lifecycle manager's concern, not the store's.

use crate::types::TunnelSpec;
use crate::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Durable mapping of tunnel id to specification
pub trait TunnelStore: Send + Sync {
    fn load(&self) -> Result<HashMap<String, TunnelSpec>>;
    fn save(&self, tunnels: &HashMap<String, TunnelSpec>) -> Result<()>;
}

/// On-disk document wrapping the tunnel mapping
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    tunnels: HashMap<String, TunnelSpec>,
}

/// JSON file store; the whole mapping is rewritten on every save
pub struct FileTunnelStore {
    path: PathBuf,
}

impl FileTunnelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TunnelStore for FileTunnelStore {
    fn load(&self) -> Result<HashMap<String, TunnelSpec>> {
        if !self.path.exists() {
            debug!("Store file {} absent, starting empty", self.path.display());
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let doc: StoreDocument = serde_json::from_str(&content)?;

        // Drop records that no longer pass validation rather than poisoning
        // the whole mapping; each drop is logged.
        let mut tunnels = HashMap::new();
        for (id, spec) in doc.tunnels {
            let mut spec = spec;
            spec.apply_defaults();
            match spec.validate() {
                Ok(()) => {
                    tunnels.insert(id, spec);
                }
                Err(e) => {
                    warn!("Skipping invalid stored tunnel {}: {}", id, e);
                }
            }
        }
        Ok(tunnels)
    }

    fn save(&self, tunnels: &HashMap<String, TunnelSpec>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let doc = StoreDocument {
            tunnels: tunnels.clone(),
        };
        let content = serde_json::to_string_pretty(&doc)?;

        // Write-then-rename so a crash mid-save never truncates the mapping
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(
            "Saved {} tunnel(s) to {}",
            tunnels.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// In-memory store for tests and ephemeral agents
#[derive(Default)]
pub struct MemoryTunnelStore {
    tunnels: Mutex<HashMap<String, TunnelSpec>>,
}

impl MemoryTunnelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TunnelStore for MemoryTunnelStore {
    fn load(&self) -> Result<HashMap<String, TunnelSpec>> {
        Ok(self.tunnels.lock().clone())
    }

    fn save(&self, tunnels: &HashMap<String, TunnelSpec>) -> Result<()> {
        *self.tunnels.lock() = tunnels.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec(vni: u32) -> TunnelSpec {
        TunnelSpec::new(vni, "10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()).unwrap()
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTunnelStore::new(dir.path().join("tunnels.json"));

        let mut tunnels = HashMap::new();
        tunnels.insert("vxlan5000".to_string(), sample_spec(5000));
        tunnels.insert("vxlan5001".to_string(), sample_spec(5001));
        store.save(&tunnels).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["vxlan5000"].vni, 5000);
        assert_eq!(loaded["vxlan5001"].interface_name, "vxlan5001");
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTunnelStore::new(dir.path().join("nope.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_skips_invalid_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunnels.json");
        // One record has an out-of-range VNI and must be dropped on load.
        let raw = r#"{
            "tunnels": {
                "vxlan5000": {"vni": 5000, "local_ip": "10.0.0.1", "remote_ip": "10.0.0.2"},
                "bogus": {"vni": 12, "local_ip": "10.0.0.1", "remote_ip": "10.0.0.2"}
            }
        }"#;
        std::fs::write(&path, raw).unwrap();

        let store = FileTunnelStore::new(path);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("vxlan5000"));
    }

    #[test]
    fn test_file_store_fills_interface_default_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunnels.json");
        let raw = r#"{
            "tunnels": {
                "vxlan5000": {"vni": 5000, "local_ip": "10.0.0.1", "remote_ip": "10.0.0.2"}
            }
        }"#;
        std::fs::write(&path, raw).unwrap();

        let loaded = FileTunnelStore::new(path).load().unwrap();
        assert_eq!(loaded["vxlan5000"].interface_name, "vxlan5000");
        assert_eq!(loaded["vxlan5000"].bridge_name, "br-lan");
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryTunnelStore::new();
        let mut tunnels = HashMap::new();
        tunnels.insert("vxlan5000".to_string(), sample_spec(5000));
        store.save(&tunnels).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
