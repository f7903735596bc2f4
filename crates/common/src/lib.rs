//! vxmesh Common Library
//!
//! Shared types, validation and store infrastructure for the vxmesh
//! tunnel provisioning platform.

pub mod error;
pub mod store;
pub mod types;
pub mod validate;

// Re-export commonly used types
pub use error::{Error, Result};
pub use store::{FileTunnelStore, MemoryTunnelStore, TunnelStore};
pub use types::*;

/// vxmesh version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store directory
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".vxmesh")
}

/// Default tunnel store file
pub fn default_tunnel_store_path() -> std::path::PathBuf {
    default_store_path().join("tunnels.json")
}

/// Default node inventory file
pub fn default_inventory_path() -> std::path::PathBuf {
    default_store_path().join("nodes.json")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
