//! Error types for vxmesh

use thiserror::Error;

/// Result type alias using vxmesh Error
pub type Result<T> = std::result::Result<T, Error>;

/// vxmesh error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Tunnel {id} already exists with a different configuration")]
    Conflict { id: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("Backend operation {op} failed: {detail}")]
    Backend { op: String, detail: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Operation timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Invalid topology configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a tunnel-kind NotFound
    pub fn tunnel_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: "tunnel".to_string(),
            id: id.into(),
        }
    }

    /// Shorthand for a node-kind NotFound
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: "node".to_string(),
            id: id.into(),
        }
    }

    /// Shorthand for a backend failure
    pub fn backend(op: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::Backend {
            op: op.into(),
            detail: detail.into(),
        }
    }

    /// True when this error reports a missing resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
