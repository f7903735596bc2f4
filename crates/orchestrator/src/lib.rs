//! vxmesh Orchestrator
//!
//! Transport abstraction and multi-node fan-out for tunnel provisioning.

pub mod inventory;
pub mod orchestrator;
pub mod transport;

pub use inventory::NodeInventory;
pub use orchestrator::{
    DeployNodeConfig, DeployReport, NodeOrchestrator, NodeProvisionReport, NodeRole, PairReport,
    StepResult,
};
pub use transport::{
    AgentExecutor, AgentRequest, ExecReport, NodeOperation, RemoteExecutor, ShellExecutor,
    TransportExecutor,
};
