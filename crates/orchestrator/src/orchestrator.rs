//! Multi-node orchestration
//!
//! Fans tunnel provisioning out across registered nodes through the
//! transport abstraction. Each node's command sequence is strictly ordered
//! and fail-fast; independent (node, tunnel) pairs run concurrently, and
//! fan-out failures are captured per pair instead of raised.

use crate::inventory::NodeInventory;
use crate::transport::{AgentRequest, ExecReport, NodeOperation, RemoteExecutor};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use vxmesh_common::{
    ConnectionType, Error, ProvisionStep, RemoteNode, Result, TopologyType, TunnelCreateRequest,
    TunnelSpec,
};

/// One remote invocation and its uniform result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: ProvisionStep,
    pub command: String,
    pub report: ExecReport,
}

/// Full per-step record of one provisioning attempt on one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeProvisionReport {
    pub node_id: String,
    pub success: bool,
    pub steps: Vec<StepResult>,
    #[serde(default)]
    pub error: Option<String>,
}

impl NodeProvisionReport {
    fn failure(node_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            success: false,
            steps: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Node role within a hub-spoke deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Hub,
    Spoke,
}

/// Per-node input to deploy_topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployNodeConfig {
    pub node_id: String,
    pub role: NodeRole,
    /// Underlay endpoint address used for the tunnel
    pub ip: IpAddr,
    /// Segment VNI; required for spokes
    #[serde(default)]
    pub vni: Option<u32>,
    #[serde(default = "default_bridge")]
    pub bridge_name: String,
    #[serde(default = "default_physical_interface")]
    pub physical_interface: String,
}

fn default_bridge() -> String {
    vxmesh_common::DEFAULT_BRIDGE.to_string()
}

fn default_physical_interface() -> String {
    vxmesh_common::DEFAULT_PHYSICAL_INTERFACE.to_string()
}

/// Result for one (hub, spoke) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReport {
    pub hub_node: String,
    pub spoke_node: String,
    pub vni: u32,
    pub hub: NodeProvisionReport,
    pub spoke: NodeProvisionReport,
    pub success: bool,
}

/// Aggregate outcome of one topology deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployReport {
    pub topology: TopologyType,
    pub pairs: Vec<PairReport>,
    pub succeeded: usize,
    pub failed: usize,
    pub completed_at: DateTime<Utc>,
}

/// Ordered shell rendering of the provisioning sequence
fn provisioning_commands(spec: &TunnelSpec) -> Vec<(ProvisionStep, String)> {
    vec![
        (
            ProvisionStep::LinkCreated,
            format!(
                "ip link add {} type vxlan id {} local {} remote {} dev {} dstport {}",
                spec.interface_name,
                spec.vni,
                spec.local_ip,
                spec.remote_ip,
                spec.physical_interface,
                spec.udp_port
            ),
        ),
        (
            ProvisionStep::LinkUp,
            format!("ip link set {} up", spec.interface_name),
        ),
        (
            ProvisionStep::BridgeReady,
            format!("ip link add {} type bridge || true", spec.bridge_name),
        ),
        (
            ProvisionStep::BridgeReady,
            format!("ip link set {} up", spec.bridge_name),
        ),
        (
            ProvisionStep::Attached,
            format!("ip link set {} master {}", spec.interface_name, spec.bridge_name),
        ),
        (
            ProvisionStep::MtuSet,
            format!("ip link set {} mtu {}", spec.interface_name, spec.mtu),
        ),
    ]
}

/// Best-effort teardown for an endpoint this attempt created
fn teardown_commands(spec: &TunnelSpec) -> Vec<String> {
    vec![
        format!("ip link set {} nomaster", spec.interface_name),
        format!("ip link delete {}", spec.interface_name),
    ]
}

/// Orchestrator dispatching provisioning across the node inventory
pub struct NodeOrchestrator {
    inventory: Arc<NodeInventory>,
    executor: Arc<dyn RemoteExecutor>,
}

impl NodeOrchestrator {
    pub fn new(inventory: Arc<NodeInventory>, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            inventory,
            executor,
        }
    }

    pub fn inventory(&self) -> &NodeInventory {
        &self.inventory
    }

    fn node(&self, node_id: &str) -> Result<RemoteNode> {
        self.inventory
            .get(node_id)
            .ok_or_else(|| Error::node_not_found(node_id))
    }

    /// Provision one tunnel on one node
    ///
    /// Shell transport runs the same ordered sequence the local lifecycle
    /// uses, stopping at the first failing step and returning every step
    /// result so the caller sees exactly where the sequence halted.
    /// Http-agent transport issues one structured request.
    pub async fn create_tunnel_on_node(
        &self,
        node_id: &str,
        spec: &TunnelSpec,
    ) -> Result<NodeProvisionReport> {
        let node = self.node(node_id)?;
        let mut spec = spec.clone();
        spec.apply_defaults();
        spec.validate()?;

        match node.connection_type {
            ConnectionType::Shell => Ok(self.create_via_shell(&node, &spec).await),
            ConnectionType::HttpAgent => Ok(self.create_via_agent(&node, &spec).await),
        }
    }

    async fn create_via_shell(&self, node: &RemoteNode, spec: &TunnelSpec) -> NodeProvisionReport {
        let mut steps = Vec::new();
        let mut failure: Option<String> = None;
        let mut endpoint_created = false;

        for (index, (step, command)) in provisioning_commands(spec).into_iter().enumerate() {
            let report = match self
                .executor
                .execute(node, NodeOperation::Command(command.clone()))
                .await
            {
                Ok(report) => report,
                Err(e) => {
                    failure = Some(e.to_string());
                    ExecReport::failure(e.to_string())
                }
            };

            let succeeded = report.success;
            if succeeded && index == 0 {
                endpoint_created = true;
            }
            steps.push(StepResult {
                step,
                command,
                report,
            });

            if !succeeded {
                if failure.is_none() {
                    failure = Some(format!("step {} failed on {}", step, node.node_id));
                }
                error!(
                    "[{}] provisioning halted at {}: {}",
                    node.node_id,
                    step,
                    failure.as_deref().unwrap_or("unknown")
                );
                break;
            }
        }

        if failure.is_some() && endpoint_created {
            self.teardown_via_shell(node, spec).await;
        }

        NodeProvisionReport {
            node_id: node.node_id.clone(),
            success: failure.is_none(),
            steps,
            error: failure,
        }
    }

    /// Remove whatever this attempt created, ignoring every error
    async fn teardown_via_shell(&self, node: &RemoteNode, spec: &TunnelSpec) {
        for command in teardown_commands(spec) {
            match self
                .executor
                .execute(node, NodeOperation::Command(command.clone()))
                .await
            {
                Ok(report) if !report.success => {
                    warn!("[{}] teardown '{}' exited non-zero", node.node_id, command);
                }
                Err(e) => {
                    warn!("[{}] teardown '{}' failed: {}", node.node_id, command, e);
                }
                Ok(_) => {}
            }
        }
    }

    async fn create_via_agent(&self, node: &RemoteNode, spec: &TunnelSpec) -> NodeProvisionReport {
        let request = AgentRequest::CreateTunnel(TunnelCreateRequest {
            tunnel_id: None,
            spec: spec.clone(),
        });
        let (report, failure) = match self
            .executor
            .execute(node, NodeOperation::Request(request))
            .await
        {
            Ok(report) => {
                let failure = if report.success {
                    None
                } else {
                    Some(format!("agent returned status {}", report.status_code))
                };
                (report, failure)
            }
            Err(e) => (ExecReport::failure(e.to_string()), Some(e.to_string())),
        };

        let success = failure.is_none();
        NodeProvisionReport {
            node_id: node.node_id.clone(),
            success,
            steps: vec![StepResult {
                step: ProvisionStep::Done,
                command: "POST /api/v1/tunnels".to_string(),
                report,
            }],
            error: failure,
        }
    }

    /// Remove one tunnel from one node
    pub async fn delete_tunnel_on_node(
        &self,
        node_id: &str,
        interface_name: &str,
    ) -> Result<NodeProvisionReport> {
        let node = self.node(node_id)?;

        match node.connection_type {
            ConnectionType::Shell => {
                let commands = vec![
                    format!("ip link set {} nomaster", interface_name),
                    format!("ip link delete {}", interface_name),
                ];
                let mut steps = Vec::new();
                for command in commands {
                    let report = match self
                        .executor
                        .execute(&node, NodeOperation::Command(command.clone()))
                        .await
                    {
                        Ok(report) => report,
                        Err(e) => ExecReport::failure(e.to_string()),
                    };
                    steps.push(StepResult {
                        step: ProvisionStep::Done,
                        command,
                        report,
                    });
                }
                let success = steps.iter().all(|s| s.report.success);
                Ok(NodeProvisionReport {
                    node_id: node.node_id.clone(),
                    success,
                    steps,
                    error: None,
                })
            }
            ConnectionType::HttpAgent => {
                let request = AgentRequest::DeleteTunnel {
                    tunnel_id: interface_name.to_string(),
                };
                let report = match self
                    .executor
                    .execute(&node, NodeOperation::Request(request))
                    .await
                {
                    Ok(report) => report,
                    Err(e) => ExecReport::failure(e.to_string()),
                };
                let success = report.success;
                Ok(NodeProvisionReport {
                    node_id: node.node_id.clone(),
                    success,
                    steps: vec![StepResult {
                        step: ProvisionStep::Done,
                        command: format!("DELETE /api/v1/tunnels/{}", interface_name),
                        report,
                    }],
                    error: None,
                })
            }
        }
    }

    /// Live tunnel state of one node via its transport
    pub async fn node_status(&self, node_id: &str) -> Result<ExecReport> {
        let node = self.node(node_id)?;
        let operation = match node.connection_type {
            ConnectionType::Shell => {
                NodeOperation::Command("ip -j link show type vxlan".to_string())
            }
            ConnectionType::HttpAgent => NodeOperation::Request(AgentRequest::Status),
        };
        self.executor.execute(&node, operation).await
    }

    /// Deploy a topology across registered nodes
    ///
    /// Current scope is hub-spoke: each spoke gets a tunnel provisioned on
    /// both the hub and the spoke side. Pairs run concurrently; one pair's
    /// failure never blocks the others and lands in the aggregate report.
    pub async fn deploy_topology(
        &self,
        topology: TopologyType,
        node_configs: &[DeployNodeConfig],
    ) -> Result<DeployReport> {
        if topology != TopologyType::HubSpoke {
            return Err(Error::Config(format!(
                "deployment currently supports hub-spoke only, not {}",
                topology
            )));
        }

        let hubs: Vec<&DeployNodeConfig> = node_configs
            .iter()
            .filter(|c| c.role == NodeRole::Hub)
            .collect();
        let hub = match hubs.as_slice() {
            [] => {
                return Err(Error::Config(
                    "hub node not designated for hub-spoke deployment".to_string(),
                ))
            }
            [hub] => *hub,
            _ => {
                return Err(Error::Config(
                    "multiple hub nodes designated for hub-spoke deployment".to_string(),
                ))
            }
        };

        // Validate every reference and spec before the first dispatch.
        for config in node_configs {
            if !self.inventory.contains(&config.node_id) {
                return Err(Error::node_not_found(&config.node_id));
            }
        }

        let mut pairs = Vec::new();
        for spoke in node_configs.iter().filter(|c| c.role == NodeRole::Spoke) {
            let vni = spoke.vni.ok_or_else(|| {
                Error::Config(format!("spoke '{}' is missing a vni", spoke.node_id))
            })?;
            let hub_spec = TunnelSpec::new(vni, hub.ip, spoke.ip)?
                .with_bridge(&hub.bridge_name)
                .with_physical_interface(&hub.physical_interface)
                .with_label(format!("hub-spoke-{}", spoke.node_id));
            let spoke_spec = TunnelSpec::new(vni, spoke.ip, hub.ip)?
                .with_bridge(&spoke.bridge_name)
                .with_physical_interface(&spoke.physical_interface)
                .with_label(format!("hub-spoke-{}", spoke.node_id));
            pairs.push((spoke.node_id.clone(), vni, hub_spec, spoke_spec));
        }

        info!(
            "Deploying hub-spoke topology: hub {}, {} spoke(s)",
            hub.node_id,
            pairs.len()
        );

        let hub_id = hub.node_id.clone();
        let results = join_all(pairs.into_iter().map(|(spoke_id, vni, hub_spec, spoke_spec)| {
            let hub_id = hub_id.clone();
            async move {
                let hub_report = match self.create_tunnel_on_node(&hub_id, &hub_spec).await {
                    Ok(report) => report,
                    Err(e) => NodeProvisionReport::failure(&hub_id, e.to_string()),
                };
                let spoke_report = match self.create_tunnel_on_node(&spoke_id, &spoke_spec).await {
                    Ok(report) => report,
                    Err(e) => NodeProvisionReport::failure(&spoke_id, e.to_string()),
                };
                let success = hub_report.success && spoke_report.success;
                if !success {
                    warn!("Pair {}-{} failed to provision", hub_id, spoke_id);
                }
                PairReport {
                    hub_node: hub_id,
                    spoke_node: spoke_id,
                    vni,
                    hub: hub_report,
                    spoke: spoke_report,
                    success,
                }
            }
        }))
        .await;

        let succeeded = results.iter().filter(|p| p.success).count();
        let failed = results.len() - succeeded;
        info!(
            "Deployment complete: {} pair(s) succeeded, {} failed",
            succeeded, failed
        );

        Ok(DeployReport {
            topology,
            pairs: results,
            succeeded,
            failed,
            completed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    #[derive(Default)]
    struct MockExecutor {
        calls: Mutex<Vec<(String, String)>>,
        fail_matching: Mutex<Option<String>>,
        error_nodes: Mutex<HashSet<String>>,
        timeout_nodes: Mutex<HashSet<String>>,
    }

    impl MockExecutor {
        fn fail_commands_containing(&self, pattern: &str) {
            *self.fail_matching.lock() = Some(pattern.to_string());
        }

        fn error_on(&self, node_id: &str) {
            self.error_nodes.lock().insert(node_id.to_string());
        }

        fn timeout_on(&self, node_id: &str) {
            self.timeout_nodes.lock().insert(node_id.to_string());
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().clone()
        }

        fn calls_for(&self, node_id: &str) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|(n, _)| n == node_id)
                .map(|(_, c)| c)
                .collect()
        }
    }

    #[async_trait]
    impl RemoteExecutor for MockExecutor {
        async fn execute(
            &self,
            node: &RemoteNode,
            operation: NodeOperation,
        ) -> Result<ExecReport> {
            let desc = match &operation {
                NodeOperation::Command(c) => c.clone(),
                NodeOperation::Request(r) => format!("{:?}", r),
            };
            self.calls.lock().push((node.node_id.clone(), desc.clone()));

            if self.error_nodes.lock().contains(&node.node_id) {
                return Err(Error::Transport("injected channel failure".to_string()));
            }
            if self.timeout_nodes.lock().contains(&node.node_id) {
                return Err(Error::Timeout { seconds: 30 });
            }
            if let Some(pattern) = self.fail_matching.lock().as_deref() {
                if desc.contains(pattern) {
                    return Ok(ExecReport {
                        success: false,
                        stdout: String::new(),
                        stderr: "injected failure".to_string(),
                        status_code: 1,
                    });
                }
            }
            Ok(ExecReport {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
                status_code: 0,
            })
        }
    }

    fn spec(vni: u32) -> TunnelSpec {
        TunnelSpec::new(vni, "10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()).unwrap()
    }

    fn orchestrator() -> (Arc<MockExecutor>, NodeOrchestrator) {
        let inventory = Arc::new(NodeInventory::in_memory());
        inventory
            .add(RemoteNode::shell("hub-1", "192.0.2.1", 22))
            .unwrap();
        inventory
            .add(RemoteNode::shell("spoke-1", "192.0.2.2", 22))
            .unwrap();
        inventory
            .add(RemoteNode::http_agent("spoke-2", "192.0.2.3", 8080))
            .unwrap();
        let executor = Arc::new(MockExecutor::default());
        (executor.clone(), NodeOrchestrator::new(inventory, executor))
    }

    #[tokio::test]
    async fn test_shell_create_runs_ordered_sequence() {
        let (executor, orchestrator) = orchestrator();

        let report = orchestrator
            .create_tunnel_on_node("spoke-1", &spec(5000))
            .await
            .unwrap();
        assert!(report.success);
        assert_eq!(report.steps.len(), 6);

        let commands = executor.calls_for("spoke-1");
        assert!(commands[0].starts_with("ip link add vxlan5000 type vxlan id 5000"));
        assert_eq!(commands[1], "ip link set vxlan5000 up");
        assert_eq!(commands[4], "ip link set vxlan5000 master br-lan");
        assert_eq!(commands[5], "ip link set vxlan5000 mtu 1450");
    }

    #[tokio::test]
    async fn test_shell_create_fails_fast_and_tears_down() {
        let (executor, orchestrator) = orchestrator();
        executor.fail_commands_containing("master");

        let report = orchestrator
            .create_tunnel_on_node("spoke-1", &spec(5000))
            .await
            .unwrap();
        assert!(!report.success);
        // Five steps attempted: the failing attach is the last one reported.
        assert_eq!(report.steps.len(), 5);
        assert!(!report.steps.last().unwrap().report.success);
        assert!(report.steps.iter().all(|s| !s.command.contains("mtu")));

        // The endpoint created by this attempt was torn down.
        let commands = executor.calls_for("spoke-1");
        assert!(commands.contains(&"ip link delete vxlan5000".to_string()));
    }

    #[tokio::test]
    async fn test_shell_create_no_teardown_when_first_step_fails() {
        let (executor, orchestrator) = orchestrator();
        executor.fail_commands_containing("type vxlan");

        let report = orchestrator
            .create_tunnel_on_node("spoke-1", &spec(5000))
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.steps.len(), 1);
        // Nothing was created, so nothing is deleted.
        let commands = executor.calls_for("spoke-1");
        assert!(!commands.iter().any(|c| c.contains("delete")));
    }

    #[tokio::test]
    async fn test_transport_error_is_captured_per_step() {
        let (executor, orchestrator) = orchestrator();
        executor.error_on("spoke-1");

        let report = orchestrator
            .create_tunnel_on_node("spoke-1", &spec(5000))
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.steps.len(), 1);
        assert!(report.error.as_deref().unwrap().contains("channel failure"));
    }

    #[tokio::test]
    async fn test_timeout_is_a_step_failure() {
        let inventory = Arc::new(NodeInventory::in_memory());
        inventory
            .add(RemoteNode::shell("spoke-1", "192.0.2.2", 22))
            .unwrap();
        let executor = Arc::new(MockExecutor::default());
        executor.timeout_on("spoke-1");
        let orchestrator = NodeOrchestrator::new(inventory, executor);

        let report = orchestrator
            .create_tunnel_on_node("spoke-1", &spec(5000))
            .await
            .unwrap();
        assert!(!report.success);
        assert!(report.error.as_deref().unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn test_agent_create_issues_single_request() {
        let (executor, orchestrator) = orchestrator();

        let report = orchestrator
            .create_tunnel_on_node("spoke-2", &spec(5000))
            .await
            .unwrap();
        assert!(report.success);
        assert_eq!(report.steps.len(), 1);

        let calls = executor.calls_for("spoke-2");
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains("CreateTunnel"));
    }

    #[tokio::test]
    async fn test_unknown_node_is_not_found() {
        let (_executor, orchestrator) = orchestrator();
        assert!(matches!(
            orchestrator.create_tunnel_on_node("ghost", &spec(5000)).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            orchestrator.node_status("ghost").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_runs_detach_then_delete() {
        let (executor, orchestrator) = orchestrator();

        let report = orchestrator
            .delete_tunnel_on_node("spoke-1", "vxlan5000")
            .await
            .unwrap();
        assert!(report.success);
        let commands = executor.calls_for("spoke-1");
        assert_eq!(
            commands,
            vec![
                "ip link set vxlan5000 nomaster".to_string(),
                "ip link delete vxlan5000".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_node_status_by_transport() {
        let (executor, orchestrator) = orchestrator();

        orchestrator.node_status("spoke-1").await.unwrap();
        assert_eq!(
            executor.calls_for("spoke-1"),
            vec!["ip -j link show type vxlan".to_string()]
        );

        orchestrator.node_status("spoke-2").await.unwrap();
        assert!(executor.calls_for("spoke-2")[0].contains("Status"));
    }

    fn deploy_configs() -> Vec<DeployNodeConfig> {
        vec![
            DeployNodeConfig {
                node_id: "hub-1".to_string(),
                role: NodeRole::Hub,
                ip: "192.0.2.1".parse().unwrap(),
                vni: None,
                bridge_name: default_bridge(),
                physical_interface: default_physical_interface(),
            },
            DeployNodeConfig {
                node_id: "spoke-1".to_string(),
                role: NodeRole::Spoke,
                ip: "192.0.2.2".parse().unwrap(),
                vni: Some(5000),
                bridge_name: default_bridge(),
                physical_interface: default_physical_interface(),
            },
            DeployNodeConfig {
                node_id: "spoke-2".to_string(),
                role: NodeRole::Spoke,
                ip: "192.0.2.3".parse().unwrap(),
                vni: Some(5001),
                bridge_name: default_bridge(),
                physical_interface: default_physical_interface(),
            },
        ]
    }

    #[tokio::test]
    async fn test_deploy_hub_spoke_provisions_both_sides() {
        let (executor, orchestrator) = orchestrator();

        let report = orchestrator
            .deploy_topology(TopologyType::HubSpoke, &deploy_configs())
            .await
            .unwrap();
        assert_eq!(report.pairs.len(), 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 0);

        // The hub carries one tunnel endpoint per spoke.
        let hub_creates = executor
            .calls_for("hub-1")
            .iter()
            .filter(|c| c.contains("type vxlan"))
            .count();
        assert_eq!(hub_creates, 2);
        // The http-agent spoke got a structured request, not shell commands.
        assert!(executor.calls_for("spoke-2")[0].contains("CreateTunnel"));
    }

    #[tokio::test]
    async fn test_deploy_partial_failure_is_aggregated() {
        let inventory = Arc::new(NodeInventory::in_memory());
        inventory
            .add(RemoteNode::shell("hub-1", "192.0.2.1", 22))
            .unwrap();
        inventory
            .add(RemoteNode::shell("spoke-1", "192.0.2.2", 22))
            .unwrap();
        inventory
            .add(RemoteNode::http_agent("spoke-2", "192.0.2.3", 8080))
            .unwrap();
        let executor = Arc::new(MockExecutor::default());
        executor.error_on("spoke-2");
        let orchestrator = NodeOrchestrator::new(inventory, executor);

        let report = orchestrator
            .deploy_topology(TopologyType::HubSpoke, &deploy_configs())
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);

        let failed_pair = report.pairs.iter().find(|p| !p.success).unwrap();
        assert_eq!(failed_pair.spoke_node, "spoke-2");
        // The hub side of the failed pair still ran and succeeded.
        assert!(failed_pair.hub.success);
    }

    #[tokio::test]
    async fn test_deploy_requires_hub() {
        let (_executor, orchestrator) = orchestrator();
        let configs: Vec<DeployNodeConfig> = deploy_configs()
            .into_iter()
            .filter(|c| c.role == NodeRole::Spoke)
            .collect();
        assert!(matches!(
            orchestrator
                .deploy_topology(TopologyType::HubSpoke, &configs)
                .await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_deploy_rejects_non_hub_spoke() {
        let (_executor, orchestrator) = orchestrator();
        assert!(matches!(
            orchestrator
                .deploy_topology(TopologyType::FullMesh, &deploy_configs())
                .await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_deploy_missing_vni_fails_before_dispatch() {
        let (executor, orchestrator) = orchestrator();
        let mut configs = deploy_configs();
        configs[1].vni = None;

        assert!(matches!(
            orchestrator
                .deploy_topology(TopologyType::HubSpoke, &configs)
                .await,
            Err(Error::Config(_))
        ));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_deploy_unregistered_node_fails_before_dispatch() {
        let (executor, orchestrator) = orchestrator();
        let mut configs = deploy_configs();
        configs[2].node_id = "ghost".to_string();

        assert!(matches!(
            orchestrator
                .deploy_topology(TopologyType::HubSpoke, &configs)
                .await,
            Err(Error::NotFound { .. })
        ));
        assert!(executor.calls().is_empty());
    }
}
