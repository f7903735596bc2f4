//! Remote execution transports
//!
//! One trait, two wire styles: an ordered command invocation over the
//! system ssh client, or a structured management request against a node's
//! HTTP agent. Both produce the same uniform report, and every call runs
//! under a bounded timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use vxmesh_common::{ConnectionType, Error, RemoteNode, Result, TunnelCreateRequest};

/// Uniform result of one remote invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecReport {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub status_code: i32,
}

impl ExecReport {
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            status_code: -1,
        }
    }
}

/// Structured request understood by the node agent
#[derive(Debug, Clone)]
pub enum AgentRequest {
    CreateTunnel(TunnelCreateRequest),
    DeleteTunnel { tunnel_id: String },
    Status,
}

/// One operation dispatched to a node
#[derive(Debug, Clone)]
pub enum NodeOperation {
    /// Single shell invocation (shell transport)
    Command(String),
    /// Structured management request (http-agent transport)
    Request(AgentRequest),
}

/// Uniform transport over the two remote-execution styles
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, node: &RemoteNode, operation: NodeOperation) -> Result<ExecReport>;
}

/// Shell transport driving the system ssh client
pub struct ShellExecutor {
    ssh_binary: String,
    timeout: Duration,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ShellExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            ssh_binary: "ssh".to_string(),
            timeout,
        }
    }

    fn build_command(&self, node: &RemoteNode, command: &str) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.ssh_binary);
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg("-p")
            .arg(node.port.to_string());
        if let Some(key) = &node.ssh_key_path {
            cmd.arg("-i").arg(key);
        }
        let target = match &node.username {
            Some(user) => format!("{}@{}", user, node.hostname),
            None => node.hostname.clone(),
        };
        cmd.arg(target).arg(command);
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RemoteExecutor for ShellExecutor {
    async fn execute(&self, node: &RemoteNode, operation: NodeOperation) -> Result<ExecReport> {
        let command = match operation {
            NodeOperation::Command(command) => command,
            NodeOperation::Request(_) => {
                return Err(Error::Transport(
                    "shell transport cannot carry structured requests".to_string(),
                ));
            }
        };

        debug!("[{}] running: {}", node.node_id, command);
        let output = tokio::time::timeout(
            self.timeout,
            self.build_command(node, &command).output(),
        )
        .await
        .map_err(|_| Error::Timeout {
            seconds: self.timeout.as_secs(),
        })?
        .map_err(|e| Error::Transport(format!("ssh to {} failed: {}", node.hostname, e)))?;

        let code = output.status.code().unwrap_or(-1);
        let report = ExecReport {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status_code: code,
        };
        if !report.success {
            warn!(
                "[{}] command exited {}: {}",
                node.node_id,
                code,
                report.stderr.trim()
            );
        }
        Ok(report)
    }
}

/// HTTP transport against a node's management agent
pub struct AgentExecutor {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl Default for AgentExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl AgentExecutor {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            timeout_secs: timeout.as_secs(),
        }
    }

    fn base_url(node: &RemoteNode) -> String {
        format!("http://{}:{}", node.hostname, node.port)
    }
}

#[async_trait]
impl RemoteExecutor for AgentExecutor {
    async fn execute(&self, node: &RemoteNode, operation: NodeOperation) -> Result<ExecReport> {
        let request = match operation {
            NodeOperation::Request(request) => request,
            NodeOperation::Command(_) => {
                return Err(Error::Transport(
                    "http-agent transport cannot carry raw shell commands".to_string(),
                ));
            }
        };

        let base = Self::base_url(node);
        let builder = match &request {
            AgentRequest::CreateTunnel(create) => self
                .client
                .post(format!("{}/api/v1/tunnels", base))
                .json(create),
            AgentRequest::DeleteTunnel { tunnel_id } => self
                .client
                .delete(format!("{}/api/v1/tunnels/{}", base, tunnel_id)),
            AgentRequest::Status => self.client.get(format!("{}/api/v1/status", base)),
        };
        let builder = match &node.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        debug!("[{}] agent request: {:?}", node.node_id, request);
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    seconds: self.timeout_secs,
                }
            } else {
                Error::Transport(format!("agent request to {} failed: {}", node.hostname, e))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("agent response read failed: {}", e)))?;

        Ok(ExecReport {
            success: status.is_success(),
            stdout: body,
            stderr: String::new(),
            status_code: i32::from(status.as_u16()),
        })
    }
}

/// Dispatcher selecting the transport from the node's connection type
pub struct TransportExecutor {
    shell: ShellExecutor,
    agent: AgentExecutor,
}

impl Default for TransportExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl TransportExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            shell: ShellExecutor::new(timeout),
            agent: AgentExecutor::new(timeout),
        }
    }
}

#[async_trait]
impl RemoteExecutor for TransportExecutor {
    async fn execute(&self, node: &RemoteNode, operation: NodeOperation) -> Result<ExecReport> {
        match node.connection_type {
            ConnectionType::Shell => self.shell.execute(node, operation).await,
            ConnectionType::HttpAgent => self.agent.execute(node, operation).await,
        }
    }
}
