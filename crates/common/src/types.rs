//! Core types for vxmesh

use crate::validate;
use crate::{Error, Result};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Default bridge every tunnel attaches to unless overridden
pub const DEFAULT_BRIDGE: &str = "br-lan";

/// Default underlay interface carrying the encapsulated traffic
pub const DEFAULT_PHYSICAL_INTERFACE: &str = "eth0";

/// Default tunnel MTU (1500 underlay minus VxLAN encapsulation overhead)
pub const DEFAULT_MTU: u32 = 1450;

/// IANA-assigned VxLAN UDP port
pub const DEFAULT_UDP_PORT: u16 = 4789;

fn default_bridge() -> String {
    DEFAULT_BRIDGE.to_string()
}

fn default_physical_interface() -> String {
    DEFAULT_PHYSICAL_INTERFACE.to_string()
}

fn default_mtu() -> u32 {
    DEFAULT_MTU
}

fn default_udp_port() -> u16 {
    DEFAULT_UDP_PORT
}

/// Tunnel encryption mode (stubbed extension point)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionMode {
    None,
    Psk,
    Ikev2,
}

impl Default for EncryptionMode {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncryptionMode::None => write!(f, "none"),
            EncryptionMode::Psk => write!(f, "psk"),
            EncryptionMode::Ikev2 => write!(f, "ikev2"),
        }
    }
}

/// VxLAN tunnel specification
///
/// `(vni, local_ip, remote_ip)` is the semantic identity of a tunnel; the
/// store key (`tunnel_id`) is separate and usually derived from the VNI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelSpec {
    pub vni: u32,
    pub local_ip: IpAddr,
    pub remote_ip: IpAddr,
    #[serde(default)]
    pub interface_name: String,
    #[serde(default = "default_bridge")]
    pub bridge_name: String,
    #[serde(default = "default_physical_interface")]
    pub physical_interface: String,
    #[serde(default = "default_mtu")]
    pub mtu: u32,
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub encryption: EncryptionMode,
    #[serde(default)]
    pub psk_key: Option<String>,
    /// Optional L3 address assigned to the bridge (CIDR)
    #[serde(default)]
    pub bridge_address: Option<IpNetwork>,
    /// Optional L3 address assigned to the tunnel interface (CIDR)
    #[serde(default)]
    pub tunnel_address: Option<IpNetwork>,
}

impl TunnelSpec {
    /// Create a spec with defaults for everything but the identity triple
    pub fn new(vni: u32, local_ip: IpAddr, remote_ip: IpAddr) -> Result<Self> {
        let spec = Self {
            vni,
            local_ip,
            remote_ip,
            interface_name: validate::derive_interface_name(vni),
            bridge_name: default_bridge(),
            physical_interface: default_physical_interface(),
            mtu: DEFAULT_MTU,
            udp_port: DEFAULT_UDP_PORT,
            label: String::new(),
            encryption: EncryptionMode::None,
            psk_key: None,
            bridge_address: None,
            tunnel_address: None,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn with_interface_name(mut self, name: impl Into<String>) -> Self {
        self.interface_name = name.into();
        self
    }

    pub fn with_bridge(mut self, bridge: impl Into<String>) -> Self {
        self.bridge_name = bridge.into();
        self
    }

    pub fn with_physical_interface(mut self, dev: impl Into<String>) -> Self {
        self.physical_interface = dev.into();
        self
    }

    pub fn with_mtu(mut self, mtu: u32) -> Self {
        self.mtu = mtu;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_encryption(mut self, mode: EncryptionMode, key: Option<String>) -> Self {
        self.encryption = mode;
        self.psk_key = key;
        self
    }

    /// Fill derivable fields left empty by a loose payload
    pub fn apply_defaults(&mut self) {
        if self.interface_name.is_empty() {
            self.interface_name = validate::derive_interface_name(self.vni);
        }
        if self.bridge_name.is_empty() {
            self.bridge_name = default_bridge();
        }
        if self.physical_interface.is_empty() {
            self.physical_interface = default_physical_interface();
        }
    }

    /// Check all field bounds, raising ValidationError before any side effect
    pub fn validate(&self) -> Result<()> {
        validate::check_vni(self.vni)?;
        validate::check_mtu(self.mtu)?;
        if self.udp_port == 0 {
            return Err(Error::Validation("udp_port must be non-zero".to_string()));
        }
        if self.interface_name.is_empty() {
            return Err(Error::Validation("interface_name must not be empty".to_string()));
        }
        if self.encryption == EncryptionMode::Psk && self.psk_key.is_none() {
            return Err(Error::Validation(
                "psk encryption requires key material".to_string(),
            ));
        }
        Ok(())
    }

    /// Two specs describe the same tunnel iff their identity triples match
    pub fn same_identity(&self, other: &TunnelSpec) -> bool {
        self.vni == other.vni
            && self.local_ip == other.local_ip
            && self.remote_ip == other.remote_ip
    }

    /// Store key derived from the VNI when the caller does not supply one
    pub fn derived_id(&self) -> String {
        validate::derive_interface_name(self.vni)
    }
}

/// Administrative state of one link as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Up,
    Down,
    Absent,
    Error,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Up => write!(f, "up"),
            LinkState::Down => write!(f, "down"),
            LinkState::Absent => write!(f, "not_found"),
            LinkState::Error => write!(f, "error"),
        }
    }
}

/// Fresh backend status for a tunnel; queried live, never cached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelStatus {
    pub state: LinkState,
    pub interface_exists: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

impl TunnelStatus {
    pub fn absent() -> Self {
        Self {
            state: LinkState::Absent,
            interface_exists: false,
            detail: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            state: LinkState::Error,
            interface_exists: false,
            detail: Some(detail.into()),
        }
    }
}

/// Stored spec plus live status, as returned by list()
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelRecord {
    pub tunnel_id: String,
    pub spec: TunnelSpec,
    pub status: TunnelStatus,
}

/// How the orchestrator reaches a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionType {
    Shell,
    HttpAgent,
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::Shell => write!(f, "shell"),
            ConnectionType::HttpAgent => write!(f, "http-agent"),
        }
    }
}

/// Remote node registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteNode {
    pub node_id: String,
    pub hostname: String,
    pub connection_type: ConnectionType,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub ssh_key_path: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
}

impl RemoteNode {
    pub fn shell(node_id: impl Into<String>, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            node_id: node_id.into(),
            hostname: hostname.into(),
            connection_type: ConnectionType::Shell,
            port,
            username: None,
            ssh_key_path: None,
            api_token: None,
        }
    }

    pub fn http_agent(node_id: impl Into<String>, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            node_id: node_id.into(),
            hostname: hostname.into(),
            connection_type: ConnectionType::HttpAgent,
            port,
            username: None,
            ssh_key_path: None,
            api_token: None,
        }
    }
}

/// Topology connectivity pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyType {
    HubSpoke,
    FullMesh,
    PartialMesh,
}

impl std::fmt::Display for TopologyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyType::HubSpoke => write!(f, "hub-spoke"),
            TopologyType::FullMesh => write!(f, "full-mesh"),
            TopologyType::PartialMesh => write!(f, "partial-mesh"),
        }
    }
}

impl std::str::FromStr for TopologyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hub-spoke" => Ok(TopologyType::HubSpoke),
            "full-mesh" => Ok(TopologyType::FullMesh),
            "partial-mesh" => Ok(TopologyType::PartialMesh),
            other => Err(Error::Config(format!("unsupported topology type: {}", other))),
        }
    }
}

/// One endpoint in a topology inventory; iteration order is meaningful
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyNode {
    pub name: String,
    pub wan_ip: IpAddr,
    #[serde(default = "default_physical_interface")]
    pub physical_interface: String,
}

impl TopologyNode {
    pub fn new(name: impl Into<String>, wan_ip: IpAddr) -> Self {
        Self {
            name: name.into(),
            wan_ip,
            physical_interface: default_physical_interface(),
        }
    }
}

/// Explicit node pair for partial-mesh topologies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub node1: String,
    pub node2: String,
}

/// Input to the planner; pure data, no side effects until executed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Node inventory in planning order
    pub nodes: Vec<TopologyNode>,
    /// Hub designation, required for hub-spoke
    #[serde(default)]
    pub hub: Option<String>,
    pub base_vni: u32,
    #[serde(default = "default_bridge")]
    pub bridge_name: String,
    #[serde(default = "default_mtu")]
    pub mtu: u32,
    /// Explicit pairs, required for partial-mesh
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl TopologyConfig {
    pub fn new(nodes: Vec<TopologyNode>, base_vni: u32) -> Self {
        Self {
            nodes,
            hub: None,
            base_vni,
            bridge_name: default_bridge(),
            mtu: DEFAULT_MTU,
            connections: Vec::new(),
        }
    }

    pub fn with_hub(mut self, hub: impl Into<String>) -> Self {
        self.hub = Some(hub.into());
        self
    }

    pub fn with_connections(mut self, connections: Vec<Connection>) -> Self {
        self.connections = connections;
        self
    }

    pub fn node(&self, name: &str) -> Option<&TopologyNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// One tunnel the planner decided on, bound to its endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTunnel {
    pub tunnel_id: String,
    pub topology: TopologyType,
    pub local_node: String,
    pub remote_node: String,
    pub spec: TunnelSpec,
}

/// Deterministic tunnel set for one topology; ordered, side-effect free
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyPlan {
    pub topology: TopologyType,
    pub tunnels: Vec<PlannedTunnel>,
}

impl TopologyPlan {
    pub fn len(&self) -> usize {
        self.tunnels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.is_empty()
    }
}

/// Per-attempt provisioning step for one tunnel on one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    Pending,
    LinkCreated,
    LinkUp,
    BridgeReady,
    Attached,
    MtuSet,
    Done,
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionStep::Pending => write!(f, "pending"),
            ProvisionStep::LinkCreated => write!(f, "link_created"),
            ProvisionStep::LinkUp => write!(f, "link_up"),
            ProvisionStep::BridgeReady => write!(f, "bridge_ready"),
            ProvisionStep::Attached => write!(f, "attached"),
            ProvisionStep::MtuSet => write!(f, "mtu_set"),
            ProvisionStep::Done => write!(f, "done"),
        }
    }
}

/// Wire payload accepted by the node agent's create endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelCreateRequest {
    #[serde(default)]
    pub tunnel_id: Option<String>,
    #[serde(flatten)]
    pub spec: TunnelSpec,
}

/// Agent status summary returned by GET /api/v1/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatusSummary {
    pub node_id: String,
    pub tunnel_count: usize,
    pub tunnels: Vec<TunnelRecord>,
    pub reported_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_spec_defaults() {
        let spec = TunnelSpec::new(5000, ip("10.0.0.1"), ip("10.0.0.2")).unwrap();
        assert_eq!(spec.interface_name, "vxlan5000");
        assert_eq!(spec.bridge_name, "br-lan");
        assert_eq!(spec.physical_interface, "eth0");
        assert_eq!(spec.mtu, 1450);
        assert_eq!(spec.udp_port, 4789);
        assert_eq!(spec.encryption, EncryptionMode::None);
    }

    #[test]
    fn test_spec_vni_bounds() {
        assert!(TunnelSpec::new(4096, ip("10.0.0.1"), ip("10.0.0.2")).is_ok());
        assert!(TunnelSpec::new(16_777_215, ip("10.0.0.1"), ip("10.0.0.2")).is_ok());
        assert!(matches!(
            TunnelSpec::new(4095, ip("10.0.0.1"), ip("10.0.0.2")),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            TunnelSpec::new(16_777_216, ip("10.0.0.1"), ip("10.0.0.2")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_spec_mtu_bounds() {
        let spec = TunnelSpec::new(5000, ip("10.0.0.1"), ip("10.0.0.2")).unwrap();
        assert!(spec.clone().with_mtu(1280).validate().is_ok());
        assert!(spec.clone().with_mtu(9000).validate().is_ok());
        assert!(matches!(
            spec.clone().with_mtu(1279).validate(),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            spec.with_mtu(9001).validate(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_spec_ipv6_endpoints() {
        let spec = TunnelSpec::new(5000, ip("fd00::1"), ip("fd00::2")).unwrap();
        assert!(spec.local_ip.is_ipv6());
    }

    #[test]
    fn test_psk_requires_key() {
        let spec = TunnelSpec::new(5000, ip("10.0.0.1"), ip("10.0.0.2"))
            .unwrap()
            .with_encryption(EncryptionMode::Psk, None);
        assert!(matches!(spec.validate(), Err(Error::Validation(_))));

        let spec = TunnelSpec::new(5000, ip("10.0.0.1"), ip("10.0.0.2"))
            .unwrap()
            .with_encryption(EncryptionMode::Psk, Some("secret".to_string()));
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_identity_ignores_cosmetics() {
        let a = TunnelSpec::new(5000, ip("10.0.0.1"), ip("10.0.0.2")).unwrap();
        let b = a.clone().with_mtu(9000).with_label("other");
        assert!(a.same_identity(&b));

        let c = TunnelSpec::new(5001, ip("10.0.0.1"), ip("10.0.0.2")).unwrap();
        assert!(!a.same_identity(&c));
    }

    #[test]
    fn test_create_request_flattened_wire_format() {
        let json = r#"{
            "tunnel_id": "vxlan5000",
            "vni": 5000,
            "local_ip": "10.0.0.1",
            "remote_ip": "10.0.0.2",
            "mtu": 1400
        }"#;
        let req: TunnelCreateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.tunnel_id.as_deref(), Some("vxlan5000"));
        assert_eq!(req.spec.vni, 5000);
        assert_eq!(req.spec.mtu, 1400);
        // bridge falls back to the documented default
        assert_eq!(req.spec.bridge_name, "br-lan");
    }

    #[test]
    fn test_connection_type_wire_names() {
        let node = RemoteNode::http_agent("cpe-1", "192.0.2.10", 8080);
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains(r#""connection_type":"http-agent""#));
        let node = RemoteNode::shell("cpe-2", "192.0.2.11", 22);
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains(r#""connection_type":"shell""#));
    }

    #[test]
    fn test_topology_type_parse() {
        assert_eq!("hub-spoke".parse::<TopologyType>().unwrap(), TopologyType::HubSpoke);
        assert_eq!("full-mesh".parse::<TopologyType>().unwrap(), TopologyType::FullMesh);
        assert!("ring".parse::<TopologyType>().is_err());
    }
}
