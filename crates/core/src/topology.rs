//! Topology planning
//!
//! Pure, deterministic generation of tunnel sets for hub-spoke, full-mesh
//! and partial-mesh patterns. Planning has no side effects; execution goes
//! through the lifecycle manager.

use crate::lifecycle::TunnelManager;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};
use vxmesh_common::{
    validate, Error, PlannedTunnel, Result, TopologyConfig, TopologyNode, TopologyPlan,
    TopologyType, TunnelSpec,
};

/// Plan the tunnel set for a topology without touching any backend
pub fn plan(topology: TopologyType, config: &TopologyConfig) -> Result<TopologyPlan> {
    let tunnels = match topology {
        TopologyType::HubSpoke => plan_hub_spoke(config)?,
        TopologyType::FullMesh => plan_full_mesh(config)?,
        TopologyType::PartialMesh => plan_partial_mesh(config)?,
    };
    Ok(TopologyPlan { topology, tunnels })
}

fn bound_spec(
    vni: u32,
    local: &TopologyNode,
    remote: &TopologyNode,
    config: &TopologyConfig,
    label: String,
) -> Result<TunnelSpec> {
    let spec = TunnelSpec::new(vni, local.wan_ip, remote.wan_ip)?
        .with_bridge(&config.bridge_name)
        .with_physical_interface(&local.physical_interface)
        .with_mtu(config.mtu)
        .with_label(label);
    spec.validate()?;
    Ok(spec)
}

/// One tunnel per (hub, spoke); VNIs count up from base_vni in node order
fn plan_hub_spoke(config: &TopologyConfig) -> Result<Vec<PlannedTunnel>> {
    let hub_name = config.hub.as_deref().ok_or_else(|| {
        Error::Config("hub designation is required for hub-spoke topology".to_string())
    })?;
    let hub = config.node(hub_name).ok_or_else(|| {
        Error::Config(format!("hub node '{}' not found in inventory", hub_name))
    })?;

    let mut tunnels = Vec::new();
    let mut vni = config.base_vni;
    for spoke in &config.nodes {
        if spoke.name == hub.name {
            continue;
        }
        let spec = bound_spec(vni, hub, spoke, config, format!("hub-spoke-{}", spoke.name))?;
        tunnels.push(PlannedTunnel {
            tunnel_id: format!("hub-{}-{}", spoke.name, vni),
            topology: TopologyType::HubSpoke,
            local_node: hub.name.clone(),
            remote_node: spoke.name.clone(),
            spec,
        });
        vni += 1;
    }
    Ok(tunnels)
}

/// One tunnel per unordered pair, walking pairs in canonical i < j order so
/// replanning identical input reproduces the identical VNI assignment
fn plan_full_mesh(config: &TopologyConfig) -> Result<Vec<PlannedTunnel>> {
    let mut tunnels = Vec::new();
    let mut vni = config.base_vni;
    for i in 0..config.nodes.len() {
        for j in (i + 1)..config.nodes.len() {
            let a = &config.nodes[i];
            let b = &config.nodes[j];
            let spec = bound_spec(vni, a, b, config, format!("mesh-{}-{}", a.name, b.name))?;
            tunnels.push(PlannedTunnel {
                tunnel_id: format!("mesh-{}-{}-{}", a.name, b.name, vni),
                topology: TopologyType::FullMesh,
                local_node: a.name.clone(),
                remote_node: b.name.clone(),
                spec,
            });
            vni += 1;
        }
    }
    Ok(tunnels)
}

/// One tunnel per explicit connection entry, in list order
fn plan_partial_mesh(config: &TopologyConfig) -> Result<Vec<PlannedTunnel>> {
    if config.connections.is_empty() {
        return Err(Error::Config(
            "connections list is required for partial-mesh topology".to_string(),
        ));
    }

    let mut tunnels = Vec::new();
    let mut vni = config.base_vni;
    for (index, connection) in config.connections.iter().enumerate() {
        if connection.node1 == connection.node2 {
            return Err(Error::Config(format!(
                "connection {} cannot connect node '{}' to itself",
                index, connection.node1
            )));
        }
        let a = config.node(&connection.node1).ok_or_else(|| {
            Error::Config(format!(
                "connection {} references unknown node '{}'",
                index, connection.node1
            ))
        })?;
        let b = config.node(&connection.node2).ok_or_else(|| {
            Error::Config(format!(
                "connection {} references unknown node '{}'",
                index, connection.node2
            ))
        })?;

        let spec = bound_spec(vni, a, b, config, format!("partial-{}-{}", a.name, b.name))?;
        tunnels.push(PlannedTunnel {
            tunnel_id: format!("partial-{}-{}-{}", a.name, b.name, vni),
            topology: TopologyType::PartialMesh,
            local_node: a.name.clone(),
            remote_node: b.name.clone(),
            spec,
        });
        vni += 1;
    }
    Ok(tunnels)
}

/// Structural validation mirroring plan(), returning every violation found
pub fn validate_config(topology: TopologyType, config: &TopologyConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.nodes.is_empty() {
        errors.push("nodes configuration is required".to_string());
        return errors;
    }

    let mut seen = HashSet::new();
    for node in &config.nodes {
        if node.name.is_empty() {
            errors.push("node name must not be empty".to_string());
        } else if !seen.insert(node.name.as_str()) {
            errors.push(format!("duplicate node name '{}'", node.name));
        }
    }

    if let Err(e) = validate::check_vni(config.base_vni) {
        errors.push(e.to_string());
    }
    if let Err(e) = validate::check_mtu(config.mtu) {
        errors.push(e.to_string());
    }

    let tunnel_count = match topology {
        TopologyType::HubSpoke => config.nodes.len().saturating_sub(1),
        TopologyType::FullMesh => config.nodes.len() * config.nodes.len().saturating_sub(1) / 2,
        TopologyType::PartialMesh => config.connections.len(),
    };
    if tunnel_count > 0
        && u64::from(config.base_vni) + tunnel_count as u64 - 1 > u64::from(validate::VNI_MAX)
    {
        errors.push(format!(
            "base_vni {} leaves no room for {} tunnel(s) within the VNI range",
            config.base_vni, tunnel_count
        ));
    }

    match topology {
        TopologyType::HubSpoke => match config.hub.as_deref() {
            None => errors.push("hub designation is required for hub-spoke topology".to_string()),
            Some(hub) if config.node(hub).is_none() => {
                errors.push(format!("hub node '{}' not found in inventory", hub));
            }
            Some(_) => {}
        },
        TopologyType::PartialMesh => {
            if config.connections.is_empty() {
                errors.push("connections list is required for partial-mesh topology".to_string());
            }
            for (index, connection) in config.connections.iter().enumerate() {
                if config.node(&connection.node1).is_none() {
                    errors.push(format!(
                        "connection {} references unknown node '{}'",
                        index, connection.node1
                    ));
                }
                if config.node(&connection.node2).is_none() {
                    errors.push(format!(
                        "connection {} references unknown node '{}'",
                        index, connection.node2
                    ));
                }
                if connection.node1 == connection.node2 {
                    errors.push(format!(
                        "connection {} cannot connect node '{}' to itself",
                        index, connection.node1
                    ));
                }
            }
        }
        TopologyType::FullMesh => {}
    }

    errors
}

/// Result of executing a plan through the lifecycle manager
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopologyReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

/// Executes topology plans against a local lifecycle manager
pub struct TopologyService {
    manager: Arc<TunnelManager>,
}

impl TopologyService {
    pub fn new(manager: Arc<TunnelManager>) -> Self {
        Self { manager }
    }

    /// Plan and create every tunnel of a topology, in plan order
    ///
    /// A tunnel that already exists with the same identity is skipped.
    /// A mid-sequence failure leaves earlier tunnels in place; recovery of
    /// the remainder is a retry or recover() concern, not a rollback.
    pub fn create(&self, topology: TopologyType, config: &TopologyConfig) -> Result<TopologyReport> {
        let plan = plan(topology, config)?;
        let mut report = TopologyReport::default();

        for planned in &plan.tunnels {
            if let Some(existing) = self.manager.get(&planned.tunnel_id) {
                if existing.same_identity(&planned.spec) {
                    info!("Tunnel {} already deployed, skipping", planned.tunnel_id);
                    report.skipped.push(planned.tunnel_id.clone());
                    continue;
                }
            }
            match self
                .manager
                .create(planned.spec.clone(), Some(planned.tunnel_id.clone()))
            {
                Ok(id) => report.created.push(id),
                Err(e) => {
                    error!(
                        "Failed to create {} tunnel {}: {}",
                        topology, planned.tunnel_id, e
                    );
                    return Err(e);
                }
            }
        }

        info!(
            "Topology {} applied: {} created, {} skipped",
            topology,
            report.created.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}
