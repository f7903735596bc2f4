//! Tunnel Commands

use anyhow::{bail, Result};
use clap::Subcommand;
use serde::Serialize;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use vxmesh_common::{EncryptionMode, FileTunnelStore, TunnelRecord, TunnelSpec};
use vxmesh_core::{IprouteBackend, TunnelManager};

use crate::output::{print_item, print_list, print_success, print_value, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum TunnelCommands {
    /// Create a new VxLAN tunnel
    Create {
        /// VxLAN Network Identifier (4096-16777215)
        #[arg(long)]
        vni: u32,

        /// Local underlay endpoint address
        #[arg(long)]
        local_ip: IpAddr,

        /// Remote underlay endpoint address
        #[arg(long)]
        remote_ip: IpAddr,

        /// Tunnel interface name (derived from the VNI when omitted)
        #[arg(long)]
        interface: Option<String>,

        /// Bridge to attach the tunnel to
        #[arg(long, default_value = "br-lan")]
        bridge: String,

        /// Physical interface carrying the encapsulated traffic
        #[arg(long, default_value = "eth0")]
        physical_interface: String,

        /// MTU size (1280-9000)
        #[arg(long, default_value = "1450")]
        mtu: u32,

        /// VxLAN UDP port
        #[arg(long, default_value = "4789")]
        udp_port: u16,

        /// Label for tunnel identification
        #[arg(long, default_value = "")]
        label: String,

        /// Encryption mode (none, psk, ikev2)
        #[arg(long, default_value = "none")]
        encryption: String,

        /// Pre-shared key for PSK encryption
        #[arg(long)]
        psk_key: Option<String>,

        /// Explicit store id (derived from the VNI when omitted)
        #[arg(long)]
        tunnel_id: Option<String>,
    },

    /// Delete a tunnel
    Delete {
        /// Tunnel id
        id: String,
    },

    /// List tunnels with live status
    List,

    /// Show the live status of one tunnel
    Status {
        /// Tunnel id
        id: String,
    },

    /// Re-assert persisted tunnels whose kernel objects are missing
    Recover,
}

/// Tunnel display wrapper for serialization
#[derive(Serialize)]
pub struct TunnelDisplay {
    pub id: String,
    pub vni: u32,
    pub local_ip: String,
    pub remote_ip: String,
    pub interface: String,
    pub bridge: String,
    pub mtu: u32,
    pub state: String,
}

impl From<&TunnelRecord> for TunnelDisplay {
    fn from(record: &TunnelRecord) -> Self {
        Self {
            id: record.tunnel_id.clone(),
            vni: record.spec.vni,
            local_ip: record.spec.local_ip.to_string(),
            remote_ip: record.spec.remote_ip.to_string(),
            interface: record.spec.interface_name.clone(),
            bridge: record.spec.bridge_name.clone(),
            mtu: record.spec.mtu,
            state: record.status.state.to_string(),
        }
    }
}

impl TableDisplay for TunnelDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "VNI", "LOCAL", "REMOTE", "INTERFACE", "BRIDGE", "MTU", "STATE"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.vni.to_string(),
            self.local_ip.clone(),
            self.remote_ip.clone(),
            self.interface.clone(),
            self.bridge.clone(),
            self.mtu.to_string(),
            self.state.clone(),
        ]
    }
}

fn parse_encryption(mode: &str) -> Result<EncryptionMode> {
    match mode {
        "none" => Ok(EncryptionMode::None),
        "psk" => Ok(EncryptionMode::Psk),
        "ikev2" => Ok(EncryptionMode::Ikev2),
        other => bail!("unknown encryption mode '{}'", other),
    }
}

fn manager(store_path: &Path) -> Result<TunnelManager> {
    let backend = Arc::new(IprouteBackend::new());
    let store = Arc::new(FileTunnelStore::new(store_path));
    Ok(TunnelManager::new(backend, store)?)
}

pub fn handle(command: TunnelCommands, store_path: &Path, format: OutputFormat) -> Result<()> {
    let manager = manager(store_path)?;

    match command {
        TunnelCommands::Create {
            vni,
            local_ip,
            remote_ip,
            interface,
            bridge,
            physical_interface,
            mtu,
            udp_port,
            label,
            encryption,
            psk_key,
            tunnel_id,
        } => {
            let mut spec = TunnelSpec::new(vni, local_ip, remote_ip)?
                .with_bridge(bridge)
                .with_physical_interface(physical_interface)
                .with_mtu(mtu)
                .with_label(label)
                .with_encryption(parse_encryption(&encryption)?, psk_key);
            spec.udp_port = udp_port;
            if let Some(interface) = interface {
                spec = spec.with_interface_name(interface);
            }

            let id = manager.create(spec, tunnel_id)?;
            print_success(&format!("Tunnel {} created", id));

            if let Some(record) = manager.list().into_iter().find(|r| r.tunnel_id == id) {
                print_item(&TunnelDisplay::from(&record), format);
            }
        }

        TunnelCommands::Delete { id } => {
            manager.delete(&id)?;
            print_success(&format!("Tunnel {} deleted", id));
        }

        TunnelCommands::List => {
            let records = manager.list();
            let items: Vec<TunnelDisplay> = records.iter().map(TunnelDisplay::from).collect();
            print_list(&items, format);
        }

        TunnelCommands::Status { id } => {
            let status = manager.status(&id)?;
            print_value(&status, format);
        }

        TunnelCommands::Recover => {
            let report = manager.recover();
            print_success(&format!(
                "Recovery complete: {} recovered, {} failed",
                report.recovered, report.failed
            ));
        }
    }

    Ok(())
}
