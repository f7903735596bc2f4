//! Network backend capability interface
//!
//! The lifecycle manager only ever touches kernel network objects through
//! this trait. All calls are synchronous and idempotent at the OS-object
//! level: destroying or detaching an object that is already gone is success.

use ipnetwork::IpNetwork;
use std::process::Command;
use tracing::{debug, error};
use vxmesh_common::{Error, Result, TunnelSpec, TunnelStatus};

/// Capability interface to one node's kernel network objects
pub trait NetworkBackend: Send + Sync {
    /// Allocate the VxLAN endpoint object for a tunnel
    fn create_endpoint(&self, spec: &TunnelSpec) -> Result<()>;

    /// Bring a link administratively up
    fn set_link_up(&self, name: &str) -> Result<()>;

    fn bridge_exists(&self, name: &str) -> Result<bool>;

    /// Create a bridge and bring it up
    fn create_bridge(&self, name: &str) -> Result<()>;

    /// Enslave a link to a bridge
    fn attach(&self, name: &str, bridge: &str) -> Result<()>;

    /// Release a link from its bridge; absent link is success
    fn detach(&self, name: &str, bridge: &str) -> Result<()>;

    /// Delete a link; absent link is success
    fn destroy(&self, name: &str) -> Result<()>;

    fn set_mtu(&self, name: &str, mtu: u32) -> Result<()>;

    /// Assign an L3 address (CIDR) to a link
    fn assign_address(&self, name: &str, address: &IpNetwork) -> Result<()>;

    /// Live existence + administrative state; never raises
    fn query_status(&self, name: &str) -> TunnelStatus;
}

/// Output of one ip(8) invocation
struct CmdOutput {
    code: i32,
    stdout: String,
    stderr: String,
}

impl CmdOutput {
    fn ok(&self) -> bool {
        self.code == 0
    }
}

/// Production backend shelling out to ip(8)
pub struct IprouteBackend {
    ip_binary: String,
}

impl Default for IprouteBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IprouteBackend {
    pub fn new() -> Self {
        Self {
            ip_binary: "ip".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            ip_binary: binary.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<CmdOutput> {
        debug!("Running: {} {}", self.ip_binary, args.join(" "));
        let output = Command::new(&self.ip_binary).args(args).output()?;
        Ok(CmdOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn run_checked(&self, op: &str, args: &[&str]) -> Result<()> {
        let out = self.run(args)?;
        if out.ok() {
            Ok(())
        } else {
            error!("{} failed (rc={}): {}", op, out.code, out.stderr.trim());
            Err(Error::backend(op, out.stderr.trim().to_string()))
        }
    }

    /// Probe for the tooling and kernel modules VxLAN provisioning needs
    pub fn check_requirements(&self) -> RequirementsReport {
        let ip_available = self.run(&["-V"]).map(|o| o.ok()).unwrap_or(false);

        let lsmod = Command::new("lsmod")
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).into_owned())
            .unwrap_or_default();
        let vxlan_module = lsmod.lines().any(|l| l.starts_with("vxlan"));
        let bridge_module = lsmod.lines().any(|l| l.starts_with("bridge"));

        // Can we read link state at all (capability / namespace check)?
        let can_query = self.run(&["link", "show"]).map(|o| o.ok()).unwrap_or(false);

        RequirementsReport {
            ip_available,
            vxlan_module,
            bridge_module,
            can_query,
        }
    }
}

/// Host readiness probe result
#[derive(Debug, Clone, serde::Serialize)]
pub struct RequirementsReport {
    pub ip_available: bool,
    pub vxlan_module: bool,
    pub bridge_module: bool,
    pub can_query: bool,
}

impl RequirementsReport {
    pub fn satisfied(&self) -> bool {
        self.ip_available && self.can_query
    }
}

fn is_absent(stderr: &str) -> bool {
    let s = stderr.to_ascii_lowercase();
    s.contains("cannot find device") || s.contains("does not exist")
}

impl NetworkBackend for IprouteBackend {
    fn create_endpoint(&self, spec: &TunnelSpec) -> Result<()> {
        let vni = spec.vni.to_string();
        let local = spec.local_ip.to_string();
        let remote = spec.remote_ip.to_string();
        let port = spec.udp_port.to_string();
        self.run_checked(
            "create_endpoint",
            &[
                "link", "add", &spec.interface_name, "type", "vxlan", "id", &vni, "local",
                &local, "remote", &remote, "dev", &spec.physical_interface, "dstport", &port,
            ],
        )
    }

    fn set_link_up(&self, name: &str) -> Result<()> {
        self.run_checked("set_link_up", &["link", "set", name, "up"])
    }

    fn bridge_exists(&self, name: &str) -> Result<bool> {
        Ok(self.run(&["link", "show", name])?.ok())
    }

    fn create_bridge(&self, name: &str) -> Result<()> {
        self.run_checked("create_bridge", &["link", "add", name, "type", "bridge"])?;
        self.run_checked("create_bridge", &["link", "set", name, "up"])
    }

    fn attach(&self, name: &str, bridge: &str) -> Result<()> {
        self.run_checked("attach", &["link", "set", name, "master", bridge])
    }

    fn detach(&self, name: &str, _bridge: &str) -> Result<()> {
        let out = self.run(&["link", "set", name, "nomaster"])?;
        if out.ok() || is_absent(&out.stderr) {
            Ok(())
        } else {
            Err(Error::backend("detach", out.stderr.trim().to_string()))
        }
    }

    fn destroy(&self, name: &str) -> Result<()> {
        let out = self.run(&["link", "delete", name])?;
        if out.ok() || is_absent(&out.stderr) {
            Ok(())
        } else {
            Err(Error::backend("destroy", out.stderr.trim().to_string()))
        }
    }

    fn set_mtu(&self, name: &str, mtu: u32) -> Result<()> {
        let mtu = mtu.to_string();
        self.run_checked("set_mtu", &["link", "set", name, "mtu", &mtu])
    }

    fn assign_address(&self, name: &str, address: &IpNetwork) -> Result<()> {
        let addr = address.to_string();
        let out = self.run(&["addr", "add", &addr, "dev", name])?;
        // "File exists" means the address is already assigned
        if out.ok() || out.stderr.to_ascii_lowercase().contains("file exists") {
            Ok(())
        } else {
            Err(Error::backend("assign_address", out.stderr.trim().to_string()))
        }
    }

    fn query_status(&self, name: &str) -> TunnelStatus {
        match self.run(&["-d", "link", "show", name]) {
            Ok(out) if out.ok() => {
                let state = if out.stdout.contains("state UP") {
                    vxmesh_common::LinkState::Up
                } else {
                    vxmesh_common::LinkState::Down
                };
                TunnelStatus {
                    state,
                    interface_exists: true,
                    detail: None,
                }
            }
            Ok(_) => TunnelStatus::absent(),
            Err(e) => TunnelStatus::error(e.to_string()),
        }
    }
}
