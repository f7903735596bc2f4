//! Scriptable in-memory backend and store instrumentation for tests

use crate::backend::NetworkBackend;
use ipnetwork::IpNetwork;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use vxmesh_common::{
    Error, LinkState, Result, TunnelSpec, TunnelStatus, TunnelStore,
};

/// Fake backend that records every call and can be told to fail
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<String>>,
    fail_ops: Mutex<HashSet<String>>,
    refused_interfaces: Mutex<HashSet<String>>,
    links: Mutex<HashMap<String, LinkState>>,
    bridges: Mutex<HashSet<String>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every future call of this backend op fails
    pub fn fail_on(&self, op: &str) {
        self.fail_ops.lock().insert(op.to_string());
    }

    /// create_endpoint for this interface name is refused
    pub fn refuse_interface(&self, name: &str) {
        self.refused_interfaces.lock().insert(name.to_string());
    }

    /// Pre-seed an existing bridge
    pub fn add_bridge(&self, name: &str) {
        self.bridges.lock().insert(name.to_string());
    }

    /// Simulate the kernel object vanishing outside our control
    pub fn forget_link(&self, name: &str) {
        self.links.lock().remove(name);
    }

    pub fn has_link(&self, name: &str) -> bool {
        self.links.lock().contains_key(name)
    }

    pub fn has_bridge(&self, name: &str) -> bool {
        self.bridges.lock().contains(name)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn check(&self, op: &str) -> Result<()> {
        if self.fail_ops.lock().contains(op) {
            return Err(Error::backend(op, "injected failure"));
        }
        Ok(())
    }
}

impl NetworkBackend for RecordingBackend {
    fn create_endpoint(&self, spec: &TunnelSpec) -> Result<()> {
        self.record(format!("create_endpoint {}", spec.interface_name));
        self.check("create_endpoint")?;
        if self.refused_interfaces.lock().contains(&spec.interface_name) {
            return Err(Error::backend("create_endpoint", "refused by backend"));
        }
        self.links
            .lock()
            .insert(spec.interface_name.clone(), LinkState::Down);
        Ok(())
    }

    fn set_link_up(&self, name: &str) -> Result<()> {
        self.record(format!("set_link_up {}", name));
        self.check("set_link_up")?;
        self.links.lock().insert(name.to_string(), LinkState::Up);
        Ok(())
    }

    fn bridge_exists(&self, name: &str) -> Result<bool> {
        self.record(format!("bridge_exists {}", name));
        self.check("bridge_exists")?;
        Ok(self.bridges.lock().contains(name))
    }

    fn create_bridge(&self, name: &str) -> Result<()> {
        self.record(format!("create_bridge {}", name));
        self.check("create_bridge")?;
        self.bridges.lock().insert(name.to_string());
        Ok(())
    }

    fn attach(&self, name: &str, bridge: &str) -> Result<()> {
        self.record(format!("attach {} {}", name, bridge));
        self.check("attach")
    }

    fn detach(&self, name: &str, bridge: &str) -> Result<()> {
        self.record(format!("detach {} {}", name, bridge));
        self.check("detach")
    }

    fn destroy(&self, name: &str) -> Result<()> {
        self.record(format!("destroy {}", name));
        self.check("destroy")?;
        // Destroying an absent object is success.
        self.links.lock().remove(name);
        self.bridges.lock().remove(name);
        Ok(())
    }

    fn set_mtu(&self, name: &str, mtu: u32) -> Result<()> {
        self.record(format!("set_mtu {} {}", name, mtu));
        self.check("set_mtu")
    }

    fn assign_address(&self, name: &str, address: &IpNetwork) -> Result<()> {
        self.record(format!("assign_address {} {}", name, address));
        self.check("assign_address")
    }

    fn query_status(&self, name: &str) -> TunnelStatus {
        match self.links.lock().get(name) {
            Some(state) => TunnelStatus {
                state: *state,
                interface_exists: true,
                detail: None,
            },
            None => TunnelStatus::absent(),
        }
    }
}

/// Store wrapper counting save() invocations
pub struct CountingStore<S: TunnelStore> {
    inner: S,
    saves: AtomicUsize,
}

impl<S: TunnelStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl<S: TunnelStore> TunnelStore for CountingStore<S> {
    fn load(&self) -> Result<HashMap<String, TunnelSpec>> {
        self.inner.load()
    }

    fn save(&self, tunnels: &HashMap<String, TunnelSpec>) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(tunnels)
    }
}

/// Store whose save() always fails, for persistence-failure paths
#[derive(Default)]
pub struct FailingSaveStore;

impl TunnelStore for FailingSaveStore {
    fn load(&self) -> Result<HashMap<String, TunnelSpec>> {
        Ok(HashMap::new())
    }

    fn save(&self, _tunnels: &HashMap<String, TunnelSpec>) -> Result<()> {
        Err(Error::Internal("store unavailable".to_string()))
    }
}
