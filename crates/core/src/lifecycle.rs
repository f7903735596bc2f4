//! Tunnel lifecycle management
//!
//! Idempotent create/delete/list/recover for a single node's tunnels. The
//! backend sequence per tunnel is strictly ordered; a failure at any step
//! tears down whatever this attempt created and persists nothing.

use crate::backend::NetworkBackend;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vxmesh_common::{
    EncryptionMode, Error, ProvisionStep, Result, TunnelRecord, TunnelSpec, TunnelStatus,
    TunnelStore,
};

/// Outcome of one recovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub recovered: usize,
    pub failed: usize,
}

/// Compensating action accumulated during the forward provisioning pass.
/// Executed in reverse on failure; each action tolerates its own errors.
enum Compensation {
    Detach { interface: String, bridge: String },
    Destroy(String),
}

impl Compensation {
    fn run(&self, backend: &dyn NetworkBackend) {
        let result = match self {
            Compensation::Detach { interface, bridge } => backend.detach(interface, bridge),
            Compensation::Destroy(name) => backend.destroy(name),
        };
        if let Err(e) = result {
            warn!("Compensating teardown step failed (ignored): {}", e);
        }
    }
}

/// Manager for one node's tunnel lifecycle
///
/// Owns the id-to-spec registry; multiple independent instances do not
/// interfere. Create/delete serialize on the registry write lock, list and
/// recover work from a read snapshot.
pub struct TunnelManager {
    backend: Arc<dyn NetworkBackend>,
    store: Arc<dyn TunnelStore>,
    tunnels: RwLock<HashMap<String, TunnelSpec>>,
}

impl TunnelManager {
    /// Create a manager over a backend and store, loading persisted state
    pub fn new(backend: Arc<dyn NetworkBackend>, store: Arc<dyn TunnelStore>) -> Result<Self> {
        let tunnels = store.load()?;
        if !tunnels.is_empty() {
            info!("Loaded {} tunnel configuration(s)", tunnels.len());
        }
        Ok(Self {
            backend,
            store,
            tunnels: RwLock::new(tunnels),
        })
    }

    /// Create a tunnel, returning its store id
    ///
    /// Without an explicit id the store key is derived as `vxlan<vni>`.
    /// Creating an id that already maps to the same (vni, local, remote)
    /// identity is a no-op success; a divergent identity is a conflict.
    pub fn create(&self, mut spec: TunnelSpec, id: Option<String>) -> Result<String> {
        spec.apply_defaults();
        spec.validate()?;

        let tunnel_id = id.unwrap_or_else(|| spec.derived_id());
        let mut tunnels = self.tunnels.write();

        if let Some(existing) = tunnels.get(&tunnel_id) {
            if existing.same_identity(&spec) {
                info!("Tunnel {} already exists with same identity", tunnel_id);
                return Ok(tunnel_id);
            }
            return Err(Error::Conflict { id: tunnel_id });
        }

        self.provision(&spec)?;

        tunnels.insert(tunnel_id.clone(), spec.clone());
        if let Err(e) = self.store.save(&tunnels) {
            // Persisting failed: undo the backend work so store stays truth.
            error!("Failed to persist tunnel {}: {}", tunnel_id, e);
            tunnels.remove(&tunnel_id);
            Compensation::Detach {
                interface: spec.interface_name.clone(),
                bridge: spec.bridge_name.clone(),
            }
            .run(self.backend.as_ref());
            Compensation::Destroy(spec.interface_name.clone()).run(self.backend.as_ref());
            return Err(e);
        }

        info!(
            "Tunnel {} created (vni {}, {} -> {})",
            tunnel_id, spec.vni, spec.local_ip, spec.remote_ip
        );
        Ok(tunnel_id)
    }

    /// Delete a tunnel
    ///
    /// Best-effort detach-then-destroy; a backend object that is already
    /// gone is tolerated. The store record is removed unconditionally:
    /// store consistency takes priority over node state here.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut tunnels = self.tunnels.write();
        let spec = tunnels
            .get(id)
            .cloned()
            .ok_or_else(|| Error::tunnel_not_found(id))?;

        if let Err(e) = self.backend.detach(&spec.interface_name, &spec.bridge_name) {
            warn!("Detach of {} failed (continuing): {}", spec.interface_name, e);
        }
        let destroy_result = self.backend.destroy(&spec.interface_name);
        if let Err(e) = &destroy_result {
            error!("Destroy of {} failed: {}", spec.interface_name, e);
        }

        tunnels.remove(id);
        self.store.save(&tunnels)?;
        info!("Tunnel {} deleted", id);
        destroy_result
    }

    /// All records with a fresh backend status, ordered by id
    pub fn list(&self) -> Vec<TunnelRecord> {
        let snapshot: Vec<(String, TunnelSpec)> = {
            let tunnels = self.tunnels.read();
            let mut entries: Vec<_> = tunnels.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries
        };

        snapshot
            .into_iter()
            .map(|(tunnel_id, spec)| {
                let status = self.backend.query_status(&spec.interface_name);
                TunnelRecord {
                    tunnel_id,
                    spec,
                    status,
                }
            })
            .collect()
    }

    /// Stored spec for an id, if any
    pub fn get(&self, id: &str) -> Option<TunnelSpec> {
        self.tunnels.read().get(id).cloned()
    }

    /// Fresh backend status for a stored tunnel
    pub fn status(&self, id: &str) -> Result<TunnelStatus> {
        let spec = self.get(id).ok_or_else(|| Error::tunnel_not_found(id))?;
        Ok(self.backend.query_status(&spec.interface_name))
    }

    pub fn len(&self) -> usize {
        self.tunnels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tunnels.read().is_empty()
    }

    /// Re-assert desired state for every record whose backend object is gone
    ///
    /// Replays the create sequence without re-persisting. A single record's
    /// failure is counted, not raised; the pass always visits every record.
    pub fn recover(&self) -> RecoveryReport {
        let snapshot: Vec<(String, TunnelSpec)> = {
            let tunnels = self.tunnels.read();
            let mut entries: Vec<_> = tunnels.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries
        };

        let mut report = RecoveryReport::default();
        for (id, spec) in snapshot {
            let status = self.backend.query_status(&spec.interface_name);
            if status.interface_exists {
                continue;
            }

            info!("Recreating missing tunnel interface for {}", id);
            match self.provision(&spec) {
                Ok(()) => report.recovered += 1,
                Err(e) => {
                    error!("Failed to recover tunnel {}: {}", id, e);
                    report.failed += 1;
                }
            }
        }

        if report.recovered > 0 || report.failed > 0 {
            info!(
                "Recovery pass complete: {} recovered, {} failed",
                report.recovered, report.failed
            );
        }
        report
    }

    /// Run the ordered backend sequence, compensating on failure
    fn provision(&self, spec: &TunnelSpec) -> Result<()> {
        let mut undo: Vec<Compensation> = Vec::new();
        match self.run_sequence(spec, &mut undo) {
            Ok(()) => {
                debug!("Provisioning sequence for {} complete", spec.interface_name);
                Ok(())
            }
            Err((step, cause)) => {
                warn!(
                    "Provisioning {} failed reaching {}: {}; tearing down this attempt",
                    spec.interface_name, step, cause
                );
                for action in undo.iter().rev() {
                    action.run(self.backend.as_ref());
                }
                Err(cause)
            }
        }
    }

    /// Forward pass: each step runs only after the previous one succeeded
    fn run_sequence(
        &self,
        spec: &TunnelSpec,
        undo: &mut Vec<Compensation>,
    ) -> std::result::Result<(), (ProvisionStep, Error)> {
        let backend = self.backend.as_ref();

        backend
            .create_endpoint(spec)
            .map_err(|e| (ProvisionStep::LinkCreated, e))?;
        undo.push(Compensation::Destroy(spec.interface_name.clone()));

        backend
            .set_link_up(&spec.interface_name)
            .map_err(|e| (ProvisionStep::LinkUp, e))?;

        // Create-if-absent: a bridge shared with other tunnels is expected.
        let bridge_present = backend
            .bridge_exists(&spec.bridge_name)
            .map_err(|e| (ProvisionStep::BridgeReady, e))?;
        if !bridge_present {
            backend
                .create_bridge(&spec.bridge_name)
                .map_err(|e| (ProvisionStep::BridgeReady, e))?;
            undo.push(Compensation::Destroy(spec.bridge_name.clone()));
        }

        backend
            .attach(&spec.interface_name, &spec.bridge_name)
            .map_err(|e| (ProvisionStep::Attached, e))?;
        undo.push(Compensation::Detach {
            interface: spec.interface_name.clone(),
            bridge: spec.bridge_name.clone(),
        });

        backend
            .set_mtu(&spec.interface_name, spec.mtu)
            .map_err(|e| (ProvisionStep::MtuSet, e))?;

        if let Some(addr) = &spec.tunnel_address {
            backend
                .assign_address(&spec.interface_name, addr)
                .map_err(|e| (ProvisionStep::Done, e))?;
        }
        if let Some(addr) = &spec.bridge_address {
            backend
                .assign_address(&spec.bridge_name, addr)
                .map_err(|e| (ProvisionStep::Done, e))?;
        }

        self.apply_encryption(spec);
        Ok(())
    }

    /// Encryption is a stubbed extension point; modes only log intent
    fn apply_encryption(&self, spec: &TunnelSpec) {
        match spec.encryption {
            EncryptionMode::None => {}
            EncryptionMode::Psk => {
                info!("PSK encryption configured for tunnel {}", spec.interface_name);
            }
            EncryptionMode::Ikev2 => {
                info!("IKEv2 encryption configured for tunnel {}", spec.interface_name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingStore, FailingSaveStore, RecordingBackend};
    use vxmesh_common::{LinkState, MemoryTunnelStore};

    fn spec(vni: u32) -> TunnelSpec {
        TunnelSpec::new(vni, "10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()).unwrap()
    }

    fn manager() -> (Arc<RecordingBackend>, Arc<MemoryTunnelStore>, TunnelManager) {
        let backend = Arc::new(RecordingBackend::new());
        let store = Arc::new(MemoryTunnelStore::new());
        let manager = TunnelManager::new(backend.clone(), store.clone()).unwrap();
        (backend, store, manager)
    }

    #[test]
    fn test_create_runs_sequence_in_order_and_persists() {
        let (backend, store, manager) = manager();

        let id = manager.create(spec(5000), None).unwrap();
        assert_eq!(id, "vxlan5000");

        assert_eq!(
            backend.calls(),
            vec![
                "create_endpoint vxlan5000",
                "set_link_up vxlan5000",
                "bridge_exists br-lan",
                "create_bridge br-lan",
                "attach vxlan5000 br-lan",
                "set_mtu vxlan5000 1450",
            ]
        );
        assert!(store.load().unwrap().contains_key("vxlan5000"));
    }

    #[test]
    fn test_create_is_idempotent_for_same_identity() {
        let (backend, _store, manager) = manager();

        let first = manager.create(spec(5000), None).unwrap();
        let calls_after_first = backend.calls().len();

        // Cosmetic differences do not matter, identity does.
        let second = manager.create(spec(5000).with_label("again"), None).unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.calls().len(), calls_after_first);
    }

    #[test]
    fn test_create_conflict_on_divergent_identity() {
        let (_backend, store, manager) = manager();

        manager.create(spec(5000), Some("edge".to_string())).unwrap();
        let err = manager
            .create(spec(5001), Some("edge".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { ref id } if id == "edge"));

        // Existing record untouched.
        assert_eq!(store.load().unwrap()["edge"].vni, 5000);
    }

    #[test]
    fn test_create_reuses_existing_bridge() {
        let (backend, _store, manager) = manager();
        backend.add_bridge("br-lan");

        manager.create(spec(5000), None).unwrap();
        assert!(!backend.calls().iter().any(|c| c.starts_with("create_bridge")));
    }

    #[test]
    fn test_validation_precedes_side_effects() {
        let (backend, store, manager) = manager();

        let err = manager.create(spec(5000).with_mtu(100), None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(backend.calls().is_empty());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_failure_mid_sequence_compensates_and_persists_nothing() {
        let (backend, store, manager) = manager();
        backend.fail_on("attach");

        let err = manager.create(spec(5000), None).unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));

        let calls = backend.calls();
        // Steps after the failing one never ran.
        assert!(!calls.iter().any(|c| c.starts_with("set_mtu")));
        // This attempt's objects were torn down, in reverse order: the
        // bridge it created, then the endpoint.
        assert_eq!(
            &calls[calls.len() - 2..],
            &["destroy br-lan".to_string(), "destroy vxlan5000".to_string()]
        );
        assert!(!backend.has_link("vxlan5000"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_failure_at_first_step_leaves_backend_untouched() {
        let (backend, store, manager) = manager();
        backend.fail_on("create_endpoint");

        assert!(manager.create(spec(5000), None).is_err());
        assert_eq!(backend.calls(), vec!["create_endpoint vxlan5000"]);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_compensation_spares_preexisting_bridge() {
        let (backend, _store, manager) = manager();
        backend.add_bridge("br-lan");
        backend.fail_on("set_mtu");

        assert!(manager.create(spec(5000), None).is_err());
        // The shared bridge was not created by this attempt, so it is not
        // part of the teardown.
        assert!(!backend.calls().iter().any(|c| c == "destroy br-lan"));
        assert!(backend.has_bridge("br-lan"));
    }

    #[test]
    fn test_delete_unknown_is_not_found() {
        let (_backend, _store, manager) = manager();
        assert!(matches!(
            manager.delete("vxlan9999"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_removes_record_even_when_backend_object_absent() {
        let (backend, store, manager) = manager();
        manager.create(spec(5000), None).unwrap();

        // Simulate the kernel object disappearing behind our back.
        backend.forget_link("vxlan5000");

        manager.delete("vxlan5000").unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_record_despite_destroy_failure() {
        let (backend, store, manager) = manager();
        manager.create(spec(5000), None).unwrap();
        backend.fail_on("destroy");

        let err = manager.delete("vxlan5000").unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
        // Store consistency wins: the record is gone regardless.
        assert!(store.load().unwrap().is_empty());
        assert!(manager.get("vxlan5000").is_none());
    }

    #[test]
    fn test_list_queries_fresh_status() {
        let (backend, _store, manager) = manager();
        manager.create(spec(5000), None).unwrap();

        let records = manager.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status.state, LinkState::Up);
        assert!(records[0].status.interface_exists);

        backend.forget_link("vxlan5000");
        let records = manager.list();
        assert_eq!(records[0].status.state, LinkState::Absent);
        assert!(!records[0].status.interface_exists);
    }

    #[test]
    fn test_recover_recreates_missing_tunnels() {
        let (backend, _store, manager) = manager();
        manager.create(spec(5000), None).unwrap();
        manager.create(spec(5001), None).unwrap();
        manager.create(spec(5002), None).unwrap();

        backend.forget_link("vxlan5000");
        backend.forget_link("vxlan5002");

        let report = manager.recover();
        assert_eq!(report, RecoveryReport { recovered: 2, failed: 0 });
        assert!(backend.has_link("vxlan5000"));
        assert!(backend.has_link("vxlan5002"));
    }

    #[test]
    fn test_recover_counts_refused_record_and_continues() {
        let (backend, _store, manager) = manager();
        manager.create(spec(5000), None).unwrap();
        manager.create(spec(5001), None).unwrap();
        manager.create(spec(5002), None).unwrap();

        backend.forget_link("vxlan5000");
        backend.forget_link("vxlan5001");
        backend.refuse_interface("vxlan5000");

        let report = manager.recover();
        assert_eq!(report, RecoveryReport { recovered: 1, failed: 1 });
        assert!(backend.has_link("vxlan5001"));
        // The untouched record is unaffected.
        assert!(backend.has_link("vxlan5002"));
    }

    #[test]
    fn test_recover_does_not_rewrite_store() {
        let backend = Arc::new(RecordingBackend::new());
        let store = Arc::new(CountingStore::new(MemoryTunnelStore::new()));
        let manager = TunnelManager::new(backend.clone(), store.clone()).unwrap();

        manager.create(spec(5000), None).unwrap();
        let saves_before = store.save_count();

        backend.forget_link("vxlan5000");
        let report = manager.recover();
        assert_eq!(report.recovered, 1);
        assert_eq!(store.save_count(), saves_before);
    }

    #[test]
    fn test_create_tears_down_when_persist_fails() {
        let backend = Arc::new(RecordingBackend::new());
        let manager =
            TunnelManager::new(backend.clone(), Arc::new(FailingSaveStore)).unwrap();

        assert!(manager.create(spec(5000), None).is_err());
        assert!(!backend.has_link("vxlan5000"));
        assert!(manager.get("vxlan5000").is_none());
    }

    #[test]
    fn test_status_for_unknown_id() {
        let (_backend, _store, manager) = manager();
        assert!(manager.status("vxlan5000").is_err());
    }

    #[test]
    fn test_manager_loads_persisted_state() {
        let backend = Arc::new(RecordingBackend::new());
        let store = Arc::new(MemoryTunnelStore::new());
        {
            let manager = TunnelManager::new(backend.clone(), store.clone()).unwrap();
            manager.create(spec(5000), None).unwrap();
        }
        let manager = TunnelManager::new(backend, store).unwrap();
        assert_eq!(manager.len(), 1);
        assert!(manager.get("vxlan5000").is_some());
    }
}
