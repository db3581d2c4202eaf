//! Full convergence pass and incremental handlers.

use super::WorkItem;
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::compiler::{Compiler, InstallPlan};
use crate::error::{ReconcileError, Result};
use crate::installer::{InstallReport, Installer};
use crate::ownership::OwnershipFilter;
use crate::view::FabricView;
use fabric_orch_common::{
    AppId, DeviceProgrammer, Host, MastershipService, NetworkConfigService, TopologyService,
};
use fabric_types::DeviceId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// Result of one full convergence pass.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Devices whose state was compiled and submitted.
    pub reconciled: Vec<DeviceId>,
    /// Devices left untouched because compilation failed.
    pub failed: Vec<(DeviceId, ReconcileError)>,
    pub install: InstallReport,
}

impl PassReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.install.is_success()
    }
}

/// Drives compilation and installation for the devices this instance owns.
pub struct Reconciler {
    pub(super) topology: Arc<dyn TopologyService>,
    net_config: Arc<dyn NetworkConfigService>,
    pub(super) ownership: OwnershipFilter,
    pub(super) programmer: Arc<dyn DeviceProgrammer>,
    compiler: Compiler,
    installer: Installer,
    full_pass: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        topology: Arc<dyn TopologyService>,
        net_config: Arc<dyn NetworkConfigService>,
        mastership: Arc<dyn MastershipService>,
        programmer: Arc<dyn DeviceProgrammer>,
        owner: AppId,
        group_install_delay: Duration,
    ) -> Self {
        let ownership = OwnershipFilter::new(mastership);
        let installer = Installer::new(Arc::clone(&programmer), ownership.clone(), group_install_delay);
        Self {
            topology,
            net_config,
            ownership,
            programmer,
            compiler: Compiler::new(owner),
            installer,
            full_pass: Mutex::new(()),
        }
    }

    pub fn owner(&self) -> &AppId {
        self.compiler.owner()
    }

    pub fn ownership(&self) -> &OwnershipFilter {
        &self.ownership
    }

    /// Snapshot of the current topology with roles resolved.
    pub fn view(&self) -> FabricView {
        FabricView::new(self.topology.snapshot(), self.net_config.as_ref())
    }

    /// Converges every available device this instance owns.
    ///
    /// Only one pass runs at a time; a second caller waits for the first.
    /// Devices are handled independently, so a configuration error on one
    /// leaves the others unaffected.
    #[instrument(skip_all)]
    pub async fn set_up_all_devices(&self) -> PassReport {
        let _pass = self.full_pass.lock().await;
        let view = self.view();
        let devices: Vec<DeviceId> = view
            .snapshot()
            .devices()
            .filter(|d| d.available)
            .map(|d| d.id.clone())
            .collect();
        let owned = self.ownership.owned(&devices);
        info!(available = devices.len(), owned = owned.len(), "starting full pass");

        let mut report = PassReport::default();
        for device in owned {
            match self.reconcile_device(&view, &device).await {
                Ok(install) => {
                    report.install.merge(install);
                    report.reconciled.push(device);
                }
                Err(e) => {
                    error!(device = %device, error = %e, "device left unconfigured");
                    report.failed.push((device, e));
                }
            }
        }

        let outcome = if report.is_success() {
            AuditOutcome::Success
        } else {
            AuditOutcome::Partial
        };
        audit_log!(AuditRecord::new(AuditCategory::ResourceCreate, "Reconciler", "full_pass")
            .with_outcome(outcome)
            .with_object_id(self.owner().as_str())
            .with_details(serde_json::json!({
                "reconciled": report.reconciled.len(),
                "failed": report.failed.len(),
                "groups_applied": report.install.groups_applied,
                "rules_applied": report.install.rules_applied,
                "skipped_unowned": report.install.skipped_unowned,
                "install_errors": report.install.errors.len(),
            })));

        report
    }

    /// Compiles the complete state of `device` and installs it. Nothing is
    /// installed if compilation fails.
    pub async fn reconcile_device(&self, view: &FabricView, device: &DeviceId) -> Result<InstallReport> {
        let plans = self.compiler.compile_device(view, device)?;
        debug!(device = %device, plans = plans.len(), "compiled device state");
        Ok(self.installer.install_all(&plans).await)
    }

    /// Runs one queued work item.
    pub async fn handle(&self, item: WorkItem) -> Result<InstallReport> {
        match item {
            WorkItem::BridgeDevice(device) => self.bridge_device(&device).await,
            WorkItem::LearnHost(host) => self.learn_host(&host).await,
            WorkItem::LinkEndpoint(device) => self.set_up_link_endpoint(&device).await,
        }
    }

    /// Installs bridging state on a device that is currently available.
    pub async fn bridge_device(&self, device: &DeviceId) -> Result<InstallReport> {
        let view = self.view();
        if !view.snapshot().is_available(device) {
            debug!(device = %device, "device not available, skipping bridging setup");
            return Ok(InstallReport::default());
        }
        if !self.ownership.is_owned(device) {
            return Ok(InstallReport::default());
        }
        info!(device = %device, "setting up bridging");
        let plans = self.compiler.compute_bridging_state(&view, device)?;
        Ok(self.installer.install_all(&plans).await)
    }

    /// Installs the bridging rule and host routes for a newly attached
    /// host on its attachment device.
    pub async fn learn_host(&self, host: &Host) -> Result<InstallReport> {
        let device = &host.location.device;
        if !self.ownership.is_owned(device) {
            return Ok(InstallReport::default());
        }
        info!(device = %device, host = %host.mac, port = %host.location.port, "learning host");
        let mut plans = vec![InstallPlan::rules_only(
            device.clone(),
            vec![self.compiler.compute_host_bridging_rule(host)],
        )];
        plans.extend(self.compiler.compute_host_routes(device, host));
        Ok(self.installer.install_all(&plans).await)
    }

    /// Refreshes my-station, route and next-hop state after a link to or
    /// from `device` appeared.
    pub async fn set_up_link_endpoint(&self, device: &DeviceId) -> Result<InstallReport> {
        if !self.ownership.is_owned(device) {
            return Ok(InstallReport::default());
        }
        let view = self.view();
        let mut rules = vec![self.compiler.compute_my_station_rule(&view, device)?];
        rules.extend(self.compiler.compute_next_hop_rules(&view, device)?);
        let mut plans = vec![InstallPlan::rules_only(device.clone(), rules)];
        plans.extend(self.compiler.compute_routes(&view, device)?);
        info!(device = %device, plans = plans.len(), "refreshing routing after link change");
        Ok(self.installer.install_all(&plans).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryTopology, ProgramOp, RecordingProgrammer, StaticMastership};
    use fabric_orch_common::{DeviceRole, FabricTable, GroupId, RoleConfig};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> DeviceId {
        DeviceId::new(s)
    }

    struct Fixture {
        topology: Arc<InMemoryTopology>,
        mastership: Arc<StaticMastership>,
        programmer: Arc<RecordingProgrammer>,
        reconciler: Reconciler,
    }

    fn fixture() -> Fixture {
        let topology = Arc::new(InMemoryTopology::new());
        for (name, role, mac) in [
            ("device:leaf1", DeviceRole::Leaf, "00:aa:00:00:00:01"),
            ("device:spine1", DeviceRole::Spine, "00:bb:00:00:00:01"),
        ] {
            topology.add_device(id(name), true);
            topology.set_role_config(
                id(name),
                RoleConfig {
                    role,
                    station_mac: mac.parse().unwrap(),
                    sid: None,
                },
            );
        }
        topology.add_bidirectional_link(
            "device:leaf1/1".parse().unwrap(),
            "device:spine1/1".parse().unwrap(),
        );
        topology.add_interface(
            "leaf1-3",
            "device:leaf1/3".parse().unwrap(),
            vec!["2001:db8:1::ff/64".parse().unwrap()],
        );

        let mastership = Arc::new(StaticMastership::all());
        let programmer = Arc::new(RecordingProgrammer::new().with_acknowledgement());
        let reconciler = Reconciler::new(
            topology.clone(),
            topology.clone(),
            mastership.clone(),
            programmer.clone(),
            AppId::new("org.fabric.test"),
            Duration::from_millis(500),
        );
        Fixture {
            topology,
            mastership,
            programmer,
            reconciler,
        }
    }

    #[tokio::test]
    async fn test_full_pass_covers_owned_available_devices() {
        let f = fixture();
        f.topology.add_device(id("device:leaf2"), false);

        let report = f.reconciler.set_up_all_devices().await;
        assert!(report.is_success());
        assert_eq!(report.reconciled, vec![id("device:leaf1"), id("device:spine1")]);
        assert!(f.programmer.installed_rules(&id("device:leaf2")).is_empty());

        let leaf_groups: Vec<GroupId> = f
            .programmer
            .installed_groups(&id("device:leaf1"))
            .iter()
            .map(|g| g.id)
            .collect();
        assert!(leaf_groups.contains(&GroupId::CPU_CLONE_SESSION));
        assert!(leaf_groups.contains(&GroupId::BROADCAST));
        assert!(leaf_groups.contains(&GroupId::ECMP));
    }

    #[tokio::test]
    async fn test_full_pass_isolates_config_errors() {
        let f = fixture();
        f.topology.add_device(id("device:leaf9"), true);

        let report = f.reconciler.set_up_all_devices().await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, id("device:leaf9"));
        assert!(matches!(report.failed[0].1, ReconcileError::Configuration { .. }));
        assert_eq!(report.reconciled.len(), 2);
        assert!(f
            .programmer
            .operations()
            .iter()
            .all(|op| op.device() != Some(&id("device:leaf9"))));
    }

    #[tokio::test]
    async fn test_full_pass_skips_unowned_devices() {
        let f = fixture();
        f.mastership.revoke(&id("device:spine1"));
        f.mastership.grant(id("device:leaf1"));

        let report = f.reconciler.set_up_all_devices().await;
        assert_eq!(report.reconciled, vec![id("device:leaf1")]);
        assert!(f
            .programmer
            .operations()
            .iter()
            .all(|op| op.device() == Some(&id("device:leaf1"))));
    }

    #[tokio::test]
    async fn test_learn_host() {
        let f = fixture();
        let host = Host {
            mac: "00:00:00:00:00:1a".parse().unwrap(),
            ips: vec!["2001:db8:1::a".parse().unwrap()],
            location: "device:leaf1/3".parse().unwrap(),
        };

        let report = f.reconciler.handle(WorkItem::LearnHost(host)).await.unwrap();
        assert_eq!(report.groups_applied, 1);
        assert_eq!(report.rules_applied, 2);

        let ops = f.programmer.operations();
        assert!(matches!(&ops[0], ProgramOp::ApplyRules(r) if r[0].table == FabricTable::L2Exact));
        assert!(matches!(&ops[1], ProgramOp::ApplyGroup(g) if g.id == GroupId::from_mac(&"00:00:00:00:00:1a".parse().unwrap())));
        assert!(matches!(&ops[2], ProgramOp::ApplyRules(r) if r[0].table == FabricTable::L3));
    }

    #[tokio::test]
    async fn test_bridge_device_requires_availability() {
        let f = fixture();
        f.topology.set_available(&id("device:leaf1"), false);

        let report = f
            .reconciler
            .handle(WorkItem::BridgeDevice(id("device:leaf1")))
            .await
            .unwrap();
        assert_eq!(report, InstallReport::default());
        assert!(f.programmer.operations().is_empty());

        f.topology.set_available(&id("device:leaf1"), true);
        let report = f
            .reconciler
            .handle(WorkItem::BridgeDevice(id("device:leaf1")))
            .await
            .unwrap();
        assert_eq!(report.groups_applied, 2);
    }

    #[tokio::test]
    async fn test_link_endpoint_refresh() {
        let f = fixture();
        let report = f
            .reconciler
            .handle(WorkItem::LinkEndpoint(id("device:spine1")))
            .await
            .unwrap();
        assert!(report.is_success());

        let tables: Vec<FabricTable> = f
            .programmer
            .installed_rules(&id("device:spine1"))
            .iter()
            .map(|r| r.table)
            .collect();
        assert!(tables.contains(&FabricTable::L2MyStation));
        assert!(tables.contains(&FabricTable::L2Exact));
        assert!(tables.contains(&FabricTable::L3));
        assert!(!tables.contains(&FabricTable::L2Ternary));
    }
}
