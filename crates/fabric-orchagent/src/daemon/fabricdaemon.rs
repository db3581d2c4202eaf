//! FabricDaemon implementation.
//!
//! The daemon owns the reconciler lifecycle:
//! - waits for leftovers of a previous run to be cleaned up
//! - subscribes to topology events and runs the worker pool
//! - schedules the initial full pass
//! - removes all application state on stop

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::config::FabricConfig;
use crate::error::{ReconcileError, Result};
use crate::reconciler::{CleanupReport, PassReport, ReconcileListener, Reconciler, WorkerPool};
use fabric_orch_common::{
    DeviceProgrammer, ListenerId, MastershipService, NetworkConfigService, TopologyService,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Lifecycle state of a [`FabricDaemon`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaemonState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonState::Stopped => write!(f, "stopped"),
            DaemonState::Starting => write!(f, "starting"),
            DaemonState::Running => write!(f, "running"),
            DaemonState::Stopping => write!(f, "stopping"),
        }
    }
}

/// External services the daemon works against.
#[derive(Clone)]
pub struct Collaborators {
    pub topology: Arc<dyn TopologyService>,
    pub mastership: Arc<dyn MastershipService>,
    pub net_config: Arc<dyn NetworkConfigService>,
    pub programmer: Arc<dyn DeviceProgrammer>,
}

/// Runs the reconciler between `start` and `stop`.
pub struct FabricDaemon {
    topology: Arc<dyn TopologyService>,
    reconciler: Arc<Reconciler>,
    worker_threads: usize,
    initial_setup_delay: Duration,
    previous_cleanup_timeout: Duration,
    state: DaemonState,
    listener: Option<ListenerId>,
    workers: Option<WorkerPool>,
    initial_pass: Option<JoinHandle<PassReport>>,
}

impl FabricDaemon {
    pub fn new(config: &FabricConfig, collaborators: Collaborators) -> Self {
        let reconciler = Reconciler::new(
            Arc::clone(&collaborators.topology),
            collaborators.net_config,
            collaborators.mastership,
            collaborators.programmer,
            config.app_id(),
            config.group_install_delay(),
        );
        Self {
            topology: collaborators.topology,
            reconciler: Arc::new(reconciler),
            worker_threads: config.reconcile.worker_threads,
            initial_setup_delay: config.initial_setup_delay(),
            previous_cleanup_timeout: config.previous_cleanup_timeout(),
            state: DaemonState::Stopped,
            listener: None,
            workers: None,
            initial_pass: None,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        Arc::clone(&self.reconciler)
    }

    fn transition(&mut self, expected: DaemonState, to: DaemonState) -> Result<()> {
        if self.state != expected {
            return Err(ReconcileError::InvalidState { from: self.state, to });
        }
        self.state = to;
        Ok(())
    }

    /// Starts reconciling.
    ///
    /// Blocks until leftovers of a previous run are gone or the cleanup
    /// timeout expires, then begins processing events. The initial full pass
    /// runs in the background after the configured delay.
    pub async fn start(&mut self) -> Result<()> {
        self.transition(DaemonState::Stopped, DaemonState::Starting)?;
        let owner = self.reconciler.owner().to_string();
        info!(app = %owner, "starting fabric daemon");

        audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "FabricDaemon", "daemon_start")
            .with_outcome(AuditOutcome::InProgress)
            .with_object_id(owner.as_str()));

        if !self
            .reconciler
            .wait_previous_cleanup(self.previous_cleanup_timeout)
            .await
        {
            warn!(app = %owner, "continuing with state left by a previous run");
            audit_log!(AuditRecord::new(AuditCategory::ErrorCondition, "FabricDaemon", "wait_previous_cleanup")
                .with_object_id(owner.as_str())
                .with_error(format!(
                    "groups of a previous run still present after {}s",
                    self.previous_cleanup_timeout.as_secs()
                )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let listener = ReconcileListener::new(self.reconciler.ownership().clone(), tx);
        self.listener = Some(self.topology.subscribe(Arc::new(listener)));
        let workers = WorkerPool::spawn(self.worker_threads, Arc::clone(&self.reconciler), rx);
        let worker_count = workers.worker_count();
        self.workers = Some(workers);

        let reconciler = Arc::clone(&self.reconciler);
        let delay = self.initial_setup_delay;
        self.initial_pass = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            reconciler.set_up_all_devices().await
        }));

        self.state = DaemonState::Running;
        info!(app = %owner, workers = worker_count, "fabric daemon started");

        audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "FabricDaemon", "daemon_start")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(owner.as_str())
            .with_details(serde_json::json!({
                "worker_threads": worker_count,
                "initial_setup_delay_secs": delay.as_secs(),
            })));

        Ok(())
    }

    /// Waits for the scheduled initial pass and returns its report.
    ///
    /// Returns `None` if no pass is pending or it was aborted.
    pub async fn initial_pass(&mut self) -> Option<PassReport> {
        let handle = self.initial_pass.take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "initial pass did not complete");
                None
            }
        }
    }

    /// Stops reconciling and removes all application state from owned
    /// devices. In-flight work is abandoned, not awaited.
    pub async fn stop(&mut self) -> Result<CleanupReport> {
        self.transition(DaemonState::Running, DaemonState::Stopping)?;
        let owner = self.reconciler.owner().to_string();
        info!(app = %owner, "stopping fabric daemon");

        if let Some(id) = self.listener.take() {
            self.topology.unsubscribe(id);
        }
        if let Some(handle) = self.initial_pass.take() {
            handle.abort();
        }
        if let Some(workers) = self.workers.take() {
            workers.shutdown();
        }

        let report = self.reconciler.clean_up_all_devices().await;
        self.state = DaemonState::Stopped;
        info!(app = %owner, devices = report.devices.len(), "fabric daemon stopped");

        audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "FabricDaemon", "daemon_stop")
            .with_outcome(AuditOutcome::Success)
            .with_object_id(owner.as_str()));

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryTopology, RecordingProgrammer, StaticMastership};
    use fabric_orch_common::{AppId, DeviceRole, GroupId, GroupKind, ReplicationGroup, RoleConfig};
    use fabric_types::DeviceId;
    use pretty_assertions::assert_eq;

    fn collaborators() -> (Arc<InMemoryTopology>, Arc<RecordingProgrammer>, Collaborators) {
        let topology = Arc::new(InMemoryTopology::new());
        let leaf = DeviceId::new("device:leaf1");
        topology.add_device(leaf.clone(), true);
        topology.set_role_config(
            leaf,
            RoleConfig {
                role: DeviceRole::Leaf,
                station_mac: "00:aa:00:00:00:01".parse().unwrap(),
                sid: None,
            },
        );
        let programmer = Arc::new(RecordingProgrammer::new());
        let collaborators = Collaborators {
            topology: topology.clone(),
            mastership: Arc::new(StaticMastership::all()),
            net_config: topology.clone(),
            programmer: programmer.clone(),
        };
        (topology, programmer, collaborators)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(DaemonState::Stopped.to_string(), "stopped");
        assert_eq!(DaemonState::Stopping.to_string(), "stopping");
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle() {
        let (topology, programmer, collaborators) = collaborators();
        let mut daemon = FabricDaemon::new(&FabricConfig::default(), collaborators);
        assert_eq!(daemon.state(), DaemonState::Stopped);

        daemon.start().await.unwrap();
        assert_eq!(daemon.state(), DaemonState::Running);
        assert_eq!(topology.listener_count(), 1);

        let pass = daemon.initial_pass().await.unwrap();
        assert_eq!(pass.reconciled, vec![DeviceId::new("device:leaf1")]);
        assert!(!programmer.installed_rules(&DeviceId::new("device:leaf1")).is_empty());

        let cleanup = daemon.stop().await.unwrap();
        assert_eq!(daemon.state(), DaemonState::Stopped);
        assert_eq!(topology.listener_count(), 0);
        assert_eq!(cleanup.devices, vec![DeviceId::new("device:leaf1")]);
        assert!(programmer.installed_rules(&DeviceId::new("device:leaf1")).is_empty());
        assert!(programmer.installed_groups(&DeviceId::new("device:leaf1")).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_transitions() {
        let (_topology, _programmer, collaborators) = collaborators();
        let mut daemon = FabricDaemon::new(&FabricConfig::default(), collaborators);

        assert!(matches!(
            daemon.stop().await,
            Err(ReconcileError::InvalidState {
                from: DaemonState::Stopped,
                to: DaemonState::Stopping
            })
        ));

        daemon.start().await.unwrap();
        assert!(matches!(
            daemon.start().await,
            Err(ReconcileError::InvalidState {
                from: DaemonState::Running,
                to: DaemonState::Starting
            })
        ));
        daemon.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_waits_for_previous_cleanup() {
        let (_topology, programmer, collaborators) = collaborators();
        programmer.preload_group(ReplicationGroup::new(
            DeviceId::new("device:leaf1"),
            GroupId::CPU_CLONE_SESSION,
            GroupKind::Clone,
            vec![],
            AppId::new("org.fabric.reconciler"),
        ));
        let mut daemon = FabricDaemon::new(&FabricConfig::default(), collaborators);

        let start = tokio::time::Instant::now();
        daemon.start().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(daemon.state(), DaemonState::Running);
        daemon.stop().await.unwrap();
    }
}
