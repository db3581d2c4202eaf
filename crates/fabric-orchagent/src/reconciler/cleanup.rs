//! Removal of application state from owned devices.

use super::Reconciler;
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use fabric_orch_common::ProgramError;
use fabric_types::DeviceId;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

const CLEANUP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of a cleanup pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Devices whose rules were removed.
    pub devices: Vec<DeviceId>,
    pub groups_removed: usize,
    pub errors: Vec<(DeviceId, ProgramError)>,
}

impl Reconciler {
    /// Removes every rule and group tagged with this application from the
    /// devices this instance owns, available or not.
    ///
    /// Ownership is checked before each removal. Groups are only removed
    /// once the device's rules are gone. Failures are logged and collected,
    /// never retried.
    #[instrument(skip_all)]
    pub async fn clean_up_all_devices(&self) -> CleanupReport {
        let snapshot = self.topology.snapshot();
        let owner = self.owner().clone();
        let mut report = CleanupReport::default();

        for device in snapshot.devices().map(|d| &d.id) {
            if !self.ownership.is_owned(device) {
                continue;
            }
            info!(device = %device, "removing application state");

            match self.programmer.remove_rules_by_owner(device, &owner).await {
                Ok(()) => report.devices.push(device.clone()),
                Err(e) => {
                    // Surviving rules may still reference the groups.
                    warn!(device = %device, error = %e, "failed to remove rules, keeping groups");
                    report.errors.push((device.clone(), e));
                    continue;
                }
            }

            let groups = match self.programmer.list_groups(device, &owner).await {
                Ok(groups) => groups,
                Err(e) => {
                    warn!(device = %device, error = %e, "failed to list groups");
                    report.errors.push((device.clone(), e));
                    continue;
                }
            };
            for group in groups {
                if !self.ownership.is_owned(device) {
                    break;
                }
                match self.programmer.remove_group(device, group.id, &owner).await {
                    Ok(()) => report.groups_removed += 1,
                    Err(e) => {
                        warn!(device = %device, group = %group.id, error = %e, "failed to remove group");
                        report.errors.push((device.clone(), e));
                    }
                }
            }
        }

        let record = AuditRecord::new(AuditCategory::ResourceDelete, "Reconciler", "clean_up_all_devices")
            .with_object_id(owner.as_str())
            .with_details(serde_json::json!({
                "devices": report.devices.len(),
                "groups_removed": report.groups_removed,
                "errors": report.errors.len(),
            }));
        let record = if report.errors.is_empty() {
            record.with_outcome(AuditOutcome::Success)
        } else {
            record.with_outcome(AuditOutcome::Partial)
        };
        audit_log!(record);

        report
    }

    /// Waits until no group tagged with this application remains on any
    /// owned device, polling until `timeout` elapses.
    ///
    /// Returns `true` if the devices are clean.
    pub async fn wait_previous_cleanup(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = self.remaining_groups().await;
            if remaining == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                warn!(remaining, timeout_secs = timeout.as_secs(), "previous cleanup did not finish");
                return false;
            }
            debug!(remaining, "waiting for previous cleanup");
            tokio::time::sleep(CLEANUP_POLL_INTERVAL).await;
        }
    }

    async fn remaining_groups(&self) -> usize {
        let snapshot = self.topology.snapshot();
        let owner = self.owner();
        let mut remaining = 0;
        for device in snapshot.devices().map(|d| &d.id) {
            if !self.ownership.is_owned(device) {
                continue;
            }
            match self.programmer.list_groups(device, owner).await {
                Ok(groups) => remaining += groups.len(),
                Err(e) => debug!(device = %device, error = %e, "group listing failed"),
            }
        }
        remaining
    }
}
