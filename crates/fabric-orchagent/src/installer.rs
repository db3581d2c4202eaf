//! Group-before-rule installation of compiled plans.

use crate::compiler::InstallPlan;
use crate::error::{InstallError, InstallTarget};
use crate::ownership::OwnershipFilter;
use dashmap::DashMap;
use fabric_orch_common::{DeviceProgrammer, ForwardingRule, ReplicationGroup, RuleFailure};
use fabric_types::DeviceId;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Outcome of installing one or more plans.
///
/// Failures are independent: one rejected rule does not stop its siblings
/// and nothing already applied is rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub groups_applied: usize,
    pub rules_applied: usize,
    /// Groups and rules not sent because this instance did not own the
    /// device at the time of the call.
    pub skipped_unowned: usize,
    pub errors: Vec<InstallError>,
}

impl InstallReport {
    pub fn merge(&mut self, other: InstallReport) {
        self.groups_applied += other.groups_applied;
        self.rules_applied += other.rules_applied;
        self.skipped_unowned += other.skipped_unowned;
        self.errors.extend(other.errors);
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What happened to one group of a plan.
enum GroupSubmission {
    Sent { acknowledged: bool },
    /// Handed to the device, which rejected it.
    Failed,
    /// Never handed to the device.
    Unowned,
}

/// Applies [`InstallPlan`]s through a [`DeviceProgrammer`].
///
/// Within a plan every group is submitted before any rule. Rules that
/// reference a group go out after `group_install_delay`, unless the device
/// acknowledged every group of the plan. Plans for the same device are
/// serialized; plans for different devices run concurrently.
pub struct Installer {
    programmer: Arc<dyn DeviceProgrammer>,
    ownership: OwnershipFilter,
    group_install_delay: Duration,
    device_locks: DashMap<DeviceId, Arc<Mutex<()>>>,
}

impl Installer {
    pub fn new(
        programmer: Arc<dyn DeviceProgrammer>,
        ownership: OwnershipFilter,
        group_install_delay: Duration,
    ) -> Self {
        Self {
            programmer,
            ownership,
            group_install_delay,
            device_locks: DashMap::new(),
        }
    }

    pub fn group_install_delay(&self) -> Duration {
        self.group_install_delay
    }

    fn device_lock(&self, device: &DeviceId) -> Arc<Mutex<()>> {
        Arc::clone(self.device_locks.entry(device.clone()).or_default().value())
    }

    pub async fn install_all(&self, plans: &[InstallPlan]) -> InstallReport {
        let mut report = InstallReport::default();
        for plan in plans {
            report.merge(self.install(plan).await);
        }
        report
    }

    #[instrument(skip_all, fields(device = %plan.device))]
    pub async fn install(&self, plan: &InstallPlan) -> InstallReport {
        let mut report = InstallReport::default();
        if plan.is_empty() {
            return report;
        }

        let lock = self.device_lock(&plan.device);
        let _guard = lock.lock().await;

        let mut submitted = 0usize;
        let mut all_acknowledged = true;
        let mut unsent = HashSet::new();
        for group in &plan.groups {
            match self.apply_group(group, &mut report).await {
                GroupSubmission::Sent { acknowledged } => {
                    submitted += 1;
                    all_acknowledged &= acknowledged;
                }
                GroupSubmission::Failed => all_acknowledged = false,
                GroupSubmission::Unowned => {
                    all_acknowledged = false;
                    unsent.insert(group.id);
                }
            }
        }

        let (dependent, independent): (Vec<ForwardingRule>, Vec<ForwardingRule>) = plan
            .rules
            .iter()
            .cloned()
            .partition(|r| r.action.group_dependency().is_some());

        self.apply_rules(&plan.device, &independent, &mut report).await;

        // A group skipped for ownership never reached the device, so nothing
        // may reference it even if ownership came back since.
        let (dependent, orphaned): (Vec<ForwardingRule>, Vec<ForwardingRule>) = dependent
            .into_iter()
            .partition(|r| r.action.group_dependency().is_some_and(|id| !unsent.contains(&id)));
        if !orphaned.is_empty() {
            debug!(rules = orphaned.len(), "dropping rules that reference unsent groups");
            report.skipped_unowned += orphaned.len();
        }

        if dependent.is_empty() {
            return report;
        }
        if submitted > 0 && !all_acknowledged {
            debug!(
                delay_ms = self.group_install_delay.as_millis() as u64,
                "waiting for groups to settle"
            );
            tokio::time::sleep(self.group_install_delay).await;
        }
        self.apply_rules(&plan.device, &dependent, &mut report).await;

        report
    }

    async fn apply_group(&self, group: &ReplicationGroup, report: &mut InstallReport) -> GroupSubmission {
        if !self.ownership.is_owned(&group.device) {
            report.skipped_unowned += 1;
            return GroupSubmission::Unowned;
        }
        debug!(group = %group, "submitting group");
        match self.programmer.apply_group(group).await {
            Ok(ack) => {
                report.groups_applied += 1;
                GroupSubmission::Sent {
                    acknowledged: ack.is_acknowledged(),
                }
            }
            Err(source) => {
                warn!(device = %group.device, group = %group.id, error = %source, "group install failed");
                report.errors.push(InstallError {
                    device: group.device.clone(),
                    target: InstallTarget::Group(group.id),
                    source,
                });
                GroupSubmission::Failed
            }
        }
    }

    async fn apply_rules(&self, device: &DeviceId, rules: &[ForwardingRule], report: &mut InstallReport) {
        if rules.is_empty() {
            return;
        }
        if !self.ownership.is_owned(device) {
            report.skipped_unowned += rules.len();
            return;
        }
        match self.programmer.apply_rules(rules).await {
            Ok(()) => report.rules_applied += rules.len(),
            Err(failures) => {
                report.rules_applied += rules.len().saturating_sub(failures.len());
                for RuleFailure { rule, error } in failures {
                    warn!(
                        device = %rule.device,
                        table = %rule.table,
                        matcher = %rule.matcher,
                        error = %error,
                        "rule install failed"
                    );
                    report.errors.push(InstallError {
                        device: rule.device,
                        target: InstallTarget::Rule {
                            table: rule.table,
                            matcher: rule.matcher,
                        },
                        source: error,
                    });
                }
            }
        }
    }
}
