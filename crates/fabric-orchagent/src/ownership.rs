//! Device ownership checks.

use fabric_orch_common::MastershipService;
use fabric_types::DeviceId;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Answers whether this instance may program a device.
///
/// Mastership can move at any time, so callers ask again right before every
/// device-affecting call instead of caching the answer.
#[derive(Clone)]
pub struct OwnershipFilter {
    mastership: Arc<dyn MastershipService>,
}

impl OwnershipFilter {
    pub fn new(mastership: Arc<dyn MastershipService>) -> Self {
        Self { mastership }
    }

    pub fn is_owned(&self, device: &DeviceId) -> bool {
        let owned = self.mastership.is_local_master(device);
        if !owned {
            debug!(device = %device, "not master, skipping");
        }
        owned
    }

    /// Keeps only the devices this instance owns, preserving order.
    pub fn owned<'a, I>(&self, devices: I) -> Vec<DeviceId>
    where
        I: IntoIterator<Item = &'a DeviceId>,
    {
        devices
            .into_iter()
            .filter(|d| self.is_owned(d))
            .cloned()
            .collect()
    }
}

impl fmt::Debug for OwnershipFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnershipFilter").finish_non_exhaustive()
    }
}
