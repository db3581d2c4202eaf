//! Outcomes and errors reported by the device programming boundary.

use crate::rule::ForwardingRule;
use fabric_types::DeviceId;
use thiserror::Error;

/// How the device boundary acknowledged a group submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupAck {
    /// The device confirmed the group is programmed and referenceable.
    Acknowledged,
    /// The group was handed off; the device has not confirmed it yet.
    Submitted,
}

impl GroupAck {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, GroupAck::Acknowledged)
    }
}

/// Error raised when programming or querying a device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    /// The device refused the request.
    #[error("device {device} rejected request: {reason}")]
    Rejected { device: DeviceId, reason: String },

    /// The request never reached the device.
    #[error("transport error: {0}")]
    Transport(String),

    /// This instance is no longer master for the device.
    #[error("not master for device {0}")]
    NotMaster(DeviceId),
}

impl ProgramError {
    pub fn rejected(device: DeviceId, reason: impl Into<String>) -> Self {
        ProgramError::Rejected {
            device,
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ProgramError::Transport(message.into())
    }
}

/// A rule from an `apply_rules` batch that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{rule}: {error}")]
pub struct RuleFailure {
    pub rule: ForwardingRule,
    pub error: ProgramError,
}

impl RuleFailure {
    pub fn new(rule: ForwardingRule, error: ProgramError) -> Self {
        Self { rule, error }
    }
}

/// A device has no (or incomplete) fabric configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing {field} for device {device}")]
pub struct ConfigMissing {
    pub device: DeviceId,
    pub field: String,
}

impl ConfigMissing {
    pub fn new(device: DeviceId, field: impl Into<String>) -> Self {
        Self {
            device,
            field: field.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_messages() {
        let device = DeviceId::new("device:leaf1");
        assert_eq!(
            ProgramError::rejected(device.clone(), "table full").to_string(),
            "device device:leaf1 rejected request: table full"
        );
        assert_eq!(
            ProgramError::NotMaster(device.clone()).to_string(),
            "not master for device device:leaf1"
        );
        assert_eq!(
            ConfigMissing::new(device, "fabricDeviceConfig").to_string(),
            "missing fabricDeviceConfig for device device:leaf1"
        );
    }

    #[test]
    fn test_group_ack() {
        assert!(GroupAck::Acknowledged.is_acknowledged());
        assert!(!GroupAck::Submitted.is_acknowledged());
    }
}
