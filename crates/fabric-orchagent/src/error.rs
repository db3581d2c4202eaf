//! Error types for the fabric reconciler.

use crate::daemon::DaemonState;
use fabric_orch_common::{ConfigMissing, FabricTable, GroupId, ProgramError, RuleMatch};
use fabric_types::DeviceId;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// What an install failure was about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallTarget {
    Group(GroupId),
    Rule { table: FabricTable, matcher: RuleMatch },
}

impl fmt::Display for InstallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallTarget::Group(id) => write!(f, "group {}", id),
            InstallTarget::Rule { table, matcher } => write!(f, "rule {} [{}]", table, matcher),
        }
    }
}

/// A single group or rule that could not be installed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to install {target} on {device}: {source}")]
pub struct InstallError {
    pub device: DeviceId,
    pub target: InstallTarget,
    pub source: ProgramError,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The device under reconciliation has no usable fabric configuration.
    #[error("configuration error on {device}: missing {field}")]
    Configuration { device: DeviceId, field: String },

    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidState { from: DaemonState, to: DaemonState },
}

impl From<ConfigMissing> for ReconcileError {
    fn from(err: ConfigMissing) -> Self {
        ReconcileError::Configuration {
            device: err.device,
            field: err.field,
        }
    }
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Errors loading the daemon configuration or a topology file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to parse network config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid network config: {0}")]
    Netcfg(String),

    #[error("invalid configuration: {0}")]
    Validation(String),
}
