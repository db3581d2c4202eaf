//! Daemon configuration file.
//!
//! Loaded from TOML. Every field has a default, so an empty or missing file
//! yields a working configuration.
//!
//! ```toml
//! [app]
//! name = "org.fabric.reconciler"
//!
//! [reconcile]
//! initial_setup_delay_secs = 2
//! group_install_delay_ms = 500
//! worker_threads = 2
//! previous_cleanup_timeout_secs = 30
//! ```

use crate::error::ConfigError;
use fabric_orch_common::AppId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Identity tagging all installed rules and groups
    #[serde(default = "default_app_name")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Delay before the first full convergence pass
    #[serde(default = "default_initial_setup_delay")]
    pub initial_setup_delay_secs: u64,

    /// Settling delay between group submission and dependent rules
    #[serde(default = "default_group_install_delay")]
    pub group_install_delay_ms: u64,

    /// Number of workers draining the event queue
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Upper bound on waiting for a previous run's state to disappear
    #[serde(default = "default_previous_cleanup_timeout")]
    pub previous_cleanup_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricConfig {
    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

fn default_app_name() -> String {
    "org.fabric.reconciler".to_string()
}

fn default_initial_setup_delay() -> u64 {
    2
}

fn default_group_install_delay() -> u64 {
    500
}

fn default_worker_threads() -> usize {
    2
}

fn default_previous_cleanup_timeout() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            initial_setup_delay_secs: default_initial_setup_delay(),
            group_install_delay_ms: default_group_install_delay(),
            worker_threads: default_worker_threads(),
            previous_cleanup_timeout_secs: default_previous_cleanup_timeout(),
        }
    }
}

impl FabricConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn app_id(&self) -> AppId {
        AppId::new(self.app.name.clone())
    }

    pub fn initial_setup_delay(&self) -> Duration {
        Duration::from_secs(self.reconcile.initial_setup_delay_secs)
    }

    pub fn group_install_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile.group_install_delay_ms)
    }

    pub fn previous_cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile.previous_cleanup_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app.name.trim().is_empty() {
            return Err(ConfigError::Validation("app.name must not be empty".to_string()));
        }

        if self.reconcile.worker_threads == 0 {
            return Err(ConfigError::Validation(
                "reconcile.worker_threads must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
