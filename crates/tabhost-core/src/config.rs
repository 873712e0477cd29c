use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_MAX_TABS: usize = 30;
const DEFAULT_SUSPEND_ENABLED: bool = true;
const DEFAULT_IDLE_THRESHOLD_SECS: u64 = 5 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_HOMEPAGE_URL: &str = "about:home";
const DEFAULT_HISTORY_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("homepage_url must not be empty")]
    EmptyHomepage,
}

/// Tab limits and eviction policy. Persisted as the store's `settings`
/// section, so every field has a default and older files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// User-facing cap on non-pinned tabs.
    #[serde(default = "default_max_tabs")]
    pub max_tabs: usize,
    /// Registry cap on concurrently live non-pinned tabs. `None` is unbounded.
    #[serde(default)]
    pub max_live_tabs: Option<usize>,
    #[serde(default = "default_suspend_enabled")]
    pub suspend_enabled: bool,
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_homepage_url")]
    pub homepage_url: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_tabs: default_max_tabs(),
            max_live_tabs: None,
            suspend_enabled: default_suspend_enabled(),
            idle_threshold_secs: default_idle_threshold_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            homepage_url: default_homepage_url(),
            history_limit: default_history_limit(),
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tabs == 0 {
            return Err(ConfigError::Zero { field: "max_tabs" });
        }
        if self.max_live_tabs == Some(0) {
            return Err(ConfigError::Zero {
                field: "max_live_tabs",
            });
        }
        if self.idle_threshold_secs == 0 {
            return Err(ConfigError::Zero {
                field: "idle_threshold_secs",
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Zero {
                field: "sweep_interval_secs",
            });
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Zero {
                field: "history_limit",
            });
        }
        if self.homepage_url.trim().is_empty() {
            return Err(ConfigError::EmptyHomepage);
        }
        Ok(())
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_max_tabs() -> usize {
    DEFAULT_MAX_TABS
}

fn default_suspend_enabled() -> bool {
    DEFAULT_SUSPEND_ENABLED
}

fn default_idle_threshold_secs() -> u64 {
    DEFAULT_IDLE_THRESHOLD_SECS
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

fn default_homepage_url() -> String {
    DEFAULT_HOMEPAGE_URL.to_owned()
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}
