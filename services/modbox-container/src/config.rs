//! Runtime configuration.
//!
//! Configuration is loaded from multiple sources with the following
//! priority:
//!
//! 1. Environment variables (`MODBOX_*`)
//! 2. Configuration file (`modbox.toml` or an explicit path)
//! 3. Default values from `modbox-constants`
//!
//! ## Example configuration file
//!
//! ```toml
//! default_stack_size = 8192
//! default_heap_size = 16384
//! max_containers = 8
//! init_timeout_ms = 500
//!
//! [watchdog]
//! interval_ms = 1000
//! timer_count = 3
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use modbox_constants::runtime::{
    DEFAULT_HEAP_SIZE, DEFAULT_STACK_SIZE, DEFAULT_WATCHDOG_INTERVAL_MS, DEFAULT_WATCHDOG_TIMERS,
    INIT_TIMEOUT_MS, MAX_CONTAINERS,
};

use crate::state::{ContainerLimits, HealthCheckConfig};

/// Container runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Stack size applied when a create request supplies no limits.
    pub default_stack_size: u32,
    /// Heap size applied when a create request supplies no limits.
    pub default_heap_size: u32,
    /// Maximum number of containers (must not exceed compiled capacity).
    pub max_containers: usize,
    /// How long `initialize` waits for engine bring-up.
    pub init_timeout_ms: u64,
    /// Default watchdog configuration.
    pub watchdog: WatchdogDefaults,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_stack_size: DEFAULT_STACK_SIZE,
            default_heap_size: DEFAULT_HEAP_SIZE,
            max_containers: MAX_CONTAINERS,
            init_timeout_ms: INIT_TIMEOUT_MS,
            watchdog: WatchdogDefaults::default(),
        }
    }
}

/// Default watchdog settings applied when a create request supplies none.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogDefaults {
    /// Interval between liveness checks, in milliseconds.
    pub interval_ms: u64,
    /// Missed timers tolerated before a container is flagged.
    pub timer_count: u32,
}

impl Default for WatchdogDefaults {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_WATCHDOG_INTERVAL_MS,
            timer_count: DEFAULT_WATCHDOG_TIMERS,
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration from `modbox.toml` and `MODBOX_*` environment
    /// variables over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be extracted.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file("modbox.toml"))
            .merge(Env::prefixed("MODBOX_").split("__"))
            .extract()
    }

    /// Loads configuration from a specific file plus the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("MODBOX_").split("__"))
            .extract()
    }

    /// Default per-container limits derived from this configuration.
    #[must_use]
    pub fn default_limits(&self) -> ContainerLimits {
        ContainerLimits::new(self.default_stack_size, self.default_heap_size)
    }

    /// Default watchdog configuration derived from this configuration.
    #[must_use]
    pub fn default_health(&self) -> HealthCheckConfig {
        HealthCheckConfig {
            interval: Duration::from_millis(self.watchdog.interval_ms),
            timer_count: self.watchdog.timer_count,
        }
    }

    /// Readiness deadline for `initialize`.
    #[must_use]
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}
