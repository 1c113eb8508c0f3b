//! Container state model.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use modbox_constants::runtime::{
    DEFAULT_WATCHDOG_INTERVAL_MS, DEFAULT_WATCHDOG_TIMERS, DIGEST_LEN, ERROR_BUF_LEN,
    MAX_HEAP_SIZE, MAX_STACK_SIZE, NAME_MAX_LEN,
};

use crate::engine::{EnvHandle, FunctionHandle, InstanceHandle, ModuleHandle};
use crate::error::{ContainerError, Result};

/// Container identifier: the stable slot index a container occupies for its
/// entire lifetime. Indices are never renumbered and become reusable only
/// after the container is destroyed.
pub type ContainerId = usize;

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Slot has never been created, or its container has been destroyed.
    Unknown,
    /// Container has been created but not started.
    Created,
    /// Container is running.
    Running,
    /// Container has been stopped.
    Stopped,
    /// Container has been destroyed.
    Destroyed,
    /// Container failed a health check.
    Unresponsive,
    /// An error occurred with the container.
    Error,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Destroyed => write!(f, "destroyed"),
            Self::Unresponsive => write!(f, "unresponsive"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Lifecycle state of the runtime itself, independent of any container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    /// Runtime has not been initialized.
    Unknown,
    /// Runtime is initialized and accepting operations.
    Initialized,
    /// Runtime has been destroyed.
    Destroyed,
    /// Runtime bring-up failed.
    Error,
}

impl std::fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Initialized => write!(f, "initialized"),
            Self::Destroyed => write!(f, "destroyed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Per-container execution resource limits. Immutable once the container is
/// created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLimits {
    /// Module stack size in bytes.
    pub stack_size: u32,
    /// Module heap size in bytes.
    pub heap_size: u32,
}

impl ContainerLimits {
    /// Creates limits without validating them; call [`validate`] before use.
    ///
    /// [`validate`]: ContainerLimits::validate
    #[must_use]
    pub const fn new(stack_size: u32, heap_size: u32) -> Self {
        Self {
            stack_size,
            heap_size,
        }
    }

    /// Checks the limits are positive and within the compiled ceilings.
    pub fn validate(&self) -> Result<()> {
        if self.stack_size == 0 || self.heap_size == 0 {
            return Err(ContainerError::InvalidConfig(
                "stack and heap sizes must be positive".to_string(),
            ));
        }
        if self.stack_size > MAX_STACK_SIZE || self.heap_size > MAX_HEAP_SIZE {
            return Err(ContainerError::OversizedLimits {
                stack: self.stack_size,
                heap: self.heap_size,
                max_stack: MAX_STACK_SIZE,
                max_heap: MAX_HEAP_SIZE,
            });
        }
        Ok(())
    }
}

/// Container identity: a unique name and the content digest used to resolve
/// the module binary from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerIdentity {
    /// Name, unique among all non-destroyed containers.
    pub name: String,
    /// Hex sha256 of the module binary.
    pub content_digest: String,
}

impl ContainerIdentity {
    /// Creates a validated identity.
    ///
    /// The digest may carry a `sha256:` prefix, which is stripped.
    pub fn new(name: impl Into<String>, content_digest: &str) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ContainerError::InvalidName("name is empty".to_string()));
        }
        if name.len() > NAME_MAX_LEN {
            return Err(ContainerError::InvalidName(format!(
                "name '{name}' exceeds {NAME_MAX_LEN} bytes"
            )));
        }

        let digest = content_digest
            .strip_prefix("sha256:")
            .unwrap_or(content_digest);
        if digest.len() != DIGEST_LEN || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ContainerError::InvalidDigest(content_digest.to_string()));
        }

        Ok(Self {
            name,
            content_digest: digest.to_ascii_lowercase(),
        })
    }
}

/// Watchdog configuration consulted by the health-monitor collaborator.
/// The core stores and forwards it, never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Interval between liveness checks.
    pub interval: Duration,
    /// Missed timers tolerated before the container is flagged unresponsive.
    pub timer_count: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_WATCHDOG_INTERVAL_MS),
            timer_count: DEFAULT_WATCHDOG_TIMERS,
        }
    }
}

/// Transient execution-engine state bound to one container instance.
///
/// Retention across transitions is explicit per field: the module buffer is
/// dropped once `load` succeeds (the storage layer owns it); the env and
/// entry handles are released on `stop` so every run gets a fresh execution
/// environment; the module and instance handles survive `stop` for fast
/// restart. Everything is cleared on destroy.
#[derive(Debug, Default)]
pub struct RuntimeArguments {
    /// Raw module binary, held only between `create` and a successful load.
    pub buffer: Option<Bytes>,
    /// Handle to the loaded module.
    pub module: Option<ModuleHandle>,
    /// Handle to the instantiated module.
    pub instance: Option<InstanceHandle>,
    /// Handle to the resolved entry function.
    pub entry: Option<FunctionHandle>,
    /// Execution environment handle.
    pub env: Option<EnvHandle>,
    /// Last engine error text, bounded to the compiled buffer length.
    error: String,
}

impl RuntimeArguments {
    /// Records engine error text, truncating it to the compiled bound.
    pub fn record_error(&mut self, message: &str) {
        let mut end = message.len().min(ERROR_BUF_LEN);
        // Back off to a char boundary so truncation cannot split a code point.
        while end > 0 && !message.is_char_boundary(end) {
            end -= 1;
        }
        self.error = message[..end].to_string();
    }

    /// Returns the last recorded engine error text, if any.
    #[must_use]
    pub fn last_error(&self) -> &str {
        &self.error
    }
}

/// One container: identity, limits, health configuration, engine state, and
/// lifecycle status. Occupies exactly one registry slot.
#[derive(Debug)]
pub struct ContainerRecord {
    /// Name and content digest.
    pub identity: ContainerIdentity,
    /// Stack/heap limits.
    pub limits: ContainerLimits,
    /// Watchdog configuration.
    pub health: HealthCheckConfig,
    /// Engine handles and error text.
    pub args: RuntimeArguments,
    /// Current lifecycle state.
    pub status: ContainerStatus,
}

impl ContainerRecord {
    /// Creates a record in the `Created` state holding the resolved module
    /// buffer. No engine resources are consumed until `run`.
    #[must_use]
    pub fn new(
        identity: ContainerIdentity,
        limits: ContainerLimits,
        health: HealthCheckConfig,
        buffer: Bytes,
    ) -> Self {
        Self {
            identity,
            limits,
            health,
            args: RuntimeArguments {
                buffer: Some(buffer),
                ..RuntimeArguments::default()
            },
            status: ContainerStatus::Created,
        }
    }
}

/// Snapshot of one container for enumeration and status surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// Slot index.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Content digest of the module binary.
    pub content_digest: String,
    /// Lifecycle state at snapshot time.
    pub status: ContainerStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3";

    #[test]
    fn identity_rejects_empty_name() {
        assert!(matches!(
            ContainerIdentity::new("", DIGEST),
            Err(ContainerError::InvalidName(_))
        ));
    }

    #[test]
    fn identity_rejects_long_name() {
        assert!(matches!(
            ContainerIdentity::new("a-very-long-container-name", DIGEST),
            Err(ContainerError::InvalidName(_))
        ));
    }

    #[test]
    fn identity_rejects_bad_digest() {
        assert!(matches!(
            ContainerIdentity::new("app", "not-a-digest"),
            Err(ContainerError::InvalidDigest(_))
        ));
    }

    #[test]
    fn identity_strips_digest_prefix() {
        let identity =
            ContainerIdentity::new("app", &format!("sha256:{}", DIGEST.to_uppercase())).unwrap();
        assert_eq!(identity.content_digest, DIGEST);
    }

    #[test]
    fn limits_reject_zero_and_oversize() {
        assert!(ContainerLimits::new(0, 1024).validate().is_err());
        assert!(matches!(
            ContainerLimits::new(MAX_STACK_SIZE + 1, 1024).validate(),
            Err(ContainerError::OversizedLimits { .. })
        ));
        assert!(ContainerLimits::new(4096, 8192).validate().is_ok());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ContainerStatus::Unresponsive).unwrap(),
            "\"unresponsive\""
        );
        let summary = ContainerSummary {
            id: 3,
            name: "app".to_string(),
            content_digest: DIGEST.to_string(),
            status: ContainerStatus::Running,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["id"], 3);
    }

    #[test]
    fn error_text_is_bounded() {
        let mut args = RuntimeArguments::default();
        args.record_error(&"x".repeat(ERROR_BUF_LEN * 2));
        assert_eq!(args.last_error().len(), ERROR_BUF_LEN);

        // Multi-byte truncation must not split a code point.
        args.record_error(&"é".repeat(ERROR_BUF_LEN));
        assert!(args.last_error().len() <= ERROR_BUF_LEN);
        assert!(args.last_error().chars().all(|c| c == 'é'));
    }
}
