//! Runtime lifecycle controller.
//!
//! `Runtime` owns the process-wide registry: it is created once by
//! [`Runtime::initialize`], serves lifecycle operations for its lifetime,
//! and is torn down once by [`Runtime::destroy`]. Initialization converts
//! the engine's asynchronous bring-up into a synchronous, bounded-wait
//! contract: the caller suspends until the engine signals readiness or the
//! configured deadline expires.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use modbox_constants::runtime::MAX_CONTAINERS;

use crate::capability::CapabilityBinding;
use crate::config::RuntimeConfig;
use crate::engine::ExecutionEngine;
use crate::error::{ContainerError, Result};
use crate::health::HealthMonitor;
use crate::manager::{CompletionCallback, ContainerManager};
use crate::state::{
    ContainerId, ContainerIdentity, ContainerLimits, ContainerStatus, ContainerSummary,
    HealthCheckConfig, RuntimeStatus,
};
use crate::store::ModuleStore;

/// Process-wide container runtime.
pub struct Runtime {
    manager: ContainerManager,
    engine: Arc<dyn ExecutionEngine>,
    status: Mutex<RuntimeStatus>,
    default_limits: ContainerLimits,
    default_health: HealthCheckConfig,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}

impl Runtime {
    /// Initializes the container runtime.
    ///
    /// Validates the configuration, forwards the capability table to the
    /// engine, and awaits engine bring-up behind the configured readiness
    /// deadline. On any failure no partially initialized runtime is
    /// reachable.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidConfig`] for a container count
    /// exceeding the compiled capacity or an empty capability table,
    /// [`ContainerError::InitTimeout`] when bring-up misses the deadline,
    /// and the engine's own error when bring-up fails outright.
    pub async fn initialize(
        config: RuntimeConfig,
        engine: Arc<dyn ExecutionEngine>,
        store: Arc<dyn ModuleStore>,
        monitor: Arc<dyn HealthMonitor>,
        capabilities: Vec<CapabilityBinding>,
    ) -> Result<Self> {
        if config.max_containers == 0 || config.max_containers > MAX_CONTAINERS {
            return Err(ContainerError::InvalidConfig(format!(
                "max_containers {} outside compiled capacity 1..={}",
                config.max_containers, MAX_CONTAINERS
            )));
        }
        if capabilities.is_empty() {
            return Err(ContainerError::InvalidConfig(
                "capability table is empty".to_string(),
            ));
        }
        let default_limits = config.default_limits();
        default_limits.validate()?;

        match tokio::time::timeout(config.init_timeout(), engine.start(&capabilities)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(error = %err, "engine bring-up failed");
                return Err(err.into());
            }
            Err(_) => {
                warn!(
                    timeout_ms = config.init_timeout_ms,
                    "engine bring-up missed readiness deadline"
                );
                return Err(ContainerError::InitTimeout(config.init_timeout_ms));
            }
        }

        let manager = ContainerManager::new(
            config.max_containers,
            Arc::clone(&engine),
            store,
            monitor,
        );

        info!(
            max_containers = config.max_containers,
            capabilities = capabilities.len(),
            "container runtime initialized"
        );

        Ok(Self {
            manager,
            engine,
            status: Mutex::new(RuntimeStatus::Initialized),
            default_limits,
            default_health: config.default_health(),
        })
    }

    /// Current runtime status, independent of any container's status.
    #[must_use]
    pub fn status(&self) -> RuntimeStatus {
        self.status
            .lock()
            .map_or(RuntimeStatus::Error, |status| *status)
    }

    /// Destroys the runtime: drives every live container through its destroy
    /// transition and shuts the engine down. Idempotent; destroying an
    /// already-destroyed runtime is a no-op reporting `Destroyed`.
    pub async fn destroy(&self) -> RuntimeStatus {
        {
            let Ok(status) = self.status.lock() else {
                return RuntimeStatus::Error;
            };
            if *status == RuntimeStatus::Destroyed {
                return RuntimeStatus::Destroyed;
            }
        }

        let live: Vec<ContainerId> = self.manager.occupied_ids().collect();
        for id in live {
            if let Err(err) = self.manager.destroy(id, None).await {
                warn!(container_id = id, error = %err, "teardown destroy failed");
            }
        }
        self.engine.shutdown().await;

        if let Ok(mut status) = self.status.lock() {
            *status = RuntimeStatus::Destroyed;
        }
        info!("container runtime destroyed");
        RuntimeStatus::Destroyed
    }

    /// Access to the underlying lifecycle manager, for collaborators such as
    /// the health monitor's verdict delivery and sweep enumeration.
    #[must_use]
    pub fn manager(&self) -> &ContainerManager {
        &self.manager
    }

    /// Creates a container. Falls back to the configured default limits and
    /// watchdog settings when the caller supplies none.
    pub async fn create_container(
        &self,
        identity: ContainerIdentity,
        limits: Option<ContainerLimits>,
        health: Option<HealthCheckConfig>,
        callback: Option<CompletionCallback>,
    ) -> Result<ContainerId> {
        self.ensure_initialized()?;
        self.manager
            .create(
                identity,
                limits.unwrap_or(self.default_limits),
                health.unwrap_or(self.default_health),
                callback,
            )
            .await
    }

    /// Runs a container.
    pub async fn run_container(
        &self,
        id: ContainerId,
        callback: Option<CompletionCallback>,
    ) -> Result<ContainerStatus> {
        self.ensure_initialized()?;
        self.manager.run(id, callback).await
    }

    /// Stops a container.
    pub async fn stop_container(
        &self,
        id: ContainerId,
        callback: Option<CompletionCallback>,
    ) -> Result<ContainerStatus> {
        self.ensure_initialized()?;
        self.manager.stop(id, callback).await
    }

    /// Restarts a container.
    pub async fn restart_container(
        &self,
        id: ContainerId,
        callback: Option<CompletionCallback>,
    ) -> Result<ContainerStatus> {
        self.ensure_initialized()?;
        self.manager.restart(id, callback).await
    }

    /// Destroys a container.
    pub async fn destroy_container(
        &self,
        id: ContainerId,
        callback: Option<CompletionCallback>,
    ) -> Result<ContainerStatus> {
        self.ensure_initialized()?;
        self.manager.destroy(id, callback).await
    }

    /// Snapshot of a container's status. Pure read, valid in any runtime
    /// state; `Unknown` for out-of-range or unoccupied ids.
    #[must_use]
    pub fn get_container_status(&self, id: ContainerId) -> ContainerStatus {
        self.manager.status(id)
    }

    /// Snapshots all live containers.
    #[must_use]
    pub fn list_containers(&self) -> Vec<ContainerSummary> {
        self.manager.list()
    }

    fn ensure_initialized(&self) -> Result<()> {
        let status = self
            .status
            .lock()
            .map_err(|_| ContainerError::Runtime("lock poisoned".to_string()))?;
        if *status == RuntimeStatus::Initialized {
            Ok(())
        } else {
            Err(ContainerError::NotInitialized)
        }
    }
}
