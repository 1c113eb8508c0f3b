//! Container lifecycle state machine.
//!
//! `ContainerManager` validates and commits lifecycle transitions against
//! the registry, driving the execution engine and the health monitor. State
//! validation and commits happen under the slot's record lock, held briefly;
//! engine calls run with only the slot's transition guard held, so other
//! slots stay fully available while one is mid-transition. Concurrent
//! requests against the same slot resolve first-committer-wins: the loser
//! observes the winner's resulting state.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::engine::{ExecutionEngine, InstanceHandle, ModuleHandle, ENTRY_FUNCTION};
use crate::error::{ContainerError, EngineError, Result};
use crate::health::HealthMonitor;
use crate::registry::Registry;
use crate::state::{
    ContainerId, ContainerIdentity, ContainerLimits, ContainerRecord, ContainerStatus,
    ContainerSummary, HealthCheckConfig,
};
use crate::store::ModuleStore;

/// Caller-supplied completion notification.
///
/// Invoked exactly once, after the transition's terminal state is committed
/// and the record lock is released, with the committed status (including
/// `Error`). Calls rejected by validation commit no transition and invoke no
/// callback. Purely a notification: no retry or compensation semantics.
pub type CompletionCallback = Box<dyn FnOnce(ContainerId, ContainerStatus) + Send>;

/// State snapshot taken before driving the engine through a `run`.
struct RunSnapshot {
    status: ContainerStatus,
    stack_size: u32,
    heap_size: u32,
    module: Option<ModuleHandle>,
    instance: Option<InstanceHandle>,
    buffer: Option<Bytes>,
    health: HealthCheckConfig,
}

/// Container lifecycle manager.
pub struct ContainerManager {
    registry: Registry,
    engine: Arc<dyn ExecutionEngine>,
    store: Arc<dyn ModuleStore>,
    monitor: Arc<dyn HealthMonitor>,
    /// Notifies subscribers of committed transitions.
    events: broadcast::Sender<(ContainerId, ContainerStatus)>,
}

impl ContainerManager {
    /// Creates a manager with `capacity` container slots.
    pub fn new(
        capacity: usize,
        engine: Arc<dyn ExecutionEngine>,
        store: Arc<dyn ModuleStore>,
        monitor: Arc<dyn HealthMonitor>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            registry: Registry::new(capacity),
            engine,
            store,
            monitor,
            events,
        }
    }

    /// Number of container slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.registry.capacity()
    }

    /// Number of currently live containers.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.registry.live_count()
    }

    /// Returns a receiver for committed `(container_id, status)` transitions.
    /// Subscribe before checking current state to avoid missing an event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<(ContainerId, ContainerStatus)> {
        self.events.subscribe()
    }

    /// Lazy enumeration of currently occupied container ids.
    pub fn occupied_ids(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.registry.occupied_ids()
    }

    /// Snapshots all live containers.
    #[must_use]
    pub fn list(&self) -> Vec<ContainerSummary> {
        self.registry.summaries()
    }

    /// Snapshot of a container's status. Pure read with no side effects;
    /// `Unknown` for out-of-range ids and never-created or destroyed slots.
    #[must_use]
    pub fn status(&self, id: ContainerId) -> ContainerStatus {
        self.registry.status(id)
    }

    /// Last engine error text recorded for a container, or `None` when the
    /// slot is unoccupied or no error has been recorded.
    #[must_use]
    pub fn last_error(&self, id: ContainerId) -> Option<String> {
        self.registry
            .with_record(id, |record| {
                let error = record.args.last_error();
                (!error.is_empty()).then(|| error.to_string())
            })
            .ok()
            .flatten()
    }

    /// Creates a container: resolves the module binary for the identity's
    /// content digest and populates a free slot in the `Created` state.
    ///
    /// The binary is resolved before any slot is touched, so a storage
    /// failure leaves no partial allocation observable. The module is not
    /// loaded into the engine until `run`: a created container consumes a
    /// slot but no engine resources.
    pub async fn create(
        &self,
        identity: ContainerIdentity,
        limits: ContainerLimits,
        health: HealthCheckConfig,
        callback: Option<CompletionCallback>,
    ) -> Result<ContainerId> {
        limits.validate()?;
        let buffer = self.store.resolve(&identity.content_digest).await?;

        let name = identity.name.clone();
        let record = ContainerRecord::new(identity, limits, health, buffer);
        let id = self.registry.allocate(record)?;

        info!(container_id = id, name = %name, "container created");
        self.notify(id, ContainerStatus::Created);
        complete(callback, id, ContainerStatus::Created);
        Ok(id)
    }

    /// Runs a container: loads (unless retained from a previous run),
    /// instantiates, resolves the entry function, creates an execution
    /// environment, and begins execution. Valid from `Created` or `Stopped`.
    ///
    /// Any engine failure aborts the transition, records the engine's error
    /// text into the container's error buffer, and commits `Error`; the slot
    /// stays occupied for inspection and can be reclaimed with `destroy`.
    /// On success the watchdog is armed with the container's health config.
    pub async fn run(
        &self,
        id: ContainerId,
        callback: Option<CompletionCallback>,
    ) -> Result<ContainerStatus> {
        let _guard = self.registry.lock_transition(id).await?;
        let result = self.run_locked(id).await;
        self.finish(callback, id, &result);
        result
    }

    /// Stops a running or unresponsive container: disarms the watchdog,
    /// signals the engine to halt, and releases the execution environment.
    /// The module and instance handles are retained for fast restart.
    pub async fn stop(
        &self,
        id: ContainerId,
        callback: Option<CompletionCallback>,
    ) -> Result<ContainerStatus> {
        let _guard = self.registry.lock_transition(id).await?;
        let result = self.stop_locked(id).await;
        self.finish(callback, id, &result);
        result
    }

    /// Restarts a container: `stop` followed by `run` as one caller-visible
    /// operation. Valid from `Running`, `Stopped`, or `Unresponsive`. If a
    /// sub-step fails the composite reports the failure and the record's
    /// status reflects the last completed sub-step.
    pub async fn restart(
        &self,
        id: ContainerId,
        callback: Option<CompletionCallback>,
    ) -> Result<ContainerStatus> {
        let _guard = self.registry.lock_transition(id).await?;

        let status = self.registry.status(id);
        if !matches!(
            status,
            ContainerStatus::Running | ContainerStatus::Stopped | ContainerStatus::Unresponsive
        ) {
            return Err(ContainerError::InvalidState {
                status,
                op: "restart",
            });
        }

        if matches!(
            status,
            ContainerStatus::Running | ContainerStatus::Unresponsive
        ) {
            let stopped = self.stop_locked(id).await;
            if stopped.is_err() {
                self.finish(callback, id, &stopped);
                return stopped;
            }
        }

        let result = self.run_locked(id).await;
        self.finish(callback, id, &result);
        result
    }

    /// Destroys a container from any state: stops it if running, releases
    /// every engine handle, clears the record, and frees the slot for reuse.
    /// Destroying an already-destroyed (or never-created) slot is a no-op
    /// that reports `Destroyed`.
    pub async fn destroy(
        &self,
        id: ContainerId,
        callback: Option<CompletionCallback>,
    ) -> Result<ContainerStatus> {
        let _guard = self.registry.lock_transition(id).await?;
        let result = self.destroy_locked(id).await;
        self.finish(callback, id, &result);
        result
    }

    /// Applies an `Unresponsive` verdict from the health monitor. Only a
    /// `Running` container transitions; any other state is left untouched.
    pub fn report_unresponsive(&self, id: ContainerId) -> ContainerStatus {
        let changed = self
            .registry
            .update(id, |record| {
                if record.status == ContainerStatus::Running {
                    record.status = ContainerStatus::Unresponsive;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);

        if changed {
            warn!(container_id = id, "container flagged unresponsive");
            self.notify(id, ContainerStatus::Unresponsive);
        }
        self.registry.status(id)
    }

    /// Applies a recovery verdict from the health monitor: `Unresponsive`
    /// back to `Running`. Any other state is left untouched.
    pub fn report_recovered(&self, id: ContainerId) -> ContainerStatus {
        let changed = self
            .registry
            .update(id, |record| {
                if record.status == ContainerStatus::Unresponsive {
                    record.status = ContainerStatus::Running;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);

        if changed {
            info!(container_id = id, "container recovered");
            self.notify(id, ContainerStatus::Running);
        }
        self.registry.status(id)
    }

    async fn run_locked(&self, id: ContainerId) -> Result<ContainerStatus> {
        let snapshot = self.registry.with_record(id, |record| RunSnapshot {
            status: record.status,
            stack_size: record.limits.stack_size,
            heap_size: record.limits.heap_size,
            module: record.args.module,
            instance: record.args.instance,
            buffer: record.args.buffer.clone(),
            health: record.health,
        })?;

        if !matches!(
            snapshot.status,
            ContainerStatus::Created | ContainerStatus::Stopped
        ) {
            return Err(ContainerError::InvalidState {
                status: snapshot.status,
                op: "run",
            });
        }

        let health = snapshot.health;
        match self.drive_run(id, snapshot).await {
            Ok(()) => {
                self.registry
                    .update(id, |record| record.status = ContainerStatus::Running)?;
                self.monitor.arm(id, &health);
                info!(container_id = id, "container running");
                self.notify(id, ContainerStatus::Running);
                Ok(ContainerStatus::Running)
            }
            Err(err) => {
                self.registry.update(id, |record| {
                    record.args.record_error(&err.to_string());
                    record.status = ContainerStatus::Error;
                })?;
                warn!(container_id = id, error = %err, "run failed");
                self.notify(id, ContainerStatus::Error);
                Err(err)
            }
        }
    }

    /// Drives the engine through the run sub-steps, committing each obtained
    /// handle into the record as it goes so a later failure leaves them
    /// reachable for `destroy` to release.
    async fn drive_run(&self, id: ContainerId, snapshot: RunSnapshot) -> Result<()> {
        let module = match snapshot.module {
            Some(module) => module,
            None => {
                let buffer = snapshot
                    .buffer
                    .ok_or_else(|| EngineError("module buffer unavailable".to_string()))?;
                let module = self.engine.load(&buffer).await?;
                // The storage layer owns the binary; drop our reference now
                // that the engine has its own copy.
                self.registry.update(id, |record| {
                    record.args.module = Some(module);
                    record.args.buffer = None;
                })?;
                module
            }
        };

        let instance = match snapshot.instance {
            Some(instance) => instance,
            None => {
                let instance = self
                    .engine
                    .instantiate(module, snapshot.stack_size, snapshot.heap_size)
                    .await?;
                self.registry
                    .update(id, |record| record.args.instance = Some(instance))?;
                instance
            }
        };

        let entry = self.engine.resolve_entry(instance, ENTRY_FUNCTION).await?;
        self.registry
            .update(id, |record| record.args.entry = Some(entry))?;

        let env = self.engine.create_env(instance, snapshot.stack_size).await?;
        self.registry
            .update(id, |record| record.args.env = Some(env))?;

        self.engine.invoke(env, entry).await?;
        Ok(())
    }

    async fn stop_locked(&self, id: ContainerId) -> Result<ContainerStatus> {
        let (status, env) = self
            .registry
            .with_record(id, |record| (record.status, record.args.env))?;

        if !matches!(
            status,
            ContainerStatus::Running | ContainerStatus::Unresponsive
        ) {
            return Err(ContainerError::InvalidState { status, op: "stop" });
        }

        self.monitor.disarm(id);

        if let Some(env) = env {
            if let Err(err) = self.engine.halt(env).await {
                self.registry.update(id, |record| {
                    record.args.record_error(&err.to_string());
                    record.status = ContainerStatus::Error;
                })?;
                warn!(container_id = id, error = %err, "halt failed");
                self.notify(id, ContainerStatus::Error);
                return Err(err.into());
            }
            self.engine.release_env(env).await;
        }

        self.registry.update(id, |record| {
            record.args.env = None;
            record.args.entry = None;
            record.status = ContainerStatus::Stopped;
        })?;

        debug!(container_id = id, "container stopped");
        self.notify(id, ContainerStatus::Stopped);
        Ok(ContainerStatus::Stopped)
    }

    async fn destroy_locked(&self, id: ContainerId) -> Result<ContainerStatus> {
        let status = self.registry.status(id);
        if status == ContainerStatus::Unknown {
            // Already destroyed or never created: idempotent success.
            return Ok(ContainerStatus::Destroyed);
        }

        if matches!(
            status,
            ContainerStatus::Running | ContainerStatus::Unresponsive
        ) {
            self.monitor.disarm(id);
            let env = self.registry.with_record(id, |record| record.args.env)?;
            if let Some(env) = env {
                // Forced teardown: a failed halt does not block destruction.
                if let Err(err) = self.engine.halt(env).await {
                    warn!(container_id = id, error = %err, "halt failed during destroy");
                }
            }
        }

        let record = self.registry.clear(id)?;
        if let Some(env) = record.args.env {
            self.engine.release_env(env).await;
        }
        if let Some(instance) = record.args.instance {
            self.engine.release_instance(instance).await;
        }
        if let Some(module) = record.args.module {
            self.engine.release_module(module).await;
        }

        info!(container_id = id, name = %record.identity.name, "container destroyed");
        self.notify(id, ContainerStatus::Destroyed);
        Ok(ContainerStatus::Destroyed)
    }

    fn notify(&self, id: ContainerId, status: ContainerStatus) {
        // Ignored when no one is listening.
        let _ = self.events.send((id, status));
    }

    /// Invokes the completion callback for a finished lifecycle call, but
    /// only when a transition actually committed.
    fn finish(
        &self,
        callback: Option<CompletionCallback>,
        id: ContainerId,
        result: &Result<ContainerStatus>,
    ) {
        match result {
            Ok(status) => complete(callback, id, *status),
            // Rejected by validation: no transition, no notification.
            Err(ContainerError::InvalidState { .. } | ContainerError::InvalidId(_)) => {}
            // Failed mid-transition: the record now reads Error.
            Err(_) => complete(callback, id, self.registry.status(id)),
        }
    }
}

fn complete(callback: Option<CompletionCallback>, id: ContainerId, status: ContainerStatus) {
    if let Some(callback) = callback {
        callback(id, status);
    }
}
