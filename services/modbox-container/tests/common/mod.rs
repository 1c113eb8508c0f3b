//! Mock collaborators shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use modbox_container::engine::{
    EngineResult, EnvHandle, ExecutionEngine, FunctionHandle, InstanceHandle, ModuleHandle,
};
use modbox_container::{
    CapabilityBinding, ContainerId, ContainerIdentity, ContainerManager, EngineError,
    HealthCheckConfig, HealthMonitor, MemoryStore,
};

/// Scripted in-memory execution engine.
#[derive(Default)]
pub struct MockEngine {
    next_handle: AtomicU64,
    pub fail_load: AtomicBool,
    pub fail_instantiate: AtomicBool,
    pub fail_invoke: AtomicBool,
    pub fail_halt: AtomicBool,
    pub loads: AtomicUsize,
    pub instantiates: AtomicUsize,
    pub invokes: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub released_envs: Mutex<Vec<u64>>,
    pub released_instances: Mutex<Vec<u64>>,
    pub released_modules: Mutex<Vec<u64>>,
}

impl MockEngine {
    fn fresh_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn fail(flag: &AtomicBool, what: &str) -> EngineResult<()> {
        if flag.load(Ordering::Relaxed) {
            Err(EngineError(format!("{what} rejected")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ExecutionEngine for MockEngine {
    async fn start(&self, _capabilities: &[CapabilityBinding]) -> EngineResult<()> {
        Ok(())
    }

    async fn load(&self, _buffer: &Bytes) -> EngineResult<ModuleHandle> {
        Self::fail(&self.fail_load, "load")?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(ModuleHandle(self.fresh_handle()))
    }

    async fn instantiate(
        &self,
        _module: ModuleHandle,
        _stack_size: u32,
        _heap_size: u32,
    ) -> EngineResult<InstanceHandle> {
        Self::fail(&self.fail_instantiate, "instantiate")?;
        self.instantiates.fetch_add(1, Ordering::Relaxed);
        Ok(InstanceHandle(self.fresh_handle()))
    }

    async fn resolve_entry(
        &self,
        _instance: InstanceHandle,
        _name: &str,
    ) -> EngineResult<FunctionHandle> {
        Ok(FunctionHandle(self.fresh_handle()))
    }

    async fn create_env(
        &self,
        _instance: InstanceHandle,
        _stack_size: u32,
    ) -> EngineResult<EnvHandle> {
        Ok(EnvHandle(self.fresh_handle()))
    }

    async fn invoke(&self, _env: EnvHandle, _func: FunctionHandle) -> EngineResult<()> {
        Self::fail(&self.fail_invoke, "invoke")?;
        self.invokes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn halt(&self, _env: EnvHandle) -> EngineResult<()> {
        Self::fail(&self.fail_halt, "halt")
    }

    async fn release_env(&self, env: EnvHandle) {
        self.released_envs.lock().unwrap().push(env.0);
    }

    async fn release_instance(&self, instance: InstanceHandle) {
        self.released_instances.lock().unwrap().push(instance.0);
    }

    async fn release_module(&self, module: ModuleHandle) {
        self.released_modules.lock().unwrap().push(module.0);
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::Relaxed);
    }
}

/// Monitor that records arm/disarm calls.
#[derive(Default)]
pub struct RecordingMonitor {
    pub armed: Mutex<Vec<ContainerId>>,
    pub disarmed: Mutex<Vec<ContainerId>>,
}

impl HealthMonitor for RecordingMonitor {
    fn arm(&self, id: ContainerId, _config: &HealthCheckConfig) {
        self.armed.lock().unwrap().push(id);
    }

    fn disarm(&self, id: ContainerId) {
        self.disarmed.lock().unwrap().push(id);
    }
}

pub struct Fixture {
    pub manager: Arc<ContainerManager>,
    pub engine: Arc<MockEngine>,
    pub store: Arc<MemoryStore>,
    pub monitor: Arc<RecordingMonitor>,
}

/// Builds a manager over mock collaborators with `capacity` slots.
pub fn fixture(capacity: usize) -> Fixture {
    let engine = Arc::new(MockEngine::default());
    let store = Arc::new(MemoryStore::new());
    let monitor = Arc::new(RecordingMonitor::default());
    let manager = Arc::new(ContainerManager::new(
        capacity,
        engine.clone(),
        store.clone(),
        monitor.clone(),
    ));
    Fixture {
        manager,
        engine,
        store,
        monitor,
    }
}

/// Stores a distinct module binary for `name` and returns its identity.
pub fn identity(store: &MemoryStore, name: &str) -> ContainerIdentity {
    let digest = store.insert(Bytes::from(format!("\0mod:{name}")));
    ContainerIdentity::new(name, &digest).unwrap()
}
