//! Runtime initialization and teardown tests.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use modbox_constants::runtime::MAX_CONTAINERS;
use modbox_container::engine::{
    EngineResult, EnvHandle, ExecutionEngine, FunctionHandle, InstanceHandle, ModuleHandle,
};
use modbox_container::{
    CapabilityBinding, ContainerError, ContainerStatus, MemoryStore, NoopMonitor, Runtime,
    RuntimeConfig, RuntimeStatus,
};

use common::{identity, MockEngine};

fn capabilities() -> Vec<CapabilityBinding> {
    vec![CapabilityBinding::new("nop", Arc::new(|_| 0))]
}

async fn initialized_runtime(config: RuntimeConfig) -> (Runtime, Arc<MockEngine>, Arc<MemoryStore>) {
    let engine = Arc::new(MockEngine::default());
    let store = Arc::new(MemoryStore::new());
    let runtime = Runtime::initialize(
        config,
        engine.clone(),
        store.clone(),
        Arc::new(NoopMonitor),
        capabilities(),
    )
    .await
    .unwrap();
    (runtime, engine, store)
}

#[tokio::test]
async fn initialize_succeeds_with_defaults() {
    let (runtime, _, _) = initialized_runtime(RuntimeConfig::default()).await;
    assert_eq!(runtime.status(), RuntimeStatus::Initialized);
    assert!(runtime.list_containers().is_empty());
}

#[tokio::test]
async fn initialize_rejects_bad_container_count() {
    for max_containers in [0, MAX_CONTAINERS + 1] {
        let config = RuntimeConfig {
            max_containers,
            ..RuntimeConfig::default()
        };
        let err = Runtime::initialize(
            config,
            Arc::new(MockEngine::default()),
            Arc::new(MemoryStore::new()),
            Arc::new(NoopMonitor),
            capabilities(),
        )
        .await
        .err();
        assert!(matches!(err, Some(ContainerError::InvalidConfig(_))));
    }
}

#[tokio::test]
async fn initialize_rejects_empty_capability_table() {
    let err = Runtime::initialize(
        RuntimeConfig::default(),
        Arc::new(MockEngine::default()),
        Arc::new(MemoryStore::new()),
        Arc::new(NoopMonitor),
        Vec::new(),
    )
    .await
    .err();
    assert!(matches!(err, Some(ContainerError::InvalidConfig(_))));
}

/// Engine whose bring-up never completes.
struct StalledEngine;

#[async_trait]
impl ExecutionEngine for StalledEngine {
    async fn start(&self, _capabilities: &[CapabilityBinding]) -> EngineResult<()> {
        std::future::pending().await
    }

    async fn load(&self, _buffer: &Bytes) -> EngineResult<ModuleHandle> {
        unreachable!()
    }

    async fn instantiate(
        &self,
        _module: ModuleHandle,
        _stack_size: u32,
        _heap_size: u32,
    ) -> EngineResult<InstanceHandle> {
        unreachable!()
    }

    async fn resolve_entry(
        &self,
        _instance: InstanceHandle,
        _name: &str,
    ) -> EngineResult<FunctionHandle> {
        unreachable!()
    }

    async fn create_env(
        &self,
        _instance: InstanceHandle,
        _stack_size: u32,
    ) -> EngineResult<EnvHandle> {
        unreachable!()
    }

    async fn invoke(&self, _env: EnvHandle, _func: FunctionHandle) -> EngineResult<()> {
        unreachable!()
    }

    async fn halt(&self, _env: EnvHandle) -> EngineResult<()> {
        unreachable!()
    }

    async fn release_env(&self, _env: EnvHandle) {}

    async fn release_instance(&self, _instance: InstanceHandle) {}

    async fn release_module(&self, _module: ModuleHandle) {}

    async fn shutdown(&self) {}
}

#[tokio::test]
async fn initialize_times_out_on_stalled_engine() {
    let config = RuntimeConfig {
        init_timeout_ms: 10,
        ..RuntimeConfig::default()
    };
    let err = Runtime::initialize(
        config,
        Arc::new(StalledEngine),
        Arc::new(MemoryStore::new()),
        Arc::new(NoopMonitor),
        capabilities(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ContainerError::InitTimeout(10)));
}

#[tokio::test]
async fn lifecycle_operations_flow_through_the_runtime() {
    let (runtime, _, store) = initialized_runtime(RuntimeConfig::default()).await;
    let ident = identity(&store, "app");

    // Defaults fill in for omitted limits and watchdog settings.
    let id = runtime.create_container(ident, None, None, None).await.unwrap();
    assert_eq!(runtime.get_container_status(id), ContainerStatus::Created);

    runtime.run_container(id, None).await.unwrap();
    assert_eq!(runtime.get_container_status(id), ContainerStatus::Running);

    runtime.restart_container(id, None).await.unwrap();
    runtime.stop_container(id, None).await.unwrap();
    assert_eq!(runtime.get_container_status(id), ContainerStatus::Stopped);

    runtime.destroy_container(id, None).await.unwrap();
    assert_eq!(runtime.get_container_status(id), ContainerStatus::Unknown);
}

#[tokio::test]
async fn destroy_tears_down_live_containers_and_engine() {
    let (runtime, engine, store) = initialized_runtime(RuntimeConfig::default()).await;
    let running = runtime
        .create_container(identity(&store, "a"), None, None, None)
        .await
        .unwrap();
    runtime.run_container(running, None).await.unwrap();
    runtime
        .create_container(identity(&store, "b"), None, None, None)
        .await
        .unwrap();

    assert_eq!(runtime.destroy().await, RuntimeStatus::Destroyed);

    assert_eq!(runtime.status(), RuntimeStatus::Destroyed);
    assert!(runtime.list_containers().is_empty());
    assert_eq!(engine.shutdowns.load(Ordering::Relaxed), 1);
    assert_eq!(engine.released_modules.lock().unwrap().len(), 1);

    // A second destroy is a no-op.
    assert_eq!(runtime.destroy().await, RuntimeStatus::Destroyed);
    assert_eq!(engine.shutdowns.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn operations_after_destroy_are_rejected() {
    let (runtime, _, store) = initialized_runtime(RuntimeConfig::default()).await;
    let ident = identity(&store, "app");
    runtime.destroy().await;

    let err = runtime.create_container(ident, None, None, None).await.unwrap_err();
    assert!(matches!(err, ContainerError::NotInitialized));
    assert!(matches!(
        runtime.run_container(0, None).await.unwrap_err(),
        ContainerError::NotInitialized
    ));

    // Status stays a pure read in any runtime state.
    assert_eq!(runtime.get_container_status(0), ContainerStatus::Unknown);
}
