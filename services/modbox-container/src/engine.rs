//! Execution engine seam.
//!
//! The engine loads, instantiates, and runs sandboxed module bytecode; the
//! runtime only drives its lifecycle calls and stores the opaque handles it
//! returns. Implementations wrap a concrete interpreter; tests use mocks.

use async_trait::async_trait;
use bytes::Bytes;

use crate::capability::CapabilityBinding;
use crate::error::EngineError;

/// Result type alias for engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Name of the entry function resolved in every module.
pub const ENTRY_FUNCTION: &str = "main";

/// Handle to a loaded module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u64);

/// Handle to an instantiated module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceHandle(pub u64);

/// Handle to a resolved function within an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionHandle(pub u64);

/// Handle to an execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvHandle(pub u64);

/// Lifecycle calls the runtime issues against the sandboxed-execution engine.
///
/// No registry lock is ever held across these calls; the per-slot transition
/// guard alone serializes same-slot access, so a blocked engine call stalls
/// only its own slot.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Brings the engine up and registers the host capability table.
    /// Runtime initialization awaits this behind its readiness deadline.
    async fn start(&self, capabilities: &[CapabilityBinding]) -> EngineResult<()>;

    /// Loads a module binary. The buffer is released by the caller once this
    /// returns; the engine must copy what it needs.
    async fn load(&self, buffer: &Bytes) -> EngineResult<ModuleHandle>;

    /// Instantiates a loaded module with the given stack and heap sizes.
    async fn instantiate(
        &self,
        module: ModuleHandle,
        stack_size: u32,
        heap_size: u32,
    ) -> EngineResult<InstanceHandle>;

    /// Resolves a function exported by the instance.
    async fn resolve_entry(
        &self,
        instance: InstanceHandle,
        name: &str,
    ) -> EngineResult<FunctionHandle>;

    /// Creates an execution environment for the instance.
    async fn create_env(&self, instance: InstanceHandle, stack_size: u32)
        -> EngineResult<EnvHandle>;

    /// Begins executing the function in the environment. Returns once the
    /// engine has accepted execution; scheduling is the engine's concern.
    async fn invoke(&self, env: EnvHandle, func: FunctionHandle) -> EngineResult<()>;

    /// Signals the environment to halt execution.
    async fn halt(&self, env: EnvHandle) -> EngineResult<()>;

    /// Releases an execution environment.
    async fn release_env(&self, env: EnvHandle);

    /// Releases an instantiated module.
    async fn release_instance(&self, instance: InstanceHandle);

    /// Releases a loaded module.
    async fn release_module(&self, module: ModuleHandle);

    /// Tears the engine down at runtime shutdown.
    async fn shutdown(&self);
}
