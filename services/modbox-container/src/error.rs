//! Error types for the container runtime.

use thiserror::Error;

use crate::state::ContainerStatus;

/// Result type alias for container runtime operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors that can occur during container runtime operations.
///
/// All variants are recoverable by the caller except [`InitTimeout`], which
/// is fatal to runtime bring-up. Engine failures additionally leave bounded
/// error text in the affected container's record; `destroy` is always safe
/// to call afterwards to reclaim the slot.
///
/// [`InitTimeout`]: ContainerError::InitTimeout
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Registry has no free slot.
    #[error("registry full: all {capacity} slots are occupied")]
    Full { capacity: usize },

    /// Another live container already uses this name.
    #[error("container name '{0}' is already in use")]
    DuplicateName(String),

    /// Container name is empty or too long.
    #[error("invalid container name: {0}")]
    InvalidName(String),

    /// Content digest is not a hex sha256.
    #[error("invalid content digest: {0}")]
    InvalidDigest(String),

    /// Container id is out of range or points at a free slot.
    #[error("container id {0} is out of range or not allocated")]
    InvalidId(usize),

    /// Requested resource limits exceed the compiled ceilings.
    #[error(
        "resource limits exceed ceiling: stack {stack} (max {max_stack}), heap {heap} (max {max_heap})"
    )]
    OversizedLimits {
        stack: u32,
        heap: u32,
        max_stack: u32,
        max_heap: u32,
    },

    /// Operation is not valid from the container's current state.
    #[error("cannot {op} container in state {status}")]
    InvalidState {
        status: ContainerStatus,
        op: &'static str,
    },

    /// Storage collaborator failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Execution engine failure.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Runtime bring-up did not signal readiness within the deadline.
    #[error("runtime initialization timed out after {0} ms")]
    InitTimeout(u64),

    /// Operation issued against a runtime that is not initialized.
    #[error("runtime is not initialized")]
    NotInitialized,

    /// Invalid runtime configuration.
    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),

    /// Internal runtime error.
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Errors returned by the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No module is stored under the given digest.
    #[error("no module found for digest {0}")]
    NotFound(String),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Io(String),
}

/// Error reported by the execution engine.
///
/// The message is truncated to the compiled error-buffer bound before being
/// recorded into a container's runtime arguments.
#[derive(Debug, Error)]
#[error("engine error: {0}")]
pub struct EngineError(pub String);
