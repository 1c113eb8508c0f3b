//! # modbox-container
//!
//! Container runtime for modbox: the fixed-capacity container registry, the
//! lifecycle state machine, and the process-wide runtime controller for
//! sandboxed application modules on resource-constrained devices.
//!
//! The module bytecode engine, the content-addressed module storage, and the
//! health-check watchdog are external collaborators reached through the
//! traits in [`engine`], [`store`], and [`health`]. Host functions exposed
//! to sandboxed code (such as sensor access) are forwarded to the engine as
//! a [`capability`] table at initialization.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_const_for_fn)]

pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod manager;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod store;

pub use capability::{CapabilityBinding, HostFn};
pub use config::RuntimeConfig;
pub use engine::{
    EngineResult, EnvHandle, ExecutionEngine, FunctionHandle, InstanceHandle, ModuleHandle,
};
pub use error::{ContainerError, EngineError, Result, StoreError};
pub use health::{HealthMonitor, NoopMonitor};
pub use manager::{CompletionCallback, ContainerManager};
pub use registry::Registry;
pub use runtime::Runtime;
pub use state::{
    ContainerId, ContainerIdentity, ContainerLimits, ContainerRecord, ContainerStatus,
    ContainerSummary, HealthCheckConfig, RuntimeArguments, RuntimeStatus,
};
pub use store::{MemoryStore, ModuleStore, StoreResult};
