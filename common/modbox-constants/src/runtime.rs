//! Compile-time bounds for the container runtime.
//!
//! Everything the runtime allocates is sized ahead of time from these
//! constants; `RuntimeConfig` may only shrink them, never grow past them.

/// Maximum number of container slots compiled into the registry.
pub const MAX_CONTAINERS: usize = 16;

/// How long `Runtime::initialize` waits for engine bring-up before giving up.
pub const INIT_TIMEOUT_MS: u64 = 500;

/// Maximum length of a container name.
pub const NAME_MAX_LEN: usize = 16;

/// Length of a hex-encoded sha256 content digest.
pub const DIGEST_LEN: usize = 64;

/// Upper bound on the engine error text retained per container.
pub const ERROR_BUF_LEN: usize = 128;

/// Ceiling for a container's module stack size, in bytes.
pub const MAX_STACK_SIZE: u32 = 64 * 1024;

/// Ceiling for a container's module heap size, in bytes.
pub const MAX_HEAP_SIZE: u32 = 256 * 1024;

/// Default module stack size, in bytes.
pub const DEFAULT_STACK_SIZE: u32 = 8 * 1024;

/// Default module heap size, in bytes.
pub const DEFAULT_HEAP_SIZE: u32 = 16 * 1024;

/// Default watchdog check interval, in milliseconds.
pub const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 1000;

/// Default number of missed watchdog timers before a container is flagged.
pub const DEFAULT_WATCHDOG_TIMERS: u32 = 3;
