//! Host capability bindings exposed to sandboxed modules.
//!
//! The runtime forwards the binding table to the execution engine at
//! initialization and never interprets individual bindings; subsystems such
//! as the sensor bridge contribute their own entries.

use std::fmt;
use std::sync::Arc;

/// A host function callable from sandboxed code.
///
/// Arguments and the return value cross the sandbox boundary as `i32`, the
/// common denominator of the capability ABI.
pub type HostFn = Arc<dyn Fn(&[i32]) -> i32 + Send + Sync>;

/// A named host function entry in the capability table.
#[derive(Clone)]
pub struct CapabilityBinding {
    name: String,
    func: HostFn,
}

impl CapabilityBinding {
    /// Creates a binding under the given export name.
    pub fn new(name: impl Into<String>, func: HostFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Export name sandboxed code imports this function under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the bound host function. Called by the engine on behalf of
    /// sandboxed code.
    #[must_use]
    pub fn call(&self, argv: &[i32]) -> i32 {
        (self.func)(argv)
    }
}

impl fmt::Debug for CapabilityBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityBinding")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
