//! Health-monitor seam.
//!
//! The runtime owns each container's watchdog configuration and arms or
//! disarms the monitor at lifecycle transitions; the monitor's timing and
//! liveness-detection algorithm are external. Verdicts come back through
//! [`ContainerManager::report_unresponsive`] and
//! [`ContainerManager::report_recovered`].
//!
//! [`ContainerManager::report_unresponsive`]: crate::manager::ContainerManager::report_unresponsive
//! [`ContainerManager::report_recovered`]: crate::manager::ContainerManager::report_recovered

use crate::state::{ContainerId, HealthCheckConfig};

/// Watchdog arm/disarm surface consulted by the lifecycle state machine.
pub trait HealthMonitor: Send + Sync {
    /// Arms the watchdog for a container entering `Running`.
    fn arm(&self, id: ContainerId, config: &HealthCheckConfig);

    /// Disarms the watchdog when a container leaves `Running`/`Unresponsive`.
    fn disarm(&self, id: ContainerId);
}

/// Monitor that does nothing, for deployments without health checking.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl HealthMonitor for NoopMonitor {
    fn arm(&self, _id: ContainerId, _config: &HealthCheckConfig) {}

    fn disarm(&self, _id: ContainerId) {}
}
