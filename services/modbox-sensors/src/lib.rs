//! # modbox-sensors
//!
//! Peripheral sensor bridge for modbox. Sensor devices register a driver
//! with the [`SensorBridge`]; discovery builds a fixed table of sensors
//! addressed by integer handles, and [`capability_bindings`] exposes the
//! sensor API to sandboxed modules through the container runtime's
//! capability table. The bridge is self-contained and takes no part in
//! container lifecycle logic.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod bridge;
pub mod driver;

pub use bridge::{capability_bindings, SensorBridge};
pub use driver::{ChannelType, DriverError, Measurement, SensorDriver, StaticSensor};
