//! Sensor driver model.
//!
//! A driver fronts one physical (or simulated) sensor device. The bridge
//! talks to drivers through [`SensorDriver`] only; the capability surface in
//! [`crate::bridge`] flattens everything to the i32 codes sandboxed modules
//! see.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use modbox_constants::sensors::FIXED_POINT_SCALE;

/// Measurement channel kinds, identified across the sandbox boundary by a
/// stable integer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ChannelType {
    AccelX = 0,
    AccelY = 1,
    AccelZ = 2,
    GyroX = 3,
    GyroY = 4,
    GyroZ = 5,
    Temperature = 10,
    Humidity = 11,
    Pressure = 12,
    Light = 13,
    Voltage = 14,
    Current = 15,
}

impl ChannelType {
    /// Stable id used across the sandbox boundary.
    #[must_use]
    pub fn id(self) -> i32 {
        self as i32
    }

    /// Reverse mapping from a sandbox-supplied id.
    #[must_use]
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Self::AccelX),
            1 => Some(Self::AccelY),
            2 => Some(Self::AccelZ),
            3 => Some(Self::GyroX),
            4 => Some(Self::GyroY),
            5 => Some(Self::GyroZ),
            10 => Some(Self::Temperature),
            11 => Some(Self::Humidity),
            12 => Some(Self::Pressure),
            13 => Some(Self::Light),
            14 => Some(Self::Voltage),
            15 => Some(Self::Current),
            _ => None,
        }
    }
}

/// One sampled value: an integer part and a microunit fractional part, the
/// split sensor hardware commonly reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Measurement {
    /// Integer part of the value.
    pub integer: i32,
    /// Fractional part in microunits.
    pub micro: i32,
}

impl Measurement {
    #[must_use]
    pub const fn new(integer: i32, micro: i32) -> Self {
        Self { integer, micro }
    }

    /// Flattens to the milli-scaled fixed-point form reported to sandboxed
    /// modules: `integer * 1000 + micro / 1000`.
    #[must_use]
    pub fn to_fixed(self) -> i32 {
        self.integer * FIXED_POINT_SCALE + self.micro / FIXED_POINT_SCALE
    }
}

/// Driver-level failure.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Triggering a sample acquisition failed.
    #[error("sample fetch failed: {0}")]
    Fetch(String),
    /// The requested channel is not provided by this sensor.
    #[error("unsupported channel {0:?}")]
    UnsupportedChannel(ChannelType),
    /// The device is not ready for use.
    #[error("device not ready")]
    NotReady,
}

/// Interface to one sensor device.
pub trait SensorDriver: Send + Sync {
    /// Device name reported to sandboxed modules.
    fn name(&self) -> &str;

    /// Whether the device is ready for sampling. Drivers that are always
    /// ready keep the default.
    fn is_ready(&self) -> bool {
        true
    }

    /// Channels this sensor provides, in channel-index order.
    fn channels(&self) -> Vec<ChannelType>;

    /// Triggers acquisition of a fresh sample for all channels.
    fn fetch(&self) -> Result<(), DriverError>;

    /// Reads the most recently fetched value for a channel.
    fn get(&self, channel: ChannelType) -> Result<Measurement, DriverError>;
}

/// In-memory sensor backed by preset channel values, for simulation and
/// tests.
pub struct StaticSensor {
    name: String,
    ready: bool,
    values: RwLock<HashMap<ChannelType, Measurement>>,
    order: Vec<ChannelType>,
}

impl StaticSensor {
    /// Creates a ready sensor with the given channel values.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<(ChannelType, Measurement)>) -> Self {
        let order = values.iter().map(|(channel, _)| *channel).collect();
        Self {
            name: name.into(),
            ready: true,
            values: RwLock::new(values.into_iter().collect()),
            order,
        }
    }

    /// Marks the sensor not ready; `open` against it reports the
    /// not-ready code.
    #[must_use]
    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Replaces a channel's value, simulating new hardware readings.
    pub fn set(&self, channel: ChannelType, value: Measurement) {
        if let Ok(mut values) = self.values.write() {
            values.insert(channel, value);
        }
    }
}

impl SensorDriver for StaticSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn channels(&self) -> Vec<ChannelType> {
        self.order.clone()
    }

    fn fetch(&self) -> Result<(), DriverError> {
        Ok(())
    }

    fn get(&self, channel: ChannelType) -> Result<Measurement, DriverError> {
        let values = self
            .values
            .read()
            .map_err(|_| DriverError::Fetch("lock poisoned".to_string()))?;
        values
            .get(&channel)
            .copied()
            .ok_or(DriverError::UnsupportedChannel(channel))
    }
}
