//! Sensor bridge and its capability surface.
//!
//! The bridge owns the fixed table of discovered sensors and flattens every
//! operation to the i32 codes of the capability ABI: `-1` for an invalid
//! handle, argument, or read failure; `-2` for a device that is not ready or
//! a caller buffer that is too small.

use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use modbox_constants::sensors::{
    ERR_INVALID, ERR_NOT_READY, MAX_CHANNELS_PER_SENSOR, MAX_SENSORS, MAX_SENSOR_NAME_LEN,
};
use modbox_container::CapabilityBinding;

use crate::driver::{ChannelType, SensorDriver};

/// One discovered sensor: the driver plus the channel list captured at
/// discovery time.
struct Entry {
    driver: Arc<dyn SensorDriver>,
    name: String,
    channels: Vec<ChannelType>,
}

/// Registry of sensor devices exposed to sandboxed modules.
///
/// Drivers are registered at bring-up; `discover` scans them into the
/// sensor table and assigns the integer handles sandboxed code uses for
/// every later call.
#[derive(Default)]
pub struct SensorBridge {
    /// Registered drivers awaiting discovery.
    candidates: RwLock<Vec<Arc<dyn SensorDriver>>>,
    /// Discovered sensors, indexed by handle.
    sensors: RwLock<Vec<Entry>>,
}

impl SensorBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a driver for the next `discover` scan.
    pub fn register(&self, driver: Arc<dyn SensorDriver>) {
        if let Ok(mut candidates) = self.candidates.write() {
            candidates.push(driver);
        }
    }

    /// Scans registered drivers into the sensor table and returns the number
    /// of discovered sensors. Devices without usable channels are skipped;
    /// the table is capped at the compiled sensor limit. Rediscovery rebuilds
    /// the table from scratch, so handles from a previous scan are void.
    pub fn discover(&self) -> i32 {
        let Ok(candidates) = self.candidates.read() else {
            return ERR_INVALID;
        };
        if candidates.is_empty() {
            warn!("no sensor drivers registered");
            return ERR_INVALID;
        }

        let mut entries = Vec::new();
        for driver in candidates.iter() {
            if entries.len() >= MAX_SENSORS {
                warn!(name = driver.name(), "sensor limit reached, skipping device");
                continue;
            }

            let mut channels = driver.channels();
            channels.truncate(MAX_CHANNELS_PER_SENSOR);
            if channels.is_empty() {
                warn!(name = driver.name(), "device has no channels, skipping");
                continue;
            }

            let mut name = driver.name().to_string();
            name.truncate(MAX_SENSOR_NAME_LEN - 1);
            debug!(name = %name, channels = channels.len(), "sensor discovered");
            entries.push(Entry {
                driver: Arc::clone(driver),
                name,
                channels,
            });
        }

        let count = entries.len();
        match self.sensors.write() {
            Ok(mut sensors) => *sensors = entries,
            Err(_) => return ERR_INVALID,
        }
        info!(count, "sensor discovery complete");
        i32::try_from(count).unwrap_or(ERR_INVALID)
    }

    /// Opens a sensor for use: `0` on success, the not-ready code when the
    /// device cannot be used yet.
    pub fn open(&self, handle: i32) -> i32 {
        self.with_entry(handle, |entry| {
            if entry.driver.is_ready() {
                0
            } else {
                warn!(name = %entry.name, "device not ready");
                ERR_NOT_READY
            }
        })
    }

    /// Returns the handle for a sensor index from the last discovery scan.
    pub fn get_handle(&self, index: i32) -> i32 {
        // Handles are the table indices themselves; this validates the index.
        self.with_entry(index, |_| index)
    }

    /// Copies the sensor name into `buffer` with a trailing NUL and returns
    /// the name length, or the not-ready code when the buffer is too small.
    pub fn get_name(&self, handle: i32, buffer: &mut [u8]) -> i32 {
        self.with_entry(handle, |entry| {
            let name = entry.name.as_bytes();
            if name.len() >= buffer.len() {
                return ERR_NOT_READY;
            }
            buffer[..name.len()].copy_from_slice(name);
            buffer[name.len()] = 0;
            i32::try_from(name.len()).unwrap_or(ERR_INVALID)
        })
    }

    /// Number of channels the sensor provides.
    pub fn channel_count(&self, handle: i32) -> i32 {
        self.with_entry(handle, |entry| {
            i32::try_from(entry.channels.len()).unwrap_or(ERR_INVALID)
        })
    }

    /// Channel id at `index` in the sensor's channel list.
    pub fn channel_type(&self, handle: i32, index: i32) -> i32 {
        self.with_entry(handle, |entry| {
            usize::try_from(index)
                .ok()
                .and_then(|index| entry.channels.get(index))
                .map_or(ERR_INVALID, |channel| channel.id())
        })
    }

    /// Samples a channel and returns its milli-scaled fixed-point value.
    /// Fetch failures, unsupported channels, and unknown channel ids all
    /// report the invalid code.
    pub fn read(&self, handle: i32, channel_id: i32) -> i32 {
        let Some(channel) = ChannelType::from_id(channel_id) else {
            return ERR_INVALID;
        };
        self.with_entry(handle, |entry| {
            if let Err(err) = entry.driver.fetch() {
                warn!(name = %entry.name, error = %err, "sample fetch failed");
                return ERR_INVALID;
            }
            match entry.driver.get(channel) {
                Ok(measurement) => measurement.to_fixed(),
                Err(err) => {
                    debug!(name = %entry.name, error = %err, "channel read failed");
                    ERR_INVALID
                }
            }
        })
    }

    fn with_entry(&self, handle: i32, f: impl FnOnce(&Entry) -> i32) -> i32 {
        let Ok(index) = usize::try_from(handle) else {
            return ERR_INVALID;
        };
        let Ok(sensors) = self.sensors.read() else {
            return ERR_INVALID;
        };
        sensors.get(index).map_or(ERR_INVALID, f)
    }
}

/// Builds the capability table entries for the sensor API.
///
/// Name retrieval moves bytes into sandbox memory and therefore lives with
/// the execution engine's own bindings; everything expressible over the
/// i32-only ABI is bound here. A missing argument reports the invalid code.
#[must_use]
pub fn capability_bindings(bridge: Arc<SensorBridge>) -> Vec<CapabilityBinding> {
    let mut bindings = Vec::new();

    let b = Arc::clone(&bridge);
    bindings.push(CapabilityBinding::new(
        "sensors_discover",
        Arc::new(move |_argv: &[i32]| b.discover()),
    ));

    let b = Arc::clone(&bridge);
    bindings.push(CapabilityBinding::new(
        "sensors_open",
        Arc::new(move |argv: &[i32]| {
            argv.first().map_or(ERR_INVALID, |&handle| b.open(handle))
        }),
    ));

    let b = Arc::clone(&bridge);
    bindings.push(CapabilityBinding::new(
        "sensors_get_handle",
        Arc::new(move |argv: &[i32]| {
            argv.first().map_or(ERR_INVALID, |&index| b.get_handle(index))
        }),
    ));

    let b = Arc::clone(&bridge);
    bindings.push(CapabilityBinding::new(
        "sensors_get_channel_count",
        Arc::new(move |argv: &[i32]| {
            argv.first()
                .map_or(ERR_INVALID, |&handle| b.channel_count(handle))
        }),
    ));

    let b = Arc::clone(&bridge);
    bindings.push(CapabilityBinding::new(
        "sensors_get_channel_type",
        Arc::new(move |argv: &[i32]| match argv {
            [handle, index, ..] => b.channel_type(*handle, *index),
            _ => ERR_INVALID,
        }),
    ));

    let b = bridge;
    bindings.push(CapabilityBinding::new(
        "sensors_read",
        Arc::new(move |argv: &[i32]| match argv {
            [handle, channel, ..] => b.read(*handle, *channel),
            _ => ERR_INVALID,
        }),
    ));

    bindings
}
