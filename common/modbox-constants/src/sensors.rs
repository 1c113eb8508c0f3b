//! Sensor bridge capacities and capability API codes.
//!
//! The i32 return codes are part of the host capability contract with
//! sandboxed modules and must stay stable.

/// Maximum number of sensors the bridge tracks.
pub const MAX_SENSORS: usize = 16;

/// Maximum number of channels captured per sensor.
pub const MAX_CHANNELS_PER_SENSOR: usize = 8;

/// Maximum sensor name length, including the trailing NUL written into
/// caller buffers.
pub const MAX_SENSOR_NAME_LEN: usize = 32;

/// Invalid handle, invalid argument, or read failure.
pub const ERR_INVALID: i32 = -1;

/// Device not ready, or caller buffer too small.
pub const ERR_NOT_READY: i32 = -2;

/// Readings are reported as `integer_part * SCALE + fractional_milli`.
pub const FIXED_POINT_SCALE: i32 = 1000;
