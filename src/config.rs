//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, identity settings, hardware addresses and
//! protocol constants live here so they can be tuned in one place.

// Update cycle

/// Sleep between two sampling cycles (milliseconds).
pub const SAMPLE_PERIOD_MS: u32 = 3_000;

/// Status LED on-time at the start of every cycle (milliseconds).
pub const LED_BLINK_MS: u32 = 100;

// Identity

/// Advertised name prefix. Only the first [`NAME_PREFIX_LEN`] characters
/// are kept; the rest of the name is the hardware-ID suffix.
pub const DEVICE_NAME_PREFIX: &str = "EnSens";

/// Characters taken from [`DEVICE_NAME_PREFIX`].
pub const NAME_PREFIX_LEN: usize = 3;

/// Hex digits of the hardware ID appended to the prefix.
pub const NAME_SUFFIX_LEN: usize = 3;

/// Total advertised name length (fits the 31-byte legacy advertisement
/// next to the 18-byte service data block).
pub const DEVICE_NAME_LEN: usize = NAME_PREFIX_LEN + NAME_SUFFIX_LEN;

// BLE

/// Maximum simultaneous peripheral connections.
pub const MAX_CONNECTIONS: usize = 2;

/// Advertising interval (in 0.625 ms units). 1600 = 1 s, the GAP
/// "slow advertising" minimum.
pub const BLE_ADV_INTERVAL: u32 = 1600;

/// BLE connection interval range (in 1.25 ms units).
/// 24..40 = 30..50 ms; sensor traffic is a handful of notifications every
/// few seconds.
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 4;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// ATT MTU requested from the SoftDevice.
pub const BLE_ATT_MTU: u16 = 23;

// Battery

/// Cell voltage reported as 0 % (millivolts).
pub const BATTERY_EMPTY_MV: u32 = 2_000;

/// Cell voltage reported as 100 % (millivolts).
pub const BATTERY_FULL_MV: u32 = 3_000;

// Sensor (BME68x on TWIM0)
//
//   I²C SDA        → P0.04
//   I²C SCL        → P0.05
//   Status LED     → P0.06

/// BME68x I²C address (SDO tied to GND).
pub const BME68X_I2C_ADDR: u8 = 0x76;

/// Gas heater target temperature (°C).
pub const BME68X_HEATER_TEMP_C: u16 = 320;

/// Gas heater duration (milliseconds).
pub const BME68X_HEATER_MS: u16 = 150;
