//! BTHome service-data payload and advertising frame builder.
//!
//! Layout (18 bytes, multi-byte fields little-endian):
//! ```text
//! Byte 0-1:   Service UUID 0xFCD2 (BTHome)
//! Byte 2:     Device info flags (0x40: BTHome v2, unencrypted)
//! Byte 3:     Object id 0x01 (battery)      Byte 4:     battery %, u8
//! Byte 5:     Object id 0x02 (temperature)  Byte 6-7:   0.01 °C, i16
//! Byte 8:     Object id 0x03 (humidity)     Byte 9-10:  0.01 %, u16
//! Byte 11:    Object id 0x04 (pressure)     Byte 12-14: Pa, u24
//! Byte 15:    Object id 0x12 (CO2)          Byte 16-17: ppm, u16
//! ```
//!
//! The payload is kept as a struct of fields and serialized on demand, so
//! the bytes handed to the advertiser are always a complete snapshot.

use heapless::Vec;

use super::channel::Channel;
use crate::error::AdvertisingError;

/// BTHome 16-bit service UUID.
pub const SERVICE_UUID: u16 = 0xFCD2;

/// BTHome device information byte.
pub const DEVICE_INFO_FLAGS: u8 = 0x40;

pub const OBJECT_BATTERY: u8 = 0x01;
pub const OBJECT_TEMPERATURE: u8 = 0x02;
pub const OBJECT_HUMIDITY: u8 = 0x03;
pub const OBJECT_PRESSURE: u8 = 0x04;
pub const OBJECT_CO2: u8 = 0x12;

pub const IDX_FLAGS: usize = 2;
pub const IDX_BATTERY: usize = 4;
pub const IDX_TEMPERATURE: usize = 6;
pub const IDX_HUMIDITY: usize = 9;
pub const IDX_PRESSURE: usize = 12;
pub const IDX_CO2: usize = 16;

/// Service data length in bytes (UUID included).
pub const PAYLOAD_LEN: usize = 18;

/// Maximum legacy advertising data length.
pub const ADV_DATA_MAX: usize = 31;

// AD types
const AD_FLAGS: u8 = 0x01;
const AD_COMPLETE_NAME: u8 = 0x09;
const AD_SERVICE_DATA_16: u8 = 0x16;

/// LE General Discoverable, BR/EDR not supported.
const ADV_FLAGS: u8 = 0x06;

/// Broadcast fields in wire units.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BroadcastPayload {
    pub battery: u8,
    pub temperature: i16,
    pub humidity: u16,
    /// Only the low 24 bits go on air.
    pub pressure: u32,
    pub co2: u16,
}

impl BroadcastPayload {
    pub const fn new() -> Self {
        Self {
            battery: 0,
            temperature: 0,
            humidity: 0,
            pressure: 0,
            co2: 0,
        }
    }

    /// Store a quantized channel value.
    ///
    /// No range checks: the value comes out of the clamper already bounded
    /// to the wire width. VOC and IAQ are not broadcast and are ignored.
    pub fn encode(&mut self, channel: Channel, value: i32) {
        match channel {
            Channel::Battery => self.battery = value as u8,
            Channel::Temperature => self.temperature = value as i16,
            Channel::Humidity => self.humidity = value as u16,
            Channel::Pressure => self.pressure = value as u32,
            Channel::Co2 => self.co2 = value as u16,
            Channel::Voc | Channel::Iaq => {}
        }
    }

    /// Whether this channel has a slot in the broadcast.
    pub const fn carries(channel: Channel) -> bool {
        !matches!(channel, Channel::Voc | Channel::Iaq)
    }

    /// Serialize into the fixed 18-byte service data block.
    pub fn to_bytes(&self) -> [u8; PAYLOAD_LEN] {
        let mut buf = [0u8; PAYLOAD_LEN];
        buf[0..2].copy_from_slice(&SERVICE_UUID.to_le_bytes());
        buf[IDX_FLAGS] = DEVICE_INFO_FLAGS;

        buf[IDX_BATTERY - 1] = OBJECT_BATTERY;
        buf[IDX_BATTERY] = self.battery;

        buf[IDX_TEMPERATURE - 1] = OBJECT_TEMPERATURE;
        buf[IDX_TEMPERATURE..IDX_TEMPERATURE + 2].copy_from_slice(&self.temperature.to_le_bytes());

        buf[IDX_HUMIDITY - 1] = OBJECT_HUMIDITY;
        buf[IDX_HUMIDITY..IDX_HUMIDITY + 2].copy_from_slice(&self.humidity.to_le_bytes());

        buf[IDX_PRESSURE - 1] = OBJECT_PRESSURE;
        buf[IDX_PRESSURE..IDX_PRESSURE + 3].copy_from_slice(&self.pressure.to_le_bytes()[..3]);

        buf[IDX_CO2 - 1] = OBJECT_CO2;
        buf[IDX_CO2..IDX_CO2 + 2].copy_from_slice(&self.co2.to_le_bytes());
        buf
    }
}

/// Build the complete legacy advertising frame:
/// `[flags AD][complete local name AD][16-bit service data AD]`.
pub fn advertisement(
    name: &str,
    payload: &[u8; PAYLOAD_LEN],
) -> Result<Vec<u8, ADV_DATA_MAX>, AdvertisingError> {
    let name = name.as_bytes();
    let mut frame: Vec<u8, ADV_DATA_MAX> = Vec::new();

    frame
        .extend_from_slice(&[0x02, AD_FLAGS, ADV_FLAGS])
        .map_err(|_| AdvertisingError::FrameTooLong)?;

    frame
        .extend_from_slice(&[name.len() as u8 + 1, AD_COMPLETE_NAME])
        .map_err(|_| AdvertisingError::FrameTooLong)?;
    frame
        .extend_from_slice(name)
        .map_err(|_| AdvertisingError::FrameTooLong)?;

    // Service data AD: the payload already starts with the UUID.
    frame
        .extend_from_slice(&[PAYLOAD_LEN as u8 + 1, AD_SERVICE_DATA_16])
        .map_err(|_| AdvertisingError::FrameTooLong)?;
    frame
        .extend_from_slice(payload)
        .map_err(|_| AdvertisingError::FrameTooLong)?;

    Ok(frame)
}
