//! Change-gated notifier: per-channel "last reported value" cache.
//!
//! A channel is reported (GATT update + broadcast refresh) only when its
//! quantized value differs from the one reported last. The cache starts
//! unset, so the first successful sample reports every channel even when a
//! reading happens to be zero.

use heapless::Vec;

use super::channel::{Channel, Characteristic};
use super::subscriptions::Subscriber;
use crate::config::MAX_CONNECTIONS;

/// Outcome of [`ChannelCache::observe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Observation {
    /// Same value as last reported; nothing to emit.
    Unchanged,
    /// New value stored. `previous` is `None` on the first report.
    Changed { previous: Option<i32> },
}

impl Observation {
    pub const fn is_changed(self) -> bool {
        matches!(self, Observation::Changed { .. })
    }
}

/// Last value reported per channel, in wire units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelCache {
    last: [Option<i32>; Channel::COUNT],
}

impl Default for ChannelCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelCache {
    pub const fn new() -> Self {
        Self {
            last: [None; Channel::COUNT],
        }
    }

    /// Compare against the cached value and store `value` if it changed.
    pub fn observe(&mut self, channel: Channel, value: i32) -> Observation {
        let slot = &mut self.last[channel.index()];
        if *slot == Some(value) {
            return Observation::Unchanged;
        }
        let previous = slot.replace(value);
        Observation::Changed { previous }
    }

    /// Last reported value, `None` until the first report.
    pub fn get(&self, channel: Channel) -> Option<i32> {
        self.last[channel.index()]
    }
}

/// Encoded characteristic value (little-endian, 2 or 4 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicValue {
    bytes: [u8; 4],
    len: u8,
}

impl CharacteristicValue {
    /// Encode a wire value for `characteristic`:
    /// temperature as i16, pressure as u32, everything else as u16.
    pub fn encode(characteristic: Characteristic, value: i32) -> Self {
        match characteristic {
            Characteristic::Temperature => Self::two((value as i16).to_le_bytes()),
            Characteristic::Pressure => Self {
                bytes: (value as u32).to_le_bytes(),
                len: 4,
            },
            Characteristic::Humidity
            | Characteristic::Co2
            | Characteristic::Voc
            | Characteristic::Iaq => Self::two((value as u16).to_le_bytes()),
        }
    }

    fn two(b: [u8; 2]) -> Self {
        Self {
            bytes: [b[0], b[1], 0, 0],
            len: 2,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn as_i16(&self) -> i16 {
        i16::from_le_bytes([self.bytes[0], self.bytes[1]])
    }

    pub fn as_u16(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0], self.bytes[1]])
    }

    pub fn as_u32(&self) -> u32 {
        u32::from_le_bytes(self.bytes)
    }
}

/// Work produced by a changed channel, executed after the shared-state
/// lock is released.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingUpdate {
    /// Store the new characteristic value and push it to `subscribers`.
    Characteristic {
        characteristic: Characteristic,
        value: CharacteristicValue,
        subscribers: Vec<Subscriber, MAX_CONNECTIONS>,
    },
    /// Battery Service level update.
    BatteryLevel(u8),
}
