//! Shared synchronization state and the handle both execution contexts use.
//!
//! The update cycle and the BLE stack's event context both hold a
//! `&'static SyncEngine`. Channel caches, the broadcast payload and the
//! subscription table sit behind a single critical-section mutex; the
//! connection count is a plain atomic. The lock is only ever held for
//! pure bookkeeping: any work that touches the radio is returned to the
//! caller as [`PendingUpdate`]s and executed after the lock is released.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

use super::channel::{Channel, ChannelSet, Characteristic};
use super::clamp;
use super::connections::ConnectionCount;
use super::notifier::{ChannelCache, CharacteristicValue, Observation, PendingUpdate};
use super::payload::{BroadcastPayload, PAYLOAD_LEN};
use super::ports::SensorReading;
use super::subscriptions::{CccOutcome, ConnHandle, SubscriptionTable};
use crate::error::SubscriptionProtocolError;

/// Everything guarded by the engine lock.
#[derive(Clone, Debug)]
pub struct SyncState {
    pub cache: ChannelCache,
    pub payload: BroadcastPayload,
    pub subscriptions: SubscriptionTable,
    /// Channels that already reported a NaN input.
    pub invalid_seen: ChannelSet,
}

impl SyncState {
    pub const fn new() -> Self {
        Self {
            cache: ChannelCache::new(),
            payload: BroadcastPayload::new(),
            subscriptions: SubscriptionTable::new(),
            invalid_seen: ChannelSet::empty(),
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of routing one reading through clamp → notifier → encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Applied {
    /// GATT / battery work to run once the lock is released.
    pub pending: Vec<PendingUpdate, { Channel::COUNT }>,
    /// Serialized broadcast after this reading.
    pub payload: [u8; PAYLOAD_LEN],
    /// Channels whose reported value changed.
    pub changed: ChannelSet,
    /// Channels that saw a NaN input for the first time.
    pub newly_invalid: ChannelSet,
}

/// Outcome of [`SyncEngine::on_connect`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Connected {
    /// Connection count including this link.
    pub active: u32,
    pub tracked: Result<(), SubscriptionProtocolError>,
}

pub struct SyncEngine {
    state: Mutex<CriticalSectionRawMutex, RefCell<SyncState>>,
    connections: ConnectionCount,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEngine {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(SyncState::new())),
            connections: ConnectionCount::new(),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SyncState) -> R) -> R {
        self.state.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Route a successful reading through every channel.
    pub fn apply(&self, reading: &SensorReading) -> Applied {
        self.with_state(|state| {
            let mut pending = Vec::new();
            let mut changed = ChannelSet::empty();
            let mut newly_invalid = ChannelSet::empty();

            for channel in Channel::ALL {
                let raw = reading.get(channel);
                if clamp::is_invalid(raw) && !state.invalid_seen.contains(channel) {
                    state.invalid_seen.insert(channel);
                    newly_invalid.insert(channel);
                }

                let value = clamp::bound(channel, raw);
                if state.cache.observe(channel, value) == Observation::Unchanged {
                    continue;
                }
                changed.insert(channel);
                state.payload.encode(channel, value);

                let update = match channel.characteristic() {
                    Some(characteristic) => PendingUpdate::Characteristic {
                        characteristic,
                        value: CharacteristicValue::encode(characteristic, value),
                        subscribers: state.subscriptions.subscribers(characteristic),
                    },
                    None => PendingUpdate::BatteryLevel(value as u8),
                };
                // One entry per channel at most.
                let _ = pending.push(update);
            }

            Applied {
                pending,
                payload: state.payload.to_bytes(),
                changed,
                newly_invalid,
            }
        })
    }

    /// Connect event from the BLE stack.
    ///
    /// The link is always counted. `tracked` is `Err(TooManyPeers)` when
    /// the subscription table has no slot left for it.
    pub fn on_connect(&self, conn: ConnHandle) -> Connected {
        let tracked = self.with_state(|state| state.subscriptions.register(conn));
        Connected {
            active: self.connections.on_connect(),
            tracked,
        }
    }

    /// Disconnect event from the BLE stack. Drops the peer's subscriptions
    /// and returns the new connection count (floored at zero).
    pub fn on_disconnect(&self, conn: ConnHandle) -> u32 {
        self.with_state(|state| state.subscriptions.remove(conn));
        self.connections.on_disconnect()
    }

    /// Raw CCC descriptor write. Invalid values leave the peer's
    /// subscriptions as they were.
    pub fn on_ccc_write(
        &self,
        conn: ConnHandle,
        characteristic: Characteristic,
        raw: u16,
    ) -> Result<CccOutcome, SubscriptionProtocolError> {
        self.with_state(|state| state.subscriptions.apply(conn, characteristic, raw))
    }

    /// Current readable value of a characteristic, `None` before the first
    /// successful sample.
    pub fn read_characteristic(&self, characteristic: Characteristic) -> Option<CharacteristicValue> {
        self.with_state(|state| {
            state
                .cache
                .get(characteristic.channel())
                .map(|v| CharacteristicValue::encode(characteristic, v))
        })
    }

    /// Last reported battery percentage.
    pub fn battery_level(&self) -> Option<u8> {
        self.with_state(|state| state.cache.get(Channel::Battery).map(|v| v as u8))
    }

    /// Last reported wire value of any channel.
    pub fn reported(&self, channel: Channel) -> Option<i32> {
        self.with_state(|state| state.cache.get(channel))
    }

    /// Serialized broadcast as currently published.
    pub fn payload_bytes(&self) -> [u8; PAYLOAD_LEN] {
        self.with_state(|state| state.payload.to_bytes())
    }

    pub fn connection_count(&self) -> u32 {
        self.connections.count()
    }

    pub fn is_connected(&self) -> bool {
        self.connections.is_connected()
    }
}
