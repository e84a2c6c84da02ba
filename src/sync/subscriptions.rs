//! Client Characteristic Configuration (CCC) state per connected peer.
//!
//! Raw descriptor values:
//! ```text
//! 0x0000  disable
//! 0x0001  notifications
//! 0x0002  indications
//! ```
//! Anything else is a protocol error: it is reported to the caller for
//! logging and the peer keeps whatever configuration it had before.

use heapless::Vec;

use super::channel::Characteristic;
use crate::config::MAX_CONNECTIONS;
use crate::error::SubscriptionProtocolError;

pub const CCC_DISABLE: u16 = 0x0000;
pub const CCC_NOTIFY: u16 = 0x0001;
pub const CCC_INDICATE: u16 = 0x0002;

/// Stack-assigned connection handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnHandle(pub u16);

/// How a peer wants value changes pushed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscriptionMode {
    #[default]
    Disabled,
    Notify,
    Indicate,
}

impl SubscriptionMode {
    /// Decode a raw CCC descriptor value.
    pub fn from_ccc(raw: u16) -> Result<Self, SubscriptionProtocolError> {
        match raw {
            CCC_DISABLE => Ok(SubscriptionMode::Disabled),
            CCC_NOTIFY => Ok(SubscriptionMode::Notify),
            CCC_INDICATE => Ok(SubscriptionMode::Indicate),
            other => Err(SubscriptionProtocolError::InvalidCccValue(other)),
        }
    }

    pub const fn delivery(self) -> Option<Delivery> {
        match self {
            SubscriptionMode::Disabled => None,
            SubscriptionMode::Notify => Some(Delivery::Notification),
            SubscriptionMode::Indicate => Some(Delivery::Indication),
        }
    }
}

/// Push flavour for one subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Delivery {
    Notification,
    Indication,
}

/// One peer that should receive a characteristic update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Subscriber {
    pub conn: ConnHandle,
    pub delivery: Delivery,
}

/// Result of an accepted CCC write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CccOutcome {
    pub conn: ConnHandle,
    pub characteristic: Characteristic,
    pub previous: SubscriptionMode,
    pub current: SubscriptionMode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct PeerEntry {
    conn: ConnHandle,
    modes: [SubscriptionMode; Characteristic::COUNT],
}

impl PeerEntry {
    fn new(conn: ConnHandle) -> Self {
        Self {
            conn,
            modes: [SubscriptionMode::Disabled; Characteristic::COUNT],
        }
    }
}

/// CCC configuration of every connected peer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionTable {
    peers: Vec<PeerEntry, MAX_CONNECTIONS>,
}

impl SubscriptionTable {
    pub const fn new() -> Self {
        Self { peers: Vec::new() }
    }

    /// Start tracking a peer with every characteristic disabled.
    /// Re-registering a known handle resets it.
    pub fn register(&mut self, conn: ConnHandle) -> Result<(), SubscriptionProtocolError> {
        if let Some(entry) = self.peers.iter_mut().find(|p| p.conn == conn) {
            *entry = PeerEntry::new(conn);
            return Ok(());
        }
        self.peers
            .push(PeerEntry::new(conn))
            .map_err(|_| SubscriptionProtocolError::TooManyPeers)
    }

    /// Forget a peer and all of its subscriptions.
    pub fn remove(&mut self, conn: ConnHandle) {
        if let Some(pos) = self.peers.iter().position(|p| p.conn == conn) {
            self.peers.swap_remove(pos);
        }
    }

    /// Apply a raw CCC write.
    ///
    /// Invalid values leave the table untouched. A write from a peer that
    /// was never registered (connect event not yet delivered) registers it.
    pub fn apply(
        &mut self,
        conn: ConnHandle,
        characteristic: Characteristic,
        raw: u16,
    ) -> Result<CccOutcome, SubscriptionProtocolError> {
        let current = SubscriptionMode::from_ccc(raw)?;

        if !self.peers.iter().any(|p| p.conn == conn) {
            self.register(conn)?;
        }
        let entry = self
            .peers
            .iter_mut()
            .find(|p| p.conn == conn)
            .ok_or(SubscriptionProtocolError::TooManyPeers)?;

        let slot = &mut entry.modes[characteristic.index()];
        let previous = *slot;
        *slot = current;

        Ok(CccOutcome {
            conn,
            characteristic,
            previous,
            current,
        })
    }

    #[cfg(test)]
    pub fn mode(&self, conn: ConnHandle, characteristic: Characteristic) -> SubscriptionMode {
        self.peers
            .iter()
            .find(|p| p.conn == conn)
            .map(|p| p.modes[characteristic.index()])
            .unwrap_or_default()
    }

    /// Peers subscribed to `characteristic`, with their delivery flavour.
    pub fn subscribers(&self, characteristic: Characteristic) -> Vec<Subscriber, MAX_CONNECTIONS> {
        let mut out = Vec::new();
        for peer in &self.peers {
            if let Some(delivery) = peer.modes[characteristic.index()].delivery() {
                // Capacity matches the peer table.
                let _ = out.push(Subscriber {
                    conn: peer.conn,
                    delivery,
                });
            }
        }
        out
    }

    #[cfg(test)]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}
