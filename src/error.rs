//! Unified error types for the sensor node.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.
//!
//! No error in the synchronization engine is fatal: a failed sample is
//! skipped, a rejected advertisement is retried by the next cycle, a failed
//! notification is dropped and a malformed descriptor write is ignored.

/// A failure that cost the node a cycle's worth of fresh data.
///
/// Notify failures and bad descriptor writes are per-peer and never
/// surface here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The sensor could not deliver a sample this cycle.
    SampleFetch(SampleFetchError),

    /// The BLE stack refused to start or update advertising.
    Advertising(AdvertisingError),
}

/// Why the sensor collaborator failed to produce a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleFetchError {
    /// Sensor not probed / not present on the bus.
    Unavailable,
    /// Bus transaction failed.
    Bus,
    /// Measurement did not complete in time.
    Timeout,
    /// Chip reported data we cannot interpret.
    InvalidData,
}

/// Advertising start / update failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingError {
    /// Advertising frame does not fit a legacy advertisement.
    FrameTooLong,
    /// The stack is busy and did not take the update.
    Busy,
    /// Raw error code from the BLE stack.
    Raw(u32),
}

/// Invalid client configuration descriptor write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscriptionProtocolError {
    /// Value is none of disable (0), notify (1) or indicate (2).
    InvalidCccValue(u16),
    /// More peers than the subscription table can track.
    TooManyPeers,
}

/// Notification / indication send failures (absorbed by the notifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifyError {
    /// Peer is not subscribed (or already gone).
    NotSubscribed,
    /// TX queue full.
    Busy,
    /// Raw error code from the BLE stack.
    Raw(u32),
}

// Convenience conversions

impl From<SampleFetchError> for Error {
    fn from(e: SampleFetchError) -> Self {
        Error::SampleFetch(e)
    }
}

impl From<AdvertisingError> for Error {
    fn from(e: AdvertisingError) -> Self {
        Error::Advertising(e)
    }
}
