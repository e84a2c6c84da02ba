//! Sensor-state to BLE synchronization engine.
//!
//! Data flows one way per cycle:
//!
//! ```text
//! SensorReading ─► clamp ─► ChannelCache ─┬─► BroadcastPayload ─► Advertiser
//!                                         └─► PendingUpdate ────► GattSink
//! ```
//!
//! Connection and subscription state flow in from the BLE stack through
//! [`SyncEngine`] and are only read, never waited on, by the cycle.

pub mod channel;
pub mod clamp;
pub mod connections;
pub mod cycle;
pub mod engine;
pub mod notifier;
pub mod payload;
pub mod ports;
pub mod subscriptions;

pub use channel::{Channel, ChannelSet, Characteristic};
pub use connections::ConnectionCount;
pub use cycle::{CycleReport, CycleState, PublishReport, UpdateCycle};
pub use engine::{Applied, Connected, SyncEngine};
pub use notifier::{CharacteristicValue, PendingUpdate};
pub use payload::{BroadcastPayload, PAYLOAD_LEN};
pub use ports::{Advertiser, GattSink, Indicator, SensorReading, SensorSource};
pub use subscriptions::{CccOutcome, ConnHandle, Delivery, Subscriber, SubscriptionMode};
