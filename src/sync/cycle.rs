//! Update cycle driver.
//!
//! ```text
//!            ┌──────────── sleep period ────────────┐
//!            ▼                                      │
//!   ┌──── Sampling ────┐                         Idle
//!   │ blink            │                          ▲
//!   │ fetch ──err──────┼──────────────────────────┤
//!   │ apply (locked)   │                          │
//!   │ deliver updates  │                          │
//!   │ publish payload ─┼──────────────────────────┘
//!   └──────────────────┘
//! ```
//!
//! A failed fetch leaves every cache and the broadcast untouched, so the
//! last good values stay on air until the sensor recovers. Nothing here is
//! fatal: notify and advertising failures are counted in the report and
//! the next cycle simply tries again.

use embedded_hal_async::delay::DelayNs;

use super::channel::ChannelSet;
use super::engine::SyncEngine;
use super::notifier::PendingUpdate;
use super::ports::{Advertiser, GattSink, Indicator, SensorReading, SensorSource};
use crate::config;
use crate::error::{AdvertisingError, Error, SampleFetchError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleState {
    Sampling,
    Idle,
}

/// Summary of a cycle that got a sample through.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PublishReport {
    pub reading: SensorReading,
    pub changed: ChannelSet,
    /// Notifications / indications (and battery updates) the stack accepted.
    pub delivered: u16,
    /// Sends the stack refused. Dropped, never retried.
    pub notify_failures: u16,
    /// Channels that produced their first NaN this cycle.
    pub newly_invalid: ChannelSet,
    pub advertising: Result<(), AdvertisingError>,
}

/// What happened during one [`UpdateCycle::step`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleReport {
    SampleFailed(SampleFetchError),
    Published(PublishReport),
}

impl CycleReport {
    /// The failure that kept this cycle's data off the air, if any.
    pub fn error(&self) -> Option<Error> {
        match self {
            CycleReport::SampleFailed(e) => Some(Error::from(*e)),
            CycleReport::Published(r) => r.advertising.err().map(Error::from),
        }
    }
}

pub struct UpdateCycle<'a, S, A, G, I, D> {
    engine: &'a SyncEngine,
    sensor: S,
    advertiser: A,
    gatt: G,
    indicator: I,
    delay: D,
    period_ms: u32,
    state: CycleState,
}

impl<'a, S, A, G, I, D> UpdateCycle<'a, S, A, G, I, D>
where
    S: SensorSource,
    A: Advertiser,
    G: GattSink,
    I: Indicator,
    D: DelayNs,
{
    pub fn new(
        engine: &'a SyncEngine,
        sensor: S,
        advertiser: A,
        gatt: G,
        indicator: I,
        delay: D,
    ) -> Self {
        Self {
            engine,
            sensor,
            advertiser,
            gatt,
            indicator,
            delay,
            period_ms: config::SAMPLE_PERIOD_MS,
            state: CycleState::Sampling,
        }
    }

    /// Override the sleep between cycles.
    pub fn with_period_ms(mut self, period_ms: u32) -> Self {
        self.period_ms = period_ms;
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Run one cycle, including the trailing sleep.
    pub async fn step(&mut self) -> CycleReport {
        self.state = CycleState::Sampling;
        self.indicator.blink().await;

        let report = match self.sensor.fetch().await {
            Ok(reading) => CycleReport::Published(self.publish(reading)),
            Err(e) => CycleReport::SampleFailed(e),
        };

        self.state = CycleState::Idle;
        self.delay.delay_ms(self.period_ms).await;
        report
    }

    /// Loop forever, handing every report to `observe`.
    pub async fn run<F>(&mut self, mut observe: F) -> !
    where
        F: FnMut(&CycleReport),
    {
        loop {
            let report = self.step().await;
            observe(&report);
        }
    }

    fn publish(&mut self, reading: SensorReading) -> PublishReport {
        let applied = self.engine.apply(&reading);

        let mut delivered = 0u16;
        let mut notify_failures = 0u16;
        let mut tally = |ok: bool| {
            if ok {
                delivered = delivered.saturating_add(1);
            } else {
                notify_failures = notify_failures.saturating_add(1);
            }
        };

        for update in applied.pending {
            match update {
                PendingUpdate::Characteristic {
                    characteristic,
                    value,
                    subscribers,
                } => {
                    self.gatt.set_value(characteristic, &value);
                    for subscriber in subscribers {
                        tally(self.gatt.notify(subscriber, characteristic, &value).is_ok());
                    }
                }
                PendingUpdate::BatteryLevel(percent) => {
                    tally(self.gatt.set_battery_level(percent).is_ok());
                }
            }
        }

        let advertising = self.advertiser.publish(&applied.payload);

        PublishReport {
            reading,
            changed: applied.changed,
            delivered,
            notify_failures,
            newly_invalid: applied.newly_invalid,
            advertising,
        }
    }
}
