//! Collaborator interfaces consumed by the update cycle.
//!
//! On target these are implemented over the BME68x driver, the SoftDevice
//! and the status LED; host tests plug in recording doubles.

use core::future::Future;

use super::channel::{Channel, Characteristic};
use super::notifier::CharacteristicValue;
use super::payload::PAYLOAD_LEN;
use super::subscriptions::Subscriber;
use crate::error::{AdvertisingError, NotifyError, SampleFetchError};

/// One raw sample in physical units. Not retained past clamping.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorReading {
    /// °C
    pub temperature: f32,
    /// %RH
    pub humidity: f32,
    /// Pa
    pub pressure: f32,
    /// ppm
    pub co2: f32,
    /// ppb
    pub voc: f32,
    /// Air-quality index, 0 (clean) to 500.
    pub iaq: f32,
    /// %
    pub battery: f32,
}

impl SensorReading {
    /// Raw value for one channel.
    pub fn get(&self, channel: Channel) -> f32 {
        match channel {
            Channel::Temperature => self.temperature,
            Channel::Humidity => self.humidity,
            Channel::Pressure => self.pressure,
            Channel::Co2 => self.co2,
            Channel::Voc => self.voc,
            Channel::Iaq => self.iaq,
            Channel::Battery => self.battery,
        }
    }
}

/// Produces one [`SensorReading`] per call.
pub trait SensorSource {
    fn fetch(&mut self) -> impl Future<Output = Result<SensorReading, SampleFetchError>>;
}

/// Republishes the broadcast.
///
/// Always receives the full service-data block; the implementation wraps
/// it into an advertising frame and restarts advertising with it.
pub trait Advertiser {
    fn publish(&mut self, payload: &[u8; PAYLOAD_LEN]) -> Result<(), AdvertisingError>;
}

/// GATT-side primitives of the BLE stack.
pub trait GattSink {
    /// Store the readable value of a characteristic.
    fn set_value(&mut self, characteristic: Characteristic, value: &CharacteristicValue);

    /// Push a value to one subscribed peer.
    fn notify(
        &mut self,
        subscriber: Subscriber,
        characteristic: Characteristic,
        value: &CharacteristicValue,
    ) -> Result<(), NotifyError>;

    /// Battery Service level update (stores and notifies).
    fn set_battery_level(&mut self, percent: u8) -> Result<(), NotifyError>;
}

/// Status signalling at the start of every cycle.
pub trait Indicator {
    fn blink(&mut self) -> impl Future<Output = ()>;
}

/// No-op indicator for boards without a status LED.
impl Indicator for () {
    async fn blink(&mut self) {}
}
