//! Sensor collaborator: BME68x + battery gauge behind [`SensorSource`].

pub mod air_quality;
pub mod bme68x;

use core::future::Future;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use self::air_quality::AirQuality;
use self::bme68x::Bme68x;
use crate::battery;
use crate::error::SampleFetchError;
use crate::sync::ports::{SensorReading, SensorSource};

/// Cell voltage source (SAADC on target).
pub trait BatteryGauge {
    fn millivolts(&mut self) -> impl Future<Output = Result<u32, SampleFetchError>>;
}

/// Full environmental reading from one BME68x and a battery gauge.
///
/// A measurement without a stable heater keeps the previous air-quality
/// estimate; before the first good gas reading those channels are NaN.
pub struct EnvironmentSensor<I, D, B> {
    bme: Bme68x<I, D>,
    battery: B,
    last_air: Option<AirQuality>,
}

impl<I, D, B> EnvironmentSensor<I, D, B>
where
    I: I2c,
    D: DelayNs,
    B: BatteryGauge,
{
    pub fn new(bme: Bme68x<I, D>, battery: B) -> Self {
        Self {
            bme,
            battery,
            last_air: None,
        }
    }
}

impl<I, D, B> SensorSource for EnvironmentSensor<I, D, B>
where
    I: I2c,
    D: DelayNs,
    B: BatteryGauge,
{
    async fn fetch(&mut self) -> Result<SensorReading, SampleFetchError> {
        let m = self.bme.measure().await?;
        let mv = self.battery.millivolts().await?;

        let air = match m.gas_resistance {
            Some(ohm) => {
                let air = air_quality::estimate(ohm, m.temperature, m.humidity);
                self.last_air = Some(air);
                air
            }
            None => self.last_air.unwrap_or(AirQuality::UNKNOWN),
        };

        Ok(SensorReading {
            temperature: m.temperature,
            humidity: m.humidity,
            pressure: m.pressure,
            co2: air.co2,
            voc: air.voc,
            iaq: air.iaq,
            battery: battery::percent_from_millivolts(mv),
        })
    }
}
