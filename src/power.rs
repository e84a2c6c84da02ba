//! Battery gauge - supply voltage through the SAADC.
//!
//! The node runs straight off the cell (no regulator in front of VDD), so
//! the internal VDD input is the battery voltage:
//! - Gain 1/6, internal 0.6 V reference: 3.6 V full scale
//! - 12-bit resolution
//!
//! Conversion to percent happens in the library ([`ensens::battery`]).

use defmt::debug;
use embassy_nrf::interrupt::typelevel::Binding;
use embassy_nrf::peripherals::SAADC;
use embassy_nrf::saadc::{self, ChannelConfig, InterruptHandler, Saadc, VddInput};
use embassy_nrf::Peripheral;
use ensens::battery;
use ensens::error::SampleFetchError;
use ensens::sensor::BatteryGauge;

/// One-channel SAADC reading VDD.
pub struct SaadcGauge<'d> {
    adc: Saadc<'d, 1>,
}

impl<'d> SaadcGauge<'d> {
    /// Configure the converter and run offset calibration once.
    pub async fn new(
        saadc: impl Peripheral<P = SAADC> + 'd,
        irq: impl Binding<embassy_nrf::interrupt::typelevel::SAADC, InterruptHandler> + 'd,
    ) -> Self {
        let channel = ChannelConfig::single_ended(VddInput);
        let adc = Saadc::new(saadc, irq, saadc::Config::default(), [channel]);
        adc.calibrate().await;
        Self { adc }
    }
}

impl BatteryGauge for SaadcGauge<'_> {
    async fn millivolts(&mut self) -> Result<u32, SampleFetchError> {
        let mut buf = [0i16; 1];
        self.adc.sample(&mut buf).await;
        let mv = battery::saadc_millivolts(buf[0]);
        debug!("battery: raw={} {}mV", buf[0], mv);
        Ok(mv)
    }
}
