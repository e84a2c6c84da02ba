//! Status LED - one short blink per update cycle.

use embassy_nrf::gpio::{Level, Output, OutputDrive, Pin};
use embassy_nrf::Peripheral;
use embassy_time::Timer;
use ensens::config::LED_BLINK_MS;
use ensens::sync::Indicator;

/// Active-low LED (XIAO nRF52840 blue on P0.06).
pub struct StatusLed<'d> {
    pin: Output<'d>,
}

impl<'d> StatusLed<'d> {
    pub fn new(pin: impl Peripheral<P = impl Pin> + 'd) -> Self {
        Self {
            pin: Output::new(pin, Level::High, OutputDrive::Standard),
        }
    }
}

impl Indicator for StatusLed<'_> {
    async fn blink(&mut self) {
        self.pin.set_low();
        Timer::after_millis(LED_BLINK_MS.into()).await;
        self.pin.set_high();
    }
}
