//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **GATT server** - Environmental Sensing Service (temperature,
//!    humidity, pressure, CO2, VOC, IAQ) and Battery Service.
//! 2. **Advertiser** - connectable undirected advertising carrying the
//!    BTHome service data; restarted whenever the update cycle publishes
//!    a new frame.
//! 3. **Connections** - one task per peer link running the GATT server
//!    and forwarding connect / disconnect / CCC events to the
//!    synchronization engine.
//!
//! The update cycle reaches the stack through [`gatt::SoftdeviceGatt`]
//! and [`advertiser::SignalAdvertiser`].

pub mod advertiser;
pub mod connections;
pub mod gatt;

use ensens::error::{AdvertisingError, NotifyError};
use nrf_softdevice::ble::gatt_server::{IndicateValueError, NotifyValueError};
use nrf_softdevice::ble::peripheral::AdvertiseError;

// Stack error mapping

pub(crate) fn notify_error(e: NotifyValueError) -> NotifyError {
    match e {
        NotifyValueError::Disconnected => NotifyError::NotSubscribed,
        NotifyValueError::Raw(raw) => NotifyError::Raw(raw as u32),
    }
}

pub(crate) fn indicate_error(e: IndicateValueError) -> NotifyError {
    match e {
        IndicateValueError::Disconnected => NotifyError::NotSubscribed,
        IndicateValueError::Raw(raw) => NotifyError::Raw(raw as u32),
    }
}

pub(crate) fn advertise_error(e: AdvertiseError) -> AdvertisingError {
    match e {
        AdvertiseError::NoFreeConn => AdvertisingError::Busy,
        AdvertiseError::Timeout => AdvertisingError::Busy,
        AdvertiseError::Raw(raw) => AdvertisingError::Raw(raw as u32),
    }
}
