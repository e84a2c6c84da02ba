//! GATT services and the [`GattSink`] implementation over them.

use defmt::warn;
use ensens::error::NotifyError;
use ensens::sync::{Characteristic, CharacteristicValue, Delivery, GattSink, Subscriber};

use super::connections::PeerRegistry;
use super::{indicate_error, notify_error};

#[nrf_softdevice::gatt_service(uuid = "180f")]
pub struct BatteryService {
    #[characteristic(uuid = "2a19", read, notify)]
    pub battery_level: u8,
}

#[nrf_softdevice::gatt_service(uuid = "181a")]
pub struct EnvironmentalService {
    /// 0.01 °C
    #[characteristic(uuid = "2a6e", read, notify, indicate)]
    pub temperature: i16,
    /// 0.01 %
    #[characteristic(uuid = "2a6f", read, notify, indicate)]
    pub humidity: u16,
    /// Pa
    #[characteristic(uuid = "2a6d", read, notify, indicate)]
    pub pressure: u32,
    /// ppm
    #[characteristic(uuid = "2b8c", read, notify, indicate)]
    pub co2: u16,
    /// ppb
    #[characteristic(uuid = "2be7", read, notify, indicate)]
    pub voc: u16,
    #[characteristic(uuid = "e2890598-1286-43d6-82ba-121248bda7da", read, notify, indicate)]
    pub iaq: u16,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub bas: BatteryService,
    pub ess: EnvironmentalService,
}

/// Translate an ESS CCCD write into `(characteristic, raw CCC value)`.
///
/// Bit 0 is notifications, bit 1 indications, as on the wire.
pub fn ccc_write(event: &EnvironmentalServiceEvent) -> (Characteristic, u16) {
    let (characteristic, notifications, indications) = match *event {
        EnvironmentalServiceEvent::TemperatureCccdWrite {
            notifications,
            indications,
        } => (Characteristic::Temperature, notifications, indications),
        EnvironmentalServiceEvent::HumidityCccdWrite {
            notifications,
            indications,
        } => (Characteristic::Humidity, notifications, indications),
        EnvironmentalServiceEvent::PressureCccdWrite {
            notifications,
            indications,
        } => (Characteristic::Pressure, notifications, indications),
        EnvironmentalServiceEvent::Co2CccdWrite {
            notifications,
            indications,
        } => (Characteristic::Co2, notifications, indications),
        EnvironmentalServiceEvent::VocCccdWrite {
            notifications,
            indications,
        } => (Characteristic::Voc, notifications, indications),
        EnvironmentalServiceEvent::IaqCccdWrite {
            notifications,
            indications,
        } => (Characteristic::Iaq, notifications, indications),
    };
    (
        characteristic,
        notifications as u16 | (indications as u16) << 1,
    )
}

/// Update-cycle side of the GATT server.
pub struct SoftdeviceGatt {
    server: &'static Server,
    peers: &'static PeerRegistry,
}

impl SoftdeviceGatt {
    pub fn new(server: &'static Server, peers: &'static PeerRegistry) -> Self {
        Self { server, peers }
    }
}

impl GattSink for SoftdeviceGatt {
    fn set_value(&mut self, characteristic: Characteristic, value: &CharacteristicValue) {
        let ess = &self.server.ess;
        let result = match characteristic {
            Characteristic::Temperature => ess.temperature_set(&value.as_i16()),
            Characteristic::Humidity => ess.humidity_set(&value.as_u16()),
            Characteristic::Pressure => ess.pressure_set(&value.as_u32()),
            Characteristic::Co2 => ess.co2_set(&value.as_u16()),
            Characteristic::Voc => ess.voc_set(&value.as_u16()),
            Characteristic::Iaq => ess.iaq_set(&value.as_u16()),
        };
        if let Err(e) = result {
            warn!("{:?}: set value failed: {:?}", characteristic, e);
        }
    }

    fn notify(
        &mut self,
        subscriber: Subscriber,
        characteristic: Characteristic,
        value: &CharacteristicValue,
    ) -> Result<(), NotifyError> {
        let conn = self
            .peers
            .get(subscriber.conn)
            .ok_or(NotifyError::NotSubscribed)?;
        let ess = &self.server.ess;

        match subscriber.delivery {
            Delivery::Notification => match characteristic {
                Characteristic::Temperature => ess.temperature_notify(&conn, &value.as_i16()),
                Characteristic::Humidity => ess.humidity_notify(&conn, &value.as_u16()),
                Characteristic::Pressure => ess.pressure_notify(&conn, &value.as_u32()),
                Characteristic::Co2 => ess.co2_notify(&conn, &value.as_u16()),
                Characteristic::Voc => ess.voc_notify(&conn, &value.as_u16()),
                Characteristic::Iaq => ess.iaq_notify(&conn, &value.as_u16()),
            }
            .map_err(notify_error),
            Delivery::Indication => match characteristic {
                Characteristic::Temperature => ess.temperature_indicate(&conn, &value.as_i16()),
                Characteristic::Humidity => ess.humidity_indicate(&conn, &value.as_u16()),
                Characteristic::Pressure => ess.pressure_indicate(&conn, &value.as_u32()),
                Characteristic::Co2 => ess.co2_indicate(&conn, &value.as_u16()),
                Characteristic::Voc => ess.voc_indicate(&conn, &value.as_u16()),
                Characteristic::Iaq => ess.iaq_indicate(&conn, &value.as_u16()),
            }
            .map_err(indicate_error),
        }
    }

    fn set_battery_level(&mut self, percent: u8) -> Result<(), NotifyError> {
        if let Err(e) = self.server.bas.battery_level_set(&percent) {
            warn!("battery level set failed: {:?}", e);
        }

        let mut result = Ok(());
        for conn in self.peers.battery_subscribers() {
            if let Err(e) = self.server.bas.battery_level_notify(&conn, &percent) {
                result = Err(notify_error(e));
            }
        }
        result
    }
}
