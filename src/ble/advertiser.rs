//! Connectable advertising with a replaceable frame.
//!
//! The update cycle hands every new frame to [`ADV_FRAME`]; the advertiser
//! task cancels the running advertisement and restarts it with the new
//! data. Accepted connections are handed to a pooled connection task and
//! advertising resumes immediately.

use defmt::{info, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use ensens::config;
use ensens::error::AdvertisingError;
use ensens::sync::payload::{advertisement, ADV_DATA_MAX, PAYLOAD_LEN};
use ensens::sync::{Advertiser, SyncEngine};
use heapless::Vec;
use nrf_softdevice::ble::peripheral;
use nrf_softdevice::Softdevice;

use super::advertise_error;
use super::connections::{connection_task, PeerRegistry};
use super::gatt::Server;

pub type AdvFrame = Vec<u8, ADV_DATA_MAX>;

/// Latest advertising frame published by the update cycle.
pub static ADV_FRAME: Signal<CriticalSectionRawMutex, AdvFrame> = Signal::new();

/// Back-off after the stack refused to start advertising (e.g. every
/// peripheral link is in use).
const ADV_RETRY_MS: u64 = 1_000;

/// [`Advertiser`] that forwards frames to [`advertiser_task`].
pub struct SignalAdvertiser {
    name: &'static str,
    last: Option<[u8; PAYLOAD_LEN]>,
}

impl SignalAdvertiser {
    pub fn new(name: &'static str) -> Self {
        Self { name, last: None }
    }
}

impl Advertiser for SignalAdvertiser {
    fn publish(&mut self, payload: &[u8; PAYLOAD_LEN]) -> Result<(), AdvertisingError> {
        // An identical frame is already on air.
        if self.last.as_ref() == Some(payload) {
            return Ok(());
        }
        let frame = advertisement(self.name, payload)?;
        ADV_FRAME.signal(frame);
        self.last = Some(*payload);
        Ok(())
    }
}

#[embassy_executor::task]
pub async fn advertiser_task(
    sd: &'static Softdevice,
    server: &'static Server,
    engine: &'static SyncEngine,
    peers: &'static PeerRegistry,
    name: &'static str,
) -> ! {
    let spawner = Spawner::for_current_executor().await;

    let mut frame = match advertisement(name, &engine.payload_bytes()) {
        Ok(frame) => frame,
        Err(e) => defmt::panic!("boot advertisement invalid: {:?}", e),
    };
    info!("advertising as {}", name);

    loop {
        let adv_config = peripheral::Config {
            interval: config::BLE_ADV_INTERVAL,
            ..Default::default()
        };
        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: frame.as_slice(),
            scan_data: &[],
        };

        let outcome = select(
            peripheral::advertise_connectable(sd, adv, &adv_config),
            ADV_FRAME.wait(),
        )
        .await;

        match outcome {
            Either::First(Ok(conn)) => {
                if spawner
                    .spawn(connection_task(conn, server, engine, peers))
                    .is_err()
                {
                    // Dropping the connection disconnects it.
                    warn!("no free connection task");
                }
            }
            Either::First(Err(e)) => {
                warn!("advertising failed: {:?}", advertise_error(e));
                if let Either::Second(next) =
                    select(Timer::after_millis(ADV_RETRY_MS), ADV_FRAME.wait()).await
                {
                    frame = next;
                }
            }
            Either::Second(next) => frame = next,
        }
    }
}
