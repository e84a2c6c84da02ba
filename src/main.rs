//! ensens - environmental sensor node firmware.
//!
//! Target: Seeed XIAO nRF52840 (Sense) + BME688 on TWIM0, SoftDevice S140.
//!
//! ```text
//!   BME68x ──I2C──┐
//!   VDD ──SAADC───┤
//!                 ▼
//!           cycle_task ──► SyncEngine ──► GATT (ESS + BAS) ──► centrals
//!                 │                 ▲
//!                 ▼                 │ connect / CCC / disconnect
//!        advertiser_task ──► BTHome advertisement
//! ```
//!
//! Build: `cargo build --release --features embedded`
//! Flash: `probe-rs run --chip nRF52840_xxAA` (S140 must already be flashed)

#![no_std]
#![no_main]

mod ble;
mod led;
mod power;

use core::mem;

use defmt::{error, info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::peripherals::TWISPI0;
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, saadc};
use embassy_time::Delay;
use ensens::config::{self, MAX_CONNECTIONS};
use ensens::error::Error;
use ensens::identity::default_device_name;
use ensens::sensor::bme68x::Bme68x;
use ensens::sensor::EnvironmentSensor;
use ensens::sync::{CycleReport, SyncEngine, UpdateCycle};
use heapless::String;
use nrf_softdevice::{raw, Softdevice};
use panic_probe as _;
use static_cell::StaticCell;

use crate::ble::advertiser::{advertiser_task, SignalAdvertiser};
use crate::ble::connections::PeerRegistry;
use crate::ble::gatt::{Server, SoftdeviceGatt};
use crate::led::StatusLed;
use crate::power::SaadcGauge;

bind_interrupts!(struct Irqs {
    TWISPI0 => twim::InterruptHandler<TWISPI0>;
    SAADC => saadc::InterruptHandler;
});

// ═══════════════════════════════════════════════════════════════════════════
// Shared state
// ═══════════════════════════════════════════════════════════════════════════

static ENGINE: SyncEngine = SyncEngine::new();
static PEERS: PeerRegistry = PeerRegistry::new();

static DEVICE_NAME: StaticCell<String<{ config::DEVICE_NAME_LEN }>> = StaticCell::new();
static SERVER: StaticCell<Server> = StaticCell::new();

type Sensor = EnvironmentSensor<Twim<'static, TWISPI0>, Delay, SaadcGauge<'static>>;
type Cycle = UpdateCycle<'static, Sensor, SignalAdvertiser, SoftdeviceGatt, StatusLed<'static>, Delay>;

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn cycle_task(mut cycle: Cycle) -> ! {
    info!("update cycle: every {} ms", cycle.period_ms());
    cycle.run(log_report).await
}

fn log_report(report: &CycleReport) {
    if let CycleReport::Published(r) = report {
        let m = &r.reading;
        info!(
            "T={}C H={}% P={}Pa CO2={} VOC={} IAQ={} bat={}%",
            m.temperature, m.humidity, m.pressure, m.co2, m.voc, m.iaq, m.battery
        );
        for channel in r.newly_invalid.iter() {
            warn!("{:?}: invalid reading", channel);
        }
        if !r.changed.is_empty() {
            info!(
                "{} channel(s) changed, {} sent, {} dropped, {} peer(s)",
                r.changed.len(),
                r.delivered,
                r.notify_failures,
                ENGINE.connection_count()
            );
        }
    }
    match report.error() {
        Some(Error::SampleFetch(e)) => warn!("sample failed: {:?}", e),
        Some(Error::Advertising(e)) => error!("advertising update failed: {:?}", e),
        None => {}
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Bring-up
// ═══════════════════════════════════════════════════════════════════════════

fn hardware_id() -> u64 {
    let ficr = embassy_nrf::pac::FICR;
    let lo = ficr.deviceid(0).read() as u64;
    let hi = ficr.deviceid(1).read() as u64;
    hi << 32 | lo
}

fn softdevice_config(name: &'static str) -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: MAX_CONNECTIONS as u8,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t {
            att_mtu: config::BLE_ATT_MTU,
        }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: MAX_CONNECTIONS as u8,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: name.as_ptr() as _,
            current_len: name.len() as u16,
            max_len: name.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ensens starting");

    // The SoftDevice reserves priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);
    interrupt::TWISPI0.set_priority(Priority::P3);
    interrupt::SAADC.set_priority(Priority::P3);

    // ── Identity ─────────────────────────────────────────────────────────
    let name: &'static String<{ config::DEVICE_NAME_LEN }> =
        DEVICE_NAME.init(default_device_name(hardware_id()));
    let name: &'static str = name.as_str();
    info!("device name: {}", name);

    // ── BLE stack ────────────────────────────────────────────────────────
    let sd = Softdevice::enable(&softdevice_config(name));
    let server: &'static Server = match Server::new(sd) {
        Ok(server) => SERVER.init(server),
        Err(e) => defmt::panic!("GATT registration failed: {:?}", e),
    };
    if spawner.spawn(softdevice_task(sd)).is_err() {
        defmt::panic!("softdevice task already running");
    }

    // ── Sensor ───────────────────────────────────────────────────────────
    let i2c = Twim::new(p.TWISPI0, Irqs, p.P0_04, p.P0_05, twim::Config::default());
    let bme = match Bme68x::probe(
        i2c,
        Delay,
        config::BME68X_I2C_ADDR,
        config::BME68X_HEATER_TEMP_C,
        config::BME68X_HEATER_MS,
    )
    .await
    {
        Ok(bme) => bme,
        Err(e) => defmt::panic!("BME68x not found: {:?}", e),
    };
    info!("BME68x variant {:?}", bme.variant());

    let gauge = SaadcGauge::new(p.SAADC, Irqs).await;
    let sensor = EnvironmentSensor::new(bme, gauge);

    // ── Tasks ────────────────────────────────────────────────────────────
    if spawner
        .spawn(advertiser_task(sd, server, &ENGINE, &PEERS, name))
        .is_err()
    {
        defmt::panic!("advertiser task already running");
    }

    let cycle = UpdateCycle::new(
        &ENGINE,
        sensor,
        SignalAdvertiser::new(name),
        SoftdeviceGatt::new(server, &PEERS),
        StatusLed::new(p.P0_06),
        Delay,
    );
    if spawner.spawn(cycle_task(cycle)).is_err() {
        defmt::panic!("cycle task already running");
    }
}
