//! Integration tests for the ensens update cycle over test doubles.
//!
//! The doubles share one `Log` so a test can drive the cycle and then
//! inspect everything it pushed at the (fake) BLE stack.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use embassy_futures::block_on;
use embedded_hal_async::delay::DelayNs;
use ensens::error::{
    AdvertisingError, Error, NotifyError, SampleFetchError, SubscriptionProtocolError,
};
use ensens::sync::subscriptions::{CCC_DISABLE, CCC_INDICATE, CCC_NOTIFY};
use ensens::sync::{
    Advertiser, Channel, Characteristic, CharacteristicValue, ConnHandle, CycleReport, CycleState,
    Delivery, GattSink, Indicator, SensorReading, SensorSource, Subscriber, SyncEngine,
    UpdateCycle, PAYLOAD_LEN,
};

// ═══════════════════════════════════════════════════════════════════════════
// Test doubles
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Log {
    blinks: u32,
    sleeps: Vec<u32>,
    advertised: Vec<[u8; PAYLOAD_LEN]>,
    values: Vec<(Characteristic, CharacteristicValue)>,
    sent: Vec<(Subscriber, Characteristic, CharacteristicValue)>,
    battery: Vec<u8>,
    fail_notify: bool,
    fail_advertising: bool,
}

type Shared = Rc<RefCell<Log>>;

struct ScriptedSensor {
    script: VecDeque<Result<SensorReading, SampleFetchError>>,
}

impl ScriptedSensor {
    fn new(script: impl IntoIterator<Item = Result<SensorReading, SampleFetchError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl SensorSource for ScriptedSensor {
    async fn fetch(&mut self) -> Result<SensorReading, SampleFetchError> {
        self.script
            .pop_front()
            .unwrap_or(Err(SampleFetchError::Unavailable))
    }
}

struct FakeAdvertiser(Shared);

impl Advertiser for FakeAdvertiser {
    fn publish(&mut self, payload: &[u8; PAYLOAD_LEN]) -> Result<(), AdvertisingError> {
        let mut log = self.0.borrow_mut();
        if log.fail_advertising {
            return Err(AdvertisingError::Busy);
        }
        log.advertised.push(*payload);
        Ok(())
    }
}

struct FakeGatt(Shared);

impl GattSink for FakeGatt {
    fn set_value(&mut self, characteristic: Characteristic, value: &CharacteristicValue) {
        self.0.borrow_mut().values.push((characteristic, *value));
    }

    fn notify(
        &mut self,
        subscriber: Subscriber,
        characteristic: Characteristic,
        value: &CharacteristicValue,
    ) -> Result<(), NotifyError> {
        let mut log = self.0.borrow_mut();
        if log.fail_notify {
            return Err(NotifyError::Busy);
        }
        log.sent.push((subscriber, characteristic, *value));
        Ok(())
    }

    fn set_battery_level(&mut self, percent: u8) -> Result<(), NotifyError> {
        self.0.borrow_mut().battery.push(percent);
        Ok(())
    }
}

struct FakeLed(Shared);

impl Indicator for FakeLed {
    async fn blink(&mut self) {
        self.0.borrow_mut().blinks += 1;
    }
}

struct FakeDelay(Shared);

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, _ns: u32) {}

    async fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().sleeps.push(ms);
    }
}

type TestCycle<'a> = UpdateCycle<'a, ScriptedSensor, FakeAdvertiser, FakeGatt, FakeLed, FakeDelay>;

fn cycle<'a>(
    engine: &'a SyncEngine,
    script: impl IntoIterator<Item = Result<SensorReading, SampleFetchError>>,
) -> (TestCycle<'a>, Shared) {
    let log = Shared::default();
    let cycle = UpdateCycle::new(
        engine,
        ScriptedSensor::new(script),
        FakeAdvertiser(log.clone()),
        FakeGatt(log.clone()),
        FakeLed(log.clone()),
        FakeDelay(log.clone()),
    );
    (cycle, log)
}

fn office() -> SensorReading {
    SensorReading {
        temperature: 21.5,
        humidity: 45.25,
        pressure: 101_325.0,
        co2: 412.0,
        voc: 120.0,
        iaq: 75.0,
        battery: 87.0,
    }
}

const OFFICE_PAYLOAD: [u8; PAYLOAD_LEN] = [
    0xD2, 0xFC, // BTHome UUID
    0x40, // v2, unencrypted
    0x01, 0x57, // battery 87 %
    0x02, 0x66, 0x08, // 21.50 °C
    0x03, 0xAD, 0x11, // 45.25 %
    0x04, 0xCD, 0x8B, 0x01, // 101325 Pa
    0x12, 0x9C, 0x01, // 412 ppm
];

fn published(report: CycleReport) -> ensens::sync::PublishReport {
    match report {
        CycleReport::Published(r) => r,
        CycleReport::SampleFailed(e) => panic!("expected a published cycle, got {:?}", e),
    }
}

fn sent_for(log: &Shared, characteristic: Characteristic) -> Vec<(ConnHandle, Delivery)> {
    log.borrow()
        .sent
        .iter()
        .filter(|(_, c, _)| *c == characteristic)
        .map(|(s, _, _)| (s.conn, s.delivery))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// Full cycle
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn full_cycle_publishes_reference_payload() {
    let engine = SyncEngine::new();
    let (mut cycle, log) = cycle(&engine, [Ok(office())]);

    let report = published(block_on(cycle.step()));

    assert_eq!(report.changed.len(), Channel::COUNT);
    assert!(report.newly_invalid.is_empty());
    assert_eq!(report.advertising, Ok(()));
    assert_eq!(cycle.state(), CycleState::Idle);

    let log = log.borrow();
    assert_eq!(log.blinks, 1);
    assert_eq!(log.sleeps, vec![ensens::config::SAMPLE_PERIOD_MS]);
    assert_eq!(log.advertised, vec![OFFICE_PAYLOAD]);
    assert_eq!(engine.payload_bytes(), OFFICE_PAYLOAD);
    assert_eq!(log.battery, vec![87]);
    // No peers: values stored, nothing pushed.
    assert_eq!(log.values.len(), 6);
    assert!(log.sent.is_empty());
}

#[test]
fn characteristics_are_readable_after_first_cycle() {
    let engine = SyncEngine::new();
    assert_eq!(engine.read_characteristic(Characteristic::Temperature), None);

    let (mut cycle, _log) = cycle(&engine, [Ok(office())]);
    block_on(cycle.step());

    let read = |c| engine.read_characteristic(c).unwrap();
    assert_eq!(read(Characteristic::Temperature).as_i16(), 2150);
    assert_eq!(read(Characteristic::Humidity).as_u16(), 4525);
    assert_eq!(read(Characteristic::Pressure).as_u32(), 101_325);
    assert_eq!(read(Characteristic::Co2).as_u16(), 412);
    assert_eq!(read(Characteristic::Voc).as_u16(), 120);
    assert_eq!(read(Characteristic::Iaq).as_u16(), 75);
    assert_eq!(engine.battery_level(), Some(87));
}

#[test]
fn out_of_range_reading_is_clamped_before_publishing() {
    let engine = SyncEngine::new();
    let hot = SensorReading {
        temperature: 120.0,
        humidity: -3.0,
        pressure: 20_000.0,
        iaq: 900.0,
        battery: 140.0,
        ..office()
    };
    let (mut cycle, log) = cycle(&engine, [Ok(hot)]);
    block_on(cycle.step());

    assert_eq!(engine.reported(Channel::Temperature), Some(8_500));
    assert_eq!(engine.reported(Channel::Humidity), Some(0));
    assert_eq!(engine.reported(Channel::Pressure), Some(30_000));
    assert_eq!(engine.reported(Channel::Iaq), Some(500));
    assert_eq!(log.borrow().battery, vec![100]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Sample failures
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn fetch_failure_keeps_last_good_state_and_still_sleeps() {
    let engine = SyncEngine::new();
    let (mut cycle, log) = cycle(&engine, [Ok(office()), Err(SampleFetchError::Bus)]);

    block_on(cycle.step());
    let before = log.borrow().values.len();

    let report = block_on(cycle.step());
    assert_eq!(report, CycleReport::SampleFailed(SampleFetchError::Bus));
    assert_eq!(cycle.state(), CycleState::Idle);
    assert_eq!(engine.payload_bytes(), OFFICE_PAYLOAD);
    assert_eq!(engine.reported(Channel::Temperature), Some(2_150));

    let log = log.borrow();
    assert_eq!(log.blinks, 2);
    assert_eq!(log.sleeps.len(), 2);
    assert_eq!(log.advertised.len(), 1);
    assert_eq!(log.values.len(), before);
}

#[test]
fn failure_before_first_sample_leaves_everything_unreported() {
    let engine = SyncEngine::new();
    let (mut cycle, log) = cycle(&engine, [Err(SampleFetchError::Timeout)]);

    let report = block_on(cycle.step());
    assert_eq!(report, CycleReport::SampleFailed(SampleFetchError::Timeout));
    for channel in Channel::ALL {
        assert_eq!(engine.reported(channel), None);
    }
    assert_eq!(engine.payload_bytes()[..3], [0xD2, 0xFC, 0x40]);
    assert!(log.borrow().advertised.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// Change gating
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn identical_readings_notify_once() {
    let engine = SyncEngine::new();
    engine.on_connect(ConnHandle(1));
    engine
        .on_ccc_write(ConnHandle(1), Characteristic::Temperature, CCC_NOTIFY)
        .unwrap();

    let (mut cycle, log) = cycle(&engine, [Ok(office()), Ok(office()), Ok(office())]);
    let first = published(block_on(cycle.step()));
    let second = published(block_on(cycle.step()));
    let third = published(block_on(cycle.step()));

    assert_eq!(first.delivered, 2); // temperature + battery
    assert!(second.changed.is_empty());
    assert!(third.changed.is_empty());
    assert_eq!(second.delivered, 0);
    assert_eq!(
        sent_for(&log, Characteristic::Temperature),
        vec![(ConnHandle(1), Delivery::Notification)]
    );
    assert_eq!(log.borrow().battery, vec![87]);
}

#[test]
fn sub_resolution_jitter_is_not_a_change() {
    let engine = SyncEngine::new();
    let jitter = SensorReading {
        temperature: 21.501,
        ..office()
    };
    let (mut cycle, _log) = cycle(&engine, [Ok(office()), Ok(jitter)]);

    block_on(cycle.step());
    let report = published(block_on(cycle.step()));
    assert!(report.changed.is_empty());
}

#[test]
fn only_changed_channels_are_pushed() {
    let engine = SyncEngine::new();
    engine.on_connect(ConnHandle(3));
    for c in Characteristic::ALL {
        engine.on_ccc_write(ConnHandle(3), c, CCC_NOTIFY).unwrap();
    }
    let warmer = SensorReading {
        temperature: 22.0,
        ..office()
    };
    let (mut cycle, log) = cycle(&engine, [Ok(office()), Ok(warmer)]);

    block_on(cycle.step());
    log.borrow_mut().sent.clear();
    let report = published(block_on(cycle.step()));

    assert_eq!(report.changed.len(), 1);
    assert!(report.changed.contains(Channel::Temperature));
    let log = log.borrow();
    assert_eq!(log.sent.len(), 1);
    assert_eq!(log.sent[0].1, Characteristic::Temperature);
    assert_eq!(log.sent[0].2.as_i16(), 2_200);
    assert_eq!(log.advertised.len(), 2);
    assert_eq!(log.advertised[1][6..8], 2_200i16.to_le_bytes());
}

#[test]
fn zero_is_reported_on_first_cycle() {
    let engine = SyncEngine::new();
    let zeros = SensorReading {
        temperature: 0.0,
        humidity: 0.0,
        pressure: 30_000.0,
        co2: 0.0,
        voc: 0.0,
        iaq: 0.0,
        battery: 0.0,
    };
    let (mut cycle, log) = cycle(&engine, [Ok(zeros)]);

    let report = published(block_on(cycle.step()));
    assert_eq!(report.changed.len(), Channel::COUNT);
    assert_eq!(log.borrow().battery, vec![0]);
}

#[test]
fn nan_is_flagged_once_and_reported_as_minimum() {
    let engine = SyncEngine::new();
    let broken = SensorReading {
        humidity: f32::NAN,
        ..office()
    };
    let (mut cycle, _log) = cycle(&engine, [Ok(broken), Ok(broken)]);

    let first = published(block_on(cycle.step()));
    let second = published(block_on(cycle.step()));

    assert!(first.newly_invalid.contains(Channel::Humidity));
    assert_eq!(first.newly_invalid.len(), 1);
    assert!(second.newly_invalid.is_empty());
    assert_eq!(engine.reported(Channel::Humidity), Some(0));
}

// ═══════════════════════════════════════════════════════════════════════════
// Subscriptions
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn each_peer_gets_its_own_delivery_mode() {
    let engine = SyncEngine::new();
    engine.on_connect(ConnHandle(1));
    engine.on_connect(ConnHandle(2));
    engine
        .on_ccc_write(ConnHandle(1), Characteristic::Co2, CCC_NOTIFY)
        .unwrap();
    engine
        .on_ccc_write(ConnHandle(2), Characteristic::Co2, CCC_INDICATE)
        .unwrap();

    let (mut cycle, log) = cycle(&engine, [Ok(office())]);
    let report = published(block_on(cycle.step()));

    let mut co2 = sent_for(&log, Characteristic::Co2);
    co2.sort_by_key(|(conn, _)| conn.0);
    assert_eq!(
        co2,
        vec![
            (ConnHandle(1), Delivery::Notification),
            (ConnHandle(2), Delivery::Indication),
        ]
    );
    assert_eq!(report.delivered, 3); // 2 x CO2 + battery
}

#[test]
fn invalid_ccc_write_is_rejected_and_ignored() {
    let engine = SyncEngine::new();
    engine.on_connect(ConnHandle(1));
    engine
        .on_ccc_write(ConnHandle(1), Characteristic::Voc, CCC_NOTIFY)
        .unwrap();

    assert_eq!(
        engine.on_ccc_write(ConnHandle(1), Characteristic::Voc, 0x0003),
        Err(SubscriptionProtocolError::InvalidCccValue(0x0003))
    );

    let (mut cycle, log) = cycle(&engine, [Ok(office())]);
    block_on(cycle.step());
    assert_eq!(
        sent_for(&log, Characteristic::Voc),
        vec![(ConnHandle(1), Delivery::Notification)]
    );
}

#[test]
fn unsubscribing_stops_pushes() {
    let engine = SyncEngine::new();
    engine.on_connect(ConnHandle(1));
    engine
        .on_ccc_write(ConnHandle(1), Characteristic::Iaq, CCC_NOTIFY)
        .unwrap();
    let worse = SensorReading {
        iaq: 180.0,
        ..office()
    };
    let (mut cycle, log) = cycle(&engine, [Ok(office()), Ok(worse)]);

    block_on(cycle.step());
    engine
        .on_ccc_write(ConnHandle(1), Characteristic::Iaq, CCC_DISABLE)
        .unwrap();
    block_on(cycle.step());

    assert_eq!(sent_for(&log, Characteristic::Iaq).len(), 1);
    assert_eq!(
        engine.read_characteristic(Characteristic::Iaq).unwrap().as_u16(),
        180
    );
}

#[test]
fn disconnect_drops_subscriptions() {
    let engine = SyncEngine::new();
    engine.on_connect(ConnHandle(7));
    engine
        .on_ccc_write(ConnHandle(7), Characteristic::Pressure, CCC_INDICATE)
        .unwrap();
    engine.on_disconnect(ConnHandle(7));

    let (mut cycle, log) = cycle(&engine, [Ok(office())]);
    let report = published(block_on(cycle.step()));

    assert!(sent_for(&log, Characteristic::Pressure).is_empty());
    assert_eq!(report.delivered, 1); // battery only
}

// ═══════════════════════════════════════════════════════════════════════════
// Connection accounting
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn connection_count_never_goes_negative() {
    let engine = SyncEngine::new();
    assert_eq!(engine.on_connect(ConnHandle(1)).active, 1);
    assert_eq!(engine.on_connect(ConnHandle(2)).active, 2);
    assert_eq!(engine.on_disconnect(ConnHandle(1)), 1);
    assert_eq!(engine.on_disconnect(ConnHandle(2)), 0);
    assert_eq!(engine.on_disconnect(ConnHandle(2)), 0);
    assert_eq!(engine.connection_count(), 0);
    assert!(!engine.is_connected());
}

// ═══════════════════════════════════════════════════════════════════════════
// Delivery failures
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn notify_failures_are_counted_and_cache_still_advances() {
    let engine = SyncEngine::new();
    engine.on_connect(ConnHandle(1));
    engine
        .on_ccc_write(ConnHandle(1), Characteristic::Humidity, CCC_NOTIFY)
        .unwrap();
    let (mut cycle, log) = cycle(&engine, [Ok(office()), Ok(office())]);
    log.borrow_mut().fail_notify = true;

    let first = published(block_on(cycle.step()));
    assert_eq!(first.notify_failures, 1);
    assert_eq!(engine.reported(Channel::Humidity), Some(4_525));

    // Dropped, never retried.
    log.borrow_mut().fail_notify = false;
    let second = published(block_on(cycle.step()));
    assert_eq!(second.notify_failures, 0);
    assert!(log.borrow().sent.is_empty());
}

#[test]
fn advertising_error_is_reported_and_cycle_continues() {
    let engine = SyncEngine::new();
    let warmer = SensorReading {
        temperature: 25.0,
        ..office()
    };
    let (mut cycle, log) = cycle(&engine, [Ok(office()), Ok(warmer)]);
    log.borrow_mut().fail_advertising = true;

    let first = published(block_on(cycle.step()));
    assert_eq!(first.advertising, Err(AdvertisingError::Busy));
    assert_eq!(cycle.state(), CycleState::Idle);

    log.borrow_mut().fail_advertising = false;
    let second = published(block_on(cycle.step()));
    assert_eq!(second.advertising, Ok(()));
    assert_eq!(log.borrow().advertised.len(), 1);
    assert_eq!(log.borrow().sleeps.len(), 2);
}

#[test]
fn report_error_names_what_kept_data_off_air() {
    let engine = SyncEngine::new();
    let (mut cycle, log) = cycle(
        &engine,
        [Ok(office()), Err(SampleFetchError::Timeout), Ok(office())],
    );

    assert_eq!(block_on(cycle.step()).error(), None);
    assert_eq!(
        block_on(cycle.step()).error(),
        Some(Error::SampleFetch(SampleFetchError::Timeout))
    );

    log.borrow_mut().fail_advertising = true;
    assert_eq!(
        block_on(cycle.step()).error(),
        Some(Error::Advertising(AdvertisingError::Busy))
    );
}

#[test]
fn custom_period_is_slept() {
    let engine = SyncEngine::new();
    let (cycle, log) = cycle(&engine, [Ok(office())]);
    let mut cycle = cycle.with_period_ms(250);

    block_on(cycle.step());
    assert_eq!(log.borrow().sleeps, vec![250]);
}
