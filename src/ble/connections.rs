//! Peripheral connection handling.
//!
//! Up to [`MAX_CONNECTIONS`] centrals can be connected at once. Each link
//! runs in its own pooled task that owns the GATT server loop for that
//! connection and reports connect, CCC and disconnect events to the
//! [`SyncEngine`].

use core::cell::RefCell;

use defmt::{info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use ensens::config::{self, MAX_CONNECTIONS};
use ensens::sync::{ConnHandle, SyncEngine};
use heapless::Vec;
use nrf_softdevice::ble::{gatt_server, Connection};
use nrf_softdevice::raw;

use super::gatt::{self, BatteryServiceEvent, Server, ServerEvent};

#[derive(Clone)]
struct PeerSlot {
    // Kept separately: `Connection::handle` is `None` once the link drops.
    handle: ConnHandle,
    conn: Connection,
    battery_notify: bool,
}

/// Live connections, looked up by handle when the update cycle pushes a
/// notification.
pub struct PeerRegistry {
    slots: Mutex<CriticalSectionRawMutex, RefCell<Vec<PeerSlot, MAX_CONNECTIONS>>>,
}

impl PeerRegistry {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    fn insert(&self, handle: ConnHandle, conn: Connection) -> bool {
        self.slots.lock(|slots| {
            slots
                .borrow_mut()
                .push(PeerSlot {
                    handle,
                    conn,
                    battery_notify: false,
                })
                .is_ok()
        })
    }

    fn remove(&self, handle: ConnHandle) {
        self.slots.lock(|slots| {
            slots
                .borrow_mut()
                .retain(|s| s.handle != handle);
        });
    }

    pub fn get(&self, handle: ConnHandle) -> Option<Connection> {
        self.slots.lock(|slots| {
            slots
                .borrow()
                .iter()
                .find(|s| s.handle == handle)
                .map(|s| s.conn.clone())
        })
    }

    fn set_battery_notify(&self, handle: ConnHandle, enabled: bool) {
        self.slots.lock(|slots| {
            if let Some(slot) = slots
                .borrow_mut()
                .iter_mut()
                .find(|s| s.handle == handle)
            {
                slot.battery_notify = enabled;
            }
        });
    }

    /// Connections that enabled Battery Level notifications.
    pub fn battery_subscribers(&self) -> Vec<Connection, MAX_CONNECTIONS> {
        self.slots.lock(|slots| {
            let mut out = Vec::new();
            for slot in slots.borrow().iter().filter(|s| s.battery_notify) {
                let _ = out.push(slot.conn.clone());
            }
            out
        })
    }
}

fn request_conn_params(conn: &Connection) {
    let params = raw::ble_gap_conn_params_t {
        min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
        max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
        slave_latency: config::BLE_SLAVE_LATENCY,
        conn_sup_timeout: config::BLE_SUP_TIMEOUT,
    };
    if let Err(e) = conn.set_conn_params(params) {
        warn!("set_conn_params failed: {:?}", e);
    }
}

#[embassy_executor::task(pool_size = MAX_CONNECTIONS)]
pub async fn connection_task(
    conn: Connection,
    server: &'static Server,
    engine: &'static SyncEngine,
    peers: &'static PeerRegistry,
) {
    let Some(raw_handle) = conn.handle() else {
        warn!("link closed before its task started");
        return;
    };
    let handle = ConnHandle(raw_handle);

    if !peers.insert(handle, conn.clone()) {
        warn!("conn {}: registry full, dropping link", raw_handle);
        return;
    }
    let connected = engine.on_connect(handle);
    info!("conn {}: connected ({} active)", raw_handle, connected.active);
    if let Err(e) = connected.tracked {
        warn!("conn {}: no subscription slot: {:?}", raw_handle, e);
    }

    request_conn_params(&conn);

    // Returns when the peer disconnects.
    let _ = gatt_server::run(&conn, server, |e| match e {
        ServerEvent::Ess(e) => {
            let (characteristic, ccc) = gatt::ccc_write(&e);
            match engine.on_ccc_write(handle, characteristic, ccc) {
                Ok(outcome) => info!(
                    "conn {}: {:?} {:?} -> {:?}",
                    raw_handle, characteristic, outcome.previous, outcome.current
                ),
                Err(err) => warn!(
                    "conn {}: {:?} CCC write ignored: {:?}",
                    raw_handle, characteristic, err
                ),
            }
        }
        ServerEvent::Bas(BatteryServiceEvent::BatteryLevelCccdWrite { notifications }) => {
            info!("conn {}: battery notifications {}", raw_handle, notifications);
            peers.set_battery_notify(handle, notifications);
        }
    })
    .await;

    peers.remove(handle);
    let active = engine.on_disconnect(handle);
    info!("conn {}: disconnected ({} active)", raw_handle, active);
}
