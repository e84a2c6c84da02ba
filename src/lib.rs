//! Host-testable core of the ensens firmware.
//!
//! Everything here is `no_std` and free of hardware access: the
//! synchronization engine, the BME68x driver (generic over
//! `embedded-hal-async`), name and battery helpers.
//!
//! Usage: `cargo test`
//!
//! Note: The embedded binary (main.rs, `--features embedded`) wires these
//! modules to the SoftDevice, TWIM, SAADC and the status LED.

#![cfg_attr(not(test), no_std)]

// ═══════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════

pub mod battery;
pub mod config;
pub mod error;
pub mod identity;
pub mod sensor;
pub mod sync;

pub use error::Error;

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests - crate-level wiring
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::config;
    use super::identity::default_device_name;
    use super::sync::payload::{advertisement, ADV_DATA_MAX, PAYLOAD_LEN};
    use super::sync::SyncEngine;

    // ════════════════════════════════════════════════════════════════════════
    // Configuration consistency
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn name_and_payload_fill_one_legacy_advertisement() {
        // flags AD (3) + name AD header (2) + service data AD header (2)
        assert_eq!(3 + 2 + config::DEVICE_NAME_LEN + 2 + PAYLOAD_LEN, ADV_DATA_MAX);
    }

    #[test]
    fn battery_window_is_non_empty() {
        assert!(config::BATTERY_FULL_MV > config::BATTERY_EMPTY_MV);
    }

    #[test]
    fn advertising_interval_is_slow_mode() {
        // 1 s .. 1.2 s in 0.625 ms units
        assert!((1600..=1920).contains(&config::BLE_ADV_INTERVAL));
    }

    // ════════════════════════════════════════════════════════════════════════
    // Boot-time advertisement
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn boot_advertisement_is_valid_before_first_sample() {
        let engine = SyncEngine::new();
        let name = default_device_name(0x0123_4567_89AB_CDEF);
        let frame = advertisement(&name, &engine.payload_bytes()).unwrap();
        assert_eq!(frame.len(), ADV_DATA_MAX);
        assert_eq!(&frame[5..11], b"EnSDEF");
    }
}
