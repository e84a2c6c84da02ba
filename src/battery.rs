//! Battery level from cell voltage.
//!
//! Linear between [`BATTERY_EMPTY_MV`] (0 %) and [`BATTERY_FULL_MV`]
//! (100 %), clamped at both ends.
//!
//! On target the cell is measured through the SAADC VDD input with the
//! internal 0.6 V reference and 1/6 gain, i.e. a 3.6 V full scale at
//! 12-bit resolution.

use crate::config::{BATTERY_EMPTY_MV, BATTERY_FULL_MV};

/// Convert a cell voltage in millivolts to a percentage in `0.0..=100.0`.
pub fn percent_from_millivolts(mv: u32) -> f32 {
    let span = (BATTERY_FULL_MV - BATTERY_EMPTY_MV) as f32;
    let above_empty = mv.saturating_sub(BATTERY_EMPTY_MV) as f32;
    let percent = above_empty / span * 100.0;
    if percent > 100.0 {
        100.0
    } else {
        percent
    }
}

/// Full-scale input of the SAADC VDD channel in millivolts.
pub const SAADC_FULL_SCALE_MV: u32 = 3_600;
/// 12-bit conversion.
pub const SAADC_RESOLUTION: u32 = 4_096;

/// Convert a raw SAADC sample of VDD to millivolts.
///
/// Single-ended conversions can dip below zero from offset noise; those
/// read as 0 mV.
pub fn saadc_millivolts(raw: i16) -> u32 {
    let raw = raw.max(0) as u32;
    raw * SAADC_FULL_SCALE_MV / SAADC_RESOLUTION
}
