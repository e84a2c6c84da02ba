//! Clamper: maps raw physical readings onto bounded, reportable values.
//!
//! Two pure steps per channel:
//!
//! 1. [`clamp`] saturates the raw `f32` into the channel's physical range.
//! 2. [`quantize`] scales it to wire units and rounds it to an integer that
//!    fits the channel's wire width.
//!
//! | channel     | range              | wire unit | wire type |
//! |-------------|--------------------|-----------|-----------|
//! | temperature | -40.0 ..= 85.0 °C  | 0.01 °C   | i16       |
//! | humidity    | 0.0 ..= 100.0 %    | 0.01 %    | u16       |
//! | pressure    | 30000 ..= 110000 Pa| 1 Pa      | u24       |
//! | CO2         | unbounded          | 1 ppm     | u16       |
//! | VOC         | unbounded          | 1 ppb     | u16       |
//! | IAQ         | 0 ..= 500          | 1         | u16       |
//! | battery     | 0.0 ..= 100.0 %    | 1 %       | u8        |
//!
//! NaN is clamped to the range minimum (0 for the unbounded channels).

use super::channel::Channel;

/// Closed physical range of a channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Saturate `raw` into `[min, max]`; NaN maps to `min`.
    pub fn saturate(&self, raw: f32) -> f32 {
        if raw.is_nan() || raw < self.min {
            self.min
        } else if raw > self.max {
            self.max
        } else {
            raw
        }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

pub const TEMPERATURE_RANGE: Range = Range::new(-40.0, 85.0);
pub const HUMIDITY_RANGE: Range = Range::new(0.0, 100.0);
pub const PRESSURE_RANGE: Range = Range::new(30_000.0, 110_000.0);
pub const IAQ_RANGE: Range = Range::new(0.0, 500.0);
pub const BATTERY_RANGE: Range = Range::new(0.0, 100.0);

impl Channel {
    /// Declared physical range. CO2 and VOC have none and pass through
    /// unclamped.
    pub const fn range(self) -> Option<Range> {
        match self {
            Channel::Temperature => Some(TEMPERATURE_RANGE),
            Channel::Humidity => Some(HUMIDITY_RANGE),
            Channel::Pressure => Some(PRESSURE_RANGE),
            Channel::Iaq => Some(IAQ_RANGE),
            Channel::Battery => Some(BATTERY_RANGE),
            Channel::Co2 | Channel::Voc => None,
        }
    }

    /// Multiplier from physical unit to wire unit.
    pub const fn scale(self) -> f32 {
        match self {
            Channel::Temperature | Channel::Humidity => 100.0,
            _ => 1.0,
        }
    }

    /// Inclusive integer bounds of the wire representation.
    pub const fn wire_bounds(self) -> (i32, i32) {
        match self {
            Channel::Temperature => (i16::MIN as i32, i16::MAX as i32),
            Channel::Pressure => (0, 0x00FF_FFFF),
            Channel::Battery => (0, u8::MAX as i32),
            Channel::Humidity | Channel::Co2 | Channel::Voc | Channel::Iaq => {
                (0, u16::MAX as i32)
            }
        }
    }
}

/// Saturate a raw reading into the channel's physical range.
///
/// Total: every `f32` (including NaN and ±∞) yields a value inside the
/// declared range. Unbounded channels only replace NaN with `0.0`.
pub fn clamp(channel: Channel, raw: f32) -> f32 {
    match channel.range() {
        Some(range) => range.saturate(raw),
        None if raw.is_nan() => 0.0,
        None => raw,
    }
}

/// Whether a raw reading is unusable (clamped to the minimum rather than
/// saturated to a meaningful bound).
pub fn is_invalid(raw: f32) -> bool {
    raw.is_nan()
}

/// Convert a clamped value to its integer wire representation.
///
/// Rounds half away from zero, then saturates to the wire type so the
/// unbounded channels cannot wrap.
pub fn quantize(channel: Channel, bounded: f32) -> i32 {
    let scaled = bounded * channel.scale();
    let rounded = if scaled.is_nan() {
        0
    } else if scaled < 0.0 {
        (scaled - 0.5) as i64
    } else {
        (scaled + 0.5) as i64
    };
    let (lo, hi) = channel.wire_bounds();
    rounded.clamp(lo as i64, hi as i64) as i32
}

/// Clamp and quantize in one step.
pub fn bound(channel: Channel, raw: f32) -> i32 {
    quantize(channel, clamp(channel, raw))
}
