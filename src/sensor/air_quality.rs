//! Fixed-baseline air-quality estimates from MOX gas resistance.
//!
//! Clean air is assumed to read [`GAS_BASELINE_KOHM`] at 25 °C / 40 %RH.
//! Lower resistance means more reducing gases:
//!
//! - IAQ: 0..50 above baseline, 50..300 below it.
//! - CO2 equivalent: linear from 400 ppm at baseline, 5 ppm per kΩ drop.
//! - VOC: 1000 ppb per unit of `baseline / resistance` above 1.

pub const GAS_BASELINE_KOHM: f32 = 150.0;
pub const CO2_BASELINE_PPM: f32 = 400.0;
pub const CO2_MAX_PPM: f32 = 5000.0;

const CO2_PPM_PER_KOHM: f32 = -5.0;
const TEMP_COEFFICIENT: f32 = -0.02;
const HUMIDITY_COEFFICIENT: f32 = 0.01;
const VOC_PPB_PER_RATIO: f32 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AirQuality {
    pub iaq: f32,
    /// ppm
    pub co2: f32,
    /// ppb
    pub voc: f32,
}

impl AirQuality {
    /// No gas reading yet.
    pub const UNKNOWN: Self = Self {
        iaq: f32::NAN,
        co2: f32::NAN,
        voc: f32::NAN,
    };
}

/// Estimate from gas resistance (Ω) and the ambient conditions it was
/// measured in.
pub fn estimate(gas_ohm: f32, temperature: f32, humidity: f32) -> AirQuality {
    let kohm = gas_ohm / 1000.0;
    let compensated = kohm
        * (1.0 + TEMP_COEFFICIENT * (temperature - 25.0))
        * (1.0 + HUMIDITY_COEFFICIENT * (humidity - 40.0));
    let ratio = compensated / GAS_BASELINE_KOHM;

    let iaq = if ratio > 1.0 {
        50.0 / ratio
    } else {
        50.0 + 250.0 * (1.0 - ratio)
    };

    let co2 = (CO2_BASELINE_PPM + (kohm - GAS_BASELINE_KOHM) * CO2_PPM_PER_KOHM)
        .clamp(CO2_BASELINE_PPM, CO2_MAX_PPM);

    let voc = if compensated > 0.0 {
        (GAS_BASELINE_KOHM / compensated - 1.0).max(0.0) * VOC_PPB_PER_RATIO
    } else {
        f32::NAN
    };

    AirQuality { iaq, co2, voc }
}
