//! Minimal BME680 / BME688 driver: forced-mode temperature, pressure,
//! humidity and gas resistance over I²C.
//!
//! One measurement per call using heater profile 0. Compensation uses the
//! floating-point formulas from the Bosch reference API.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::error::SampleFetchError;

pub const CHIP_ID: u8 = 0x61;

const REG_COEFF1: u8 = 0x8A;
const REG_COEFF2: u8 = 0xE1;
const REG_COEFF3: u8 = 0x00;
const REG_FIELD0: u8 = 0x1D;
const REG_RES_HEAT0: u8 = 0x5A;
const REG_GAS_WAIT0: u8 = 0x64;
const REG_CTRL_GAS1: u8 = 0x71;
const REG_CTRL_HUM: u8 = 0x72;
const REG_CTRL_MEAS: u8 = 0x74;
const REG_CHIP_ID: u8 = 0xD0;
const REG_SOFT_RESET: u8 = 0xE0;
const REG_VARIANT_ID: u8 = 0xF0;

const LEN_COEFF1: usize = 23;
const LEN_COEFF2: usize = 14;
const LEN_COEFF3: usize = 5;
const LEN_COEFF: usize = LEN_COEFF1 + LEN_COEFF2 + LEN_COEFF3;
const LEN_FIELD: usize = 17;

const SOFT_RESET_CMD: u8 = 0xB6;

const NEW_DATA: u8 = 0x80;
const GAS_VALID: u8 = 0x20;
const HEAT_STAB: u8 = 0x10;
const GAS_RANGE_MASK: u8 = 0x0F;

const RUN_GAS_LOW: u8 = 0x10;
const RUN_GAS_HIGH: u8 = 0x20;

// Oversampling T x2, P x16, H x1, forced mode.
const OSRS_H_X1: u8 = 0b001;
const CTRL_MEAS_FORCED: u8 = (0b010 << 5) | (0b101 << 2) | 0b01;
const MEAS_CYCLES: u32 = 2 + 16 + 1;

const POLL_ATTEMPTS: u8 = 5;
const POLL_INTERVAL_MS: u32 = 10;

/// Gas sensing variant reported in `VARIANT_ID`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    /// BME680
    GasLow,
    /// BME688
    GasHigh,
}

/// Factory trimming coefficients.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Calibration {
    pub par_t1: u16,
    pub par_t2: i16,
    pub par_t3: i8,
    pub par_p1: u16,
    pub par_p2: i16,
    pub par_p3: i8,
    pub par_p4: i16,
    pub par_p5: i16,
    pub par_p6: i8,
    pub par_p7: i8,
    pub par_p8: i16,
    pub par_p9: i16,
    pub par_p10: u8,
    pub par_h1: u16,
    pub par_h2: u16,
    pub par_h3: i8,
    pub par_h4: i8,
    pub par_h5: i8,
    pub par_h6: u8,
    pub par_h7: i8,
    pub par_gh1: i8,
    pub par_gh2: i16,
    pub par_gh3: i8,
    pub res_heat_range: u8,
    pub res_heat_val: i8,
    pub range_sw_err: i8,
}

fn le_i16(lsb: u8, msb: u8) -> i16 {
    i16::from_le_bytes([lsb, msb])
}

fn le_u16(lsb: u8, msb: u8) -> u16 {
    u16::from_le_bytes([lsb, msb])
}

impl Calibration {
    /// Decode the three coefficient blocks, concatenated in register order
    /// (0x8A.., 0xE1.., 0x00..).
    pub fn from_registers(c: &[u8; LEN_COEFF]) -> Self {
        Self {
            par_t1: le_u16(c[31], c[32]),
            par_t2: le_i16(c[0], c[1]),
            par_t3: c[2] as i8,
            par_p1: le_u16(c[4], c[5]),
            par_p2: le_i16(c[6], c[7]),
            par_p3: c[8] as i8,
            par_p4: le_i16(c[10], c[11]),
            par_p5: le_i16(c[12], c[13]),
            par_p6: c[15] as i8,
            par_p7: c[14] as i8,
            par_p8: le_i16(c[18], c[19]),
            par_p9: le_i16(c[20], c[21]),
            par_p10: c[22],
            par_h1: ((c[25] as u16) << 4) | (c[24] & 0x0F) as u16,
            par_h2: ((c[23] as u16) << 4) | (c[24] >> 4) as u16,
            par_h3: c[26] as i8,
            par_h4: c[27] as i8,
            par_h5: c[28] as i8,
            par_h6: c[29],
            par_h7: c[30] as i8,
            par_gh1: c[35] as i8,
            par_gh2: le_i16(c[33], c[34]),
            par_gh3: c[36] as i8,
            res_heat_range: (c[39] & 0x30) >> 4,
            res_heat_val: c[37] as i8,
            range_sw_err: (c[41] as i8 & 0xF0u8 as i8) / 16,
        }
    }

    /// Returns `(°C, t_fine)`.
    pub fn temperature(&self, adc: u32) -> (f32, f32) {
        let adc = adc as f32;
        let t1 = self.par_t1 as f32;
        let var1 = (adc / 16384.0 - t1 / 1024.0) * self.par_t2 as f32;
        let d = adc / 131072.0 - t1 / 8192.0;
        let var2 = d * d * (self.par_t3 as f32 * 16.0);
        let t_fine = var1 + var2;
        (t_fine / 5120.0, t_fine)
    }

    /// Pressure in Pa.
    pub fn pressure(&self, adc: u32, t_fine: f32) -> f32 {
        let mut var1 = t_fine / 2.0 - 64000.0;
        let mut var2 = var1 * var1 * (self.par_p6 as f32 / 131072.0);
        var2 += var1 * self.par_p5 as f32 * 2.0;
        var2 = var2 / 4.0 + self.par_p4 as f32 * 65536.0;
        var1 = (self.par_p3 as f32 * var1 * var1 / 16384.0 + self.par_p2 as f32 * var1) / 524288.0;
        var1 = (1.0 + var1 / 32768.0) * self.par_p1 as f32;
        if var1 == 0.0 {
            return 0.0;
        }

        let mut p = 1048576.0 - adc as f32;
        p = (p - var2 / 4096.0) * 6250.0 / var1;
        let var1 = self.par_p9 as f32 * p * p / 2147483648.0;
        let var2 = p * (self.par_p8 as f32 / 32768.0);
        let q = p / 256.0;
        let var3 = q * q * q * (self.par_p10 as f32 / 131072.0);
        p + (var1 + var2 + var3 + self.par_p7 as f32 * 128.0) / 16.0
    }

    /// Relative humidity in %, limited to 0..=100.
    pub fn humidity(&self, adc: u16, t_fine: f32) -> f32 {
        let temp = t_fine / 5120.0;
        let var1 = adc as f32
            - (self.par_h1 as f32 * 16.0 + (self.par_h3 as f32 / 2.0) * temp);
        let var2 = var1
            * (self.par_h2 as f32 / 262144.0
                * (1.0
                    + self.par_h4 as f32 / 16384.0 * temp
                    + self.par_h5 as f32 / 1048576.0 * temp * temp));
        let var3 = self.par_h6 as f32 / 16384.0;
        let var4 = self.par_h7 as f32 / 2097152.0;
        let h = var2 + (var3 + var4 * temp) * var2 * var2;
        h.clamp(0.0, 100.0)
    }

    /// Gas resistance in Ω.
    pub fn gas_resistance(&self, variant: Variant, adc: u16, range: u8) -> f32 {
        let range = (range & GAS_RANGE_MASK) as usize;
        match variant {
            Variant::GasHigh => {
                let var1 = (262144u32 >> range) as f32;
                let var2 = 4096.0 + (adc as f32 - 512.0) * 3.0;
                1_000_000.0 * var1 / var2
            }
            Variant::GasLow => {
                const K1: [f32; 16] = [
                    0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, -0.8, 0.0, 0.0, -0.2, -0.5, 0.0, -1.0,
                    0.0, 0.0,
                ];
                const K2: [f32; 16] = [
                    0.0, 0.0, 0.0, 0.0, 0.1, 0.7, 0.0, -0.8, -0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                    0.0,
                ];
                let var1 = 1340.0 + 5.0 * self.range_sw_err as f32;
                let var2 = var1 * (1.0 + K1[range] / 100.0);
                let var3 = 1.0 + K2[range] / 100.0;
                1.0 / (var3
                    * 0.000000125
                    * (1u32 << range) as f32
                    * ((adc as f32 - 512.0) / var2 + 1.0))
            }
        }
    }

    /// `RES_HEAT` register value for a heater target (capped at 400 °C).
    pub fn heater_resistance(&self, target_c: u16, ambient_c: f32) -> u8 {
        let target = target_c.min(400) as f32;
        let var1 = self.par_gh1 as f32 / 16.0 + 49.0;
        let var2 = self.par_gh2 as f32 / 32768.0 * 0.0005 + 0.00235;
        let var3 = self.par_gh3 as f32 / 1024.0;
        let var4 = var1 * (1.0 + var2 * target);
        let var5 = var4 + var3 * ambient_c;
        let res = 3.4
            * (var5
                * (4.0 / (4.0 + self.res_heat_range as f32))
                * (1.0 / (1.0 + self.res_heat_val as f32 * 0.002))
                - 25.0);
        res.clamp(0.0, 255.0) as u8
    }
}

/// `GAS_WAIT` register encoding: 6-bit value with a ×4 multiplier
/// exponent in the top two bits.
pub fn gas_wait(duration_ms: u16) -> u8 {
    if duration_ms >= 0x0FC0 {
        return 0xFF;
    }
    let mut dur = duration_ms;
    let mut factor = 0u8;
    while dur > 0x3F {
        dur /= 4;
        factor += 1;
    }
    dur as u8 + factor * 64
}

/// TPH conversion time for the fixed oversampling, in milliseconds.
fn tph_duration_ms() -> u32 {
    let us = MEAS_CYCLES * 1963 + 477 * 4 + 477 * 5 + 500 + 1000;
    us.div_ceil(1000)
}

/// One compensated forced-mode measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// °C
    pub temperature: f32,
    /// Pa
    pub pressure: f32,
    /// %RH
    pub humidity: f32,
    /// Ω, `None` if the heater did not stabilise.
    pub gas_resistance: Option<f32>,
}

pub struct Bme68x<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    calib: Calibration,
    variant: Variant,
    heater_temp_c: u16,
    heater_ms: u16,
    ambient_c: f32,
}

impl<I, D> Bme68x<I, D>
where
    I: I2c,
    D: DelayNs,
{
    /// Reset the chip, check its ID and load the calibration.
    pub async fn probe(
        i2c: I,
        delay: D,
        address: u8,
        heater_temp_c: u16,
        heater_ms: u16,
    ) -> Result<Self, SampleFetchError> {
        let mut dev = Self {
            i2c,
            delay,
            address,
            calib: Calibration::default(),
            variant: Variant::GasLow,
            heater_temp_c,
            heater_ms,
            ambient_c: 25.0,
        };

        dev.write_reg(REG_SOFT_RESET, SOFT_RESET_CMD).await?;
        dev.delay.delay_ms(10).await;

        let mut id = [0u8; 1];
        dev.read_regs(REG_CHIP_ID, &mut id).await?;
        if id[0] != CHIP_ID {
            return Err(SampleFetchError::Unavailable);
        }

        dev.read_regs(REG_VARIANT_ID, &mut id).await?;
        dev.variant = if id[0] == 0 {
            Variant::GasLow
        } else {
            Variant::GasHigh
        };

        let mut coeff = [0u8; LEN_COEFF];
        dev.read_regs(REG_COEFF1, &mut coeff[..LEN_COEFF1]).await?;
        dev.read_regs(REG_COEFF2, &mut coeff[LEN_COEFF1..LEN_COEFF1 + LEN_COEFF2])
            .await?;
        dev.read_regs(REG_COEFF3, &mut coeff[LEN_COEFF1 + LEN_COEFF2..])
            .await?;
        dev.calib = Calibration::from_registers(&coeff);

        Ok(dev)
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Trigger a forced-mode measurement and wait for the result.
    pub async fn measure(&mut self) -> Result<Measurement, SampleFetchError> {
        let res_heat = self
            .calib
            .heater_resistance(self.heater_temp_c, self.ambient_c);
        let run_gas = match self.variant {
            Variant::GasLow => RUN_GAS_LOW,
            Variant::GasHigh => RUN_GAS_HIGH,
        };

        self.write_reg(REG_RES_HEAT0, res_heat).await?;
        self.write_reg(REG_GAS_WAIT0, gas_wait(self.heater_ms)).await?;
        self.write_reg(REG_CTRL_GAS1, run_gas).await?;
        // ctrl_hum only takes effect after a ctrl_meas write.
        self.write_reg(REG_CTRL_HUM, OSRS_H_X1).await?;
        self.write_reg(REG_CTRL_MEAS, CTRL_MEAS_FORCED).await?;

        self.delay
            .delay_ms(tph_duration_ms() + self.heater_ms as u32)
            .await;

        let mut field = [0u8; LEN_FIELD];
        for _ in 0..POLL_ATTEMPTS {
            self.read_regs(REG_FIELD0, &mut field).await?;
            if field[0] & NEW_DATA != 0 {
                let m = self.decode(&field);
                self.ambient_c = m.temperature;
                return Ok(m);
            }
            self.delay.delay_ms(POLL_INTERVAL_MS).await;
        }
        Err(SampleFetchError::Timeout)
    }

    fn decode(&self, f: &[u8; LEN_FIELD]) -> Measurement {
        let adc_pres = ((f[2] as u32) << 12) | ((f[3] as u32) << 4) | ((f[4] as u32) >> 4);
        let adc_temp = ((f[5] as u32) << 12) | ((f[6] as u32) << 4) | ((f[7] as u32) >> 4);
        let adc_hum = u16::from_be_bytes([f[8], f[9]]);
        let (msb, lsb) = match self.variant {
            Variant::GasLow => (f[13], f[14]),
            Variant::GasHigh => (f[15], f[16]),
        };
        let adc_gas = ((msb as u16) << 2) | ((lsb as u16) >> 6);
        let gas_ok = lsb & (GAS_VALID | HEAT_STAB) == GAS_VALID | HEAT_STAB;

        let (temperature, t_fine) = self.calib.temperature(adc_temp);
        Measurement {
            temperature,
            pressure: self.calib.pressure(adc_pres, t_fine),
            humidity: self.calib.humidity(adc_hum, t_fine),
            gas_resistance: gas_ok.then(|| {
                self.calib
                    .gas_resistance(self.variant, adc_gas, lsb & GAS_RANGE_MASK)
            }),
        }
    }

    async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SampleFetchError> {
        self.i2c
            .write(self.address, &[reg, value])
            .await
            .map_err(|_| SampleFetchError::Bus)
    }

    async fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), SampleFetchError> {
        self.i2c
            .write_read(self.address, &[reg], buf)
            .await
            .map_err(|_| SampleFetchError::Bus)
    }
}
