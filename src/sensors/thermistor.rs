//! NTC thermistor on a resistive divider, beta-equation conversion.
//!
//! ```text
//!   1/T = 1/T0 + ln(R/R0)/B   ⇒   T = B / (B/T0 + ln R − ln R0)
//! ```
//!
//! `B/T0` and `ln R0` depend only on the descriptor, so `init` computes them
//! once and keeps them in the sensor's [`SensorCache`](super::SensorCache).
//! Everything is Q16.16 fixed point.

use crate::config::TemperatureUnit;
use crate::error::{Error, Result};
use crate::fixed::{self, Q16};

use super::divider::resistance;
use super::{Reading, SensorCache, SensorConfig, SensorDescriptor, SensorEnv, SensorStatus, with_adc};

/// 0 °C in hundredths of a kelvin.
const ZERO_CELSIUS_CENTI_K: i64 = 27_315;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermistorConfig {
    /// Beta coefficient, kelvin.
    pub beta: u16,
    /// Resistance at the reference temperature.
    pub ref_ohms: u32,
    /// Reference temperature in hundredths of a degree Celsius.
    pub ref_centi_celsius: i16,
    pub series_ohms: u32,
    /// Series resistor between the ADC pin and ground.
    pub series_low_side: bool,
}

/// Precomputed beta-equation constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermistorCache {
    b_div_t0: Q16,
    ln_r0: Q16,
}

fn config(desc: &SensorDescriptor) -> Result<&ThermistorConfig> {
    match &desc.config {
        SensorConfig::Thermistor(cfg) => Ok(cfg),
        _ => Err(Error::BadArgument),
    }
}

pub fn init(desc: &SensorDescriptor, status: &mut SensorStatus, _env: &mut SensorEnv<'_>) -> Result<()> {
    let cfg = config(desc)?;
    let t0 = fixed::from_centi(i64::from(cfg.ref_centi_celsius) + ZERO_CELSIUS_CENTI_K);
    let b_div_t0 = fixed::div(fixed::from_int(i64::from(cfg.beta)), t0).ok_or(Error::BadArgument)?;
    let ln_r0 = fixed::ln(cfg.ref_ohms).ok_or(Error::BadArgument)?;
    status.cache = SensorCache::Thermistor(ThermistorCache { b_div_t0, ln_r0 });
    Ok(())
}

pub fn read(desc: &SensorDescriptor, status: &mut SensorStatus, env: &mut SensorEnv<'_>) -> Result<()> {
    let cfg = config(desc)?;
    let SensorCache::Thermistor(cache) = status.cache else {
        return Err(Error::Init);
    };

    let pin = desc.pin;
    let raw = with_adc(env.hal, |hal| hal.adc_read_pin(pin))?;
    let max = env.hal.adc_max();
    let raw = if cfg.series_low_side { max.saturating_sub(raw) } else { raw };

    // Open or shorted probe.
    let ohms = resistance(raw, max, cfg.series_ohms).ok_or(Error::Unknown)?;
    let ln_r = fixed::ln(ohms).ok_or(Error::Unknown)?;

    let denom = cache.b_div_t0 + ln_r - cache.ln_r0;
    if denom <= 0 {
        return Err(Error::Unknown);
    }
    let kelvin = fixed::div(fixed::from_int(i64::from(cfg.beta)), denom).ok_or(Error::Unknown)?;
    let celsius = kelvin - fixed::from_centi(ZERO_CELSIUS_CENTI_K);

    status.values[0] = scale(celsius, env.temperature_unit, env.temperature_scale);
    Ok(())
}

fn scale(celsius: Q16, unit: TemperatureUnit, factor: u16) -> Reading {
    let t = match unit {
        TemperatureUnit::Celsius => celsius,
        TemperatureUnit::Fahrenheit => celsius * 9 / 5 + fixed::from_int(32),
    };
    let scaled = fixed::round(t * i64::from(factor));
    scaled.clamp(i64::from(Reading::MIN + 1), i64::from(Reading::MAX)) as Reading
}
