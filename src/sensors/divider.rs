//! Resistive divider sensors: unknown resistance, or divided-down voltage.

use crate::error::{Error, Result};

use super::{Reading, SensorConfig, SensorDescriptor, SensorEnv, SensorStatus, with_adc};

/// Divider with one known resistor; the sensor is the other leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResistanceConfig {
    pub series_ohms: u32,
    /// Series resistor between the ADC pin and ground.
    pub series_low_side: bool,
}

/// Fixed divider scaling a voltage down to the ADC range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DividerConfig {
    pub high_side_ohms: u32,
    pub low_side_ohms: u32,
}

/// Resistance of the leg between the ADC pin and ground, given the series
/// resistor on the high side.  `None` when the reading is full scale (open
/// circuit).
pub fn resistance(raw: u16, max: u16, series_ohms: u32) -> Option<u32> {
    if raw >= max {
        return None;
    }
    let ohms = u64::from(raw) * u64::from(series_ohms) / u64::from(max - raw);
    Some(u32::try_from(ohms).unwrap_or(u32::MAX))
}

pub fn read_ohms(desc: &SensorDescriptor, status: &mut SensorStatus, env: &mut SensorEnv<'_>) -> Result<()> {
    let SensorConfig::Ohms(cfg) = desc.config else {
        return Err(Error::BadArgument);
    };
    let pin = desc.pin;
    let raw = with_adc(env.hal, |hal| hal.adc_read_pin(pin))?;
    let max = env.hal.adc_max();
    let raw = if cfg.series_low_side { max.saturating_sub(raw) } else { raw };
    status.values[0] = match resistance(raw, max, cfg.series_ohms) {
        Some(ohms) => Reading::try_from(ohms).unwrap_or(Reading::MAX),
        None => Reading::MAX,
    };
    Ok(())
}

pub fn read_millivolts(desc: &SensorDescriptor, status: &mut SensorStatus, env: &mut SensorEnv<'_>) -> Result<()> {
    let SensorConfig::Millivolts(cfg) = desc.config else {
        return Err(Error::BadArgument);
    };
    if cfg.low_side_ohms == 0 {
        return Err(Error::BadArgument);
    }
    let pin = desc.pin;
    let raw = with_adc(env.hal, |hal| hal.adc_read_pin(pin))?;
    let max = env.hal.adc_max();
    let at_pin = u64::from(raw) * u64::from(*env.vref_mv) / u64::from(max);
    let mv = at_pin * (u64::from(cfg.high_side_ohms) + u64::from(cfg.low_side_ohms)) / u64::from(cfg.low_side_ohms);
    status.values[0] = Reading::try_from(mv).unwrap_or(Reading::MAX);
    Ok(())
}
