//! Digital level switch (float switch, water-level probe).
//!
//! The input is only biased while it is being sampled and is parked in the
//! reset state afterwards so the pull resistor does not drain the battery.

use crate::app::ports::{Bias, PinMode, PinState};
use crate::error::{Error, Result};

use super::{SensorConfig, SensorDescriptor, SensorEnv, SensorStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelConfig {
    pub bias: Bias,
    /// Level that means "triggered" (reads as 1).
    pub active: PinState,
}

pub fn read(desc: &SensorDescriptor, status: &mut SensorStatus, env: &mut SensorEnv<'_>) -> Result<()> {
    let SensorConfig::LevelSwitch(cfg) = desc.config else {
        return Err(Error::BadArgument);
    };
    env.hal.gpio_set_mode(desc.pin, PinMode::Input, cfg.bias)?;
    let state = env.hal.gpio_read(desc.pin);
    env.hal.gpio_set_mode(desc.pin, PinMode::Reset, Bias::Float)?;
    status.values[0] = i32::from(state? == cfg.active);
    Ok(())
}
