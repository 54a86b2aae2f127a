//! Plain on/off GPIO output (relay, MOSFET gate, solenoid driver).

use crate::app::ports::{Bias, Hal, PinMode, PinState};
use crate::error::Result;

use super::{ActuatorDescriptor, ActuatorValue};

pub fn init(desc: &ActuatorDescriptor, hal: &mut dyn Hal) -> Result<()> {
    hal.gpio_set_mode(desc.pin, PinMode::PushPull, Bias::Float)?;
    hal.output_pin_off(desc.pin)?;
    Ok(())
}

/// Any positive value turns the pin on.  Returns 1 or 0.
pub fn set(desc: &ActuatorDescriptor, hal: &mut dyn Hal, value: ActuatorValue) -> Result<ActuatorValue> {
    if value > 0 {
        hal.output_pin_on(desc.pin)?;
        Ok(1)
    } else {
        hal.output_pin_off(desc.pin)?;
        Ok(0)
    }
}

/// Read back the output latch.
pub fn is_on(desc: &ActuatorDescriptor, hal: &mut dyn Hal) -> Result<bool> {
    Ok(hal.gpio_read(desc.pin)? == PinState::High)
}
