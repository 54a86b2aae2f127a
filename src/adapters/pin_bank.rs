//! GPIO port over a bank of `embedded-hal` pins.
//!
//! Any board whose HAL hands out pins implementing the `embedded-hal` 1.0
//! digital traits can back [`GpioPort`] with this.  Logical pin `n` is slot
//! `n` of the bank; empty slots report [`HalError::InvalidPin`].
//!
//! `embedded-hal` has no mode switching, so the requested [`PinMode`] is
//! only recorded.  It decides whether `gpio_read` samples the input or
//! reports the output latch.

use embedded_hal::digital::{InputPin, StatefulOutputPin};

use crate::app::ports::{Bias, GpioPort, HalError, PinId, PinMode, PinState};

pub struct PinBank<P, const N: usize> {
    pins: [Option<P>; N],
    modes: [PinMode; N],
}

impl<P, const N: usize> PinBank<P, N>
where
    P: InputPin + StatefulOutputPin,
{
    pub fn new() -> Self {
        Self {
            pins: core::array::from_fn(|_| None),
            modes: [PinMode::Reset; N],
        }
    }

    /// Put `pin` in slot `id`.  Returns the pin back if the slot is taken or
    /// out of range.
    pub fn attach(&mut self, id: PinId, pin: P) -> Result<(), P> {
        match self.pins.get_mut(usize::from(id)) {
            Some(slot @ None) => {
                *slot = Some(pin);
                Ok(())
            }
            _ => Err(pin),
        }
    }

    pub fn mode(&self, id: PinId) -> Option<PinMode> {
        self.modes.get(usize::from(id)).copied()
    }

    pub fn pin_mut(&mut self, id: PinId) -> Option<&mut P> {
        self.pins.get_mut(usize::from(id)).and_then(Option::as_mut)
    }

    fn slot(&mut self, id: PinId) -> Result<&mut P, HalError> {
        self.pin_mut(id).ok_or(HalError::InvalidPin)
    }
}

impl<P, const N: usize> Default for PinBank<P, N>
where
    P: InputPin + StatefulOutputPin,
{
    fn default() -> Self {
        Self::new()
    }
}

fn io<E: embedded_hal::digital::Error>(_: E) -> HalError {
    HalError::Io
}

impl<P, const N: usize> GpioPort for PinBank<P, N>
where
    P: InputPin + StatefulOutputPin,
{
    fn gpio_set_mode(&mut self, pin: PinId, mode: PinMode, _bias: Bias) -> Result<(), HalError> {
        self.slot(pin)?;
        self.modes[usize::from(pin)] = mode;
        Ok(())
    }

    fn output_pin_on(&mut self, pin: PinId) -> Result<(), HalError> {
        self.slot(pin)?.set_high().map_err(io)
    }

    fn output_pin_off(&mut self, pin: PinId) -> Result<(), HalError> {
        self.slot(pin)?.set_low().map_err(io)
    }

    fn gpio_read(&mut self, pin: PinId) -> Result<PinState, HalError> {
        let driven = matches!(
            self.mode(pin),
            Some(PinMode::PushPull | PinMode::OpenDrain)
        );
        let p = self.slot(pin)?;
        let high = if driven {
            p.is_set_high().map_err(io)?
        } else {
            p.is_high().map_err(io)?
        };
        Ok(if high { PinState::High } else { PinState::Low })
    }
}
