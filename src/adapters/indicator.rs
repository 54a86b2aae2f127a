//! Status LED indicator over an `embedded-hal` output pin.
//!
//! Flashes the warning pattern: `count` short pulses, blocking.  The whole
//! pattern stays well under a second so it fits inside a duty cycle.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::Indicator;

const ON_MS: u32 = 60;
const OFF_MS: u32 = 140;

pub struct LedIndicator<P, D> {
    led: P,
    delay: D,
}

impl<P: OutputPin, D: DelayNs> LedIndicator<P, D> {
    pub fn new(led: P, delay: D) -> Self {
        Self { led, delay }
    }

    pub fn release(self) -> (P, D) {
        (self.led, self.delay)
    }
}

impl<P: OutputPin, D: DelayNs> Indicator for LedIndicator<P, D> {
    fn flash(&mut self, count: u8) {
        for _ in 0..count {
            if self.led.set_high().is_err() {
                warn!("status LED unavailable");
                return;
            }
            self.delay.delay_ms(ON_MS);
            let _ = self.led.set_low();
            self.delay.delay_ms(OFF_MS);
        }
    }
}
