//! Port traits: the boundary between the dispatch core and the board.
//!
//! ```text
//!   Board adapter ──▶ Port trait ──▶ Monitor (registries, scheduler)
//! ```
//!
//! Device routines (sensor reads, actuator sets, controller runs) only ever
//! see `&mut dyn Hal`.  The core never touches registers directly, so the
//! whole engine runs on the host against the mock board in `tests/`.
//!
//! ## Shared-resource rules
//!
//! - The ADC is a single-owner peripheral.  A routine that finds it off
//!   turns it on, uses it, and turns it back off.  A routine that finds it
//!   on leaves it on.
//! - Every HAL call is bounded; timeouts are reported as
//!   [`HalError::Timeout`], never by blocking.

use crate::calendar::Timestamp;
pub use crate::error::HalError;

/// Logical pin identifier (board-specific numbering, see `pins`).
pub type PinId = u8;

/// Electrical mode for [`GpioPort::gpio_set_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Lowest-power state; pin disconnected.
    Reset,
    Analog,
    Input,
    PushPull,
    OpenDrain,
}

/// Pull resistor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Float,
    Low,
    High,
}

/// Logic level on a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Low,
    High,
}

// ───────────────────────────────────────────────────────────────
// ADC
// ───────────────────────────────────────────────────────────────

pub trait AdcPort {
    fn adc_on(&mut self) -> Result<(), HalError>;

    fn adc_off(&mut self);

    fn adc_is_on(&self) -> bool;

    /// Single conversion on `pin`.  Returns the raw count `0..=adc_max()`.
    fn adc_read_pin(&mut self, pin: PinId) -> Result<u16, HalError>;

    /// Measure the supply voltage against the internal reference.
    fn adc_read_vref_mv(&mut self) -> Result<u16, HalError>;

    /// Full-scale raw count.
    fn adc_max(&self) -> u16 {
        4095
    }
}

// ───────────────────────────────────────────────────────────────
// GPIO
// ───────────────────────────────────────────────────────────────

pub trait GpioPort {
    fn gpio_set_mode(&mut self, pin: PinId, mode: PinMode, bias: Bias) -> Result<(), HalError>;

    fn output_pin_on(&mut self, pin: PinId) -> Result<(), HalError>;

    fn output_pin_off(&mut self, pin: PinId) -> Result<(), HalError>;

    /// Sample the current level of `pin` (input or output latch).
    fn gpio_read(&mut self, pin: PinId) -> Result<PinState, HalError>;
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Wall clock in whole seconds since the Unix epoch.
pub trait ClockPort {
    fn now(&self) -> Timestamp;

    /// Set the RTC.  Used by the "set time to noon" button command.
    fn set_time(&mut self, t: Timestamp) -> Result<(), HalError>;
}

/// Everything a device routine may touch.
pub trait Hal: AdcPort + GpioPort + ClockPort {}

impl<T: AdcPort + GpioPort + ClockPort> Hal for T {}

// ───────────────────────────────────────────────────────────────
// Outer collaborators (driven by the power-cycle loop)
// ───────────────────────────────────────────────────────────────

/// Destination for formatted status lines (UART, SD card file).
pub trait LogWriter {
    fn write_line(&mut self, line: &str) -> Result<(), HalError>;

    /// Flush buffered output to the medium.
    fn sync(&mut self) -> Result<(), HalError>;
}

/// Status LED used to show the warning pattern.
pub trait Indicator {
    fn flash(&mut self, count: u8);
}

/// Low-power sleep.  Returns early if an interrupt fires.
pub trait SleepPort {
    fn hibernate_until(&mut self, wake_at: Timestamp);
}
