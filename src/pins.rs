//! Logical pin assignments for the greenhouse monitor board.
//!
//! Single source of truth: the device tables in `board` reference these
//! constants rather than hard-coding pin numbers.  Numbering is the board
//! adapter's, not the MCU's; the adapter maps each id to a physical pin.

use crate::app::ports::PinId;

/// Placeholder for devices without a physical pin (Vcc via Vref).
pub const NONE: PinId = 0;

// ---------------------------------------------------------------------------
// Analog inputs
// ---------------------------------------------------------------------------

/// Battery sense, top of a 2:1 divider.
pub const BAT: PinId = 1;
/// Indoor NTC thermistor, 22 kΩ series resistor to Vref.
pub const IN_TEMP1: PinId = 2;
/// Resistive soil moisture probe, 10 kΩ series resistor to Vref.
pub const GND_MOIST1: PinId = 3;

// ---------------------------------------------------------------------------
// Digital inputs
// ---------------------------------------------------------------------------

/// Reservoir float switch, closes to ground when water is present.
pub const WATER_LVL: PinId = 4;
/// Momentary push-button (active-low with internal pull-up).
pub const BUTTON: PinId = 13;

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Irrigation valve driver (active HIGH).
pub const IRR1: PinId = 8;
/// Ventilation fan relay.
pub const FAN1: PinId = 9;
/// Reservoir aerator pump.
pub const PUMP: PinId = 10;
/// Status LED, flashes the warning pattern.
pub const STATUS_LED: PinId = 12;

/// Number of logical pins the board adapter must provide.
pub const PIN_COUNT: usize = 16;
