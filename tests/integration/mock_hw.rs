//! Mock board for integration tests.
//!
//! Implements every HAL port with scripted values and counts physical
//! accesses so tests can assert on caching and output history without real
//! ADC/GPIO registers.

use ghmon::app::ports::{
    AdcPort, Bias, ClockPort, GpioPort, HalError, Indicator, LogWriter, PinId, PinMode, PinState,
};
use ghmon::calendar::Timestamp;
use ghmon::config::SystemConfig;
use ghmon::events::ShutoffRequests;
use ghmon::{Monitor, board, pins};

pub const PINS: usize = 16;

// ── MockBoard ─────────────────────────────────────────────────

pub struct MockBoard {
    pub now: Timestamp,
    pub adc_powered: bool,
    /// Raw ADC count returned per pin.
    pub adc_raw: [u16; PINS],
    pub vref_mv: u16,
    /// Physical ADC conversions per pin.
    pub adc_reads: [u32; PINS],
    pub vref_reads: u32,
    /// Input level seen by `gpio_read` on non-output pins.
    pub inputs: [PinState; PINS],
    pub outputs: [bool; PINS],
    pub modes: [PinMode; PINS],
    /// Every output edge, in order: (pin, on).
    pub output_log: Vec<(PinId, bool)>,
    /// Output pins whose writes fail.
    pub broken_outputs: Vec<PinId>,
    pub adc_fails: bool,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now,
            adc_powered: false,
            adc_raw: [0; PINS],
            vref_mv: 3300,
            adc_reads: [0; PINS],
            vref_reads: 0,
            inputs: [PinState::High; PINS],
            outputs: [false; PINS],
            modes: [PinMode::Reset; PINS],
            output_log: Vec::new(),
            broken_outputs: Vec::new(),
            adc_fails: false,
        }
    }

    pub fn advance(&mut self, secs: u32) {
        self.now += secs;
    }

    pub fn is_on(&self, pin: PinId) -> bool {
        self.outputs[usize::from(pin)]
    }

    pub fn reads(&self, pin: PinId) -> u32 {
        self.adc_reads[usize::from(pin)]
    }

    /// Raw count for a resistance on the low leg of a divider whose series
    /// resistor sits on the high side.
    pub fn set_ohms(&mut self, pin: PinId, ohms: u32, series_ohms: u32) {
        let raw = 4095u64 * u64::from(ohms) / (u64::from(ohms) + u64::from(series_ohms));
        self.adc_raw[usize::from(pin)] = raw as u16;
    }

    /// Raw count for `mv` at the top of a 2:1 divider.
    pub fn set_battery_mv(&mut self, pin: PinId, mv: u32) {
        let at_pin = mv / 2;
        let raw = (u64::from(at_pin) * 4095).div_ceil(u64::from(self.vref_mv));
        self.adc_raw[usize::from(pin)] = raw as u16;
    }

    fn drive(&mut self, pin: PinId, on: bool) -> Result<(), HalError> {
        if usize::from(pin) >= PINS {
            return Err(HalError::InvalidPin);
        }
        if self.broken_outputs.contains(&pin) {
            return Err(HalError::Io);
        }
        self.outputs[usize::from(pin)] = on;
        self.output_log.push((pin, on));
        Ok(())
    }
}

impl AdcPort for MockBoard {
    fn adc_on(&mut self) -> Result<(), HalError> {
        self.adc_powered = true;
        Ok(())
    }

    fn adc_off(&mut self) {
        self.adc_powered = false;
    }

    fn adc_is_on(&self) -> bool {
        self.adc_powered
    }

    fn adc_read_pin(&mut self, pin: PinId) -> Result<u16, HalError> {
        if !self.adc_powered {
            return Err(HalError::Busy);
        }
        let i = usize::from(pin);
        if i >= PINS {
            return Err(HalError::InvalidPin);
        }
        self.adc_reads[i] += 1;
        if self.adc_fails {
            return Err(HalError::Timeout);
        }
        Ok(self.adc_raw[i])
    }

    fn adc_read_vref_mv(&mut self) -> Result<u16, HalError> {
        if !self.adc_powered {
            return Err(HalError::Busy);
        }
        self.vref_reads += 1;
        Ok(self.vref_mv)
    }
}

impl GpioPort for MockBoard {
    fn gpio_set_mode(&mut self, pin: PinId, mode: PinMode, _bias: Bias) -> Result<(), HalError> {
        let slot = self.modes.get_mut(usize::from(pin)).ok_or(HalError::InvalidPin)?;
        *slot = mode;
        Ok(())
    }

    fn output_pin_on(&mut self, pin: PinId) -> Result<(), HalError> {
        self.drive(pin, true)
    }

    fn output_pin_off(&mut self, pin: PinId) -> Result<(), HalError> {
        self.drive(pin, false)
    }

    fn gpio_read(&mut self, pin: PinId) -> Result<PinState, HalError> {
        let i = usize::from(pin);
        if i >= PINS {
            return Err(HalError::InvalidPin);
        }
        Ok(match self.modes[i] {
            PinMode::PushPull | PinMode::OpenDrain => {
                if self.outputs[i] {
                    PinState::High
                } else {
                    PinState::Low
                }
            }
            _ => self.inputs[i],
        })
    }
}

impl ClockPort for MockBoard {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn set_time(&mut self, t: Timestamp) -> Result<(), HalError> {
        self.now = t;
        Ok(())
    }
}

// ── MemLog ────────────────────────────────────────────────────

/// Log writer that keeps every line in memory.
#[derive(Default)]
pub struct MemLog {
    pub lines: Vec<String>,
    pub syncs: u32,
    pub fail: bool,
}

impl LogWriter for MemLog {
    fn write_line(&mut self, line: &str) -> Result<(), HalError> {
        if self.fail {
            return Err(HalError::Io);
        }
        self.lines.push(line.to_owned());
        Ok(())
    }

    fn sync(&mut self) -> Result<(), HalError> {
        if self.fail {
            return Err(HalError::Io);
        }
        self.syncs += 1;
        Ok(())
    }
}

// ── FlashRecorder ─────────────────────────────────────────────

/// Indicator that records each flash pattern.
#[derive(Default)]
pub struct FlashRecorder {
    pub patterns: Vec<u8>,
}

impl Indicator for FlashRecorder {
    fn flash(&mut self, count: u8) {
        self.patterns.push(count);
    }
}

// ── Default board fixture ─────────────────────────────────────

/// Raw count for 25 °C on the board's IN_TEMP1 divider (exactly 20 kΩ).
pub const RAW_25C: u16 = 1950;

/// 2024-05-01 00:00:00 UTC.
pub const DAY0: Timestamp = 1_714_521_600;

#[allow(dead_code)]
pub const fn at(hour: u32, minute: u32) -> Timestamp {
    DAY0 + hour * 3600 + minute * 60
}

/// Mock wired like the default board with healthy readings: full battery,
/// 25 °C, moist soil, reservoir full.
#[allow(dead_code)]
pub fn healthy_board(now: Timestamp) -> MockBoard {
    let mut hal = MockBoard::new(now);
    hal.set_battery_mv(pins::BAT, 4_000);
    hal.adc_raw[usize::from(pins::IN_TEMP1)] = RAW_25C;
    hal.set_ohms(pins::GND_MOIST1, 6_000, 10_000);
    hal.inputs[usize::from(pins::WATER_LVL)] = PinState::Low;
    hal
}

/// Default-board monitor with a private shutoff mask, initialised.
#[allow(dead_code)]
pub fn board_monitor<'t>(
    hal: &mut MockBoard,
    config: SystemConfig,
    shutoff: &'t ShutoffRequests,
) -> Monitor<'t> {
    let mut monitor = Monitor::with_shutoff(board::tables(), config, shutoff).unwrap();
    monitor.init(hal);
    monitor
}
