//! ghmon-sim: host simulation of the greenhouse monitor.
//!
//! Runs the real monitor core against a simulated board through a number of
//! wake/sleep cycles and prints the log output, standing in for the UART
//! console.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  SimBoard                                                   │
//! │  ADC model (battery, NTC, moisture) · PinBank<SimPin> · RTC │
//! │                                                             │
//! │  ───────────── Port Trait Boundary ─────────────            │
//! │                                                             │
//! │  Monitor: sensors · controllers · actuators · logger        │
//! │                                                             │
//! │  TextLogSink(stdout) · LedIndicator · hibernate = clock jump│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `ghmon-sim [hours]` (default 48).

use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result, anyhow};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};
use log::{Level, LevelFilter, Log, Metadata, Record, info, warn};
// std-backed critical section for the ISR atomics
use critical_section as _;

use ghmon::adapters::{LedIndicator, PinBank, TextLogSink};
use ghmon::app::ports::{AdcPort, Bias, ClockPort, GpioPort, HalError, PinId, PinMode, PinState, SleepPort};
use ghmon::calendar::{Date, SECONDS_PER_HOUR, TimeOfDay, Timestamp, date_to_seconds, seconds_to_date, seconds_to_time};
use ghmon::config::SystemConfig;
use ghmon::events::{IRQS, request_actuator_off_from_isr};
use ghmon::power::Intent;
use ghmon::{Monitor, board, pins};

const DEFAULT_HOURS: u32 = 48;
const ADC_MAX: f64 = 4095.0;
const VREF_MV: u16 = 3300;

// ── Console logger ────────────────────────────────────────────

/// Serial-console stand-in: every record goes to stdout with the simulated
/// wall-clock time.
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Simulated wall clock, shared with the logger.
static SIM_NOW: AtomicU32 = AtomicU32::new(0);

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let t = seconds_to_time(SIM_NOW.load(Ordering::Relaxed));
        println!(
            "{:02}:{:02}:{:02} {:<5} {}",
            t.hour,
            t.minute,
            t.second,
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

// ── Simulated pins ────────────────────────────────────────────

#[derive(Debug, Default)]
struct SimPin {
    latch: bool,
    input: bool,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.latch = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.latch = true;
        Ok(())
    }
}

impl StatefulOutputPin for SimPin {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.latch)
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.latch)
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.input)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.input)
    }
}

/// The LED flashes in zero simulated time.
struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

// ── Simulated board ───────────────────────────────────────────

struct SimBoard {
    now: Timestamp,
    adc_on: bool,
    gpio: PinBank<SimPin, { pins::PIN_COUNT }>,
    battery_mv: f64,
    /// Soil probe resistance; rises as the soil dries.
    soil_ohms: f64,
    reservoir_full: bool,
}

impl SimBoard {
    fn new(now: Timestamp) -> Result<Self> {
        let mut gpio = PinBank::new();
        for id in [pins::WATER_LVL, pins::BUTTON, pins::IRR1, pins::FAN1, pins::PUMP] {
            gpio.attach(id, SimPin::default())
                .map_err(|_| anyhow!("pin {} attached twice", id))?;
        }
        SIM_NOW.store(now, Ordering::Relaxed);
        Ok(Self {
            now,
            adc_on: false,
            gpio,
            battery_mv: 4_100.0,
            soil_ohms: 6_000.0,
            reservoir_full: true,
        })
    }

    fn output(&mut self, id: PinId) -> bool {
        self.gpio.pin_mut(id).is_some_and(|p| p.latch)
    }

    /// Greenhouse air temperature: 18 °C at night, 34 °C mid-afternoon.
    fn air_celsius(&self) -> f64 {
        let t = seconds_to_time(self.now);
        let hour = f64::from(t.hour) + f64::from(t.minute) / 60.0;
        let phase = (hour - 9.0) / 24.0 * std::f64::consts::TAU;
        26.0 + 8.0 * phase.sin()
    }

    /// Move the physical model forward by `secs`.
    fn advance(&mut self, secs: u32) {
        let hours = f64::from(secs) / f64::from(SECONDS_PER_HOUR);
        let watering = self.output(pins::IRR1);
        let pumping = self.output(pins::PUMP);
        let fan = self.output(pins::FAN1);

        self.soil_ohms = if watering {
            (self.soil_ohms - 6_000.0 * hours * 12.0).max(3_000.0)
        } else {
            (self.soil_ohms + 450.0 * hours).min(40_000.0)
        };
        let load_mv = if pumping || fan || watering { 8.0 } else { 1.5 };
        self.battery_mv = (self.battery_mv - load_mv * hours).max(3_000.0);
        self.now = self.now.saturating_add(secs);
        SIM_NOW.store(self.now, Ordering::Relaxed);
    }

    fn divider_raw(ohms: f64, series_ohms: f64) -> u16 {
        (ADC_MAX * ohms / (ohms + series_ohms)).round() as u16
    }

    fn ntc_raw(&self) -> u16 {
        let probe = board::IN_TEMP1_PROBE;
        let t = self.air_celsius() + 273.15;
        let t0 = f64::from(probe.ref_centi_celsius) / 100.0 + 273.15;
        let ohms = f64::from(probe.ref_ohms) * (f64::from(probe.beta) * (1.0 / t - 1.0 / t0)).exp();
        Self::divider_raw(ohms, f64::from(probe.series_ohms))
    }
}

impl AdcPort for SimBoard {
    fn adc_on(&mut self) -> Result<(), HalError> {
        self.adc_on = true;
        Ok(())
    }

    fn adc_off(&mut self) {
        self.adc_on = false;
    }

    fn adc_is_on(&self) -> bool {
        self.adc_on
    }

    fn adc_read_pin(&mut self, pin: PinId) -> Result<u16, HalError> {
        if !self.adc_on {
            return Err(HalError::Busy);
        }
        match pin {
            pins::BAT => Ok((self.battery_mv / 2.0 / f64::from(VREF_MV) * ADC_MAX).round() as u16),
            pins::IN_TEMP1 => Ok(self.ntc_raw()),
            pins::GND_MOIST1 => Ok(Self::divider_raw(self.soil_ohms, 10_000.0)),
            _ => Err(HalError::InvalidPin),
        }
    }

    fn adc_read_vref_mv(&mut self) -> Result<u16, HalError> {
        if self.adc_on {
            Ok(VREF_MV)
        } else {
            Err(HalError::Busy)
        }
    }
}

impl GpioPort for SimBoard {
    fn gpio_set_mode(&mut self, pin: PinId, mode: PinMode, bias: Bias) -> Result<(), HalError> {
        if pin == pins::WATER_LVL {
            let reservoir_full = self.reservoir_full;
            if let Some(p) = self.gpio.pin_mut(pin) {
                // Float switch pulls the line low when water is present.
                p.input = !reservoir_full;
            }
        }
        self.gpio.gpio_set_mode(pin, mode, bias)
    }

    fn output_pin_on(&mut self, pin: PinId) -> Result<(), HalError> {
        self.gpio.output_pin_on(pin)
    }

    fn output_pin_off(&mut self, pin: PinId) -> Result<(), HalError> {
        self.gpio.output_pin_off(pin)
    }

    fn gpio_read(&mut self, pin: PinId) -> Result<PinState, HalError> {
        self.gpio.gpio_read(pin)
    }
}

impl ClockPort for SimBoard {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn set_time(&mut self, t: Timestamp) -> Result<(), HalError> {
        self.now = t;
        SIM_NOW.store(t, Ordering::Relaxed);
        Ok(())
    }
}

impl SleepPort for SimBoard {
    fn hibernate_until(&mut self, wake_at: Timestamp) {
        let secs = wake_at.saturating_sub(self.now);
        self.advance(secs);
    }
}

// ── Stdout text sink ──────────────────────────────────────────

/// UART stand-in for the status log.
struct Stdout;

impl fmt::Write for Stdout {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        print!("{}", s);
        Ok(())
    }
}

// ── Scripted events ───────────────────────────────────────────

/// Things a person (or the plumbing) does to the board during the run.
fn scripted_events(board: &mut SimBoard, start: Timestamp, last: Timestamp) {
    let now = board.now;
    let hour = |h: u32| start + h * SECONDS_PER_HOUR;
    let crossed = |t: Timestamp| last < t && now >= t;

    // Morning status check.
    if crossed(hour(3)) {
        IRQS.button_pressed();
    }
    // Reservoir runs dry; the float switch ISR cuts the pump at once.
    if crossed(hour(20)) {
        info!("(sim) reservoir empty");
        board.reservoir_full = false;
        request_actuator_off_from_isr(board::ACTUATOR_PUMP);
    }
    if crossed(hour(26)) {
        info!("(sim) reservoir refilled");
        board.reservoir_full = true;
    }
    // Operator forces a log sync.
    if crossed(hour(30)) {
        IRQS.button_pressed();
        IRQS.button_pressed();
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Info))
        .map_err(|e| anyhow!("logger: {}", e))?;

    let hours: u32 = match std::env::args().nth(1) {
        Some(arg) => arg.parse().with_context(|| format!("bad hour count '{}'", arg))?,
        None => DEFAULT_HOURS,
    };

    info!("ghmon-sim v{}", env!("CARGO_PKG_VERSION"));

    let start = date_to_seconds(
        Date { year: 2024, month: 5, day: 1 },
        TimeOfDay { hour: 6, minute: 0, second: 0 },
    )
    .ok_or_else(|| anyhow!("start date out of range"))?;
    let end = start + hours * SECONDS_PER_HOUR;

    let config = SystemConfig::default();
    let mut monitor = Monitor::new(board::tables(), config)
        .map_err(|e| anyhow!("monitor setup failed: {}", e))?;

    let mut hal = SimBoard::new(start)?;
    let mut sink = TextLogSink::new(Stdout);
    let mut led = LedIndicator::new(SimPin::default(), NoDelay);

    monitor.init(&mut hal);

    let mut cycles = 0u32;
    let mut last = start;
    while hal.now() < end {
        scripted_events(&mut hal, start, last);
        last = hal.now();

        IRQS.take();
        let presses = IRQS.take_presses();
        let mut intent = Intent::NONE;
        if presses > 0 {
            intent = intent | monitor.handle_button(&mut hal, presses);
        }

        let report = monitor.cycle(&mut hal, &mut sink, &mut led, intent);
        cycles += 1;
        if report.wake_at <= hal.now() {
            warn!("wake time not in the future, stopping");
            break;
        }
        hal.hibernate_until(report.wake_at);
    }

    // Write out whatever is still buffered.
    monitor.log_status(&mut hal, &mut sink, true);

    let date = seconds_to_date(hal.now());
    info!(
        "Simulated {} cycle(s) up to {}-{:02}-{:02}, {} log line(s), warnings {:#04x}",
        cycles,
        date.year,
        date.month,
        date.day,
        sink.lines(),
        monitor.warnings().bits()
    );
    Ok(())
}
