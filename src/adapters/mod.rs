//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements  | Connects to                         |
//! |-------------|-------------|-------------------------------------|
//! | `pin_bank`  | GpioPort    | `embedded-hal` digital pins         |
//! | `indicator` | Indicator   | status LED pin + `embedded-hal` delay |
//! | `log_sink`  | LogWriter   | any `core::fmt::Write` (UART, file) |
//!
//! ADC and RTC access are too board-specific to share; a board adapter
//! implements those ports directly and delegates GPIO to a [`PinBank`].

pub mod indicator;
pub mod log_sink;
pub mod pin_bank;

pub use indicator::LedIndicator;
pub use log_sink::TextLogSink;
pub use pin_bank::PinBank;
