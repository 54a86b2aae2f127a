//! Interrupt-to-main-loop signalling.
//!
//! ISRs never call into the registries.  They only set bits here, and the
//! main loop (or the actuator registry) picks them up on its next pass.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌──────────────────────┐
//! │ Button ISR  │────▶│ IrqFlags         │────▶│ power cycle loop     │
//! │ UART ISR    │────▶│ (atomic bits +   │     │ (take() once a pass) │
//! │ Level ISR   │──┐  │  press counter)  │     └──────────────────────┘
//! └─────────────┘  │  └──────────────────┘
//!                  │  ┌──────────────────┐     ┌──────────────────────┐
//!                  └─▶│ ShutoffRequests  │────▶│ ActuatorRegistry     │
//!                     │ (bit per device) │     │ (drains on next call)│
//!                     └──────────────────┘     └──────────────────────┘
//! ```
//!
//! `portable_atomic` keeps this working on parts without native
//! compare-and-swap (AVR, Cortex-M0), where it falls back to a critical
//! section.

use portable_atomic::{AtomicU8, AtomicU32, Ordering};

// ── IRQ flags ─────────────────────────────────────────────────

/// Interrupt sources the main loop cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Irq {
    Button = 0b0000_0001,
    Uart = 0b0000_0010,
    WaterLevel = 0b0000_0100,
}

impl Irq {
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

/// Pending IRQ bits plus the button press count since the last pass.
pub struct IrqFlags {
    pending: AtomicU8,
    presses: AtomicU8,
}

impl IrqFlags {
    pub const fn new() -> Self {
        Self {
            pending: AtomicU8::new(0),
            presses: AtomicU8::new(0),
        }
    }

    /// Mark `irq` pending.  Lock-free, safe to call from interrupt context.
    pub fn raise(&self, irq: Irq) {
        self.pending.fetch_or(irq.mask(), Ordering::AcqRel);
    }

    /// Debounced button edge.  Saturates rather than wrapping.
    pub fn button_pressed(&self) {
        let _ = self
            .presses
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_add(1));
        self.raise(Irq::Button);
    }

    pub fn any_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire) != 0
    }

    /// Take and clear all pending bits.
    pub fn take(&self) -> u8 {
        self.pending.swap(0, Ordering::AcqRel)
    }

    /// Take and clear the press count.
    pub fn take_presses(&self) -> u8 {
        self.presses.swap(0, Ordering::AcqRel)
    }
}

impl Default for IrqFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// The board's interrupt handlers write here.
pub static IRQS: IrqFlags = IrqFlags::new();

// ── Asynchronous actuator shutoff ─────────────────────────────

/// One bit per actuator index (up to 32) that an ISR wants forced off.
///
/// The actuator registry drains the mask at the start of its next call and
/// drives each flagged actuator to 0 through the normal `set` path, so the
/// status table is only ever written from the main loop.
pub struct ShutoffRequests {
    mask: AtomicU32,
}

impl ShutoffRequests {
    pub const fn new() -> Self {
        Self {
            mask: AtomicU32::new(0),
        }
    }

    /// Ask for actuator `index` to be turned off.  ISR-safe.
    /// Indices past 31 are ignored.
    pub fn request(&self, index: usize) {
        if index < 32 {
            self.mask.fetch_or(1 << index, Ordering::AcqRel);
        }
    }

    pub fn pending(&self) -> bool {
        self.mask.load(Ordering::Acquire) != 0
    }

    /// Take and clear the pending mask.
    pub fn take(&self) -> u32 {
        self.mask.swap(0, Ordering::AcqRel)
    }
}

impl Default for ShutoffRequests {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutoff requests raised by the board's ISRs.
pub static ACTUATOR_SHUTOFF: ShutoffRequests = ShutoffRequests::new();

/// Force actuator `index` off on the next registry call.
/// Lock-free, safe to call from interrupt context.
pub fn request_actuator_off_from_isr(index: usize) {
    ACTUATOR_SHUTOFF.request(index);
    IRQS.raise(Irq::WaterLevel);
}
