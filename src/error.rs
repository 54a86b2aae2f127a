//! Unified error types for the monitor core.
//!
//! Every registry, controller and device routine reports through the single
//! `Error` enum below.  All variants are `Copy` so they can be stored in the
//! per-device status slots and surfaced to the logger without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Result kinds shared by sensors, controllers and actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Transient condition; the caller should try again after a delay.
    Retry,
    /// Generic failure.  Logged, never fatal to a scheduling pass.
    Unknown,
    /// A device failed to initialise and is treated as absent.
    Init,
    /// Programming error: bad index, unknown name, bad table entry.
    BadArgument,
    /// A fixed-capacity buffer or table is full.
    NoMemory,
    /// An operation did not complete in its allotted time.
    Timeout,
    /// The hardware or the current power state refused the operation.
    Denied,
    /// A peripheral access failed.
    Hal(HalError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "retry requested"),
            Self::Unknown => write!(f, "unknown error"),
            Self::Init => write!(f, "initialisation failed"),
            Self::BadArgument => write!(f, "bad argument"),
            Self::NoMemory => write!(f, "out of memory"),
            Self::Timeout => write!(f, "timed out"),
            Self::Denied => write!(f, "denied"),
            Self::Hal(e) => write!(f, "hal: {e}"),
        }
    }
}

impl Error {
    /// Short numeric code appended to error log lines as `E<n>`.
    pub const fn code(self) -> u8 {
        match self {
            Self::Retry => 1,
            Self::Unknown => 2,
            Self::Init => 3,
            Self::BadArgument => 4,
            Self::NoMemory => 5,
            Self::Timeout => 6,
            Self::Denied => 7,
            Self::Hal(_) => 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Peripheral errors
// ---------------------------------------------------------------------------

/// Errors reported by the hardware abstraction layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// The peripheral did not answer within its bounded timeout.
    Timeout,
    /// The peripheral is powered down or claimed by another user.
    Busy,
    /// The pin or channel is not valid for the requested operation.
    InvalidPin,
    /// The peripheral refused the operation.
    Denied,
    /// Any other low-level failure.
    Io,
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "peripheral timeout"),
            Self::Busy => write!(f, "peripheral busy"),
            Self::InvalidPin => write!(f, "invalid pin"),
            Self::Denied => write!(f, "access denied"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl From<HalError> for Error {
    fn from(e: HalError) -> Self {
        match e {
            HalError::Timeout => Self::Timeout,
            HalError::Denied => Self::Denied,
            HalError::InvalidPin => Self::BadArgument,
            other => Self::Hal(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
