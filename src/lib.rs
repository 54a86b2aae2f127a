//! Greenhouse monitor firmware library.
//!
//! Table-driven sensor sampling, scheduled controllers and actuators, status
//! logging and power-cycle planning for small battery-powered boards.  The
//! core is `no_std` and allocation-free; hardware is reached only through the
//! port traits in [`app::ports`], so everything runs on the host in tests.

#![cfg_attr(not(test), no_std)]
#![deny(unused_must_use)]

pub mod actuators;
pub mod adapters;
pub mod app;
pub mod board;
pub mod calendar;
pub mod config;
pub mod controllers;
pub mod error;
pub mod events;
pub mod fixed;
pub mod logger;
pub mod pins;
pub mod power;
pub mod scheduler;
pub mod sensors;
pub mod threshold;
pub mod warnings;

mod flags;

pub use app::service::{CycleReport, DeviceTables, Monitor};
pub use error::{Error, HalError, Result};
