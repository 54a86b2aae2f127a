//! Application core: scheduling and dispatch with no direct I/O.
//!
//! All interaction with hardware happens through the **port traits** in
//! [`ports`]; [`service::Monitor`] drives the registries through them, so
//! this layer is fully testable without real peripherals.

pub mod ports;
pub mod service;
