//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises the monitor against the
//! mock board in `mock_hw`.  All tests run on the host with no real
//! hardware required.

mod irrigation_tests;
mod mock_hw;
mod monitor_tests;
mod power_cycle_tests;
mod retry_tests;
