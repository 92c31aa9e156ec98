//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the mock transport and the in-memory card.  All tests run on
//! the host (x86_64) with no real hardware required.

mod engine_tests;
mod file_transfer_tests;
mod hardware_tests;
mod mock_hw;
