//! Application core: request handling, zero I/O.
//!
//! The handlers for every controller request live here.  All interaction
//! with hardware happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod files;
pub mod ports;
pub mod service;
