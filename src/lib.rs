//! RhythmBadge firmware library.
//!
//! Exposes the protocol engine, request handlers and adapters for
//! integration testing on the host.  All ESP-IDF-specific code is guarded
//! by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod rpc;
pub mod scheduler;
