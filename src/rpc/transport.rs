//! Transport abstraction for the controller link.
//!
//! Concrete implementations:
//! - BLE GATT service ([`BleTransport`](crate::adapters::ble_transport::BleTransport))
//! - scripted in-memory transport (integration tests)
//!
//! The engine only ever needs three primitives: a bounded wait for an
//! exact number of received bytes, a bounded whole-frame transmit and a
//! forced disconnect.

use core::fmt;

use embassy_time::Duration;

/// Why a bounded wait for received bytes ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitError {
    /// The bytes did not arrive within the timeout.
    Timeout,
    /// The link dropped while waiting.
    Disconnected,
}

/// Outcome classes of a failed transmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitError {
    /// The stack is temporarily out of transmit buffers; retrying may succeed.
    NoBuffers,
    /// Disconnected, invalid state, or any other failure.
    Fatal,
}

impl fmt::Display for AwaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

impl fmt::Display for TransmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBuffers => write!(f, "out of transmit buffers"),
            Self::Fatal => write!(f, "transmit failed"),
        }
    }
}

/// Controller link as seen by the protocol engine.
pub trait Transport {
    /// Fill `buf` completely from the received byte stream, waiting at
    /// most `timeout` for the bytes to become available.
    fn await_bytes(&mut self, buf: &mut [u8], timeout: Duration) -> Result<(), AwaitError>;

    /// Queue one complete frame for transmission.
    fn transmit(&mut self, frame: &[u8], timeout: Duration) -> Result<(), TransmitError>;

    /// Drop the current connection and discard any buffered bytes.
    fn disconnect(&mut self);
}

/// A transport with nothing connected.  Every wait times out and every
/// transmit fails.
pub struct NullTransport;

impl Transport for NullTransport {
    fn await_bytes(&mut self, _buf: &mut [u8], _timeout: Duration) -> Result<(), AwaitError> {
        Err(AwaitError::Disconnected)
    }

    fn transmit(&mut self, _frame: &[u8], _timeout: Duration) -> Result<(), TransmitError> {
        Err(TransmitError::Fatal)
    }

    fn disconnect(&mut self) {}
}
