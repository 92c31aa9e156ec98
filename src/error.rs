//! Unified error types for the badge firmware.
//!
//! A single `Error` enum every subsystem converts into, keeping the
//! scheduler-level handling uniform.  All variants are `Copy` so they can
//! travel through the protocol engine's recovery path without allocation.

use core::fmt;

use crate::app::ports::{SamplingError, StorageError};
use crate::rpc::transport::{AwaitError, TransmitError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The controller connection hit a connection-fatal condition.
    Protocol(ProtocolError),
    /// The removable storage rejected an operation.
    Storage(StorageError),
    /// A sensor sampler could not be started.
    Sampling(SamplingError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Sampling(e) => write!(f, "sampling: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

/// Which of the two reassembly reads was in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStage {
    /// The 2-byte length prefix.
    Length,
    /// The payload announced by the prefix.
    Payload,
}

impl fmt::Display for ReadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length => write!(f, "length prefix"),
            Self::Payload => write!(f, "payload"),
        }
    }
}

/// Connection-fatal protocol conditions.
///
/// Each one routes through the engine's single recovery path: the
/// notification queue is flushed, the link is dropped and both exclusion
/// gates return to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The transport did not deliver the awaited bytes in time.
    AwaitTimeout(ReadStage),
    /// The link went away while awaiting bytes.
    LinkLost(ReadStage),
    /// The length prefix announced more bytes than the request buffer holds.
    FrameTooLarge(u16),
    /// Queued notifications cover fewer bytes than the frame just read.
    Desynchronized { missing: u16 },
    /// The frame's discriminant matches no known request.
    UnknownRequest(u8),
    /// The frame was shorter than its request variant's fields.
    MalformedRequest(u8),
    /// A response frame carried an unknown discriminant (controller side).
    UnknownResponse(u8),
    /// A response frame was shorter than its variant's fields.
    MalformedResponse(u8),
    /// The transport rejected a response with a non-retryable error.
    TransmitFailed,
    /// Transient transmit failures exceeded the configured attempt budget.
    RetriesExhausted(u8),
    /// A follow-up task could not be queued.
    SchedulerFull,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitTimeout(stage) => write!(f, "timed out awaiting {stage}"),
            Self::LinkLost(stage) => write!(f, "link lost while awaiting {stage}"),
            Self::FrameTooLarge(len) => write!(f, "frame of {len} bytes exceeds request buffer"),
            Self::Desynchronized { missing } => {
                write!(f, "notifications short by {missing} bytes")
            }
            Self::UnknownRequest(tag) => write!(f, "unknown request discriminant {tag}"),
            Self::MalformedRequest(tag) => write!(f, "truncated request {tag}"),
            Self::UnknownResponse(tag) => write!(f, "unknown response discriminant {tag}"),
            Self::MalformedResponse(tag) => write!(f, "truncated response {tag}"),
            Self::TransmitFailed => write!(f, "transmit failed"),
            Self::RetriesExhausted(n) => write!(f, "transmit still busy after {n} attempts"),
            Self::SchedulerFull => write!(f, "scheduler queue full"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<SamplingError> for Error {
    fn from(e: SamplingError) -> Self {
        Self::Sampling(e)
    }
}

impl From<TransmitError> for ProtocolError {
    fn from(_: TransmitError) -> Self {
        Self::TransmitFailed
    }
}

impl AwaitError {
    /// Classify an await failure at the given read stage.
    pub fn at(self, stage: ReadStage) -> ProtocolError {
        match self {
            Self::Timeout => ProtocolError::AwaitTimeout(stage),
            Self::Disconnected => ProtocolError::LinkLost(stage),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
