//! Port traits: the boundary between the request handlers and the badge's
//! collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BadgeService (request handlers)
//! ```
//!
//! The protocol engine never touches the clock, sensors, storage or the
//! advertiser directly; [`BadgeService`](super::service::BadgeService)
//! reaches them through these traits, so every handler runs on the host
//! against mocks.

use core::fmt;

use crate::rpc::messages::{
    BadgeAssignment, FileName, ImuReading, ImuSettings, MicrophoneSettings, ScanSettings,
    Timestamp,
};

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Tick counter plus controller-synchronised wall clock.
pub trait ClockPort {
    /// Current value of the free-running tick counter.
    fn now_ticks(&self) -> u64;

    /// Declare that the controller's wall time was `timestamp` at `ticks`.
    /// Returns the correction in milliseconds versus the previous estimate.
    fn set_timestamp(&mut self, ticks: u64, timestamp: Timestamp) -> i32;

    /// Whether a timestamp has been applied since boot.
    fn is_synced(&self) -> bool;

    /// Wall time corresponding to `ticks` under the current sync.
    fn timestamp_at(&self, ticks: u64) -> Timestamp;
}

// ───────────────────────────────────────────────────────────────
// Sampling port
// ───────────────────────────────────────────────────────────────

/// Starts and stops the sensor samplers that write to storage.
pub trait SamplingPort {
    fn start_microphone(&mut self, mode: u8) -> Result<(), SamplingError>;
    fn stop_microphone(&mut self);

    fn start_scan(&mut self, window: u16, interval: u16) -> Result<(), SamplingError>;
    fn stop_scan(&mut self);

    fn start_imu(&mut self, acc_fsr: u16, gyr_fsr: u16, datarate: u16)
    -> Result<(), SamplingError>;
    fn stop_imu(&mut self);

    /// True while any sampler holds a storage write session.
    fn is_sampling(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Sensor port
// ───────────────────────────────────────────────────────────────

/// Read-only view of the sensor drivers' effective state.
pub trait SensorPort {
    fn microphone(&self) -> MicrophoneSettings;
    fn scanner(&self) -> ScanSettings;
    fn imu(&self) -> ImuSettings;

    /// Latest IMU axes.
    fn imu_reading(&self) -> ImuReading;

    /// Battery level in percent.
    fn battery_level(&self) -> i8;

    /// Most recent raw microphone sample.
    fn latest_pdm_sample(&self) -> u32;

    /// RSSI of the most recent scan hit.
    fn latest_scan_rssi(&self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Advertiser port
// ───────────────────────────────────────────────────────────────

/// Status flags carried in the advertising record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub clock_synced: bool,
    pub microphone: bool,
    pub scan: bool,
    pub imu: bool,
}

/// The advertising record's mutable fields.
pub trait AdvertiserPort {
    fn status_flags(&self) -> StatusFlags;
    fn set_clock_synced(&mut self, synced: bool);
    fn badge_assignment(&self) -> BadgeAssignment;
    fn set_badge_assignment(&mut self, assignment: BadgeAssignment);
}

// ───────────────────────────────────────────────────────────────
// File store port
// ───────────────────────────────────────────────────────────────

/// Total and free capacity of the removable storage, in kilobytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpaceInfo {
    pub total: u32,
    pub free: u32,
}

/// One regular file as reported by a directory walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEntry {
    pub name: FileName,
    pub size: u32,
    /// FAT modification date.
    pub timestamp: u32,
}

/// Opaque handle to an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle(pub u8);

/// A file opened for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    pub handle: FileHandle,
    pub size: u32,
}

/// Removable storage primitives used by the file-transfer handlers.
pub trait FileStorePort {
    fn free_space(&mut self) -> Result<SpaceInfo, StorageError>;

    fn erase_all(&mut self) -> Result<(), StorageError>;

    /// Visit every regular file of the root directory in directory order.
    /// Directories and hidden entries are skipped.
    fn list_dir(&mut self, visit: &mut dyn FnMut(&FileEntry)) -> Result<(), StorageError>;

    fn open(&mut self, name: &[u8]) -> Result<OpenFile, StorageError>;

    /// Read up to `buf.len()` bytes at `offset`; returns the count read.
    fn read_at(
        &mut self,
        handle: FileHandle,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<usize, StorageError>;

    fn close(&mut self, handle: FileHandle);
}

// ───────────────────────────────────────────────────────────────
// System port
// ───────────────────────────────────────────────────────────────

/// Device-level actions.
pub trait SystemPort {
    /// Light the status LED for `timeout_secs` seconds (blocking).
    fn identify(&mut self, timeout_secs: u16);

    /// Reset the whole device.
    fn restart(&mut self);
}

/// Everything a request handler may touch, as one bound.
pub trait BadgePorts:
    ClockPort + SamplingPort + SensorPort + AdvertiserPort + FileStorePort + SystemPort
{
}

impl<T> BadgePorts for T where
    T: ClockPort + SamplingPort + SensorPort + AdvertiserPort + FileStorePort + SystemPort
{
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`FileStorePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// No file with the requested name.
    NotFound,
    /// Too many files open.
    NoHandles,
    /// The card reported an I/O failure.
    Io,
    /// The card is not mounted.
    Unavailable,
}

/// Errors from [`SamplingPort`] start operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingError {
    /// The storage session backing the sampler could not be opened.
    StorageUnavailable,
    /// The sensor driver rejected its configuration.
    SensorFault,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "file not found"),
            Self::NoHandles => write!(f, "no free file handles"),
            Self::Io => write!(f, "I/O error"),
            Self::Unavailable => write!(f, "card unavailable"),
        }
    }
}

impl fmt::Display for SamplingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageUnavailable => write!(f, "storage unavailable"),
            Self::SensorFault => write!(f, "sensor fault"),
        }
    }
}
