//! Badge service: the request handler table.
//!
//! [`BadgeService::handle`] runs the side effects of a decoded request and
//! says whether the request is finished or owes a response.
//! [`BadgeService::respond`] later gathers the response fields.  The
//! protocol engine decides *when* each half runs; this module only decides
//! *what* they do.
//!
//! ```text
//!   Request ──▶ handle() ──▶ Dispatch::Finished
//!                        └─▶ Dispatch::Respond(PendingResponse) ──▶ respond() ──▶ Response
//! ```

use log::{debug, info, warn};

use super::files::{self, DownloadSession};
use super::ports::{BadgePorts, SamplingError, SpaceInfo};
use crate::config::BadgeConfig;
use crate::rpc::messages::{FileName, ImuReading, Request, Response, Timestamp, VERSION_STR_LEN};

// ───────────────────────────────────────────────────────────────
// Hand-off types
// ───────────────────────────────────────────────────────────────

/// When a request reached the badge.
///
/// Captured from the oldest queued notification before the handler runs,
/// so a response reports request arrival rather than completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrivalStamp {
    pub ticks: u64,
    pub timestamp: Timestamp,
    pub clock_synced: bool,
}

/// A response still to be built, with whatever the request carried that
/// the builder needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingResponse {
    Status { time_delta: i32 },
    StartMicrophone,
    StartScan,
    StartImu,
    FreeSpace,
    EraseAll,
    ImuData,
    FirmwareVersion,
    ListFiles { start_index: u8, max_files: u8 },
    StartDownload { filename: FileName },
    DownloadChunk { chunk_index: u32 },
    FileChecksum { filename: FileName },
}

/// Outcome of [`BadgeService::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// No response is owed; the next request may be drained.
    Finished,
    /// A response must be built and sent.
    Respond(PendingResponse),
}

// ───────────────────────────────────────────────────────────────
// BadgeService
// ───────────────────────────────────────────────────────────────

pub struct BadgeService {
    version: [u8; VERSION_STR_LEN],
    download: DownloadSession,
}

impl BadgeService {
    pub fn new(config: &BadgeConfig) -> Self {
        let mut version = [0u8; VERSION_STR_LEN];
        let label = config.firmware_version.as_bytes();
        let n = label.len().min(VERSION_STR_LEN);
        version[..n].copy_from_slice(&label[..n]);

        Self {
            version,
            download: DownloadSession::new(),
        }
    }

    pub fn download(&self) -> &DownloadSession {
        &self.download
    }

    // ── Request half ──────────────────────────────────────────

    /// Apply a request's side effects.
    ///
    /// Requests that carry a timestamp sync the clock first and re-stamp
    /// `arrival` on the synced clock.
    pub fn handle<P: BadgePorts>(
        &mut self,
        request: Request,
        arrival: &mut ArrivalStamp,
        ports: &mut P,
    ) -> Dispatch {
        match request {
            Request::Status {
                timestamp,
                assignment,
            } => {
                let time_delta = sync_clock(timestamp, arrival, ports);
                if let Some(assignment) = assignment {
                    info!(
                        "RPC: badge assigned id {} group {}",
                        assignment.id, assignment.group
                    );
                    ports.set_badge_assignment(assignment);
                }
                Dispatch::Respond(PendingResponse::Status { time_delta })
            }
            Request::StartMicrophone { timestamp, mode } => {
                sync_clock(timestamp, arrival, ports);
                info!("RPC: start microphone, mode {mode}");
                let started = ports.start_microphone(mode);
                started_or_restart(started, PendingResponse::StartMicrophone, ports)
            }
            Request::StartScan {
                timestamp,
                window,
                interval,
            } => {
                sync_clock(timestamp, arrival, ports);
                info!("RPC: start scan, window {window} interval {interval}");
                let started = ports.start_scan(window, interval);
                started_or_restart(started, PendingResponse::StartScan, ports)
            }
            Request::StartImu {
                timestamp,
                acc_fsr,
                gyr_fsr,
                datarate,
            } => {
                sync_clock(timestamp, arrival, ports);
                info!("RPC: start imu, acc_fsr {acc_fsr} gyr_fsr {gyr_fsr} datarate {datarate}");
                let started = ports.start_imu(acc_fsr, gyr_fsr, datarate);
                started_or_restart(started, PendingResponse::StartImu, ports)
            }
            Request::StopMicrophone => {
                info!("RPC: stop microphone");
                ports.stop_microphone();
                Dispatch::Finished
            }
            Request::StopScan => {
                info!("RPC: stop scan");
                ports.stop_scan();
                Dispatch::Finished
            }
            Request::StopImu => {
                info!("RPC: stop imu");
                ports.stop_imu();
                Dispatch::Finished
            }
            Request::Identify { timeout_secs } => {
                info!("RPC: identify for {timeout_secs} s");
                ports.identify(timeout_secs);
                Dispatch::Finished
            }
            Request::Restart => {
                info!("RPC: restart requested");
                ports.restart();
                Dispatch::Finished
            }
            Request::FreeSpace => Dispatch::Respond(PendingResponse::FreeSpace),
            Request::EraseAll => Dispatch::Respond(PendingResponse::EraseAll),
            Request::ImuData => Dispatch::Respond(PendingResponse::ImuData),
            Request::FirmwareVersion => Dispatch::Respond(PendingResponse::FirmwareVersion),
            Request::ListFiles {
                start_index,
                max_files,
            } => Dispatch::Respond(PendingResponse::ListFiles {
                start_index,
                max_files,
            }),
            Request::StartDownload { filename } => {
                Dispatch::Respond(PendingResponse::StartDownload { filename })
            }
            Request::DownloadChunk { chunk_index } => {
                Dispatch::Respond(PendingResponse::DownloadChunk { chunk_index })
            }
            Request::FileChecksum { filename } => {
                Dispatch::Respond(PendingResponse::FileChecksum { filename })
            }
        }
    }

    // ── Response half ─────────────────────────────────────────

    /// Gather the fields of a pending response.
    ///
    /// Storage requests that would race an active sampler get an
    /// "unavailable" response without touching storage.
    pub fn respond<P: BadgePorts>(
        &mut self,
        pending: PendingResponse,
        arrival: &ArrivalStamp,
        ports: &mut P,
    ) -> Response {
        let timestamp = arrival.timestamp;

        match pending {
            PendingResponse::Status { time_delta } => Response::Status {
                flags: ports.status_flags(),
                battery_level: ports.battery_level(),
                pdm_data: ports.latest_pdm_sample(),
                scan_data: ports.latest_scan_rssi(),
                time_delta,
                timestamp,
            },
            PendingResponse::StartMicrophone => Response::StartMicrophone {
                timestamp,
                settings: ports.microphone(),
            },
            PendingResponse::StartScan => Response::StartScan {
                timestamp,
                settings: ports.scanner(),
            },
            PendingResponse::StartImu => Response::StartImu {
                timestamp,
                settings: ports.imu(),
            },
            PendingResponse::FreeSpace => {
                let space = if ports.is_sampling() {
                    debug!("RPC: free space unavailable while sampling");
                    SpaceInfo::default()
                } else {
                    ports.free_space().unwrap_or_else(|e| {
                        warn!("RPC: free space query failed: {e}");
                        SpaceInfo::default()
                    })
                };
                Response::FreeSpace {
                    total_space: space.total,
                    free_space: space.free,
                    timestamp,
                }
            }
            PendingResponse::EraseAll => {
                let done = if ports.is_sampling() {
                    debug!("RPC: erase refused while sampling");
                    false
                } else {
                    match ports.erase_all() {
                        Ok(()) => true,
                        Err(e) => {
                            warn!("RPC: erase failed: {e}");
                            false
                        }
                    }
                };
                Response::EraseAll { done, timestamp }
            }
            PendingResponse::ImuData => {
                let reading = if ports.status_flags().imu {
                    ports.imu_reading()
                } else {
                    ImuReading::default()
                };
                Response::ImuData { reading, timestamp }
            }
            PendingResponse::FirmwareVersion => Response::FirmwareVersion {
                version: self.version,
            },
            PendingResponse::ListFiles {
                start_index,
                max_files,
            } => {
                let listing =
                    files::list_files(ports, start_index, max_files).unwrap_or_else(|e| {
                        warn!("RPC: listing files failed: {e}");
                        Default::default()
                    });
                Response::ListFiles(listing)
            }
            PendingResponse::StartDownload { filename } => {
                if ports.is_sampling() {
                    debug!("RPC: download refused while sampling");
                    Response::StartDownload {
                        file_size: 0,
                        total_chunks: 0,
                        success: false,
                    }
                } else {
                    self.download.start(ports, &filename)
                }
            }
            PendingResponse::DownloadChunk { chunk_index } => {
                Response::DownloadChunk(self.download.read_chunk(ports, chunk_index))
            }
            PendingResponse::FileChecksum { filename } => {
                let checksum = if ports.is_sampling() {
                    debug!("RPC: checksum refused while sampling");
                    None
                } else {
                    files::file_checksum(ports, &filename)
                        .inspect_err(|e| warn!("RPC: checksum of {filename:?} failed: {e}"))
                        .ok()
                };
                Response::FileChecksum {
                    checksum: checksum.unwrap_or(0),
                    success: checksum.is_some(),
                }
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Helpers
// ───────────────────────────────────────────────────────────────

/// Apply a controller timestamp taken at the request's arrival.
fn sync_clock<P: BadgePorts>(timestamp: Timestamp, arrival: &mut ArrivalStamp, ports: &mut P) -> i32 {
    let delta = ports.set_timestamp(arrival.ticks, timestamp);
    ports.set_clock_synced(true);
    arrival.timestamp = ports.timestamp_at(arrival.ticks);
    arrival.clock_synced = true;
    debug!("CLOCK: synced at tick {}, correction {delta} ms", arrival.ticks);
    delta
}

/// A sampler that cannot start means storage is unusable; reset the device.
fn started_or_restart<P: BadgePorts>(
    started: Result<(), SamplingError>,
    pending: PendingResponse,
    ports: &mut P,
) -> Dispatch {
    match started {
        Ok(()) => Dispatch::Respond(pending),
        Err(e) => {
            warn!("RPC: sampler failed to start ({e}), restarting");
            ports.restart();
            Dispatch::Finished
        }
    }
}
