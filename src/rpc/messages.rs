//! Request and response messages exchanged with the controller.
//!
//! Every payload is one discriminant byte followed by that variant's
//! fields, packed and little-endian:
//!
//! ```text
//! ┌──────────┬───────────────────────────────────────────┐
//! │ tag (1B) │ variant fields (fixed layout per tag)     │
//! └──────────┴───────────────────────────────────────────┘
//! ```
//!
//! Responses are always padded to the largest variant so the controller
//! sees a constant frame length.  Requests may arrive padded the same way;
//! bytes past a variant's fields are ignored.

use crate::app::ports::{FileEntry, StatusFlags};
use crate::error::ProtocolError;

/// Filename buffer length on the wire (8.3 name plus NUL).
pub const MAX_FILENAME_LEN: usize = 12;
/// Maximum entries carried by one list-files response.
pub const LIST_FILES_MAX_ENTRIES: usize = 3;
/// Payload bytes per download chunk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 16;
/// Firmware version buffer length.
pub const VERSION_STR_LEN: usize = 32;

/// Largest response body (the list-files page).
pub const MAX_RESPONSE_BODY: usize = 3 + LIST_FILES_MAX_ENTRIES * (MAX_FILENAME_LEN + 8);
/// Payload length of every response frame.
pub const RESPONSE_PAYLOAD_LEN: usize = 1 + MAX_RESPONSE_BODY;

// ── Discriminants ─────────────────────────────────────────────

/// Request discriminants, fixed for compatibility with deployed hubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestTag {
    Status = 1,
    StartMicrophone = 2,
    StopMicrophone = 3,
    StartScan = 4,
    StopScan = 5,
    StartImu = 6,
    StopImu = 7,
    Identify = 27,
    Restart = 29,
    FreeSpace = 30,
    EraseAll = 31,
    ImuData = 33,
    FirmwareVersion = 35,
    ListFiles = 37,
    StartDownload = 39,
    DownloadChunk = 40,
    FileChecksum = 41,
}

impl TryFrom<u8> for RequestTag {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Ok(match raw {
            1 => Self::Status,
            2 => Self::StartMicrophone,
            3 => Self::StopMicrophone,
            4 => Self::StartScan,
            5 => Self::StopScan,
            6 => Self::StartImu,
            7 => Self::StopImu,
            27 => Self::Identify,
            29 => Self::Restart,
            30 => Self::FreeSpace,
            31 => Self::EraseAll,
            33 => Self::ImuData,
            35 => Self::FirmwareVersion,
            37 => Self::ListFiles,
            39 => Self::StartDownload,
            40 => Self::DownloadChunk,
            41 => Self::FileChecksum,
            other => return Err(ProtocolError::UnknownRequest(other)),
        })
    }
}

/// Response discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseTag {
    Status = 1,
    StartMicrophone = 2,
    StartScan = 3,
    StartImu = 4,
    FreeSpace = 5,
    EraseAll = 32,
    ImuData = 34,
    FirmwareVersion = 36,
    ListFiles = 38,
    StartDownload = 42,
    DownloadChunk = 43,
    FileChecksum = 44,
}

impl TryFrom<u8> for ResponseTag {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Ok(match raw {
            1 => Self::Status,
            2 => Self::StartMicrophone,
            3 => Self::StartScan,
            4 => Self::StartImu,
            5 => Self::FreeSpace,
            32 => Self::EraseAll,
            34 => Self::ImuData,
            36 => Self::FirmwareVersion,
            38 => Self::ListFiles,
            42 => Self::StartDownload,
            43 => Self::DownloadChunk,
            44 => Self::FileChecksum,
            other => return Err(ProtocolError::UnknownResponse(other)),
        })
    }
}

// ── Shared field types ────────────────────────────────────────

/// Controller wall time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub seconds: u32,
    pub ms: u16,
}

/// Identity the hub assigns to a badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BadgeAssignment {
    pub id: u16,
    pub group: u8,
}

/// Effective microphone configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MicrophoneSettings {
    pub mode: u8,
    pub gain_l: i8,
    pub gain_r: i8,
    /// 0 off, 1 low, 2 high.
    pub switch_pos: i8,
    /// kHz
    pub pdm_freq: u16,
}

/// Effective scanner timing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSettings {
    pub window: u16,
    pub interval: u16,
}

/// Effective IMU configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImuSettings {
    pub self_test_done: bool,
    pub gyr_fsr: u32,
    pub acc_fsr: u32,
    pub datarate: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Axes {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

/// One snapshot of every IMU channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImuReading {
    pub gyr: Axes,
    pub mag: Axes,
    pub acc: Axes,
    pub rot: Axes,
}

/// NUL-padded fixed-width filename.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct FileName([u8; MAX_FILENAME_LEN]);

impl FileName {
    /// Build from raw bytes.  Longer names are cut so the last byte is
    /// always NUL.
    pub fn new(name: &[u8]) -> Self {
        let mut buf = [0u8; MAX_FILENAME_LEN];
        let n = name.len().min(MAX_FILENAME_LEN - 1);
        buf[..n].copy_from_slice(&name[..n]);
        Self(buf)
    }

    /// Name bytes up to the first NUL.
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(MAX_FILENAME_LEN);
        &self.0[..end]
    }

    pub fn raw(&self) -> &[u8; MAX_FILENAME_LEN] {
        &self.0
    }
}

impl core::fmt::Debug for FileName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(s) => write!(f, "{s:?}"),
            Err(_) => write!(f, "{:?}", self.as_bytes()),
        }
    }
}

/// One page of the root directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileListing {
    pub total_files: u8,
    pub start_index: u8,
    pub entries: heapless::Vec<FileEntry, LIST_FILES_MAX_ENTRIES>,
}

/// One slice of a file being downloaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_index: u32,
    pub chunk_size: u16,
    pub data: [u8; DOWNLOAD_CHUNK_SIZE],
    pub is_last: bool,
}

// ── Requests ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Status {
        timestamp: Timestamp,
        assignment: Option<BadgeAssignment>,
    },
    StartMicrophone {
        timestamp: Timestamp,
        mode: u8,
    },
    StopMicrophone,
    StartScan {
        timestamp: Timestamp,
        window: u16,
        interval: u16,
    },
    StopScan,
    StartImu {
        timestamp: Timestamp,
        acc_fsr: u16,
        gyr_fsr: u16,
        datarate: u16,
    },
    StopImu,
    Identify {
        timeout_secs: u16,
    },
    Restart,
    FreeSpace,
    EraseAll,
    ImuData,
    FirmwareVersion,
    ListFiles {
        start_index: u8,
        max_files: u8,
    },
    StartDownload {
        filename: FileName,
    },
    DownloadChunk {
        chunk_index: u32,
    },
    FileChecksum {
        filename: FileName,
    },
}

impl Request {
    pub fn tag(&self) -> RequestTag {
        match self {
            Self::Status { .. } => RequestTag::Status,
            Self::StartMicrophone { .. } => RequestTag::StartMicrophone,
            Self::StopMicrophone => RequestTag::StopMicrophone,
            Self::StartScan { .. } => RequestTag::StartScan,
            Self::StopScan => RequestTag::StopScan,
            Self::StartImu { .. } => RequestTag::StartImu,
            Self::StopImu => RequestTag::StopImu,
            Self::Identify { .. } => RequestTag::Identify,
            Self::Restart => RequestTag::Restart,
            Self::FreeSpace => RequestTag::FreeSpace,
            Self::EraseAll => RequestTag::EraseAll,
            Self::ImuData => RequestTag::ImuData,
            Self::FirmwareVersion => RequestTag::FirmwareVersion,
            Self::ListFiles { .. } => RequestTag::ListFiles,
            Self::StartDownload { .. } => RequestTag::StartDownload,
            Self::DownloadChunk { .. } => RequestTag::DownloadChunk,
            Self::FileChecksum { .. } => RequestTag::FileChecksum,
        }
    }

    /// Decode a frame payload.
    ///
    /// An empty payload or a payload shorter than its variant's fields is
    /// malformed; an unlisted discriminant is unknown.  Both are
    /// connection-fatal.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let (&raw, body) = payload
            .split_first()
            .ok_or(ProtocolError::MalformedRequest(0))?;
        let tag = RequestTag::try_from(raw)?;
        Self::decode_body(tag, &mut Reader::new(body)).ok_or(ProtocolError::MalformedRequest(raw))
    }

    fn decode_body(tag: RequestTag, r: &mut Reader<'_>) -> Option<Self> {
        Some(match tag {
                RequestTag::Status => {
                    let timestamp = r.timestamp()?;
                    let has_assignment = r.u8()? != 0;
                    let assignment = r.assignment()?;
                    Self::Status {
                        timestamp,
                        assignment: has_assignment.then_some(assignment),
                    }
                }
                RequestTag::StartMicrophone => Self::StartMicrophone {
                    timestamp: r.timestamp()?,
                    mode: r.u8()?,
                },
                RequestTag::StopMicrophone => Self::StopMicrophone,
                RequestTag::StartScan => Self::StartScan {
                    timestamp: r.timestamp()?,
                    window: r.u16()?,
                    interval: r.u16()?,
                },
                RequestTag::StopScan => Self::StopScan,
                RequestTag::StartImu => Self::StartImu {
                    timestamp: r.timestamp()?,
                    acc_fsr: r.u16()?,
                    gyr_fsr: r.u16()?,
                    datarate: r.u16()?,
                },
                RequestTag::StopImu => Self::StopImu,
                RequestTag::Identify => Self::Identify {
                    timeout_secs: r.u16()?,
                },
                RequestTag::Restart => Self::Restart,
                RequestTag::FreeSpace => Self::FreeSpace,
                RequestTag::EraseAll => Self::EraseAll,
                RequestTag::ImuData => Self::ImuData,
                RequestTag::FirmwareVersion => Self::FirmwareVersion,
                RequestTag::ListFiles => Self::ListFiles {
                    start_index: r.u8()?,
                    max_files: r.u8()?,
                },
                RequestTag::StartDownload => Self::StartDownload {
                    filename: r.filename()?,
                },
                RequestTag::DownloadChunk => Self::DownloadChunk {
                    chunk_index: r.u32()?,
                },
                RequestTag::FileChecksum => Self::FileChecksum {
                    filename: r.filename()?,
                },
            })
    }

    /// Encode into `out`, unpadded.  Returns the payload length.
    pub fn encode(&self, out: &mut [u8]) -> Option<usize> {
        let mut w = Writer::new(out);
        w.u8(self.tag() as u8);
        match *self {
            Self::Status {
                timestamp,
                assignment,
            } => {
                w.timestamp(timestamp);
                w.u8(u8::from(assignment.is_some()));
                w.assignment(assignment.unwrap_or_default());
            }
            Self::StartMicrophone { timestamp, mode } => {
                w.timestamp(timestamp);
                w.u8(mode);
            }
            Self::StartScan {
                timestamp,
                window,
                interval,
            } => {
                w.timestamp(timestamp);
                w.u16(window);
                w.u16(interval);
            }
            Self::StartImu {
                timestamp,
                acc_fsr,
                gyr_fsr,
                datarate,
            } => {
                w.timestamp(timestamp);
                w.u16(acc_fsr);
                w.u16(gyr_fsr);
                w.u16(datarate);
            }
            Self::Identify { timeout_secs } => w.u16(timeout_secs),
            Self::ListFiles {
                start_index,
                max_files,
            } => {
                w.u8(start_index);
                w.u8(max_files);
            }
            Self::StartDownload { filename } | Self::FileChecksum { filename } => {
                w.bytes(filename.raw());
            }
            Self::DownloadChunk { chunk_index } => w.u32(chunk_index),
            Self::StopMicrophone
            | Self::StopScan
            | Self::StopImu
            | Self::Restart
            | Self::FreeSpace
            | Self::EraseAll
            | Self::ImuData
            | Self::FirmwareVersion => {}
        }
        w.finish()
    }
}

// ── Responses ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Status {
        flags: StatusFlags,
        battery_level: i8,
        pdm_data: u32,
        scan_data: u16,
        time_delta: i32,
        timestamp: Timestamp,
    },
    StartMicrophone {
        timestamp: Timestamp,
        settings: MicrophoneSettings,
    },
    StartScan {
        timestamp: Timestamp,
        settings: ScanSettings,
    },
    StartImu {
        timestamp: Timestamp,
        settings: ImuSettings,
    },
    FreeSpace {
        total_space: u32,
        free_space: u32,
        timestamp: Timestamp,
    },
    EraseAll {
        done: bool,
        timestamp: Timestamp,
    },
    ImuData {
        reading: ImuReading,
        timestamp: Timestamp,
    },
    FirmwareVersion {
        version: [u8; VERSION_STR_LEN],
    },
    ListFiles(FileListing),
    StartDownload {
        file_size: u32,
        total_chunks: u32,
        success: bool,
    },
    DownloadChunk(Chunk),
    FileChecksum {
        checksum: u32,
        success: bool,
    },
}

impl Response {
    pub fn tag(&self) -> ResponseTag {
        match self {
            Self::Status { .. } => ResponseTag::Status,
            Self::StartMicrophone { .. } => ResponseTag::StartMicrophone,
            Self::StartScan { .. } => ResponseTag::StartScan,
            Self::StartImu { .. } => ResponseTag::StartImu,
            Self::FreeSpace { .. } => ResponseTag::FreeSpace,
            Self::EraseAll { .. } => ResponseTag::EraseAll,
            Self::ImuData { .. } => ResponseTag::ImuData,
            Self::FirmwareVersion { .. } => ResponseTag::FirmwareVersion,
            Self::ListFiles(_) => ResponseTag::ListFiles,
            Self::StartDownload { .. } => ResponseTag::StartDownload,
            Self::DownloadChunk(_) => ResponseTag::DownloadChunk,
            Self::FileChecksum { .. } => ResponseTag::FileChecksum,
        }
    }

    /// Encode as a padded payload of [`RESPONSE_PAYLOAD_LEN`] bytes.
    pub fn encode(&self) -> [u8; RESPONSE_PAYLOAD_LEN] {
        let mut out = [0u8; RESPONSE_PAYLOAD_LEN];
        let mut w = Writer::new(&mut out);
        w.u8(self.tag() as u8);
        match self {
            Self::Status {
                flags,
                battery_level,
                pdm_data,
                scan_data,
                time_delta,
                timestamp,
            } => {
                w.u8(u8::from(flags.clock_synced));
                w.u8(u8::from(flags.microphone));
                w.u8(u8::from(flags.scan));
                w.u8(u8::from(flags.imu));
                w.i8(*battery_level);
                w.u32(*pdm_data);
                w.u16(*scan_data);
                w.i32(*time_delta);
                w.timestamp(*timestamp);
            }
            Self::StartMicrophone {
                timestamp,
                settings,
            } => {
                w.timestamp(*timestamp);
                w.u8(settings.mode);
                w.i8(settings.gain_l);
                w.i8(settings.gain_r);
                w.i8(settings.switch_pos);
                w.u16(settings.pdm_freq);
            }
            Self::StartScan {
                timestamp,
                settings,
            } => {
                w.timestamp(*timestamp);
                w.u16(settings.window);
                w.u16(settings.interval);
            }
            Self::StartImu {
                timestamp,
                settings,
            } => {
                w.timestamp(*timestamp);
                w.u8(u8::from(settings.self_test_done));
                w.u32(settings.gyr_fsr);
                w.u32(settings.acc_fsr);
                w.u8(settings.datarate);
            }
            Self::FreeSpace {
                total_space,
                free_space,
                timestamp,
            } => {
                w.u32(*total_space);
                w.u32(*free_space);
                w.timestamp(*timestamp);
            }
            Self::EraseAll { done, timestamp } => {
                w.u8(u8::from(*done));
                w.timestamp(*timestamp);
            }
            Self::ImuData { reading, timestamp } => {
                for axes in [reading.gyr, reading.mag, reading.acc, reading.rot] {
                    w.axes(axes);
                }
                w.timestamp(*timestamp);
            }
            Self::FirmwareVersion { version } => w.bytes(version),
            Self::ListFiles(listing) => {
                w.u8(listing.entries.len() as u8);
                w.u8(listing.total_files);
                w.u8(listing.start_index);
                for entry in &listing.entries {
                    w.bytes(entry.name.raw());
                    w.u32(entry.size);
                    w.u32(entry.timestamp);
                }
            }
            Self::StartDownload {
                file_size,
                total_chunks,
                success,
            } => {
                w.u32(*file_size);
                w.u32(*total_chunks);
                w.u8(u8::from(*success));
            }
            Self::DownloadChunk(chunk) => {
                w.u32(chunk.chunk_index);
                w.u16(chunk.chunk_size);
                w.bytes(&chunk.data);
                w.u8(u8::from(chunk.is_last));
            }
            Self::FileChecksum { checksum, success } => {
                w.u32(*checksum);
                w.u8(u8::from(*success));
            }
        }
        out
    }

    /// Decode a response payload (controller side and tests).
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let (&raw, body) = payload
            .split_first()
            .ok_or(ProtocolError::MalformedResponse(0))?;
        let tag = ResponseTag::try_from(raw)?;
        Self::decode_body(tag, &mut Reader::new(body))
            .ok_or(ProtocolError::MalformedResponse(raw))
    }

    fn decode_body(tag: ResponseTag, r: &mut Reader<'_>) -> Option<Self> {
        Some(match tag {
                ResponseTag::Status => Self::Status {
                    flags: StatusFlags {
                        clock_synced: r.u8()? != 0,
                        microphone: r.u8()? != 0,
                        scan: r.u8()? != 0,
                        imu: r.u8()? != 0,
                    },
                    battery_level: r.i8()?,
                    pdm_data: r.u32()?,
                    scan_data: r.u16()?,
                    time_delta: r.i32()?,
                    timestamp: r.timestamp()?,
                },
                ResponseTag::StartMicrophone => Self::StartMicrophone {
                    timestamp: r.timestamp()?,
                    settings: MicrophoneSettings {
                        mode: r.u8()?,
                        gain_l: r.i8()?,
                        gain_r: r.i8()?,
                        switch_pos: r.i8()?,
                        pdm_freq: r.u16()?,
                    },
                },
                ResponseTag::StartScan => Self::StartScan {
                    timestamp: r.timestamp()?,
                    settings: ScanSettings {
                        window: r.u16()?,
                        interval: r.u16()?,
                    },
                },
                ResponseTag::StartImu => Self::StartImu {
                    timestamp: r.timestamp()?,
                    settings: ImuSettings {
                        self_test_done: r.u8()? != 0,
                        gyr_fsr: r.u32()?,
                        acc_fsr: r.u32()?,
                        datarate: r.u8()?,
                    },
                },
                ResponseTag::FreeSpace => Self::FreeSpace {
                    total_space: r.u32()?,
                    free_space: r.u32()?,
                    timestamp: r.timestamp()?,
                },
                ResponseTag::EraseAll => Self::EraseAll {
                    done: r.u8()? != 0,
                    timestamp: r.timestamp()?,
                },
                ResponseTag::ImuData => Self::ImuData {
                    reading: ImuReading {
                        gyr: r.axes()?,
                        mag: r.axes()?,
                        acc: r.axes()?,
                        rot: r.axes()?,
                    },
                    timestamp: r.timestamp()?,
                },
                ResponseTag::FirmwareVersion => Self::FirmwareVersion {
                    version: r.array()?,
                },
                ResponseTag::ListFiles => {
                    let file_count = usize::from(r.u8()?).min(LIST_FILES_MAX_ENTRIES);
                    let mut listing = FileListing {
                        total_files: r.u8()?,
                        start_index: r.u8()?,
                        entries: heapless::Vec::new(),
                    };
                    for _ in 0..file_count {
                        let entry = FileEntry {
                            name: r.filename()?,
                            size: r.u32()?,
                            timestamp: r.u32()?,
                        };
                        listing.entries.push(entry).ok()?;
                    }
                    Self::ListFiles(listing)
                }
                ResponseTag::StartDownload => Self::StartDownload {
                    file_size: r.u32()?,
                    total_chunks: r.u32()?,
                    success: r.u8()? != 0,
                },
                ResponseTag::DownloadChunk => Self::DownloadChunk(Chunk {
                    chunk_index: r.u32()?,
                    chunk_size: r.u16()?,
                    data: r.array()?,
                    is_last: r.u8()? != 0,
                }),
                ResponseTag::FileChecksum => Self::FileChecksum {
                    checksum: r.u32()?,
                    success: r.u8()? != 0,
                },
            })
    }
}

// ── Cursor helpers ────────────────────────────────────────────

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.buf.get(self.pos..self.pos + N)?;
        self.pos += N;
        bytes.try_into().ok()
    }

    fn u8(&mut self) -> Option<u8> {
        self.array::<1>().map(|[b]| b)
    }

    fn i8(&mut self) -> Option<i8> {
        self.u8().map(|b| b as i8)
    }

    fn u16(&mut self) -> Option<u16> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Option<i32> {
        self.array().map(i32::from_le_bytes)
    }

    fn timestamp(&mut self) -> Option<Timestamp> {
        Some(Timestamp {
            seconds: self.u32()?,
            ms: self.u16()?,
        })
    }

    fn assignment(&mut self) -> Option<BadgeAssignment> {
        Some(BadgeAssignment {
            id: self.u16()?,
            group: self.u8()?,
        })
    }

    fn axes(&mut self) -> Option<Axes> {
        Some(Axes {
            x: self.u16()?,
            y: self.u16()?,
            z: self.u16()?,
        })
    }

    fn filename(&mut self) -> Option<FileName> {
        self.array().map(FileName)
    }
}

/// Appends little-endian fields; overflow is reported by [`Writer::finish`].
struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, data: &[u8]) {
        if let Some(dst) = self.buf.get_mut(self.pos..self.pos + data.len()) {
            dst.copy_from_slice(data);
        }
        self.pos += data.len();
    }

    fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    fn i8(&mut self, v: i8) {
        self.bytes(&v.to_le_bytes());
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.bytes(&v.to_le_bytes());
    }

    fn timestamp(&mut self, t: Timestamp) {
        self.u32(t.seconds);
        self.u16(t.ms);
    }

    fn assignment(&mut self, a: BadgeAssignment) {
        self.u16(a.id);
        self.u8(a.group);
    }

    fn axes(&mut self, a: Axes) {
        self.u16(a.x);
        self.u16(a.y);
        self.u16(a.z);
    }

    fn finish(self) -> Option<usize> {
        (self.pos <= self.buf.len()).then_some(self.pos)
    }
}
