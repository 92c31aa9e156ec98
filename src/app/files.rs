//! File listing, chunked download and checksums over [`FileStorePort`].

use log::{debug, info, warn};

use super::ports::{FileEntry, FileHandle, FileStorePort, StorageError};
use crate::rpc::messages::{
    Chunk, DOWNLOAD_CHUNK_SIZE, FileListing, FileName, LIST_FILES_MAX_ENTRIES, Response,
};

/// Read buffer for checksum streaming.
const CHECKSUM_BUF_LEN: usize = 64;

/// One page of the root directory, starting at the `start_index`-th file.
///
/// `total_files` counts every regular file, whatever the page.
pub fn list_files<S: FileStorePort + ?Sized>(
    store: &mut S,
    start_index: u8,
    max_files: u8,
) -> Result<FileListing, StorageError> {
    let wanted = usize::from(max_files).min(LIST_FILES_MAX_ENTRIES);
    let skip = usize::from(start_index);
    let mut listing = FileListing {
        start_index,
        ..FileListing::default()
    };
    let mut seen = 0usize;

    store.list_dir(&mut |entry: &FileEntry| {
        if seen >= skip && listing.entries.len() < wanted {
            // Bounded by `wanted`, cannot overflow.
            let _ = listing.entries.push(*entry);
        }
        seen += 1;
    })?;

    listing.total_files = u8::try_from(seen).unwrap_or(u8::MAX);
    debug!(
        "FILES: listed {} of {} from index {}",
        listing.entries.len(),
        seen,
        start_index
    );
    Ok(listing)
}

/// CRC-32 (IEEE) of a whole file, streamed in small reads.
pub fn file_checksum<S: FileStorePort + ?Sized>(
    store: &mut S,
    name: &FileName,
) -> Result<u32, StorageError> {
    let file = store.open(name.as_bytes())?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; CHECKSUM_BUF_LEN];
    let mut offset = 0u32;

    let result = loop {
        if offset >= file.size {
            break Ok(());
        }
        match store.read_at(file.handle, offset, &mut buf) {
            Ok(0) => break Ok(()),
            Ok(n) => {
                hasher.update(&buf[..n]);
                offset += n as u32;
            }
            Err(e) => break Err(e),
        }
    };
    store.close(file.handle);

    result.map(|()| hasher.finalize())
}

// ───────────────────────────────────────────────────────────────
// Download session
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct OpenDownload {
    handle: FileHandle,
    size: u32,
}

/// The single open download.  Starting a new one closes the previous.
#[derive(Debug, Default)]
pub struct DownloadSession {
    open: Option<OpenDownload>,
}

impl DownloadSession {
    pub const fn new() -> Self {
        Self { open: None }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Open `name` for chunked reading and describe it.
    pub fn start<S: FileStorePort + ?Sized>(&mut self, store: &mut S, name: &FileName) -> Response {
        self.close(store);

        match store.open(name.as_bytes()) {
            Ok(file) => {
                let total_chunks = file.size.div_ceil(DOWNLOAD_CHUNK_SIZE as u32);
                info!(
                    "FILES: download {:?} opened, {} bytes in {} chunks",
                    name, file.size, total_chunks
                );
                self.open = Some(OpenDownload {
                    handle: file.handle,
                    size: file.size,
                });
                Response::StartDownload {
                    file_size: file.size,
                    total_chunks,
                    success: true,
                }
            }
            Err(e) => {
                warn!("FILES: cannot open {:?} for download: {}", name, e);
                Response::StartDownload {
                    file_size: 0,
                    total_chunks: 0,
                    success: false,
                }
            }
        }
    }

    /// Read chunk `chunk_index` of the open file.
    ///
    /// Without an open session, or on a read error, the chunk is empty.
    pub fn read_chunk<S: FileStorePort + ?Sized>(&mut self, store: &mut S, chunk_index: u32) -> Chunk {
        let mut chunk = Chunk {
            chunk_index,
            ..Chunk::default()
        };

        let Some(open) = self.open else {
            warn!("FILES: chunk {chunk_index} requested with no open download");
            return chunk;
        };
        let Some(offset) = chunk_index.checked_mul(DOWNLOAD_CHUNK_SIZE as u32) else {
            return chunk;
        };
        if offset >= open.size {
            chunk.is_last = true;
            return chunk;
        }

        match store.read_at(open.handle, offset, &mut chunk.data) {
            Ok(n) => {
                chunk.chunk_size = n as u16;
                chunk.is_last = offset + n as u32 >= open.size;
            }
            Err(e) => warn!("FILES: chunk {chunk_index} read failed: {e}"),
        }
        chunk
    }

    /// Close the open file, if any.
    pub fn close<S: FileStorePort + ?Sized>(&mut self, store: &mut S) {
        if let Some(open) = self.open.take() {
            store.close(open.handle);
        }
    }
}
