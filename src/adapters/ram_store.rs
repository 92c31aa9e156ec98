//! RAM-backed file store.
//!
//! Stands in for the SD card on host builds and in tests.  Files live in
//! insertion order, which doubles as directory order.  Names starting with
//! `.` are hidden from directory walks, as on the card.

use log::{debug, info};

use crate::app::ports::{FileEntry, FileHandle, FileStorePort, OpenFile, SpaceInfo, StorageError};
use crate::rpc::messages::{FileName, MAX_FILENAME_LEN};

/// Files that may be open at once.
pub const MAX_OPEN_FILES: usize = 4;

#[derive(Debug, Clone)]
struct StoredFile {
    name: FileName,
    data: Vec<u8>,
    timestamp: u32,
}

/// How often each card-touching operation has been called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageCalls {
    pub free_space: u32,
    pub erase_all: u32,
    pub list_dir: u32,
    pub open: u32,
}

#[derive(Debug)]
pub struct RamFileStore {
    capacity_kb: u32,
    files: Vec<StoredFile>,
    open: [Option<usize>; MAX_OPEN_FILES],
    available: bool,
    calls: StorageCalls,
}

impl RamFileStore {
    pub fn new(capacity_kb: u32) -> Self {
        info!("FILES: RAM store, {capacity_kb} KiB");
        Self {
            capacity_kb,
            files: Vec::new(),
            open: [None; MAX_OPEN_FILES],
            available: true,
            calls: StorageCalls::default(),
        }
    }

    /// Create or replace a file.  `timestamp` is its FAT modification date.
    pub fn insert(&mut self, name: &[u8], data: &[u8], timestamp: u32) -> Result<(), StorageError> {
        if !self.available {
            return Err(StorageError::Unavailable);
        }
        // One byte of the name buffer is reserved for the NUL.
        if name.is_empty() || name.len() >= MAX_FILENAME_LEN {
            return Err(StorageError::Io);
        }
        let replaced = self.position(name).map_or(0, |i| self.files[i].data.len());
        if self.used_bytes() - replaced + data.len() > self.capacity_bytes() {
            return Err(StorageError::Io);
        }

        let file = StoredFile {
            name: FileName::new(name),
            data: data.to_vec(),
            timestamp,
        };
        match self.position(name) {
            Some(i) => self.files[i] = file,
            None => self.files.push(file),
        }
        Ok(())
    }

    /// Simulate the card being pulled or reinserted.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn open_handles(&self) -> usize {
        self.open.iter().filter(|slot| slot.is_some()).count()
    }

    /// Port calls made so far, whether or not they succeeded.
    pub fn calls(&self) -> StorageCalls {
        self.calls
    }

    fn position(&self, name: &[u8]) -> Option<usize> {
        self.files.iter().position(|f| f.name.as_bytes() == name)
    }

    fn used_bytes(&self) -> usize {
        self.files.iter().map(|f| f.data.len()).sum()
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity_kb as usize * 1024
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.available {
            Ok(())
        } else {
            Err(StorageError::Unavailable)
        }
    }
}

impl FileStorePort for RamFileStore {
    fn free_space(&mut self) -> Result<SpaceInfo, StorageError> {
        self.calls.free_space += 1;
        self.check_available()?;
        let used_kb = self.used_bytes().div_ceil(1024) as u32;
        Ok(SpaceInfo {
            total: self.capacity_kb,
            free: self.capacity_kb.saturating_sub(used_kb),
        })
    }

    fn erase_all(&mut self) -> Result<(), StorageError> {
        self.calls.erase_all += 1;
        self.check_available()?;
        info!("FILES: erasing {} file(s)", self.files.len());
        self.files.clear();
        self.open = [None; MAX_OPEN_FILES];
        Ok(())
    }

    fn list_dir(&mut self, visit: &mut dyn FnMut(&FileEntry)) -> Result<(), StorageError> {
        self.calls.list_dir += 1;
        self.check_available()?;
        for file in self.files.iter().filter(|f| !f.name.as_bytes().starts_with(b".")) {
            visit(&FileEntry {
                name: file.name,
                size: file.data.len() as u32,
                timestamp: file.timestamp,
            });
        }
        Ok(())
    }

    fn open(&mut self, name: &[u8]) -> Result<OpenFile, StorageError> {
        self.calls.open += 1;
        self.check_available()?;
        let index = self.position(name).ok_or(StorageError::NotFound)?;
        let slot = self
            .open
            .iter()
            .position(Option::is_none)
            .ok_or(StorageError::NoHandles)?;
        self.open[slot] = Some(index);
        debug!("FILES: opened {:?} as handle {slot}", self.files[index].name);
        Ok(OpenFile {
            handle: FileHandle(slot as u8),
            size: self.files[index].data.len() as u32,
        })
    }

    fn read_at(
        &mut self,
        handle: FileHandle,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<usize, StorageError> {
        self.check_available()?;
        let index = self
            .open
            .get(usize::from(handle.0))
            .copied()
            .flatten()
            .ok_or(StorageError::Io)?;
        let data = &self.files[index].data;
        let start = (offset as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn close(&mut self, handle: FileHandle) {
        if let Some(slot) = self.open.get_mut(usize::from(handle.0)) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(store: &mut RamFileStore) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        store
            .list_dir(&mut |e: &FileEntry| out.push(e.name.as_bytes().to_vec()))
            .unwrap();
        out
    }

    #[test]
    fn listing_keeps_insertion_order_and_hides_dotfiles() {
        let mut store = RamFileStore::new(8);
        store.insert(b"B.BIN", b"b", 0).unwrap();
        store.insert(b".TRASH", b"x", 0).unwrap();
        store.insert(b"A.BIN", b"a", 0).unwrap();
        assert_eq!(names(&mut store), vec![b"B.BIN".to_vec(), b"A.BIN".to_vec()]);
    }

    #[test]
    fn free_space_tracks_contents() {
        let mut store = RamFileStore::new(4);
        store.insert(b"A.BIN", &[0; 1500], 0).unwrap();
        assert_eq!(store.free_space().unwrap(), SpaceInfo { total: 4, free: 2 });
        assert_eq!(store.insert(b"B.BIN", &[0; 3000], 0), Err(StorageError::Io));
        store.erase_all().unwrap();
        assert_eq!(store.free_space().unwrap().free, 4);
        assert_eq!(store.file_count(), 0);
    }

    #[test]
    fn handles_run_out() {
        let mut store = RamFileStore::new(1);
        store.insert(b"A", b"a", 0).unwrap();
        for _ in 0..MAX_OPEN_FILES {
            store.open(b"A").unwrap();
        }
        assert_eq!(store.open(b"A"), Err(StorageError::NoHandles));
        store.close(FileHandle(0));
        assert!(store.open(b"A").is_ok());
    }

    #[test]
    fn reads_clamp_at_end_of_file() {
        let mut store = RamFileStore::new(1);
        store.insert(b"A", b"hello", 0).unwrap();
        let f = store.open(b"A").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(store.read_at(f.handle, 3, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(store.read_at(f.handle, 9, &mut buf).unwrap(), 0);
    }

    #[test]
    fn pulled_card_is_unavailable() {
        let mut store = RamFileStore::new(1);
        store.set_available(false);
        assert_eq!(store.free_space(), Err(StorageError::Unavailable));
        assert_eq!(store.open(b"A"), Err(StorageError::Unavailable));
    }

    #[test]
    fn calls_are_counted_even_when_refused() {
        let mut store = RamFileStore::new(1);
        store.insert(b"A", b"a", 0).unwrap();
        assert_eq!(store.calls(), StorageCalls::default());

        store.free_space().unwrap();
        store.open(b"A").unwrap();
        names(&mut store);
        store.set_available(false);
        assert!(store.erase_all().is_err());
        assert!(store.open(b"A").is_err());

        assert_eq!(
            store.calls(),
            StorageCalls {
                free_space: 1,
                erase_all: 1,
                list_dir: 1,
                open: 2,
            }
        );
    }

    #[test]
    fn names_must_leave_room_for_nul() {
        let mut store = RamFileStore::new(1);
        assert!(store.insert(b"ABCDEFG.DAT", b"a", 0).is_ok());
        assert_eq!(store.insert(b"ABCDEFGH.DAT", b"a", 0), Err(StorageError::Io));
        assert_eq!(store.insert(b"", b"a", 0), Err(StorageError::Io));
    }
}
