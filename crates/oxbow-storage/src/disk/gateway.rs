//! The disk gateway seam and its implementations.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use oxbow_common::constants::PAGE_SIZE;
use oxbow_common::types::PageId;
use parking_lot::Mutex;

use super::error::{IoError, IoResult};

/// Synchronous page-granular storage.
///
/// One call moves exactly one [`PAGE_SIZE`] page between a caller-supplied
/// buffer and stable storage. Implementations own the on-disk layout; the
/// buffer pool never interprets offsets itself. Failures are reported
/// through the `Result`, never by panicking.
pub trait DiskGateway: Send + Sync {
    /// Reads the page identified by `page_id` into `buf`.
    ///
    /// A page that was never written reads back as zeroes.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> IoResult<()>;

    /// Writes `buf` as the content of the page identified by `page_id`.
    fn write_page(&self, page_id: PageId, buf: &[u8]) -> IoResult<()>;
}

fn check_buf(len: usize) -> IoResult<()> {
    if len != PAGE_SIZE {
        return Err(IoError::BadBufferSize {
            len,
            expected: PAGE_SIZE,
        });
    }
    Ok(())
}

/// File-backed disk gateway.
///
/// Pages live in a single data file at offset `page_id * PAGE_SIZE`.
/// Positional reads and writes keep the handle shareable across the
/// scheduler's worker threads without seeking.
pub struct FileDisk {
    file: File,
}

impl FileDisk {
    /// Opens (creating if necessary) the data file at `path`.
    pub fn open(path: impl AsRef<Path>) -> IoResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Flushes file contents to stable storage.
    pub fn sync(&self) -> IoResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

impl DiskGateway for FileDisk {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> IoResult<()> {
        check_buf(buf.len())?;
        let offset = page_id.as_u64() * PAGE_SIZE as u64;

        // Short reads past EOF are legal: the tail of the page is a region
        // the engine allocated but never flushed, and reads back as zeroes.
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read_at(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                buf[filled..].fill(0);
                break;
            }
            filled += n;
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> IoResult<()> {
        check_buf(buf.len())?;
        let offset = page_id.as_u64() * PAGE_SIZE as u64;
        self.file.write_all_at(buf, offset)?;
        Ok(())
    }
}

impl std::fmt::Debug for FileDisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDisk").finish_non_exhaustive()
    }
}

/// In-memory disk gateway for tests.
///
/// Stores pages in a map, counts every gateway call so tests can assert on
/// I/O traffic, and can be switched into a faulted state in which every
/// operation fails.
#[derive(Debug, Default)]
pub struct MemoryDisk {
    pages: Mutex<HashMap<PageId, Box<[u8]>>>,
    reads: AtomicU64,
    writes: AtomicU64,
    faulted: AtomicBool,
}

impl MemoryDisk {
    /// Creates an empty in-memory disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `read_page` calls that reached the gateway.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Acquire)
    }

    /// Number of `write_page` calls that reached the gateway.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }

    /// Switches fault injection on or off.
    ///
    /// While faulted, every read and write fails with [`IoError::Injected`].
    pub fn set_faulted(&self, faulted: bool) {
        self.faulted.store(faulted, Ordering::Release);
    }

    /// Returns the stored content of a page, if it was ever written.
    pub fn page(&self, page_id: PageId) -> Option<Box<[u8]>> {
        self.pages.lock().get(&page_id).cloned()
    }

    fn check_fault(&self, page_id: PageId) -> IoResult<()> {
        if self.faulted.load(Ordering::Acquire) {
            return Err(IoError::Injected { page_id });
        }
        Ok(())
    }
}

impl DiskGateway for MemoryDisk {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> IoResult<()> {
        check_buf(buf.len())?;
        self.check_fault(page_id)?;
        self.reads.fetch_add(1, Ordering::AcqRel);

        match self.pages.lock().get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> IoResult<()> {
        check_buf(buf.len())?;
        self.check_fault(page_id)?;
        self.writes.fetch_add(1, Ordering::AcqRel);

        self.pages.lock().insert(page_id, buf.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_disk_round_trip() {
        let disk = MemoryDisk::new();
        let mut page = vec![0u8; PAGE_SIZE];
        page[0..4].copy_from_slice(&[1, 2, 3, 4]);

        disk.write_page(PageId::new(7), &page).unwrap();

        let mut out = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(7), &mut out).unwrap();
        assert_eq!(out, page);

        assert_eq!(disk.read_count(), 1);
        assert_eq!(disk.write_count(), 1);
    }

    #[test]
    fn test_memory_disk_unwritten_page_is_zeroed() {
        let disk = MemoryDisk::new();
        let mut out = vec![0xffu8; PAGE_SIZE];
        disk.read_page(PageId::new(0), &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_memory_disk_fault_injection() {
        let disk = MemoryDisk::new();
        disk.set_faulted(true);

        let mut buf = vec![0u8; PAGE_SIZE];
        assert!(matches!(
            disk.read_page(PageId::new(1), &mut buf),
            Err(IoError::Injected { .. })
        ));
        assert!(matches!(
            disk.write_page(PageId::new(1), &buf),
            Err(IoError::Injected { .. })
        ));
        // Faulted operations never reach the counters.
        assert_eq!(disk.read_count(), 0);
        assert_eq!(disk.write_count(), 0);

        disk.set_faulted(false);
        disk.write_page(PageId::new(1), &buf).unwrap();
        assert_eq!(disk.write_count(), 1);
    }

    #[test]
    fn test_bad_buffer_size() {
        let disk = MemoryDisk::new();
        let mut small = vec![0u8; 16];
        assert!(matches!(
            disk.read_page(PageId::new(0), &mut small),
            Err(IoError::BadBufferSize { len: 16, .. })
        ));
    }

    #[test]
    fn test_file_disk_round_trip() {
        let dir = tempdir().unwrap();
        let disk = FileDisk::open(dir.path().join("data.oxb")).unwrap();

        let mut page = vec![0u8; PAGE_SIZE];
        page[10] = 0xab;
        disk.write_page(PageId::new(3), &page).unwrap();
        disk.sync().unwrap();

        let mut out = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(3), &mut out).unwrap();
        assert_eq!(out, page);
    }

    #[test]
    fn test_file_disk_read_past_eof_zero_fills() {
        let dir = tempdir().unwrap();
        let disk = FileDisk::open(dir.path().join("data.oxb")).unwrap();

        let mut out = vec![0xffu8; PAGE_SIZE];
        disk.read_page(PageId::new(9), &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_file_disk_pages_do_not_overlap() {
        let dir = tempdir().unwrap();
        let disk = FileDisk::open(dir.path().join("data.oxb")).unwrap();

        let a = vec![0xaau8; PAGE_SIZE];
        let b = vec![0xbbu8; PAGE_SIZE];
        disk.write_page(PageId::new(0), &a).unwrap();
        disk.write_page(PageId::new(1), &b).unwrap();

        let mut out = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(0), &mut out).unwrap();
        assert_eq!(out, a);
        disk.read_page(PageId::new(1), &mut out).unwrap();
        assert_eq!(out, b);
    }
}
