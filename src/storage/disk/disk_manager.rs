use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result, PAGE_SIZE};

/// The disk interface consumed by the buffer pool.
///
/// The buffer pool only ever reads whole pages, writes whole pages, and asks
/// for fresh page IDs; everything else about the on-disk format is the
/// implementation's business. Tests substitute a recording mock through this
/// trait.
pub trait DiskManager: Send + Sync {
    /// Reads a page from disk into the provided buffer.
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()>;

    /// Writes a page to disk from the provided buffer.
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Allocates a new page and returns its ID. IDs are monotonically
    /// increasing and never reissued.
    fn allocate_page(&self) -> Result<PageId>;

    /// Releases a page ID. Each allocated ID may be deallocated at most once.
    fn deallocate_page(&self, page_id: PageId) -> Result<()>;
}

/// File-backed [`DiskManager`] storing pages in a single flat file at
/// `page_id * PAGE_SIZE` offsets.
pub struct FileDiskManager {
    /// Database file handle. The mutex also serialises the seek-then-read
    /// cursor movement.
    file: Mutex<File>,
    /// Path to the database file
    db_path: PathBuf,
    /// Next page ID to hand out
    next_page_id: AtomicU32,
    /// Number of disk reads performed
    num_reads: AtomicU32,
    /// Number of disk writes performed
    num_writes: AtomicU32,
}

impl FileDiskManager {
    /// Opens the database file at `db_path`, creating it if needed.
    /// Existing files resume page allocation after their last page.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        log::debug!(
            "opened database file {:?} with {} existing pages",
            db_path,
            num_pages
        );

        Ok(Self {
            file: Mutex::new(file),
            db_path,
            next_page_id: AtomicU32::new(num_pages),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Total number of pages allocated so far.
    pub fn num_pages(&self) -> u32 {
        self.next_page_id.load(Ordering::Relaxed)
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Forces all buffered file contents to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let byte_offset = (page_id.as_u32() as u64) * (PAGE_SIZE as u64);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(byte_offset))?;

        // Pages that were allocated but never written read back as zeroes.
        let bytes_read = file.read(data)?;
        if bytes_read < PAGE_SIZE {
            data[bytes_read..].fill(0);
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let byte_offset = (page_id.as_u32() as u64) * (PAGE_SIZE as u64);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(byte_offset))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let page_id = PageId::new(self.next_page_id.fetch_add(1, Ordering::SeqCst));
        Ok(page_id)
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        // The flat file never shrinks and IDs are never reissued, so there is
        // nothing to reclaim here.
        log::trace!("deallocated {}", page_id);
        Ok(())
    }
}

impl Drop for FileDiskManager {
    fn drop(&mut self) {
        let _ = self.file.get_mut().sync_all();
    }
}
