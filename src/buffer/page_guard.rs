use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard,
};

use crate::common::PageId;

use super::buffer_pool_manager::PoolState;
use super::frame::{Frame, FrameReadGuard, FrameWriteGuard};

/// RAII handle over a pinned page.
///
/// Holds one logical pin and a dirty bit; dropping the guard releases the pin
/// exactly once, passing the dirty bit along. The guard does not hold the
/// frame latch; `data`/`data_mut` take it transiently for the duration of the
/// borrow. Guards are move-only, so a moved-from guard simply no longer
/// exists and cannot double-release.
pub struct BasicPageGuard {
    /// The page this guard pins
    page_id: PageId,
    /// The pinned frame; None once released
    frame: Option<Arc<Frame>>,
    /// Pool state used to release the pin
    pool: Arc<PoolState>,
    /// Whether this guard wrote to the page
    is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(page_id: PageId, frame: Arc<Frame>, pool: Arc<PoolState>) -> Self {
        Self {
            page_id,
            frame: Some(frame),
            pool,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    fn frame(&self) -> &Arc<Frame> {
        self.frame.as_ref().expect("page guard already released")
    }

    /// Borrows the page bytes, holding the read latch for the borrow.
    pub fn data(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.frame().read_data(), |buf| &buf[..])
    }

    /// Mutably borrows the page bytes, holding the write latch for the
    /// borrow. Marks the page dirty.
    pub fn data_mut(&mut self) -> MappedRwLockWriteGuard<'_, [u8]> {
        self.is_dirty = true;
        RwLockWriteGuard::map(self.frame().write_data(), |buf| &mut buf[..])
    }

    /// Converts into a read guard, keeping the pin and acquiring the frame's
    /// read latch.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        let frame = self.frame.take().expect("page guard already released");
        let data = frame.read_data_owned();
        ReadPageGuard {
            data: Some(data),
            guard: BasicPageGuard {
                page_id: self.page_id,
                frame: Some(frame),
                pool: Arc::clone(&self.pool),
                is_dirty: self.is_dirty,
            },
        }
    }

    /// Converts into a write guard, keeping the pin and acquiring the frame's
    /// write latch.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        let frame = self.frame.take().expect("page guard already released");
        let data = frame.write_data_owned();
        WritePageGuard {
            data: Some(data),
            guard: BasicPageGuard {
                page_id: self.page_id,
                frame: Some(frame),
                pool: Arc::clone(&self.pool),
                is_dirty: self.is_dirty,
            },
        }
    }

    /// Releases the pin now rather than at end of scope.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        if self.frame.take().is_some() {
            self.pool.unpin(self.page_id, self.is_dirty);
        }
    }
}

/// RAII guard for shared read access to a page. Holds the frame's read latch
/// for its whole lifetime and releases latch, then pin, on drop.
pub struct ReadPageGuard {
    guard: BasicPageGuard,
    /// Held read latch; None only mid-drop
    data: Option<FrameReadGuard>,
}

impl ReadPageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().expect("read guard already released")[..]
    }

    /// Releases the latch and the pin now rather than at end of scope.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Latch before pin: once the pin drops the frame may be evicted.
        self.data.take();
    }
}

/// RAII guard for exclusive write access to a page. Holds the frame's write
/// latch for its whole lifetime; any mutable access marks the page dirty.
pub struct WritePageGuard {
    guard: BasicPageGuard,
    /// Held write latch; None only mid-drop
    data: Option<FrameWriteGuard>,
}

impl WritePageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().expect("write guard already released")[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.guard.is_dirty = true;
        &mut self.data.as_mut().expect("write guard already released")[..]
    }

    /// Releases the latch and the pin now rather than at end of scope.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.data.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::storage::disk::{DiskManager, FileDiskManager};
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm: Arc<dyn DiskManager> = Arc::new(FileDiskManager::new(temp_file.path()).unwrap());
        (BufferPoolManager::new(pool_size, 2, dm), temp_file)
    }

    #[test]
    fn test_basic_guard_releases_pin_on_drop() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, guard) = bpm.new_page_guarded().unwrap();
        assert_eq!(bpm.get_pin_count(page_id), Some(1));

        drop(guard);
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_basic_guard_dirty_propagates() {
        let (bpm, _temp) = create_bpm(1);

        let (page_id, guard) = bpm.new_page_guarded().unwrap();
        drop(guard);

        {
            let mut guard = bpm.fetch_page_basic(page_id).unwrap();
            guard.data_mut()[0] = 7;
        }

        // Force the page out; the dirty bit passed at unpin must trigger a
        // writeback, so the refetch sees the data via disk.
        let (other, _frame) = bpm.new_page().unwrap();
        bpm.unpin_page(other, false);

        let guard = bpm.fetch_page_basic(page_id).unwrap();
        assert_eq!(guard.data()[0], 7);
    }

    #[test]
    fn test_guard_explicit_drop() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, guard) = bpm.new_page_guarded().unwrap();
        guard.drop_guard();
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_upgrade_keeps_single_pin() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, guard) = bpm.new_page_guarded().unwrap();
        assert_eq!(bpm.get_pin_count(page_id), Some(1));

        let read = guard.upgrade_read();
        assert_eq!(bpm.get_pin_count(page_id), Some(1));

        drop(read);
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_read_guards_share_the_latch() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, guard) = bpm.new_page_guarded().unwrap();
        drop(guard);

        let r1 = bpm.fetch_page_read(page_id).unwrap();
        let r2 = bpm.fetch_page_read(page_id).unwrap();
        assert_eq!(r1.data()[0], r2.data()[0]);
        assert_eq!(bpm.get_pin_count(page_id), Some(2));

        drop(r1);
        drop(r2);
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_write_guard_marks_dirty_and_writes() {
        let (bpm, _temp) = create_bpm(10);

        let (page_id, guard) = bpm.new_page_guarded().unwrap();
        drop(guard);

        {
            let mut w = bpm.fetch_page_write(page_id).unwrap();
            w.data_mut()[10] = 99;
            assert_eq!(w.page_id(), page_id);
        }

        let r = bpm.fetch_page_read(page_id).unwrap();
        assert_eq!(r.data()[10], 99);
    }

    #[test]
    fn test_write_guard_excludes_concurrent_writer() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;

        let (bpm, _temp) = create_bpm(10);
        let bpm = Arc::new(bpm);

        let (page_id, guard) = bpm.new_page_guarded().unwrap();
        drop(guard);

        let mut w = bpm.fetch_page_write(page_id).unwrap();
        w.data_mut()[0] = 1;

        let done = Arc::new(AtomicBool::new(false));
        let handle = {
            let bpm = Arc::clone(&bpm);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let r = bpm.fetch_page_read(page_id).unwrap();
                done.store(true, Ordering::SeqCst);
                assert_eq!(r.data()[0], 1);
            })
        };

        // The reader blocks on the latch until the writer drops.
        thread::sleep(std::time::Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst));

        drop(w);
        handle.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
    }
}
