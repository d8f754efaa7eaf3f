use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// Owned read guard on a frame's page bytes. Holding one holds the frame's
/// read latch.
pub type FrameReadGuard = ArcRwLockReadGuard<RawRwLock, Box<[u8; PAGE_SIZE]>>;

/// Owned write guard on a frame's page bytes. Holding one holds the frame's
/// write latch.
pub type FrameWriteGuard = ArcRwLockWriteGuard<RawRwLock, Box<[u8; PAGE_SIZE]>>;

/// Frame manages a single slot in the buffer pool: the page image it currently
/// holds plus the metadata the pool and the replacer need.
///
/// Frames are created when the pool is constructed and live as long as the
/// pool does. The page bytes sit behind their own read/write latch, distinct
/// from the pool mutex; the latch guards the bytes, the pool mutex guards
/// residency.
pub struct Frame {
    /// The frame ID (index in the buffer pool)
    frame_id: FrameId,
    /// The page ID resident in this frame (INVALID_PAGE_ID if empty)
    page_id: Mutex<PageId>,
    /// Number of logical pins currently held on this frame
    pin_count: AtomicU32,
    /// Whether the page bytes differ from the on-disk copy
    is_dirty: AtomicBool,
    /// The page bytes behind the per-frame latch. In an Arc so guards can
    /// hold the latch by value while the frame stays owned by the pool.
    data: Arc<RwLock<Box<[u8; PAGE_SIZE]>>>,
}

impl Frame {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: Mutex::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        *self.page_id.lock()
    }

    pub fn set_page_id(&self, page_id: PageId) {
        *self.page_id.lock() = page_id;
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the new value.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrements the pin count and returns the new value.
    /// Returns None if the pin count was already 0.
    pub fn unpin(&self) -> Option<u32> {
        loop {
            let current = self.pin_count.load(Ordering::Acquire);
            if current == 0 {
                return None;
            }
            if self
                .pin_count
                .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(current - 1);
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Acquires the read latch for the duration of the returned guard.
    pub fn read_data(&self) -> RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Acquires the write latch for the duration of the returned guard.
    pub fn write_data(&self) -> RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.write()
    }

    /// Acquires the read latch as an owned guard, for page guards that must
    /// hold it across their own lifetime.
    pub(crate) fn read_data_owned(&self) -> FrameReadGuard {
        self.data.read_arc()
    }

    /// Acquires the write latch as an owned guard.
    pub(crate) fn write_data_owned(&self) -> FrameWriteGuard {
        self.data.write_arc()
    }

    /// Copies data from the given slice into the frame.
    pub fn copy_from(&self, data: &[u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        self.data.write().copy_from_slice(data);
    }

    /// Copies data from the frame into the given slice.
    pub fn copy_to(&self, data: &mut [u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        let guard = self.data.read();
        data.copy_from_slice(&**guard);
    }

    /// Resets the frame to its initial empty state.
    pub fn reset(&self) {
        *self.page_id.lock() = INVALID_PAGE_ID;
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}
