use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{FrameId, PageId, Result, SiltError, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::frame::Frame;
use super::lru_k_replacer::{AccessType, LruKReplacer};
use super::page_guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};

/// Residency bookkeeping, guarded by the single pool mutex.
struct PoolInner {
    /// Maps resident page IDs to the frames holding them
    page_table: HashMap<PageId, FrameId>,
    /// Frames not currently holding any page
    free_list: VecDeque<FrameId>,
}

/// State shared between the manager and the guards it hands out, so a guard
/// can release its pin without borrowing the manager.
pub(crate) struct PoolState {
    frames: Vec<Arc<Frame>>,
    inner: Mutex<PoolInner>,
    replacer: LruKReplacer,
}

impl PoolState {
    /// Decrements a page's pin count. Returns false when the page is not
    /// resident or its pin count is already zero; otherwise ORs in the dirty
    /// flag and marks the frame evictable once the count reaches zero.
    pub(crate) fn unpin(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };

        let frame = &self.frames[frame_id.as_usize()];
        match frame.unpin() {
            None => false,
            Some(remaining) => {
                if is_dirty {
                    frame.set_dirty(true);
                }
                if remaining == 0 {
                    self.replacer.set_evictable(frame_id, true);
                }
                true
            }
        }
    }
}

/// BufferPoolManager mediates all access to the disk-backed paged store. It
/// owns a fixed array of frames, maps resident pages to them, and uses the
/// LRU-K policy to pick a frame to reuse when none are free.
///
/// One mutex guards the page table and free list; each frame additionally has
/// its own read/write latch over the page bytes, which is never taken while
/// the pool mutex is held. Disk I/O goes through the scheduler and runs with
/// the pool mutex held.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// Shared state, also referenced by outstanding guards
    state: Arc<PoolState>,
    /// Disk scheduler for page I/O
    scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size, k value for
    /// LRU-K, and disk manager. All frames start on the free list.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<dyn DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Frame::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(PoolState {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: LruKReplacer::new(k, pool_size),
        });

        Self {
            pool_size,
            state,
            scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page and installs it in a clean frame. The page is
    /// returned pinned (`pin_count == 1`); the caller owes one `unpin_page`
    /// or should hold the frame through a guard.
    pub fn new_page(&self) -> Result<(PageId, Arc<Frame>)> {
        let mut inner = self.state.inner.lock();
        let frame_id = self.acquire_clean_frame(&mut inner)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let page_id = match self.scheduler.disk_manager().allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                inner.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        frame.set_page_id(page_id);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);

        self.state
            .replacer
            .record_access(frame_id, AccessType::Unknown);
        self.state.replacer.set_evictable(frame_id, false);

        Ok((page_id, Arc::clone(frame)))
    }

    /// Returns the frame holding `page_id`, reading it from disk if it is not
    /// resident. Every fetch increments the pin count, warm or cold, and
    /// marks the frame non-evictable.
    pub fn fetch_page(&self, page_id: PageId, access_type: AccessType) -> Result<Arc<Frame>> {
        if page_id == INVALID_PAGE_ID {
            return Err(SiltError::InvalidPageId(page_id));
        }

        let mut inner = self.state.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.record_access(frame_id, access_type);
            self.state.replacer.set_evictable(frame_id, false);
            return Ok(Arc::clone(frame));
        }

        let frame_id = self.acquire_clean_frame(&mut inner)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        if let Err(e) = self.scheduler.schedule_read_sync(page_id, &mut data) {
            inner.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.set_page_id(page_id);
        frame.copy_from(&data);
        frame.set_dirty(false);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);

        self.state.replacer.record_access(frame_id, access_type);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(Arc::clone(frame))
    }

    /// Releases one pin on a page. See [`PoolState::unpin`] for the contract.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin(page_id, is_dirty)
    }

    /// Writes a resident page to disk and clears its dirty flag. Returns
    /// whether the page was resident; dirtiness does not affect the result.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(SiltError::InvalidPageId(page_id));
        }

        let inner = self.state.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);

        self.scheduler.schedule_write_sync(page_id, &data)?;
        frame.set_dirty(false);

        Ok(true)
    }

    /// Flushes every resident page to disk, dirty or not, clearing dirty
    /// flags along the way.
    pub fn flush_all_pages(&self) -> Result<()> {
        let inner = self.state.inner.lock();
        log::debug!("flushing {} resident pages", inner.page_table.len());

        for (&page_id, &frame_id) in inner.page_table.iter() {
            let frame = &self.state.frames[frame_id.as_usize()];
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.scheduler.schedule_write_sync(page_id, &data)?;
            frame.set_dirty(false);
        }

        Ok(())
    }

    /// Removes a page from the pool and deallocates it on disk. A page that
    /// is not resident is already as deleted as it can get, so the result is
    /// `Ok(true)`; a pinned page cannot be deleted and yields `Ok(false)`.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.state.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(true);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        inner.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id);
        frame.reset();
        inner.free_list.push_back(frame_id);

        self.scheduler.disk_manager().deallocate_page(page_id)?;
        log::debug!("deleted {} from {}", page_id, frame_id);

        Ok(true)
    }

    /// Fetches a page wrapped in a guard that releases the pin on drop.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Ok(BasicPageGuard::new(page_id, frame, Arc::clone(&self.state)))
    }

    /// Fetches a page and takes its read latch. The latch is acquired after
    /// the pool mutex is released and held until the guard drops.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_read())
    }

    /// Fetches a page and takes its write latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_write())
    }

    /// Allocates a fresh page wrapped in a guard.
    pub fn new_page_guarded(&self) -> Result<(PageId, BasicPageGuard)> {
        let (page_id, frame) = self.new_page()?;
        Ok((
            page_id,
            BasicPageGuard::new(page_id, frame, Arc::clone(&self.state)),
        ))
    }

    /// Returns the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of frames on the free list.
    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    /// Returns the number of resident pages.
    pub fn resident_page_count(&self) -> usize {
        self.state.inner.lock().page_table.len()
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    /// Obtains a frame ready to receive a page: pops the free list, or evicts
    /// a victim (flushing it first if dirty) and unmaps its old page. The
    /// returned frame is reset, unpinned, and absent from the page table.
    fn acquire_clean_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.state.replacer.evict().ok_or(SiltError::PoolExhausted)?;
        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            log::trace!("evicting dirty {} from {}", old_page_id, frame_id);
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.scheduler.schedule_write_sync(old_page_id, &data)?;
        } else {
            log::trace!("evicting clean {} from {}", old_page_id, frame_id);
        }

        inner.page_table.remove(&old_page_id);
        frame.reset();

        Ok(frame_id)
    }
}
