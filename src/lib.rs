//! Silt - the in-memory core of a disk-oriented storage engine
//!
//! This crate provides the memory-management and concurrency substrate on
//! which higher-level index structures are built: a fixed-capacity buffer
//! pool over a disk-backed paged store, plus a persistent trie usable as a
//! concurrent key/value index.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): Disk access behind a narrow interface
//!   - `DiskManager`: the read/write/allocate/deallocate trait the pool consumes
//!   - `FileDiskManager`: single-file implementation
//!   - `DiskScheduler`: background worker processing I/O requests
//!
//! - **Buffer Pool** (`buffer`): Memory management for database pages
//!   - `BufferPoolManager`: maps page IDs to frames, orchestrates fetch,
//!     pin, flush, evict, and delete
//!   - `LruKReplacer`: LRU-K eviction policy
//!   - `Frame`: per-slot metadata, pin count, and latched page bytes
//!   - `BasicPageGuard`/`ReadPageGuard`/`WritePageGuard`: RAII pin and
//!     latch management
//!
//! - **Index** (`index`): Copy-on-write structures
//!   - `Trie`: persistent byte-keyed trie; updates return new versions
//!   - `TrieStore`: one writer, many lock-free readers over the trie
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use silt::buffer::BufferPoolManager;
//! use silt::storage::disk::{DiskManager, FileDiskManager};
//!
//! // Create a disk manager for a database file
//! let disk_manager: Arc<dyn DiskManager> =
//!     Arc::new(FileDiskManager::new("test.db").unwrap());
//!
//! // Create a buffer pool with 100 frames and LRU-2 replacement
//! let bpm = BufferPoolManager::new(100, 2, disk_manager);
//!
//! // Allocate a new page and write to it through a guard
//! let (page_id, guard) = bpm.new_page_guarded().unwrap();
//! let mut guard = guard.upgrade_write();
//! guard.data_mut()[0] = 1;
//! drop(guard);
//!
//! // Flush changes to disk
//! bpm.flush_page(page_id).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, Result, SiltError};
