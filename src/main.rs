use std::sync::Arc;

use silt::buffer::BufferPoolManager;
use silt::index::{Trie, TrieStore};
use silt::storage::disk::{DiskManager, FileDiskManager};

fn main() {
    println!("Silt - storage engine core demo");
    println!("===============================\n");

    let db_path = "demo.db";

    let disk_manager: Arc<dyn DiskManager> =
        Arc::new(FileDiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    // Buffer pool with 10 frames and LRU-2 replacement
    let bpm = BufferPoolManager::new(10, 2, disk_manager);
    println!("Created buffer pool manager with 10 frames\n");

    let (page_id, guard) = bpm.new_page_guarded().expect("Failed to allocate page");
    println!("Allocated new page: {}", page_id);

    {
        let mut guard = guard.upgrade_write();
        let data = guard.data_mut();
        data[..13].copy_from_slice(b"Hello, silt!\n");
    }

    bpm.flush_page(page_id).expect("Failed to flush page");
    println!("Flushed page to disk");

    {
        let guard = bpm.fetch_page_read(page_id).expect("Failed to fetch page");
        println!(
            "Read back from {}: {:?}\n",
            page_id,
            String::from_utf8_lossy(&guard.data()[..13])
        );
    }

    // The trie is persistent: every version stays readable.
    let t0 = Trie::new();
    let t1 = t0.put(b"engine", String::from("silt"));
    let t2 = t1.put(b"frames", 10u32);
    println!("t1[engine] = {:?}", t1.get::<String>(b"engine"));
    println!("t2[frames] = {:?}", t2.get::<u32>(b"frames"));
    println!("t0[engine] = {:?} (old version untouched)", t0.get::<String>(b"engine"));

    // The store coordinates concurrent readers with a single writer.
    let store = TrieStore::new();
    store.put(b"answer", 42u32);
    println!("store[answer] = {:?}\n", store.get::<u32>(b"answer").map(|g| *g));

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}
