//! Integration tests for the persistent trie and its concurrent store

use std::sync::Arc;
use std::thread;

use silt::index::{Trie, TrieStore};

#[test]
fn test_trie_version_history() {
    let t0 = Trie::new();
    let t1 = t0.put(b"ab", 1u32);
    let t2 = t1.put(b"ac", 2u32);
    let t3 = t2.remove(b"ab");

    // Every version remains readable and unchanged.
    assert_eq!(t0.get::<u32>(b"ab"), None);
    assert_eq!(t1.get::<u32>(b"ab"), Some(&1));
    assert_eq!(t2.get::<u32>(b"ab"), Some(&1));
    assert_eq!(t2.get::<u32>(b"ac"), Some(&2));
    assert_eq!(t3.get::<u32>(b"ab"), None);
    assert_eq!(t3.get::<u32>(b"ac"), Some(&2));
}

#[test]
fn test_trie_mixed_value_types() {
    let trie = Trie::new()
        .put(b"count", 7u32)
        .put(b"name", String::from("silt"))
        .put(b"big", 1u64 << 40);

    assert_eq!(trie.get::<u32>(b"count"), Some(&7));
    assert_eq!(trie.get::<String>(b"name").map(String::as_str), Some("silt"));
    assert_eq!(trie.get::<u64>(b"big"), Some(&(1u64 << 40)));

    // Asking for the wrong type is a miss, not an error.
    assert_eq!(trie.get::<u64>(b"count"), None);
    assert_eq!(trie.get::<u32>(b"name"), None);
}

#[test]
fn test_trie_remove_absent_preserves_all_keys() {
    let trie = Trie::new().put(b"one", 1u32).put(b"two", 2u32);
    let same = trie.remove(b"three");

    assert_eq!(same.get::<u32>(b"one"), Some(&1));
    assert_eq!(same.get::<u32>(b"two"), Some(&2));
}

#[test]
fn test_trie_many_keys_shared_prefixes() {
    let mut trie = Trie::new();
    for i in 0..200u32 {
        trie = trie.put(format!("key/{:03}", i).as_bytes(), i);
    }

    for i in 0..200u32 {
        assert_eq!(trie.get::<u32>(format!("key/{:03}", i).as_bytes()), Some(&i));
    }

    let mut trimmed = trie.clone();
    for i in 0..100u32 {
        trimmed = trimmed.remove(format!("key/{:03}", i).as_bytes());
    }
    for i in 0..100u32 {
        assert_eq!(trimmed.get::<u32>(format!("key/{:03}", i).as_bytes()), None);
        // The source trie is untouched.
        assert_eq!(trie.get::<u32>(format!("key/{:03}", i).as_bytes()), Some(&i));
    }
    for i in 100..200u32 {
        assert_eq!(trimmed.get::<u32>(format!("key/{:03}", i).as_bytes()), Some(&i));
    }
}

#[test]
fn test_store_single_writer_many_readers() {
    const N: u32 = 10_000;

    let store = Arc::new(TrieStore::new());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..N {
                store.put(i.to_be_bytes().as_slice(), i);
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                // Cheap deterministic pseudo-random probe sequence per thread.
                let mut seed = 0x9E3779B9u32.wrapping_mul(t + 1);
                for _ in 0..5_000 {
                    seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
                    let i = seed % N;
                    // A reader sees either nothing yet or exactly the value
                    // the writer stored, never a torn result.
                    if let Some(guard) = store.get::<u32>(i.to_be_bytes().as_slice()) {
                        assert_eq!(*guard, i);
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    for i in 0..N {
        assert_eq!(*store.get::<u32>(i.to_be_bytes().as_slice()).unwrap(), i);
    }
}

#[test]
fn test_store_guard_pins_snapshot() {
    let store = TrieStore::new();
    store.put(b"k", String::from("v1"));

    let guard = store.get::<String>(b"k").unwrap();
    store.put(b"k", String::from("v2"));
    store.remove(b"k");

    assert_eq!(guard.value().as_str(), "v1");
    assert!(store.get::<String>(b"k").is_none());
}
