use std::any::Any;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use super::trie::Trie;

/// A value read from a [`TrieStore`].
///
/// Owns a snapshot of the root the value was found under, so the value stays
/// valid no matter how many writes land after the lookup.
pub struct ValueGuard<T> {
    _root: Trie,
    value: Arc<T>,
}

impl<T> ValueGuard<T> {
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> Deref for ValueGuard<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// Concurrent wrapper around a persistent [`Trie`]: any number of readers
/// against immutable snapshots, one writer at a time.
///
/// Readers only ever contend on the root pointer copy; a lookup never holds a
/// lock. Writers are serialised end-to-end and swap a fully-built root in, so
/// a reader observes the pre-write or post-write trie, never anything partial.
pub struct TrieStore {
    /// Guards the root pointer itself. Held for a pointer copy or swap only,
    /// never across a trie operation.
    root: Mutex<Trie>,
    /// Serialises writers end-to-end.
    write_lock: Mutex<()>,
}

impl TrieStore {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Trie::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Looks up `key` against a snapshot of the current root.
    pub fn get<T: Any + Send + Sync>(&self, key: &[u8]) -> Option<ValueGuard<T>> {
        let root = self.root.lock().clone();
        let value = root.get_owned::<T>(key)?;
        Some(ValueGuard { _root: root, value })
    }

    /// Stores `value` under `key`.
    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) {
        let _writer = self.write_lock.lock();

        let snapshot = self.root.lock().clone();
        // Build the new version outside the root lock; readers keep going.
        let new_root = snapshot.put(key, value);
        *self.root.lock() = new_root;
    }

    /// Removes `key` if present.
    pub fn remove(&self, key: &[u8]) {
        let _writer = self.write_lock.lock();

        let snapshot = self.root.lock().clone();
        let new_root = snapshot.remove(key);
        *self.root.lock() = new_root;
    }
}

impl Default for TrieStore {
    fn default() -> Self {
        Self::new()
    }
}
