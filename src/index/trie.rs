use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Values are stored type-erased; lookups name the expected type and get None
/// back on a mismatch.
type Value = Arc<dyn Any + Send + Sync>;

/// A node in the persistent trie. Immutable once published: updates build new
/// nodes along the touched path and share every untouched subtree.
#[derive(Default, Clone)]
pub struct TrieNode {
    /// One child per key byte
    children: HashMap<u8, Arc<TrieNode>>,
    /// Present iff some key terminates at this node
    value: Option<Value>,
}

/// A persistent copy-on-write trie keyed by byte strings.
///
/// A `Trie` is a cheap-to-clone handle on an immutable tree. `put` and
/// `remove` return a new `Trie` and leave the receiver untouched, so every
/// historical root stays readable indefinitely.
#[derive(Default, Clone)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Walks to the node the key terminates at, if the path exists.
    fn walk(&self, key: &[u8]) -> Option<&TrieNode> {
        let mut node = self.root.as_deref()?;
        for &byte in key {
            node = node.children.get(&byte)?.as_ref();
        }
        Some(node)
    }

    /// Looks up the value stored under `key`. Returns None when the key is
    /// absent or the stored value is not a `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &[u8]) -> Option<&T> {
        self.walk(key)?.value.as_ref()?.downcast_ref::<T>()
    }

    /// Like [`get`](Self::get) but returns shared ownership of the value, for
    /// callers that must hold it beyond the trie borrow.
    pub fn get_owned<T: Any + Send + Sync>(&self, key: &[u8]) -> Option<Arc<T>> {
        self.walk(key)?.value.clone()?.downcast::<T>().ok()
    }

    /// Returns a new trie with `value` stored under `key`. Nodes off the key
    /// path are shared with the receiver.
    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) -> Trie {
        let value: Value = Arc::new(value);
        let root = Self::put_node(self.root.as_deref(), key, value);
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    fn put_node(node: Option<&TrieNode>, key: &[u8], value: Value) -> TrieNode {
        match key.split_first() {
            // Terminal: keep the children, swap in the value.
            None => TrieNode {
                children: node.map(|n| n.children.clone()).unwrap_or_default(),
                value: Some(value),
            },
            Some((&byte, rest)) => {
                let child = node.and_then(|n| n.children.get(&byte)).map(Arc::as_ref);
                let new_child = Self::put_node(child, rest, value);

                let mut children = node.map(|n| n.children.clone()).unwrap_or_default();
                children.insert(byte, Arc::new(new_child));
                TrieNode {
                    children,
                    value: node.and_then(|n| n.value.clone()),
                }
            }
        }
    }

    /// Returns a new trie without `key`. Nodes left with no value and no
    /// children are pruned on the way back up. Removing an absent key yields
    /// a trie equivalent to the receiver.
    pub fn remove(&self, key: &[u8]) -> Trie {
        // Nothing stored under the key: share the existing root wholesale.
        match self.walk(key) {
            Some(node) if node.value.is_some() => {}
            _ => return self.clone(),
        }

        let root = self
            .root
            .as_deref()
            .and_then(|node| Self::remove_node(node, key));
        Trie {
            root: root.map(Arc::new),
        }
    }

    /// Rebuilds `node` with `key` removed below it. None means the rebuilt
    /// subtree is empty and the parent should drop its edge.
    fn remove_node(node: &TrieNode, key: &[u8]) -> Option<TrieNode> {
        match key.split_first() {
            None => {
                if node.children.is_empty() {
                    return None;
                }
                Some(TrieNode {
                    children: node.children.clone(),
                    value: None,
                })
            }
            Some((&byte, rest)) => {
                let Some(child) = node.children.get(&byte) else {
                    return Some(node.clone());
                };

                let mut children = node.children.clone();
                match Self::remove_node(child, rest) {
                    Some(new_child) => {
                        children.insert(byte, Arc::new(new_child));
                    }
                    None => {
                        children.remove(&byte);
                    }
                }

                if children.is_empty() && node.value.is_none() {
                    return None;
                }
                Some(TrieNode {
                    children,
                    value: node.value.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trie_empty_get() {
        let trie = Trie::new();
        assert_eq!(trie.get::<u32>(b"missing"), None);
        assert_eq!(trie.get::<u32>(b""), None);
    }

    #[test]
    fn test_trie_put_get() {
        let trie = Trie::new().put(b"hello", 42u32);
        assert_eq!(trie.get::<u32>(b"hello"), Some(&42));
        assert_eq!(trie.get::<u32>(b"hell"), None);
        assert_eq!(trie.get::<u32>(b"hello!"), None);
    }

    #[test]
    fn test_trie_empty_key() {
        let trie = Trie::new().put(b"", 7u32);
        assert_eq!(trie.get::<u32>(b""), Some(&7));
    }

    #[test]
    fn test_trie_type_mismatch() {
        let trie = Trie::new().put(b"key", 42u32);
        assert_eq!(trie.get::<String>(b"key"), None);
        assert_eq!(trie.get::<u64>(b"key"), None);
        assert_eq!(trie.get::<u32>(b"key"), Some(&42));
    }

    #[test]
    fn test_trie_overwrite_keeps_children() {
        let trie = Trie::new().put(b"ab", 1u32).put(b"a", 2u32);
        assert_eq!(trie.get::<u32>(b"a"), Some(&2));
        assert_eq!(trie.get::<u32>(b"ab"), Some(&1));

        let trie = trie.put(b"a", 3u32);
        assert_eq!(trie.get::<u32>(b"a"), Some(&3));
        assert_eq!(trie.get::<u32>(b"ab"), Some(&1));
    }

    #[test]
    fn test_trie_versions_are_independent() {
        let t0 = Trie::new();
        let t1 = t0.put(b"ab", 1u32);
        let t2 = t1.put(b"ac", 2u32);
        let t3 = t2.remove(b"ab");

        assert_eq!(t0.get::<u32>(b"ab"), None);
        assert_eq!(t1.get::<u32>(b"ab"), Some(&1));
        assert_eq!(t1.get::<u32>(b"ac"), None);
        assert_eq!(t2.get::<u32>(b"ab"), Some(&1));
        assert_eq!(t2.get::<u32>(b"ac"), Some(&2));
        assert_eq!(t3.get::<u32>(b"ab"), None);
        assert_eq!(t3.get::<u32>(b"ac"), Some(&2));
    }

    #[test]
    fn test_trie_remove_prunes_empty_nodes() {
        let trie = Trie::new().put(b"ab", 1u32);
        let removed = trie.remove(b"ab");

        assert_eq!(removed.get::<u32>(b"ab"), None);
        // The whole path collapses; an empty trie has no root at all.
        assert!(removed.root.is_none());
    }

    #[test]
    fn test_trie_remove_keeps_needed_interior() {
        let trie = Trie::new().put(b"a", 1u32).put(b"ab", 2u32);

        let no_leaf = trie.remove(b"ab");
        assert_eq!(no_leaf.get::<u32>(b"a"), Some(&1));
        assert_eq!(no_leaf.get::<u32>(b"ab"), None);

        let no_interior = trie.remove(b"a");
        assert_eq!(no_interior.get::<u32>(b"a"), None);
        assert_eq!(no_interior.get::<u32>(b"ab"), Some(&2));
    }

    #[test]
    fn test_trie_remove_absent_is_noop() {
        let trie = Trie::new().put(b"ab", 1u32);

        let same = trie.remove(b"zz");
        assert_eq!(same.get::<u32>(b"ab"), Some(&1));
        // The fast path shares the root outright.
        assert!(Arc::ptr_eq(
            trie.root.as_ref().unwrap(),
            same.root.as_ref().unwrap()
        ));

        // A prefix of a stored key holds no value either.
        let same = trie.remove(b"a");
        assert_eq!(same.get::<u32>(b"ab"), Some(&1));
    }

    #[test]
    fn test_trie_structural_sharing() {
        let t1 = Trie::new().put(b"ab", 1u32).put(b"cd", 2u32);
        let t2 = t1.put(b"ab", 3u32);

        // The subtree under 'c' is untouched and shared between versions.
        let c1 = t1.root.as_ref().unwrap().children.get(&b'c').unwrap();
        let c2 = t2.root.as_ref().unwrap().children.get(&b'c').unwrap();
        assert!(Arc::ptr_eq(c1, c2));
    }

    #[test]
    fn test_trie_non_copy_values() {
        let trie = Trie::new().put(b"s", String::from("payload"));
        assert_eq!(trie.get::<String>(b"s").map(String::as_str), Some("payload"));

        let owned = trie.get_owned::<String>(b"s").unwrap();
        drop(trie);
        assert_eq!(owned.as_str(), "payload");
    }
}
