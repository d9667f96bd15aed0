//! Sorted string map: a thin façade over the crit-bit trie.
//!
//! Keys whose last byte is `0x00` or `0xFF` get a `0xFF` sentinel byte
//! appended before they reach the trie, and the sentinel is stripped on
//! the way out. `0xFF` is the maximum byte value, so the escaping keeps
//! lexicographic order intact while sidestepping the NUL-tail rule.

use crate::trie::Trie;

/// Map sorted by the natural byte order of its keys.
pub struct SortedMap<V> {
    trie: Trie<V>,
}

impl<V> Default for SortedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SortedMap<V> {
    pub fn new() -> Self {
        SortedMap { trie: Trie::new() }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.trie.contains(&str_to_key(key))
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.trie.get(&str_to_key(key))
    }

    /// Inserts or replaces, returning the previous value if any.
    pub fn set(&mut self, key: &str, value: V) -> Option<V> {
        self.trie
            .set(&str_to_key(key), value)
            .expect("escaped keys never end in NUL")
    }

    /// Removes a key, returning its value.
    pub fn delete(&mut self, key: &str) -> Option<V> {
        self.trie.delete(&str_to_key(key))
    }

    pub fn clear(&mut self) {
        self.trie.clear();
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// All keys, in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        self.trie.all_prefixed(&[], |k, _| {
            keys.push(key_to_str(k));
            true
        });
        keys
    }

    /// Visits every entry whose key starts with `prefix`, in sorted
    /// order. Returns `false` iff the visitor aborted the enumeration.
    pub fn each<F>(&self, prefix: &str, mut handle: F) -> bool
    where
        F: FnMut(&str, &V) -> bool,
    {
        self.trie
            .all_prefixed(prefix.as_bytes(), |k, v| handle(&key_to_str(k), v))
    }
}

fn str_to_key(s: &str) -> Vec<u8> {
    let mut key = s.as_bytes().to_vec();
    if matches!(key.last(), Some(&0x00) | Some(&0xff)) {
        key.push(0xff);
    }
    key
}

fn key_to_str(key: &[u8]) -> String {
    let raw = match key.last() {
        Some(&0xff) => &key[..key.len() - 1],
        _ => key,
    };
    String::from_utf8_lossy(raw).into_owned()
}
