//! # offset-trie
//!
//! A compressed (radix) trie mapping byte-string keys to `i64` values, stored
//! entirely inside one fixed-size buffer.
//!
//! Nodes refer to each other through 16-bit offsets from the start of the
//! buffer instead of pointers, so the whole structure is relocatable: the
//! bytes returned by [`Trie::as_bytes`] can be copied anywhere and loaded back
//! with [`Trie::from_bytes`]. Allocation is a bump pointer; space lost to node
//! splits, removed values and regrown children arrays is reclaimed in bulk by
//! [`Trie::defrag`], which `write` also runs on its own when the free tail of
//! the buffer runs out.
//!
//! Typical use is a route table: build once from many hierarchical keys, then
//! serve lookups.
//!
//! ## Example
//!
//! ```rust
//! use offset_trie::Trie;
//!
//! let mut routes = Trie::new();
//! routes.write("admin/backup", 1).unwrap();
//! routes.write("admin/stats", 2).unwrap();
//!
//! assert_eq!(routes.try_read("admin/stats"), Some(2));
//! assert_eq!(routes.try_read("admin"), None);
//! assert!(routes.remove("admin/backup"));
//! assert_eq!(routes.entries_count(), 1);
//! ```
//!
//! ## Concurrency
//!
//! Operations run to completion synchronously and there is no internal
//! locking. Share a `Trie` across threads behind your own lock.

#![forbid(unsafe_code)]

mod alloc;
mod config;
mod defrag;
mod error;
mod layout;
mod matcher;
mod remove;
mod validate;
mod walk;
mod write;

use std::fmt;

pub use config::{TrieConfig, DEFAULT_CAPACITY, MAX_CAPACITY, MIN_CAPACITY};
pub use error::{Error, Result};
pub use layout::{
    CHILD_REF_SIZE, HEADER_SIZE, MAX_CHILDREN, MAX_KEY_LEN, NODE_HEADER_SIZE, OFFSET_CEILING,
    VALUE_SIZE,
};
pub use validate::Corruption;
pub use walk::{TrieStats, Walk, WalkEntry};

use layout::{NodeRef, TrieHeader};
use matcher::Match;

/// Radix trie of byte-string keys to `i64` values inside one fixed buffer.
#[derive(Clone)]
pub struct Trie {
    buf: Box<[u8]>,
    /// Highest offset any allocation may end at.
    limit: usize,
    config: TrieConfig,
}

impl Trie {
    /// Creates an empty trie with the default 32 KiB buffer.
    pub fn new() -> Self {
        // The default configuration is always within bounds.
        Self::build(TrieConfig::default())
    }

    /// Creates an empty trie with a buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_config(TrieConfig::default().with_capacity(capacity))
    }

    pub fn with_config(config: TrieConfig) -> Result<Self> {
        config.check()?;
        Ok(Self::build(config))
    }

    fn build(config: TrieConfig) -> Self {
        let mut buf = vec![0u8; config.capacity].into_boxed_slice();
        TrieHeader::empty().write(&mut buf);
        Self {
            limit: config.capacity.min(OFFSET_CEILING),
            buf,
            config,
        }
    }

    /// Loads a trie from bytes previously obtained through [`Trie::as_bytes`].
    ///
    /// The buffer length becomes the capacity. The structure is validated
    /// before it is accepted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config = TrieConfig::default().with_capacity(bytes.len());
        if config.check().is_err() {
            return Err(Corruption::BadCapacity { len: bytes.len() }.into());
        }
        let mut trie = Self::build(config);
        trie.buf.copy_from_slice(bytes);
        validate::check(&trie.buf, trie.limit)?;
        Ok(trie)
    }

    /// Looks up the value stored under `key`.
    ///
    /// Keys that only exist as a prefix of longer keys are not found.
    pub fn try_read(&self, key: impl AsRef<[u8]>) -> Option<i64> {
        let key = key.as_ref();
        if self.is_empty() || key.len() > MAX_KEY_LEN {
            return None;
        }
        match matcher::find(&self.buf, NodeRef::ROOT, key, 0) {
            Match::Exact { node } => layout::NodeHeader::read(&self.buf, node).value(&self.buf),
            Match::Partial { .. } => None,
        }
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.try_read(key).is_some()
    }

    /// Number of keys currently holding a value.
    pub fn entries_count(&self) -> usize {
        TrieHeader::read(&self.buf).items_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.entries_count() == 0
    }

    /// Bytes allocated but no longer live; only `defrag` brings this back to 0.
    pub fn wasted_space(&self) -> usize {
        TrieHeader::read(&self.buf).wasted()
    }

    /// Bytes left between the bump pointer and the end of the buffer.
    pub fn available_space_before_defrag(&self) -> usize {
        self.buf.len() - TrieHeader::read(&self.buf).next_alloc as usize
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// The raw buffer, laid out as documented in the `layout` module
    /// (little-endian, offsets relative to the start of the slice).
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Trie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trie")
            .field("stats", &self.stats())
            .field("limit", &self.limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trie_is_empty() {
        let t = Trie::new();
        assert_eq!(t.entries_count(), 0);
        assert!(t.is_empty());
        assert_eq!(t.try_read("hello"), None);
        assert_eq!(t.wasted_space(), 0);
        assert_eq!(t.capacity(), DEFAULT_CAPACITY);
        assert_eq!(
            t.available_space_before_defrag(),
            DEFAULT_CAPACITY - HEADER_SIZE
        );
    }

    #[test]
    fn test_add_to_empty() {
        let mut t = Trie::new();
        assert_eq!(t.write("hello", 1), Ok(()));
        assert_eq!(t.entries_count(), 1);
        assert_eq!(t.try_read("hello"), Some(1));
    }

    #[test]
    fn test_extension_after_prefix() {
        let mut t = Trie::new();
        t.write("oren", 1).unwrap();
        assert_eq!(t.entries_count(), 1);
        t.write("oren eini", 2).unwrap();
        assert_eq!(t.entries_count(), 2);
        assert_eq!(t.try_read("oren"), Some(1));
        assert_eq!(t.try_read("oren eini"), Some(2));
        assert_eq!(t.try_read("or"), None);
    }

    #[test]
    fn test_shared_prefix() {
        let mut t = Trie::new();
        t.write("oren", 1).unwrap();
        t.write("orange", 2).unwrap();
        assert_eq!(t.entries_count(), 2);
        assert_eq!(t.try_read("oren"), Some(1));
        assert_eq!(t.try_read("orange"), Some(2));
    }

    #[test]
    fn test_prefix_after_extension() {
        let mut t = Trie::new();
        t.write("oren eini", 1).unwrap();
        t.write("oren", 2).unwrap();
        assert_eq!(t.entries_count(), 2);
        assert_eq!(t.try_read("oren"), Some(2));
        assert_eq!(t.try_read("oren eini"), Some(1));
    }

    #[test]
    fn test_prefix_churn_tracks_garbage() {
        let mut t = Trie::new();
        t.write("oren eini", 1).unwrap();
        t.write("oren", 2).unwrap();
        t.write("orange", 3).unwrap();
        assert_eq!(t.entries_count(), 3);
        assert!(t.available_space_before_defrag() > 0);
        assert!(t.wasted_space() > 0);
    }

    #[test]
    fn test_empty_key() {
        let mut t = Trie::new();
        t.write("abc", 1).unwrap();
        t.write("", 42).unwrap();
        assert_eq!(t.try_read(""), Some(42));
        assert_eq!(t.try_read("abc"), Some(1));
        assert_eq!(t.entries_count(), 2);

        let mut t = Trie::new();
        t.write("", 7).unwrap();
        t.write("x", 8).unwrap();
        assert_eq!(t.try_read(""), Some(7));
        assert_eq!(t.try_read("x"), Some(8));
    }

    #[test]
    fn test_update_keeps_count() {
        let mut t = Trie::new();
        t.write("key", 1).unwrap();
        t.write("key", 2).unwrap();
        assert_eq!(t.try_read("key"), Some(2));
        assert_eq!(t.entries_count(), 1);
    }

    #[test]
    fn test_many() {
        let mut t = Trie::new();
        for i in 0..500i64 {
            t.write(format!("key{i:05}"), i).unwrap();
        }
        assert_eq!(t.entries_count(), 500);
        for i in 0..500i64 {
            assert_eq!(t.try_read(format!("key{i:05}")), Some(i), "failed at {i}");
        }
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_negative_and_extreme_values() {
        let mut t = Trie::new();
        t.write("min", i64::MIN).unwrap();
        t.write("max", i64::MAX).unwrap();
        t.write("neg", -1).unwrap();
        assert_eq!(t.try_read("min"), Some(i64::MIN));
        assert_eq!(t.try_read("max"), Some(i64::MAX));
        assert_eq!(t.try_read("neg"), Some(-1));
    }

    #[test]
    fn test_binary_keys() {
        let mut t = Trie::new();
        t.write([0u8, 0, 0], 1).unwrap();
        t.write([0u8, 0], 2).unwrap();
        t.write([0xFFu8, 0x00], 3).unwrap();
        assert_eq!(t.try_read([0u8, 0, 0]), Some(1));
        assert_eq!(t.try_read([0u8, 0]), Some(2));
        assert_eq!(t.try_read([0xFFu8, 0x00]), Some(3));
        assert_eq!(t.try_read([0u8]), None);
    }

    #[test]
    fn test_randomized_against_btreemap() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        use std::collections::BTreeMap;

        let mut rng = StdRng::seed_from_u64(7);
        let mut t = Trie::new();
        let mut m: BTreeMap<Vec<u8>, i64> = BTreeMap::new();

        for _ in 0..20_000 {
            let len = rng.gen_range(0..12);
            let key: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'f')).collect();
            match rng.gen_range(0..100) {
                0..=39 => {
                    let v: i64 = rng.gen();
                    match t.write(&key, v) {
                        Ok(()) => {
                            m.insert(key, v);
                        }
                        Err(Error::NotEnoughSpace { .. }) => {}
                        Err(other) => panic!("unexpected {other}"),
                    }
                }
                40..=69 => {
                    assert_eq!(t.remove(&key), m.remove(&key).is_some());
                }
                70..=98 => {
                    assert_eq!(t.try_read(&key), m.get(&key).copied());
                }
                _ => t.defrag(),
            }
            assert_eq!(t.entries_count(), m.len());
        }
        assert!(t.validate().is_ok());
        for (k, v) in &m {
            assert_eq!(t.try_read(k), Some(*v));
        }
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut t = Trie::with_capacity(4096).unwrap();
        t.write("admin/backup", 1).unwrap();
        t.write("admin/stats", 2).unwrap();
        t.write("docs", 3).unwrap();

        let copy = Trie::from_bytes(t.as_bytes()).unwrap();
        assert_eq!(copy.capacity(), 4096);
        assert_eq!(copy.try_read("admin/stats"), Some(2));
        assert_eq!(copy.try_read("docs"), Some(3));
        assert_eq!(copy.stats(), t.stats());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert_eq!(
            Trie::from_bytes(&[0u8; 16]).unwrap_err(),
            Error::Corrupted(Corruption::BadCapacity { len: 16 })
        );
        assert!(matches!(
            Trie::from_bytes(&[0u8; 128]),
            Err(Error::Corrupted(Corruption::AllocationInsideHeader { .. }))
        ));
    }

    #[test]
    fn test_from_bytes_rejects_zero_child_slot() {
        let mut t = Trie::new();
        t.write("a", 1).unwrap();
        t.write("b", 2).unwrap();
        t.write("c", 3).unwrap();

        let mut bytes = t.as_bytes().to_vec();
        let block = layout::NodeHeader::read(&bytes, NodeRef::ROOT).children_offset;
        layout::write_u16(&mut bytes, layout::child_slot(block, 0), 0);
        let mut header = TrieHeader::read(&bytes);
        header.items_count = 2;
        header.write(&mut bytes);

        assert!(matches!(
            Trie::from_bytes(&bytes),
            Err(Error::Corrupted(Corruption::NodeOutOfBounds {
                field: "child",
                ..
            }))
        ));
    }

    #[test]
    fn test_invalid_capacity() {
        assert_eq!(Trie::with_capacity(8).unwrap_err(), Error::InvalidCapacity(8));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut t = Trie::new();
        t.write("a", 1).unwrap();
        let snapshot = t.clone();
        t.write("a", 2).unwrap();
        assert_eq!(snapshot.try_read("a"), Some(1));
        assert_eq!(t.try_read("a"), Some(2));
    }
}

#[cfg(test)]
mod proptests;
