use crate::error::{Error, Result};

/// Default buffer size (32 KiB).
pub const DEFAULT_CAPACITY: usize = 32 * 1024;
/// Smallest accepted buffer.
pub const MIN_CAPACITY: usize = 64;
/// Largest accepted buffer; offsets above `i16::MAX` are never handed out, so
/// anything beyond this would be dead weight.
pub const MAX_CAPACITY: usize = 32 * 1024;

/// Configuration for a [`Trie`](crate::Trie).
///
/// The capacity is fixed for the lifetime of the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieConfig {
    /// Size of the backing buffer in bytes.
    pub capacity: usize,
    /// Run `validate` after every compaction and log violations.
    pub validate_after_defrag: bool,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            validate_after_defrag: cfg!(debug_assertions),
        }
    }
}

impl TrieConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_validate_after_defrag(mut self, on: bool) -> Self {
        self.validate_after_defrag = on;
        self
    }

    pub(crate) fn check(&self) -> Result<()> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&self.capacity) {
            return Err(Error::InvalidCapacity(self.capacity));
        }
        Ok(())
    }
}
