use crate::validate::Corruption;

/// Errors surfaced by [`Trie`](crate::Trie) operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("key of {len} bytes exceeds the {max} byte limit", max = crate::MAX_KEY_LEN)]
    KeyTooLarge { len: usize },
    /// Live data plus `required` bytes does not fit, even after compaction.
    #[error("not enough space for {required} more bytes")]
    NotEnoughSpace { required: usize },
    /// Live data fits but the free tail of the buffer is too short.
    ///
    /// `write` absorbs this by compacting once and retrying.
    #[error("{required} bytes only fit after defrag")]
    DefragRequired { required: usize },
    #[error("item counter is at its maximum")]
    MaxItemsStored,
    #[error("node already has the maximum number of children")]
    TooManyChildren,
    #[error("capacity {0} is outside the supported range")]
    InvalidCapacity(usize),
    #[error("corruption: {0}")]
    Corrupted(#[from] Corruption),
}

pub type Result<T> = std::result::Result<T, Error>;
