use crate::layout::{NodeHeader, NodeRef, TrieHeader, MAX_KEY_LEN, VALUE_SIZE};
use crate::matcher::{self, Match};
use crate::Trie;

impl Trie {
    /// Tombstones the value stored under `key`.
    ///
    /// Returns `false` when the key was never written or only exists as a
    /// prefix of longer keys. The tree shape is left alone; the value slot
    /// becomes waste until the next `defrag`.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> bool {
        let key = key.as_ref();
        let mut trie = TrieHeader::read(&self.buf);
        if trie.items_count == 0 || key.len() > MAX_KEY_LEN {
            return false;
        }

        let node = match matcher::find(&self.buf, NodeRef::ROOT, key, 0) {
            Match::Exact { node } => node,
            Match::Partial { .. } => return false,
        };
        let mut header = NodeHeader::read(&self.buf, node);
        if !header.has_value() {
            return false;
        }

        header.value_offset = 0;
        header.write(&mut self.buf, node);
        trie.items_count -= 1;
        trie.used_size -= VALUE_SIZE as u16;
        trie.write(&mut self.buf);
        true
    }
}
