//! Read-only introspection: node traversal and space statistics.

use std::fmt;

use smallvec::SmallVec;

use crate::layout::{child_at, children_count, NodeHeader, NodeRef, TrieHeader};
use crate::Trie;

/// One node visited by [`Trie::walk`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalkEntry<'a> {
    /// Distance from the root (the root is 0).
    pub depth: usize,
    /// Bytes this node contributes to the keys below it.
    pub fragment: &'a [u8],
    /// Value of the key ending here; `None` for path-only nodes.
    pub value: Option<i64>,
}

/// Depth-first traversal over every node, including path-only ones.
///
/// Sibling order follows the children blocks; no key ordering is promised.
pub struct Walk<'a> {
    buf: &'a [u8],
    stack: SmallVec<[(NodeRef, usize); 32]>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = WalkEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        let header = NodeHeader::read(self.buf, node);
        if header.has_children() {
            for i in 0..children_count(self.buf, header.children_offset) {
                let child = child_at(self.buf, header.children_offset, i);
                self.stack.push((NodeRef::new(child), depth + 1));
            }
        }
        Some(WalkEntry {
            depth,
            fragment: header.fragment(self.buf),
            value: header.value(self.buf),
        })
    }
}

/// Space accounting snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrieStats {
    pub entries: usize,
    pub next_alloc: usize,
    pub used_size: usize,
    pub wasted: usize,
    pub capacity: usize,
}

impl fmt::Display for TrieStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entries {} next alloc {} used {} waste {} capacity {}",
            self.entries, self.next_alloc, self.used_size, self.wasted, self.capacity
        )
    }
}

impl Trie {
    /// Visits every node depth-first as `(depth, fragment, value)`.
    ///
    /// Meant for dumps and debugging tools.
    pub fn walk(&self) -> Walk<'_> {
        let mut stack = SmallVec::new();
        if TrieHeader::read(&self.buf).items_count > 0 {
            stack.push((NodeRef::ROOT, 0));
        }
        Walk {
            buf: &self.buf,
            stack,
        }
    }

    pub fn stats(&self) -> TrieStats {
        let h = TrieHeader::read(&self.buf);
        TrieStats {
            entries: h.items_count as usize,
            next_alloc: h.next_alloc as usize,
            used_size: h.used_size as usize,
            wasted: h.wasted(),
            capacity: self.buf.len(),
        }
    }
}
