//! Compaction.
//!
//! The live tree is copied depth-first into a fresh buffer of the same size.
//! Each node is placed at the bump pointer with an exact footprint (no key
//! padding, no value slot for path-only nodes, a children block sized for the
//! children it actually has). A child's new offset is only known once it has
//! been placed, so the worklist carries the slot in the parent's new children
//! block that must be patched at that point.

use smallvec::{smallvec, SmallVec};
use tracing::{debug, error};

use crate::alloc;
use crate::error::Result;
use crate::layout::{
    child_at, child_slot, children_block_size, children_count, write_i64, write_u16,
    NodeHeader, NodeRef, TrieHeader, NODE_HEADER_SIZE, VALUE_SIZE,
};
use crate::Trie;

/// A node still to be copied: its offset in the old buffer and the slot in
/// the new buffer that must receive its new offset (none for the root).
type Pending = (NodeRef, Option<usize>);

impl Trie {
    /// Rebuilds the trie so that no wasted space remains.
    ///
    /// Content is unchanged; every node moves, so offsets obtained before the
    /// call are stale. The rebuild goes into a shadow buffer that replaces the
    /// current one only once it is complete.
    pub fn defrag(&mut self) {
        let before = TrieHeader::read(&self.buf);
        let mut fresh = vec![0u8; self.buf.len()].into_boxed_slice();

        match compact_into(&self.buf, &mut fresh, self.limit) {
            Ok(nodes) => {
                self.buf = fresh;
                let after = TrieHeader::read(&self.buf);
                debug!(
                    nodes,
                    items = after.items_count,
                    next_alloc_before = before.next_alloc,
                    next_alloc_after = after.next_alloc,
                    reclaimed = before.next_alloc.saturating_sub(after.next_alloc),
                    "trie compacted"
                );
                if self.config.validate_after_defrag {
                    // validate() logs the violation itself.
                    let _ = self.validate();
                }
            }
            Err(err) => {
                error!(%err, "defrag aborted, buffer left untouched");
            }
        }
    }
}

/// Copies the tree rooted in `old` into `fresh`; returns the number of nodes
/// placed.
fn compact_into(old: &[u8], fresh: &mut [u8], limit: usize) -> Result<usize> {
    TrieHeader::empty().write(fresh);
    if TrieHeader::read(old).items_count == 0 {
        return Ok(0);
    }

    let mut pending: SmallVec<[Pending; 32]> = smallvec![(NodeRef::ROOT, None)];
    let mut items = 0u16;
    let mut placed = 0usize;

    while let Some((source, slot)) = pending.pop() {
        let node = NodeHeader::read(old, source);
        let fragment = node.fragment(old);
        let child_count = if node.has_children() {
            children_count(old, node.children_offset)
        } else {
            0
        };

        let mut size = NODE_HEADER_SIZE + fragment.len();
        if node.has_value() {
            size += VALUE_SIZE;
        }
        if child_count > 0 {
            size += children_block_size(child_count);
        }

        let at = alloc::allocate(fresh, limit, size)?;
        let target = NodeRef::new(at);
        if let Some(slot) = slot {
            write_u16(fresh, slot, at);
        }

        let key_offset = target.offset() + NODE_HEADER_SIZE;
        fresh[key_offset..key_offset + fragment.len()].copy_from_slice(fragment);
        let mut cursor = key_offset + fragment.len();

        let value_offset = match node.value(old) {
            Some(v) => {
                let at = cursor;
                write_i64(fresh, at, v);
                items += 1;
                cursor += VALUE_SIZE;
                at
            }
            None => 0,
        };

        let children_offset = if child_count > 0 {
            let block = cursor as u16;
            fresh[cursor] = child_count as u8;
            for i in 0..child_count {
                let child = child_at(old, node.children_offset, i);
                pending.push((NodeRef::new(child), Some(child_slot(block, i))));
            }
            block
        } else {
            0
        };

        NodeHeader {
            key_offset: key_offset as u16,
            key_size: fragment.len() as u16,
            children_offset,
            value_offset: value_offset as u16,
        }
        .write(fresh, target);
        placed += 1;
    }

    let mut header = TrieHeader::read(fresh);
    header.items_count = items;
    header.write(fresh);
    Ok(placed)
}
