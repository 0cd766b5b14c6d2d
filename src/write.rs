//! Insertion: new roots, value promotion, child appends and node splits.

use std::cmp::Reverse;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::alloc;
use crate::error::{Error, Result};
use crate::layout::{
    child_at, children_block_size, children_count, first_key_byte, new_node_size, set_child_at,
    write_i64, write_new_node, NodeHeader, NodeRef, TrieHeader, MAX_CHILDREN, MAX_ITEMS,
    MAX_KEY_LEN, NODE_HEADER_SIZE, ROOT_OFFSET, VALUE_SIZE,
};
use crate::matcher::{self, Match};
use crate::Trie;

impl Trie {
    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// If the free tail of the buffer is too short while the live data would
    /// still fit, the trie is compacted once and the insertion retried.
    /// Any node offsets derived before this call are invalid afterwards.
    pub fn write(&mut self, key: impl AsRef<[u8]>, value: i64) -> Result<()> {
        let key = key.as_ref();
        if key.len() > MAX_KEY_LEN {
            return Err(Error::KeyTooLarge { len: key.len() });
        }

        let result = match self.insert(key, value) {
            Err(Error::DefragRequired { required }) => {
                debug!(
                    required,
                    wasted = self.wasted_space(),
                    "free tail exhausted, compacting before retry"
                );
                self.defrag();
                self.insert(key, value)
            }
            other => other,
        };

        if let Err(ref err) = result {
            warn!(key_len = key.len(), %err, "write rejected");
        }
        result
    }

    fn insert(&mut self, key: &[u8], value: i64) -> Result<()> {
        if TrieHeader::read(&self.buf).items_count == 0 {
            return self.write_root(key, value);
        }

        let (node, start, common) = match matcher::find(&self.buf, NodeRef::ROOT, key, 0) {
            Match::Exact { node } => return self.store_value(node, value),
            Match::Partial {
                node,
                start,
                common,
            } => (node, start, common),
        };
        let rest = &key[start + common..];
        let fragment_len = NodeHeader::read(&self.buf, node).key_size as usize;
        if common == fragment_len {
            return self.append_child(node, rest, value);
        }

        // Split and the step after it either both happen or neither does.
        self.check_items()?;
        alloc::reserve(
            TrieHeader::read(&self.buf),
            split_size() + after_split_size(rest.len()),
            self.limit,
        )?;
        self.split(node, common)?;
        // The truncated node now ends where the key diverges, and its only
        // child starts with a different byte than `rest`.
        if rest.is_empty() {
            self.store_value(node, value)
        } else {
            self.append_child(node, rest, value)
        }
    }

    /// Materializes the whole key as the root, discarding whatever path-only
    /// nodes an emptied trie still carried.
    fn write_root(&mut self, key: &[u8], value: i64) -> Result<()> {
        let size = new_node_size(key.len());
        alloc::reserve(TrieHeader::empty(), size, self.limit)?;
        TrieHeader::empty().write(&mut self.buf);
        let at = alloc::allocate(&mut self.buf, self.limit, size)?;
        debug_assert_eq!(at as usize, ROOT_OFFSET);
        write_new_node(&mut self.buf, NodeRef::ROOT, key, value);
        self.add_items(1);
        Ok(())
    }

    fn store_value(&mut self, node: NodeRef, value: i64) -> Result<()> {
        let mut header = NodeHeader::read(&self.buf, node);
        if !header.has_value() {
            // Path-only node becomes a terminal key.
            self.check_items()?;
            header.value_offset = alloc::allocate(&mut self.buf, self.limit, VALUE_SIZE)?;
            header.write(&mut self.buf, node);
            self.add_items(1);
        }
        write_i64(&mut self.buf, header.value_offset as usize, value);
        Ok(())
    }

    /// Hangs a new leaf carrying `rest` below `parent`.
    ///
    /// Children blocks never grow in place: a block one entry larger is
    /// allocated together with the leaf, and the old block becomes waste.
    fn append_child(&mut self, parent: NodeRef, rest: &[u8], value: i64) -> Result<()> {
        debug_assert!(!rest.is_empty());
        let mut header = NodeHeader::read(&self.buf, parent);
        let old_block = header.children_offset;
        let old_count = if header.has_children() {
            children_count(&self.buf, old_block)
        } else {
            0
        };
        if old_count >= MAX_CHILDREN {
            return Err(Error::TooManyChildren);
        }
        self.check_items()?;

        let block_size = children_block_size(old_count + 1);
        let block = alloc::allocate(
            &mut self.buf,
            self.limit,
            block_size + new_node_size(rest.len()),
        )?;
        let leaf = NodeRef::new(block + block_size as u16);
        write_new_node(&mut self.buf, leaf, rest, value);

        let mut children: SmallVec<[NodeRef; 16]> = (0..old_count)
            .map(|i| NodeRef::new(child_at(&self.buf, old_block, i)))
            .collect();
        children.push(leaf);
        children.sort_unstable_by_key(|&c| Reverse(first_key_byte(&self.buf, c)));

        self.buf[block as usize] = children.len() as u8;
        for (i, &child) in children.iter().enumerate() {
            set_child_at(&mut self.buf, block, i, child);
        }

        header.children_offset = block;
        header.write(&mut self.buf, parent);
        if old_count > 0 {
            alloc::reclaim(&mut self.buf, children_block_size(old_count));
        }
        self.add_items(1);

        trace!(
            parent = parent.raw(),
            children = children.len(),
            "children block regrown"
        );
        Ok(())
    }

    /// Cuts `node`'s fragment after `common` bytes.
    ///
    /// The tail node takes over the remainder of the fragment (sharing its
    /// key bytes), the value and the children; `node` keeps the prefix and a
    /// single-entry children block pointing at the tail.
    fn split(&mut self, node: NodeRef, common: usize) -> Result<()> {
        let mut header = NodeHeader::read(&self.buf, node);
        debug_assert!(common < header.key_size as usize);

        let at = alloc::allocate(&mut self.buf, self.limit, split_size())?;
        let tail = NodeRef::new(at);
        NodeHeader {
            key_offset: header.key_offset + common as u16,
            key_size: header.key_size - common as u16,
            children_offset: header.children_offset,
            value_offset: header.value_offset,
        }
        .write(&mut self.buf, tail);

        let block = at + NODE_HEADER_SIZE as u16;
        self.buf[block as usize] = 1;
        set_child_at(&mut self.buf, block, 0, tail);

        header.key_size = common as u16;
        header.value_offset = 0;
        header.children_offset = block;
        header.write(&mut self.buf, node);

        trace!(node = node.raw(), tail = tail.raw(), common, "node split");
        Ok(())
    }

    fn check_items(&self) -> Result<()> {
        if TrieHeader::read(&self.buf).items_count == MAX_ITEMS {
            return Err(Error::MaxItemsStored);
        }
        Ok(())
    }

    fn add_items(&mut self, n: u16) {
        let mut header = TrieHeader::read(&self.buf);
        header.items_count += n;
        header.write(&mut self.buf);
    }
}

/// New node header plus its single-entry children block.
fn split_size() -> usize {
    NODE_HEADER_SIZE + children_block_size(1)
}

/// What a write needs right after splitting: a value slot when the key ends
/// at the split point, otherwise a two-entry block and the new leaf.
fn after_split_size(rest_len: usize) -> usize {
    if rest_len == 0 {
        VALUE_SIZE
    } else {
        children_block_size(2) + new_node_size(rest_len)
    }
}
