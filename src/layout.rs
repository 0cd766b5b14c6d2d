//! On-buffer binary layout.
//!
//! Every structure lives inside one byte buffer and is addressed by a `u16`
//! offset from the start of that buffer. All integers are little endian, so a
//! buffer written on one host reads back identically on any other.
//!
//! ```text
//! trie header (offset 0):
//! [next_alloc:2][used_size:2][items_count:2][reserved:2]
//!
//! node header:
//! [key_offset:2][key_size:2][children_offset:2][value_offset:2]
//!
//! children block:
//! [count:1][child:2 * count]   children sorted by first fragment byte, descending
//!
//! value slot:
//! [value:8]                    i64
//! ```
//!
//! A `children_offset` or `value_offset` of 0 means "absent": offset 0 is the
//! trie header and can never hold a node's data.

/// Size of the trie header at offset 0.
pub const HEADER_SIZE: usize = 8;
/// Size of a node header.
pub const NODE_HEADER_SIZE: usize = 8;
/// Size of a value slot.
pub const VALUE_SIZE: usize = 8;
/// Size of one entry in a children block.
pub const CHILD_REF_SIZE: usize = 2;
/// The root node is always materialized directly after the trie header.
pub const ROOT_OFFSET: usize = HEADER_SIZE;
/// Longest key accepted by `write`.
pub const MAX_KEY_LEN: usize = u8::MAX as usize;
/// Children per node are bounded by the one-byte count.
pub const MAX_CHILDREN: usize = u8::MAX as usize;
/// Largest representable `items_count`.
pub const MAX_ITEMS: u16 = u16::MAX;
/// Allocations must stay addressable as a signed 16-bit offset.
pub const OFFSET_CEILING: usize = i16::MAX as usize;

/// Offset of a node header inside the buffer.
///
/// Only valid until the next structural mutation; `defrag` relocates every
/// node and invalidates all previously obtained refs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct NodeRef(u16);

impl NodeRef {
    pub(crate) const ROOT: NodeRef = NodeRef(ROOT_OFFSET as u16);

    #[inline]
    pub(crate) fn new(off: u16) -> Self {
        debug_assert!(off as usize >= HEADER_SIZE);
        Self(off)
    }

    #[inline]
    pub(crate) fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub(crate) fn offset(self) -> usize {
        self.0 as usize
    }
}

#[inline]
pub(crate) fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline]
pub(crate) fn write_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

#[inline]
pub(crate) fn read_i64(buf: &[u8], at: usize) -> i64 {
    let mut b = [0u8; VALUE_SIZE];
    b.copy_from_slice(&buf[at..at + VALUE_SIZE]);
    i64::from_le_bytes(b)
}

#[inline]
pub(crate) fn write_i64(buf: &mut [u8], at: usize, v: i64) {
    buf[at..at + VALUE_SIZE].copy_from_slice(&v.to_le_bytes());
}

/// Key bytes reserved by a freshly written node.
///
/// Rounds up to the next multiple of 8, and adds a whole unit when `len` is
/// already a multiple of 8 (`8 -> 16`, `0 -> 8`).
#[inline]
pub(crate) fn aligned_key_size(len: usize) -> usize {
    len + 8 - len % 8
}

/// Footprint of a node created by `write`: header, padded key, value slot.
#[inline]
pub(crate) fn new_node_size(key_len: usize) -> usize {
    NODE_HEADER_SIZE + aligned_key_size(key_len) + VALUE_SIZE
}

#[inline]
pub(crate) fn children_block_size(count: usize) -> usize {
    1 + CHILD_REF_SIZE * count
}

/// Decoded trie header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TrieHeader {
    pub(crate) next_alloc: u16,
    pub(crate) used_size: u16,
    pub(crate) items_count: u16,
}

impl TrieHeader {
    pub(crate) fn empty() -> Self {
        Self {
            next_alloc: HEADER_SIZE as u16,
            used_size: HEADER_SIZE as u16,
            items_count: 0,
        }
    }

    #[inline]
    pub(crate) fn read(buf: &[u8]) -> Self {
        Self {
            next_alloc: read_u16(buf, 0),
            used_size: read_u16(buf, 2),
            items_count: read_u16(buf, 4),
        }
    }

    #[inline]
    pub(crate) fn write(self, buf: &mut [u8]) {
        write_u16(buf, 0, self.next_alloc);
        write_u16(buf, 2, self.used_size);
        write_u16(buf, 4, self.items_count);
        write_u16(buf, 6, 0);
    }

    #[inline]
    pub(crate) fn wasted(self) -> usize {
        (self.next_alloc as usize).saturating_sub(self.used_size as usize)
    }
}

/// Decoded node header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NodeHeader {
    pub(crate) key_offset: u16,
    pub(crate) key_size: u16,
    pub(crate) children_offset: u16,
    pub(crate) value_offset: u16,
}

impl NodeHeader {
    #[inline]
    pub(crate) fn read(buf: &[u8], node: NodeRef) -> Self {
        let o = node.offset();
        Self {
            key_offset: read_u16(buf, o),
            key_size: read_u16(buf, o + 2),
            children_offset: read_u16(buf, o + 4),
            value_offset: read_u16(buf, o + 6),
        }
    }

    #[inline]
    pub(crate) fn write(self, buf: &mut [u8], node: NodeRef) {
        let o = node.offset();
        write_u16(buf, o, self.key_offset);
        write_u16(buf, o + 2, self.key_size);
        write_u16(buf, o + 4, self.children_offset);
        write_u16(buf, o + 6, self.value_offset);
    }

    #[inline]
    pub(crate) fn has_value(self) -> bool {
        self.value_offset != 0
    }

    #[inline]
    pub(crate) fn has_children(self) -> bool {
        self.children_offset != 0
    }

    #[inline]
    pub(crate) fn fragment(self, buf: &[u8]) -> &[u8] {
        let start = self.key_offset as usize;
        &buf[start..start + self.key_size as usize]
    }

    #[inline]
    pub(crate) fn value(self, buf: &[u8]) -> Option<i64> {
        self.has_value()
            .then(|| read_i64(buf, self.value_offset as usize))
    }
}

/// Writes a brand-new node at `node`: header, then the fragment, then the
/// value slot after the padded key area.
pub(crate) fn write_new_node(buf: &mut [u8], node: NodeRef, fragment: &[u8], value: i64) {
    let key_offset = node.offset() + NODE_HEADER_SIZE;
    let value_offset = key_offset + aligned_key_size(fragment.len());
    buf[key_offset..key_offset + fragment.len()].copy_from_slice(fragment);
    write_i64(buf, value_offset, value);
    NodeHeader {
        key_offset: key_offset as u16,
        key_size: fragment.len() as u16,
        children_offset: 0,
        value_offset: value_offset as u16,
    }
    .write(buf, node);
}

#[inline]
pub(crate) fn children_count(buf: &[u8], block: u16) -> usize {
    buf[block as usize] as usize
}

#[inline]
pub(crate) fn child_slot(block: u16, idx: usize) -> usize {
    block as usize + 1 + idx * CHILD_REF_SIZE
}

#[inline]
pub(crate) fn child_at(buf: &[u8], block: u16, idx: usize) -> u16 {
    read_u16(buf, child_slot(block, idx))
}

#[inline]
pub(crate) fn set_child_at(buf: &mut [u8], block: u16, idx: usize, child: NodeRef) {
    write_u16(buf, child_slot(block, idx), child.raw());
}

/// First byte of a child's fragment; children never carry empty fragments.
#[inline]
pub(crate) fn first_key_byte(buf: &[u8], node: NodeRef) -> u8 {
    let header = NodeHeader::read(buf, node);
    debug_assert!(header.key_size > 0, "child node with empty fragment");
    buf[header.key_offset as usize]
}
