//! Key matching, shared by read, write and remove. Never mutates the buffer.

use std::cmp::Ordering;

use crate::layout::{child_at, children_count, first_key_byte, NodeHeader, NodeRef};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Match {
    /// The key ends exactly at the end of `node`'s fragment.
    Exact { node: NodeRef },
    /// The walk stopped at `node`, whose fragment begins at `start` in the
    /// key. The first `common` bytes of the fragment matched.
    ///
    /// `common == fragment length` means the key continues past `node` with no
    /// matching child (append point); anything shorter is a split point.
    Partial {
        node: NodeRef,
        start: usize,
        common: usize,
    },
}

/// Walks from `node`, whose fragment is compared against `key[position..]`.
pub(crate) fn find(buf: &[u8], mut node: NodeRef, key: &[u8], mut position: usize) -> Match {
    loop {
        let header = NodeHeader::read(buf, node);
        let fragment = header.fragment(buf);
        let rest = &key[position..];

        if rest.is_empty() && fragment.is_empty() {
            return Match::Exact { node };
        }

        if fragment.len() > rest.len() || fragment != &rest[..fragment.len()] {
            return Match::Partial {
                node,
                start: position,
                common: common_prefix_len(fragment, rest),
            };
        }

        let start = position;
        position += fragment.len();
        if position == key.len() {
            return Match::Exact { node };
        }

        let next = header
            .has_children()
            .then(|| find_child(buf, header.children_offset, key[position]))
            .flatten();
        match next {
            Some(child) => node = child,
            None => {
                return Match::Partial {
                    node,
                    start,
                    common: fragment.len(),
                }
            }
        }
    }
}

/// Binary search over a children block sorted by first byte, descending.
pub(crate) fn find_child(buf: &[u8], block: u16, byte: u8) -> Option<NodeRef> {
    let (mut lo, mut hi) = (0, children_count(buf, block));
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let child = NodeRef::new(child_at(buf, block, mid));
        match first_key_byte(buf, child).cmp(&byte) {
            Ordering::Equal => return Some(child),
            Ordering::Greater => lo = mid + 1,
            Ordering::Less => hi = mid,
        }
    }
    None
}

#[inline]
fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
