//! Structural checks over the raw buffer.
//!
//! Diagnostic only: violations are reported, never repaired. All reads are
//! preceded by a bounds check so a corrupted buffer cannot make the walk panic.

use smallvec::{smallvec, SmallVec};
use tracing::error;

use crate::layout::{
    child_at, children_block_size, children_count, NodeHeader, NodeRef, TrieHeader, HEADER_SIZE,
    NODE_HEADER_SIZE, ROOT_OFFSET, VALUE_SIZE,
};
use crate::Trie;

/// A violated structural invariant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Corruption {
    #[error("buffer of {len} bytes is not a supported capacity")]
    BadCapacity { len: usize },
    #[error("next allocation {next_alloc} is inside the trie header")]
    AllocationInsideHeader { next_alloc: usize },
    #[error("used size {used} is greater than allocation {next_alloc}")]
    UsedExceedsAllocated { used: usize, next_alloc: usize },
    #[error("allocation {next_alloc} is past the buffer limit {limit}")]
    AllocationPastLimit { next_alloc: usize, limit: usize },
    #[error("node at {node}: {field} ends at {end}, after next allocation {next_alloc}")]
    NodeOutOfBounds {
        node: usize,
        field: &'static str,
        end: usize,
        next_alloc: usize,
    },
    #[error("node at {node} has a children block with zero entries")]
    EmptyChildrenBlock { node: usize },
    #[error("node at {node} has a child with an empty fragment")]
    EmptyChildFragment { node: usize },
    #[error("children of node at {node} are not in descending first byte order")]
    ChildrenOutOfOrder { node: usize },
    #[error("header counts {header} items but {reachable} reachable nodes hold a value")]
    ItemCountMismatch { header: usize, reachable: usize },
    #[error("more than {budget} nodes reachable from the root")]
    NodeBudgetExceeded { budget: usize },
}

impl Trie {
    /// Walks the whole structure and reports the first violated invariant.
    ///
    /// Also logs the violation at `error` level.
    pub fn validate(&self) -> Result<(), Corruption> {
        let result = check(&self.buf, self.limit);
        if let Err(ref err) = result {
            error!(%err, "trie validation failed");
        }
        result
    }
}

/// Every node header takes at least `NODE_HEADER_SIZE` bytes, so a walk that
/// visits more nodes than fit below `next_alloc` has looped.
fn node_budget(next_alloc: usize) -> usize {
    next_alloc / NODE_HEADER_SIZE + 1
}

pub(crate) fn check(buf: &[u8], limit: usize) -> Result<(), Corruption> {
    if buf.len() < HEADER_SIZE {
        return Err(Corruption::BadCapacity { len: buf.len() });
    }
    let header = TrieHeader::read(buf);
    let next_alloc = header.next_alloc as usize;
    let used = header.used_size as usize;

    if next_alloc < HEADER_SIZE {
        return Err(Corruption::AllocationInsideHeader { next_alloc });
    }
    if used > next_alloc {
        return Err(Corruption::UsedExceedsAllocated { used, next_alloc });
    }
    if next_alloc > limit || next_alloc > buf.len() {
        return Err(Corruption::AllocationPastLimit { next_alloc, limit });
    }
    if header.items_count == 0 {
        return Ok(());
    }

    let in_bounds = |node: NodeRef, field: &'static str, end: usize| {
        if end > next_alloc {
            Err(Corruption::NodeOutOfBounds {
                node: node.offset(),
                field,
                end,
                next_alloc,
            })
        } else {
            Ok(())
        }
    };

    let budget = node_budget(next_alloc);
    let mut visited = 0usize;
    let mut reachable = 0usize;
    let mut stack: SmallVec<[NodeRef; 32]> = smallvec![NodeRef::ROOT];

    while let Some(node) = stack.pop() {
        visited += 1;
        if visited > budget {
            return Err(Corruption::NodeBudgetExceeded { budget });
        }

        in_bounds(node, "header", node.offset() + NODE_HEADER_SIZE)?;
        let h = NodeHeader::read(buf, node);
        in_bounds(node, "key", h.key_offset as usize + h.key_size as usize)?;
        if h.has_value() {
            in_bounds(node, "value", h.value_offset as usize + VALUE_SIZE)?;
            reachable += 1;
        }
        if !h.has_children() {
            continue;
        }

        let block = h.children_offset;
        in_bounds(node, "children count", block as usize + 1)?;
        let count = children_count(buf, block);
        if count == 0 {
            return Err(Corruption::EmptyChildrenBlock {
                node: node.offset(),
            });
        }
        in_bounds(
            node,
            "children block",
            block as usize + children_block_size(count),
        )?;

        let mut previous: Option<u8> = None;
        for i in 0..count {
            let child = child_at(buf, block, i) as usize;
            // Zero is never written to a slot and would alias the trie header.
            if child < ROOT_OFFSET {
                return Err(Corruption::NodeOutOfBounds {
                    node: node.offset(),
                    field: "child",
                    end: child,
                    next_alloc,
                });
            }
            let child = NodeRef::new(child as u16);
            in_bounds(node, "child", child.offset() + NODE_HEADER_SIZE)?;
            let ch = NodeHeader::read(buf, child);
            if ch.key_size == 0 {
                return Err(Corruption::EmptyChildFragment {
                    node: node.offset(),
                });
            }
            in_bounds(child, "key", ch.key_offset as usize + ch.key_size as usize)?;
            let first = buf[ch.key_offset as usize];
            if previous.is_some_and(|p| p <= first) {
                return Err(Corruption::ChildrenOutOfOrder {
                    node: node.offset(),
                });
            }
            previous = Some(first);
            stack.push(child);
        }
    }

    if reachable != header.items_count as usize {
        return Err(Corruption::ItemCountMismatch {
            header: header.items_count as usize,
            reachable,
        });
    }
    Ok(())
}
