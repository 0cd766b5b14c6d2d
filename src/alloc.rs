//! Bump allocation inside the trie buffer.
//!
//! There is no free list. Space given back by splits, tombstones and
//! regrown children blocks only lowers `used_size`; `next_alloc` moves
//! backwards solely through compaction.

use crate::error::{Error, Result};
use crate::layout::TrieHeader;

/// Two-tier space check against `limit`.
///
/// `NotEnoughSpace` when even a perfect compaction would not make room,
/// `DefragRequired` when the live bytes fit but the free tail does not.
#[inline]
pub(crate) fn reserve(header: TrieHeader, size: usize, limit: usize) -> Result<()> {
    if header.used_size as usize + size > limit {
        return Err(Error::NotEnoughSpace { required: size });
    }
    if header.next_alloc as usize + size > limit {
        return Err(Error::DefragRequired { required: size });
    }
    Ok(())
}

/// Allocates `size` bytes at the bump pointer and returns their offset.
///
/// The header is only touched once the checks pass.
pub(crate) fn allocate(buf: &mut [u8], limit: usize, size: usize) -> Result<u16> {
    let mut header = TrieHeader::read(buf);
    reserve(header, size, limit)?;
    let at = header.next_alloc;
    header.next_alloc += size as u16;
    header.used_size += size as u16;
    header.write(buf);
    Ok(at)
}

/// Marks `size` already-allocated bytes as waste.
#[inline]
pub(crate) fn reclaim(buf: &mut [u8], size: usize) {
    let mut header = TrieHeader::read(buf);
    debug_assert!(header.used_size as usize >= size);
    header.used_size -= size as u16;
    header.write(buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::HEADER_SIZE;

    fn fresh(capacity: usize) -> Vec<u8> {
        let mut buf = vec![0u8; capacity];
        TrieHeader::empty().write(&mut buf);
        buf
    }

    #[test]
    fn test_allocate_bumps_pointer() {
        let mut buf = fresh(128);
        assert_eq!(allocate(&mut buf, 128, 24), Ok(HEADER_SIZE as u16));
        assert_eq!(allocate(&mut buf, 128, 8), Ok(HEADER_SIZE as u16 + 24));
        let h = TrieHeader::read(&buf);
        assert_eq!(h.next_alloc as usize, HEADER_SIZE + 32);
        assert_eq!(h.used_size, h.next_alloc);
    }

    #[test]
    fn test_exact_fit_is_allowed() {
        let mut buf = fresh(64);
        assert!(allocate(&mut buf, 64, 64 - HEADER_SIZE).is_ok());
        assert_eq!(
            allocate(&mut buf, 64, 1),
            Err(Error::NotEnoughSpace { required: 1 })
        );
    }

    #[test]
    fn test_fragmentation_requires_defrag() {
        let mut buf = fresh(64);
        allocate(&mut buf, 64, 40).unwrap();
        reclaim(&mut buf, 32);
        let before = TrieHeader::read(&buf);
        assert_eq!(
            allocate(&mut buf, 64, 24),
            Err(Error::DefragRequired { required: 24 })
        );
        // A failed allocation leaves the header alone.
        assert_eq!(TrieHeader::read(&buf), before);
        assert_eq!(before.wasted(), 32);
    }
}
