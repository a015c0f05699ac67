//! Generic bit-set over a fixed block range, used for both the data-block and the
//! inode allocation maps.
//!
//! Grounded on `bitmap.c`: `get_bitmap_position` (block/byte/bit decomposition),
//! `bitmap_find_free` (linear scan), `bitmap_set_system_blocks_used` (one-at-a-time,
//! simplicity over speed).

use crate::cache::BlockCache;
use crate::error::CacheError;
use crate::param::{BPB, BSIZE};
use crate::transport::BlockTransport;

/// A bitmap covering `max_items` items, stored starting at block `start_block` for
/// `num_blocks` blocks.
#[derive(Debug, Clone, Copy)]
pub struct BitmapRegion {
    pub start_block: u32,
    pub num_blocks: u32,
    pub max_items: u32,
}

struct Position {
    block: u32,
    byte: usize,
    bit: u8,
}

impl BitmapRegion {
    fn position(&self, item: u32) -> Position {
        let block_index = item / BPB;
        let byte_index = ((item % BPB) / 8) as usize;
        let bit_index = (item % 8) as u8;
        Position {
            block: self.start_block + block_index,
            byte: byte_index,
            bit: bit_index,
        }
    }

    /// Returns whether item `i` is marked used. Panics if `i >= max_items`: callers in
    /// this crate always check range before calling (mirrors the source's behavior of
    /// treating out-of-range bitmap queries as a programming error, not a recoverable
    /// one).
    pub fn is_used(
        &self,
        cache: &mut BlockCache,
        transport: &mut dyn BlockTransport,
        i: u32,
    ) -> Result<bool, CacheError> {
        assert!(i < self.max_items);
        let pos = self.position(i);
        let block = cache.read(transport, pos.block)?;
        Ok(block[pos.byte] & (1 << pos.bit) != 0)
    }

    pub fn set(
        &self,
        cache: &mut BlockCache,
        transport: &mut dyn BlockTransport,
        i: u32,
        used: bool,
    ) -> Result<(), CacheError> {
        assert!(i < self.max_items);
        let pos = self.position(i);
        let mut block = cache.read(transport, pos.block)?;
        if used {
            block[pos.byte] |= 1 << pos.bit;
        } else {
            block[pos.byte] &= !(1 << pos.bit);
        }
        cache.write(transport, pos.block, &block)
    }

    /// Lowest index with bit zero in `[0, max_items)`; `None` when the region is full.
    pub fn find_free(
        &self,
        cache: &mut BlockCache,
        transport: &mut dyn BlockTransport,
    ) -> Result<Option<u32>, CacheError> {
        for i in 0..self.max_items {
            if !self.is_used(cache, transport, i)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Zeroes every bitmap block in the region.
    pub fn clear_all(
        &self,
        cache: &mut BlockCache,
        transport: &mut dyn BlockTransport,
    ) -> Result<(), CacheError> {
        let zero = [0u8; BSIZE];
        for b in 0..self.num_blocks {
            cache.write(transport, self.start_block + b, &zero)?;
        }
        Ok(())
    }

    pub fn set_range(
        &self,
        cache: &mut BlockCache,
        transport: &mut dyn BlockTransport,
        start: u32,
        count: u32,
        used: bool,
    ) -> Result<(), CacheError> {
        for i in start..start + count {
            self.set(cache, transport, i, used)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_support::MemTransport;

    fn region() -> BitmapRegion {
        BitmapRegion {
            start_block: 1,
            num_blocks: 1,
            max_items: 100,
        }
    }

    #[test]
    fn set_and_query_roundtrip() {
        let mut t = MemTransport::new(64, 64);
        let mut c = BlockCache::new();
        let r = region();
        assert!(!r.is_used(&mut c, &mut t, 5).unwrap());
        r.set(&mut c, &mut t, 5, true).unwrap();
        assert!(r.is_used(&mut c, &mut t, 5).unwrap());
        r.set(&mut c, &mut t, 5, false).unwrap();
        assert!(!r.is_used(&mut c, &mut t, 5).unwrap());
    }

    #[test]
    fn find_free_returns_lowest() {
        let mut t = MemTransport::new(64, 64);
        let mut c = BlockCache::new();
        let r = region();
        r.set(&mut c, &mut t, 0, true).unwrap();
        r.set(&mut c, &mut t, 1, true).unwrap();
        assert_eq!(r.find_free(&mut c, &mut t).unwrap(), Some(2));
    }

    #[test]
    fn find_free_none_when_full() {
        let mut t = MemTransport::new(64, 64);
        let mut c = BlockCache::new();
        let r = BitmapRegion {
            start_block: 1,
            num_blocks: 1,
            max_items: 8,
        };
        r.set_range(&mut c, &mut t, 0, 8, true).unwrap();
        assert_eq!(r.find_free(&mut c, &mut t).unwrap(), None);
    }
}
