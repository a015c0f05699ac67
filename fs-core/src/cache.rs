//! Write-back block cache sitting between the filesystem and the block transport.
//!
//! Grounded on `simple_cache.c`: a fixed array of slots, linear scan for hits, first
//! invalid slot or round-robin eviction on miss, write-back on eviction and on flush.

use tracing::{debug, warn};

use crate::error::CacheError;
use crate::param::{BSIZE, N_CACHE};
use crate::transport::BlockTransport;

struct Slot {
    blockno: u32,
    data: [u8; BSIZE],
    valid: bool,
    dirty: bool,
}

impl Slot {
    const fn empty() -> Self {
        Self {
            blockno: 0,
            data: [0u8; BSIZE],
            valid: false,
            dirty: false,
        }
    }
}

/// A fixed-capacity write-back cache of disk blocks.
pub struct BlockCache {
    slots: Vec<Slot>,
    next_slot: usize,
}

impl BlockCache {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(N_CACHE);
        slots.resize_with(N_CACHE, Slot::empty);
        Self {
            slots,
            next_slot: 0,
        }
    }

    fn find(&self, blockno: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.valid && s.blockno == blockno)
    }

    /// Picks a slot to receive a new block: the first invalid slot, else the
    /// round-robin cursor. Writes back the victim first if it is dirty.
    fn evict_slot(
        &mut self,
        transport: &mut dyn BlockTransport,
    ) -> Result<usize, CacheError> {
        if let Some(idx) = self.slots.iter().position(|s| !s.valid) {
            return Ok(idx);
        }
        let idx = self.next_slot;
        self.next_slot = (self.next_slot + 1) % self.slots.len();
        if self.slots[idx].dirty {
            let blockno = self.slots[idx].blockno;
            let data = self.slots[idx].data;
            debug!(blockno, "evicting dirty cache slot, writing back");
            transport.write_block(blockno, &data)?;
            self.slots[idx].dirty = false;
        }
        Ok(idx)
    }

    /// Reads one block, consulting the cache first.
    pub fn read(
        &mut self,
        transport: &mut dyn BlockTransport,
        blockno: u32,
    ) -> Result<[u8; BSIZE], CacheError> {
        if let Some(idx) = self.find(blockno) {
            return Ok(self.slots[idx].data);
        }
        let data = transport.read_block(blockno)?;
        let idx = self.evict_slot(transport)?;
        let slot = &mut self.slots[idx];
        slot.blockno = blockno;
        slot.data = data;
        slot.valid = true;
        slot.dirty = false;
        Ok(data)
    }

    /// Writes one whole block. The supplied payload is authoritative for the entire
    /// block; on a cache miss there is no need to read the old contents from
    /// transport first.
    pub fn write(
        &mut self,
        transport: &mut dyn BlockTransport,
        blockno: u32,
        data: &[u8; BSIZE],
    ) -> Result<(), CacheError> {
        if let Some(idx) = self.find(blockno) {
            self.slots[idx].data = *data;
            self.slots[idx].dirty = true;
            return Ok(());
        }
        let idx = self.evict_slot(transport)?;
        let slot = &mut self.slots[idx];
        slot.blockno = blockno;
        slot.data = *data;
        slot.valid = true;
        slot.dirty = true;
        Ok(())
    }

    /// Writes back every dirty valid slot and clears its dirty flag.
    pub fn flush(&mut self, transport: &mut dyn BlockTransport) -> Result<(), CacheError> {
        for slot in self.slots.iter_mut() {
            if slot.valid && slot.dirty {
                transport.write_block(slot.blockno, &slot.data)?;
                slot.dirty = false;
            }
        }
        Ok(())
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        if self.slots.iter().any(|s| s.valid && s.dirty) {
            warn!("block cache dropped with unflushed dirty slots");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_support::MemTransport;

    #[test]
    fn read_miss_then_hit() {
        let mut t = MemTransport::new(4, 4);
        let mut c = BlockCache::new();
        let a = c.read(&mut t, 3).unwrap();
        assert_eq!(a, [0u8; BSIZE]);
        let b = c.read(&mut t, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn write_then_read_without_flush() {
        let mut t = MemTransport::new(4, 4);
        let mut c = BlockCache::new();
        let mut payload = [0u8; BSIZE];
        payload[0] = 42;
        c.write(&mut t, 7, &payload).unwrap();
        let back = c.read(&mut t, 7).unwrap();
        assert_eq!(back[0], 42);
    }

    #[test]
    fn flush_persists_to_transport() {
        let mut t = MemTransport::new(4, 4);
        let mut c = BlockCache::new();
        let mut payload = [0u8; BSIZE];
        payload[1] = 9;
        c.write(&mut t, 5, &payload).unwrap();
        c.flush(&mut t).unwrap();
        let raw = t.read_block(5).unwrap();
        assert_eq!(raw[1], 9);
    }

    #[test]
    fn eviction_round_robin_writes_back_dirty_victim() {
        let mut t = MemTransport::new(4, 4);
        let mut c = BlockCache::new();
        for i in 0..(N_CACHE as u32) {
            let mut payload = [0u8; BSIZE];
            payload[0] = (i % 251) as u8;
            c.write(&mut t, i, &payload).unwrap();
        }
        // one more write forces an eviction of slot 0's original block (index 0)
        let mut payload = [0u8; BSIZE];
        payload[0] = 250;
        c.write(&mut t, N_CACHE as u32, &payload).unwrap();
        let evicted = t.read_block(0).unwrap();
        assert_eq!(evicted[0], 0);
    }
}
