//! Bundles together the three things every block-level operation needs: the mounted
//! superblock, the block cache, and the transport backing cache misses.
//!
//! Threading this context explicitly (instead of reaching for globals) is the
//! rewrite's answer to the source's process-wide `sb`/`disk_client` statics — see the
//! "Global mutable state" design note.

use crate::cache::BlockCache;
use crate::error::CacheError;
use crate::param::BSIZE;
use crate::superblock::Superblock;
use crate::transport::BlockTransport;

pub struct Disk<'a> {
    pub sb: &'a Superblock,
    pub cache: &'a mut BlockCache,
    pub transport: &'a mut dyn BlockTransport,
}

impl<'a> Disk<'a> {
    pub fn read_block(&mut self, b: u32) -> Result<[u8; BSIZE], CacheError> {
        self.cache.read(self.transport, b)
    }

    pub fn write_block(&mut self, b: u32, data: &[u8; BSIZE]) -> Result<(), CacheError> {
        self.cache.write(self.transport, b, data)
    }

    pub fn zero_block(&mut self, b: u32) -> Result<(), CacheError> {
        self.write_block(b, &[0u8; BSIZE])
    }
}
