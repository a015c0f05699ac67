//! The on-disk superblock and the layout arithmetic derived from it.
//!
//! Grounded on `fs_format.c::init_sb` for the field layout and derivation formulas,
//! and on the teacher's `fs/superblock.rs` for the `AsBytes`/`FromBytes`-style
//! block-0 (de)serialization idiom (there via `unsafe ptr::read`, here via `zerocopy`).

use zerocopy::{AsBytes, FromBytes};

use crate::bitmap::BitmapRegion;
use crate::param::{BSIZE, FS_MAGIC, LOGS, RATE};

/// Disk layout:
/// `[ superblock | data bitmap | inode bitmap | inode table | log area | data blocks ]`
#[derive(Debug, Clone, Copy, AsBytes, FromBytes)]
#[repr(C)]
pub struct Superblock {
    pub magic: u32,
    pub size: u32,
    pub bmapstart: u32,
    pub bmapblocks: u32,
    pub inodebmapstart: u32,
    pub inodebmapblocks: u32,
    pub inodestart: u32,
    pub ninodes: u32,
    pub logstart: u32,
    pub nlog: u32,
    pub datastart: u32,
    pub ndatablocks: u32,
}

static_assertions::const_assert!(core::mem::size_of::<Superblock>() <= BSIZE);

impl Superblock {
    /// Computes a fresh superblock for a device of `size` blocks, following the
    /// layout derivation in `fs_format.c::init_sb`.
    pub fn compute(size: u32) -> Self {
        let bmapstart = 1;
        let bmapblocks = size / crate::param::BPB + 1;
        let inodebmapstart = bmapstart + bmapblocks;
        let ninodes = size / RATE;
        let inodebmapblocks = ninodes / crate::param::BPB + 1;
        let inodestart = inodebmapstart + inodebmapblocks;
        let dinode_size = core::mem::size_of::<crate::inode::Dinode>() as u32;
        let inodeblocks = (ninodes * dinode_size).div_ceil(BSIZE as u32);
        let logstart = inodestart + inodeblocks;
        let nlog = LOGS;
        let datastart = logstart + nlog;
        let ndatablocks = size - datastart;
        Self {
            magic: FS_MAGIC,
            size,
            bmapstart,
            bmapblocks,
            inodebmapstart,
            inodebmapblocks,
            inodestart,
            ninodes,
            logstart,
            nlog,
            datastart,
            ndatablocks,
        }
    }

    /// Deserializes the superblock from block 0's raw bytes.
    pub fn from_block(buf: &[u8; BSIZE]) -> Option<Self> {
        let sb = Superblock::read_from_prefix(&buf[..])?;
        if sb.magic != FS_MAGIC {
            return None;
        }
        Some(sb)
    }

    /// Serializes the superblock into a fresh zero-filled block-0 image.
    pub fn to_block(&self) -> [u8; BSIZE] {
        let mut buf = [0u8; BSIZE];
        self.write_to_prefix(&mut buf[..]);
        buf
    }

    /// Block containing inode `i`.
    pub fn iblock(&self, i: u32) -> u32 {
        let ipb = (BSIZE / core::mem::size_of::<crate::inode::Dinode>()) as u32;
        self.inodestart + i / ipb
    }

    pub fn data_bitmap(&self) -> BitmapRegion {
        BitmapRegion {
            start_block: self.bmapstart,
            num_blocks: self.bmapblocks,
            max_items: self.size,
        }
    }

    pub fn inode_bitmap(&self) -> BitmapRegion {
        BitmapRegion {
            start_block: self.inodebmapstart,
            num_blocks: self.inodebmapblocks,
            max_items: self.ninodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_invariant_datastart_matches_sum_of_regions() {
        let sb = Superblock::compute(1024 * 63);
        assert_eq!(sb.inodebmapstart, sb.bmapstart + sb.bmapblocks);
        assert_eq!(sb.inodestart, sb.inodebmapstart + sb.inodebmapblocks);
        assert!(sb.logstart >= sb.inodestart);
        assert_eq!(sb.datastart, sb.logstart + sb.nlog);
        assert_eq!(sb.size, sb.datastart + sb.ndatablocks);
    }

    #[test]
    fn roundtrip_through_block_bytes() {
        let sb = Superblock::compute(1024 * 63);
        let block = sb.to_block();
        let back = Superblock::from_block(&block).unwrap();
        assert_eq!(sb.size, back.size);
        assert_eq!(sb.datastart, back.datastart);
        assert_eq!(back.magic, FS_MAGIC);
    }

    #[test]
    fn rejects_bad_magic() {
        let block = [0u8; BSIZE];
        assert!(Superblock::from_block(&block).is_none());
    }
}
