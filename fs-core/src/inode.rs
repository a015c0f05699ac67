//! On-disk inode table and in-memory inode handles: `ialloc`, `iget`, `iput`,
//! `iupdate`, `bmap`, `readi`, `writei`.
//!
//! Grounded on `inode.c` for every operation's exact semantics, and on the teacher's
//! `fs/inode.rs`/`fs/superblock.rs` for the on-disk-struct-via-zerocopy idiom and the
//! `bmap`/direct-indirect-double-indirect naming. Unlike the teacher, handles here are
//! plain owned structs: no `Arena`, no `Rc`, no `Sleeplock` — every `iget` allocates a
//! fresh copy, per the "no caching of open inodes" design note.

use zerocopy::{AsBytes, FromBytes};

use crate::allocator;
use crate::diskctx::Disk;
use crate::error::{CacheError, FsError, FsResult};
use crate::param::{APB, BSIZE, NADDRS, NDIRECT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    Unused,
    Dir,
    File,
}

impl InodeType {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => InodeType::Dir,
            2 => InodeType::File,
            _ => InodeType::Unused,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            InodeType::Unused => 0,
            InodeType::Dir => 1,
            InodeType::File => 2,
        }
    }
}

/// On-disk inode record: 64 bytes, 8 per block. No `dirty` field: the source's
/// persisted dirty bit is meaningless on disk (always clear after write-back) and is
/// kept in-memory only on [`Inode`], per the design note. `typ`/`nlink` are packed as
/// `u8` (and `mode` as `u16`) specifically so the four-byte header plus the 48-byte
/// address array land on exactly 64 bytes with no compiler-inserted padding.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes)]
#[repr(C)]
pub struct Dinode {
    pub typ: u8,
    pub nlink: u8,
    pub mode: u16,
    pub uid: u32,
    pub size: u32,
    pub blocks: u32,
    pub addrs: [u32; NADDRS],
}

pub const IPB: usize = BSIZE / core::mem::size_of::<Dinode>();

static_assertions::const_assert_eq!(core::mem::size_of::<Dinode>(), 64);
static_assertions::const_assert_eq!(IPB, 8);

impl Dinode {
    const fn empty() -> Self {
        Self {
            typ: 0,
            nlink: 0,
            mode: 0,
            uid: 0,
            size: 0,
            blocks: 0,
            addrs: [0u32; NADDRS],
        }
    }
}

/// An in-memory inode handle: an independent, owned copy populated from disk by
/// `iget` and written back (if dirty) by `iput`. Never shared or cached.
#[derive(Debug, Clone)]
pub struct Inode {
    pub inum: u32,
    pub typ: InodeType,
    pub mode: u16,
    pub nlink: u16,
    pub uid: u32,
    pub size: u32,
    pub blocks: u32,
    pub addrs: [u32; NADDRS],
    pub dirty: bool,
}

impl Inode {
    fn from_dinode(inum: u32, d: &Dinode) -> Self {
        Self {
            inum,
            typ: InodeType::from_u8(d.typ),
            mode: d.mode,
            nlink: d.nlink as u16,
            uid: d.uid,
            size: d.size,
            blocks: d.blocks,
            addrs: d.addrs,
            dirty: false,
        }
    }

    fn to_dinode(&self) -> Dinode {
        Dinode {
            typ: self.typ.to_u8(),
            mode: self.mode,
            nlink: self.nlink as u8,
            uid: self.uid,
            size: self.size,
            blocks: self.blocks,
            addrs: self.addrs,
        }
    }

    fn dinode_offset_in_block(inum: u32) -> usize {
        let ipb = IPB as u32;
        ((inum % ipb) as usize) * core::mem::size_of::<Dinode>()
    }

    /// Allocates the lowest free inode, zeroes its on-disk slot, and returns a fresh
    /// handle with the defaults described in §4.E: nlink=1/mode=0644 for files,
    /// nlink=2/mode=0755 for directories.
    pub fn ialloc(disk: &mut Disk<'_>, typ: InodeType) -> FsResult<Inode> {
        let bitmap = disk.sb.inode_bitmap();
        let inum = bitmap
            .find_free(disk.cache, disk.transport)?
            .ok_or(FsError::NoSpace)?;
        bitmap.set(disk.cache, disk.transport, inum, true)?;

        let (nlink, mode) = match typ {
            InodeType::File => (1u16, 0o644u16),
            InodeType::Dir => (2u16, 0o755u16),
            InodeType::Unused => unreachable!("ialloc is never called with InodeType::Unused"),
        };
        let ip = Inode {
            inum,
            typ,
            mode,
            nlink,
            uid: 0,
            size: 0,
            blocks: 0,
            addrs: [0u32; NADDRS],
            dirty: true,
        };
        ip.iupdate(disk)?;
        Ok(ip)
    }

    /// Reads the containing block and returns a fresh handle populated from disk.
    /// Refuses inums outside the table or whose on-disk type is `UNUSED`.
    pub fn iget(disk: &mut Disk<'_>, inum: u32) -> FsResult<Inode> {
        if inum >= disk.sb.ninodes {
            return Err(FsError::NotFound);
        }
        let block_no = disk.sb.iblock(inum);
        let block = disk.read_block(block_no)?;
        let off = Self::dinode_offset_in_block(inum);
        let d = Dinode::read_from_prefix(&block[off..]).expect("dinode slice is well-formed");
        if d.typ == 0 {
            return Err(FsError::NotFound);
        }
        Ok(Inode::from_dinode(inum, &d))
    }

    /// Writes the handle back to its on-disk slot and clears the dirty flag.
    pub fn iupdate(&self, disk: &mut Disk<'_>) -> Result<(), CacheError> {
        let block_no = disk.sb.iblock(self.inum);
        let mut block = disk.read_block(block_no)?;
        let off = Self::dinode_offset_in_block(self.inum);
        self.to_dinode().write_to_prefix(&mut block[off..]);
        disk.write_block(block_no, &block)
    }

    /// If dirty, writes back. If the link count has reached zero, frees every
    /// reachable data block (including indirect-index blocks), clears the inode
    /// bitmap bit, and zeroes the on-disk slot. Consumes the handle.
    pub fn iput(mut self, disk: &mut Disk<'_>) -> Result<(), CacheError> {
        if self.nlink == 0 {
            self.free_inode_blocks(disk)?;
            let bitmap = disk.sb.inode_bitmap();
            bitmap.set(disk.cache, disk.transport, self.inum, false)?;
            let block_no = disk.sb.iblock(self.inum);
            let mut block = disk.read_block(block_no)?;
            let off = Self::dinode_offset_in_block(self.inum);
            Dinode::empty().write_to_prefix(&mut block[off..]);
            disk.write_block(block_no, &block)?;
        } else if self.dirty {
            self.dirty = false;
            self.iupdate(disk)?;
        }
        Ok(())
    }

    /// Frees every data block owned by this inode and resets size/blocks to zero,
    /// persisting the result, without touching the inode's own bitmap bit. Used by
    /// the directory engine's collect-truncate-reappend rewrite.
    pub fn truncate(&mut self, disk: &mut Disk<'_>) -> Result<(), CacheError> {
        self.free_inode_blocks(disk)?;
        self.iupdate(disk)
    }

    /// Frees every data block reachable from the address array: direct slots, then
    /// every block pointed to by the single-indirect slot plus the index block
    /// itself, then every block under the double-indirect slot plus both levels of
    /// index blocks.
    fn free_inode_blocks(&mut self, disk: &mut Disk<'_>) -> Result<(), CacheError> {
        for slot in self.addrs[..NDIRECT].iter_mut() {
            if *slot != 0 {
                allocator::free(disk, *slot)?;
                *slot = 0;
            }
        }
        if self.addrs[NDIRECT] != 0 {
            let indirect = self.addrs[NDIRECT];
            let block = disk.read_block(indirect)?;
            for entry in block_as_addrs(&block) {
                if entry != 0 {
                    allocator::free(disk, entry)?;
                }
            }
            allocator::free(disk, indirect)?;
            self.addrs[NDIRECT] = 0;
        }
        if self.addrs[NDIRECT + 1] != 0 {
            let dindirect = self.addrs[NDIRECT + 1];
            let level1 = disk.read_block(dindirect)?;
            for l1_entry in block_as_addrs(&level1) {
                if l1_entry != 0 {
                    let level2 = disk.read_block(l1_entry)?;
                    for l2_entry in block_as_addrs(&level2) {
                        if l2_entry != 0 {
                            allocator::free(disk, l2_entry)?;
                        }
                    }
                    allocator::free(disk, l1_entry)?;
                }
            }
            allocator::free(disk, dindirect)?;
            self.addrs[NDIRECT + 1] = 0;
        }
        self.blocks = 0;
        self.size = 0;
        self.dirty = true;
        Ok(())
    }

    /// Maps file-relative block index `bn` to an absolute data-block index,
    /// allocating along the path as needed. See §4.F for the three-tier selection.
    pub fn bmap(&mut self, disk: &mut Disk<'_>, bn: usize) -> FsResult<u32> {
        if bn < NDIRECT {
            if self.addrs[bn] == 0 {
                let b = allocator::allocate(disk)?.ok_or(FsError::NoSpace)?;
                self.addrs[bn] = b;
                self.blocks += 1;
                self.dirty = true;
            }
            return Ok(self.addrs[bn]);
        }
        let bn = bn - NDIRECT;
        if bn < APB {
            if self.addrs[NDIRECT] == 0 {
                let b = allocator::allocate(disk)?.ok_or(FsError::NoSpace)?;
                self.addrs[NDIRECT] = b;
                self.blocks += 1;
                self.dirty = true;
            }
            let indirect = self.addrs[NDIRECT];
            let mut block = disk.read_block(indirect)?;
            let mut addrs = block_as_addrs(&block);
            if addrs[bn] == 0 {
                let b = allocator::allocate(disk)?.ok_or(FsError::NoSpace)?;
                addrs[bn] = b;
                write_addrs(&mut block, &addrs);
                disk.write_block(indirect, &block)?;
                self.blocks += 1;
                self.dirty = true;
            }
            return Ok(addrs[bn]);
        }
        let bn = bn - APB;
        if bn < APB * APB {
            if self.addrs[NDIRECT + 1] == 0 {
                let b = allocator::allocate(disk)?.ok_or(FsError::NoSpace)?;
                self.addrs[NDIRECT + 1] = b;
                self.blocks += 1;
                self.dirty = true;
            }
            let dindirect = self.addrs[NDIRECT + 1];
            let mut level1 = disk.read_block(dindirect)?;
            let mut l1_addrs = block_as_addrs(&level1);
            let l1_idx = bn / APB;
            if l1_addrs[l1_idx] == 0 {
                let b = allocator::allocate(disk)?.ok_or(FsError::NoSpace)?;
                l1_addrs[l1_idx] = b;
                write_addrs(&mut level1, &l1_addrs);
                disk.write_block(dindirect, &level1)?;
                self.blocks += 1;
                self.dirty = true;
            }
            let indirect = l1_addrs[l1_idx];
            let mut level2 = disk.read_block(indirect)?;
            let mut l2_addrs = block_as_addrs(&level2);
            let l2_idx = bn % APB;
            if l2_addrs[l2_idx] == 0 {
                let b = allocator::allocate(disk)?.ok_or(FsError::NoSpace)?;
                l2_addrs[l2_idx] = b;
                write_addrs(&mut level2, &l2_addrs);
                disk.write_block(indirect, &level2)?;
                self.blocks += 1;
                self.dirty = true;
            }
            return Ok(l2_addrs[l2_idx]);
        }
        Err(FsError::InvalidRange)
    }

    /// Reads up to `n` bytes starting at `off`. Clamps at `size`; never allocates.
    pub fn readi(&mut self, disk: &mut Disk<'_>, off: usize, n: usize) -> FsResult<Vec<u8>> {
        let size = self.size as usize;
        if off > size {
            return Ok(Vec::new());
        }
        let n = n.min(size - off);
        let mut out = Vec::with_capacity(n);
        let mut cur = off;
        let end = off + n;
        while cur < end {
            let block_idx = cur / BSIZE;
            let block_off = cur % BSIZE;
            let to_copy = (BSIZE - block_off).min(end - cur);
            let phys = self.bmap(disk, block_idx)?;
            let block = disk.read_block(phys)?;
            out.extend_from_slice(&block[block_off..block_off + to_copy]);
            cur += to_copy;
        }
        Ok(out)
    }

    /// Writes `data` starting at `off`, extending the file and allocating blocks as
    /// needed up to `MAXFILE`. Updates `size` if the write extends past it. Always
    /// persists via `iupdate`. Returns a short count only on allocation failure.
    pub fn writei(&mut self, disk: &mut Disk<'_>, off: usize, data: &[u8]) -> FsResult<usize> {
        if off + data.len() > crate::param::MAXFILE {
            return Err(FsError::InvalidRange);
        }
        let mut cur = off;
        let end = off + data.len();
        let mut written = 0usize;
        while cur < end {
            let block_idx = cur / BSIZE;
            let block_off = cur % BSIZE;
            let to_copy = (BSIZE - block_off).min(end - cur);
            let phys = match self.bmap(disk, block_idx) {
                Ok(p) => p,
                Err(_) => break,
            };
            let mut block = disk.read_block(phys)?;
            block[block_off..block_off + to_copy]
                .copy_from_slice(&data[written..written + to_copy]);
            disk.write_block(phys, &block)?;
            cur += to_copy;
            written += to_copy;
        }
        if cur > self.size as usize {
            self.size = cur as u32;
        }
        self.dirty = true;
        self.iupdate(disk)?;
        Ok(written)
    }
}

fn block_as_addrs(block: &[u8; BSIZE]) -> [u32; APB] {
    let mut out = [0u32; APB];
    for (i, chunk) in block.chunks_exact(4).enumerate() {
        out[i] = u32::from_ne_bytes(chunk.try_into().unwrap());
    }
    out
}

fn write_addrs(block: &mut [u8; BSIZE], addrs: &[u32; APB]) {
    for (i, a) in addrs.iter().enumerate() {
        block[i * 4..i * 4 + 4].copy_from_slice(&a.to_ne_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BlockCache;
    use crate::superblock::Superblock;
    use crate::transport::test_support::MemTransport;

    fn fresh() -> (Superblock, BlockCache, MemTransport) {
        let sb = Superblock::compute(1024 * 63);
        let mut cache = BlockCache::new();
        let mut transport = MemTransport::new(1024, 63);
        sb.data_bitmap()
            .set_range(&mut cache, &mut transport, 0, sb.datastart, true)
            .unwrap();
        (sb, cache, transport)
    }

    #[test]
    fn ialloc_then_iget_roundtrip() {
        let (sb, mut cache, mut transport) = fresh();
        let mut disk = Disk {
            sb: &sb,
            cache: &mut cache,
            transport: &mut transport,
        };
        let ip = Inode::ialloc(&mut disk, InodeType::File).unwrap();
        assert_eq!(ip.nlink, 1);
        assert_eq!(ip.mode, 0o644);
        let back = Inode::iget(&mut disk, ip.inum).unwrap();
        assert_eq!(back.typ, InodeType::File);
        assert_eq!(back.nlink, 1);
    }

    #[test]
    fn write_then_read_small_file() {
        let (sb, mut cache, mut transport) = fresh();
        let mut disk = Disk {
            sb: &sb,
            cache: &mut cache,
            transport: &mut transport,
        };
        let mut ip = Inode::ialloc(&mut disk, InodeType::File).unwrap();
        ip.writei(&mut disk, 0, b"hello").unwrap();
        let back = ip.readi(&mut disk, 0, 5).unwrap();
        assert_eq!(back, b"hello");
        assert_eq!(ip.size, 5);
    }

    #[test]
    fn write_exactly_ndirect_blocks_allocates_no_indirect() {
        let (sb, mut cache, mut transport) = fresh();
        let mut disk = Disk {
            sb: &sb,
            cache: &mut cache,
            transport: &mut transport,
        };
        let mut ip = Inode::ialloc(&mut disk, InodeType::File).unwrap();
        let data = vec![7u8; NDIRECT * BSIZE];
        ip.writei(&mut disk, 0, &data).unwrap();
        assert_eq!(ip.blocks, NDIRECT as u32);
        assert_eq!(ip.addrs[NDIRECT], 0);
    }

    #[test]
    fn write_one_block_past_ndirect_allocates_indirect_index_and_data() {
        let (sb, mut cache, mut transport) = fresh();
        let mut disk = Disk {
            sb: &sb,
            cache: &mut cache,
            transport: &mut transport,
        };
        let mut ip = Inode::ialloc(&mut disk, InodeType::File).unwrap();
        let data = vec![7u8; (NDIRECT + 1) * BSIZE];
        ip.writei(&mut disk, 0, &data).unwrap();
        assert_eq!(ip.blocks, (NDIRECT + 2) as u32);
        assert_ne!(ip.addrs[NDIRECT], 0);
    }

    #[test]
    fn readi_clamps_past_end_of_file() {
        let (sb, mut cache, mut transport) = fresh();
        let mut disk = Disk {
            sb: &sb,
            cache: &mut cache,
            transport: &mut transport,
        };
        let mut ip = Inode::ialloc(&mut disk, InodeType::File).unwrap();
        ip.writei(&mut disk, 0, b"abc").unwrap();
        let r = ip.readi(&mut disk, 1, 100).unwrap();
        assert_eq!(r, b"bc");
        let r2 = ip.readi(&mut disk, 10, 5).unwrap();
        assert_eq!(r2.len(), 0);
    }

    #[test]
    fn iput_frees_blocks_when_nlink_zero() {
        let (sb, mut cache, mut transport) = fresh();
        let mut disk = Disk {
            sb: &sb,
            cache: &mut cache,
            transport: &mut transport,
        };
        let mut ip = Inode::ialloc(&mut disk, InodeType::File).unwrap();
        let inum = ip.inum;
        ip.writei(&mut disk, 0, b"data").unwrap();
        let block = ip.addrs[0];
        ip.nlink = 0;
        ip.dirty = true;
        ip.iput(&mut disk).unwrap();
        assert!(!sb
            .data_bitmap()
            .is_used(disk.cache, disk.transport, block)
            .unwrap());
        assert!(Inode::iget(&mut disk, inum).is_err());
    }
}
