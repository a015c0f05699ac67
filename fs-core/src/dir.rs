//! Directory engine: a directory's bytes are a flat sequence of fixed-size `Entry`
//! records, scanned and rewritten through the ordinary `readi`/`writei` machinery.
//!
//! Grounded on `fs_directory.c` (`find_entry_in_directory`, `collect_directory_entries`,
//! `add_entry_to_directory`, `remove_entry_from_directory`, `is_directory_empty`) and
//! `fs_utils.c` (`search_directory_block` and friends, folded here into the uniform
//! byte-range scan since `readi` already walks direct/indirect/double-indirect blocks).

use zerocopy::{AsBytes, FromBytes};

use crate::diskctx::Disk;
use crate::error::{FsError, FsResult};
use crate::inode::{Inode, InodeType};
use crate::param::MAXNAME;

/// One directory record: 32 bytes, 16 per block. 0 in `inum` marks an unused slot
/// (never produced by this implementation, which always appends; kept for
/// on-disk-format parity with the source, which could in principle punch holes).
/// `typ`/`uid` are packed as `u8` — `uid` always fits since every entry's owner is a
/// valid table uid (`< MAX_USERS = 256`) — so the record lands on exactly 32 bytes
/// with `mode` still a full `u16` and `name` at its required `MAXNAME` width.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes)]
#[repr(C)]
pub struct RawEntry {
    pub inum: u32,
    pub size: u32,
    pub mode: u16,
    pub typ: u8,
    pub uid: u8,
    pub name: [u8; MAXNAME],
}

pub const ENTRY_SIZE: usize = core::mem::size_of::<RawEntry>();

static_assertions::const_assert_eq!(ENTRY_SIZE, 32);

/// A directory entry as consumed by callers (`ls`, name lookup).
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub inum: u32,
    pub size: u32,
    pub typ: InodeType,
    pub mode: u16,
    pub uid: u32,
    pub name: String,
}

impl RawEntry {
    fn new(name: &str, inum: u32, typ: InodeType, mode: u16, uid: u32, size: u32) -> FsResult<Self> {
        if name.len() >= MAXNAME || !name.is_ascii() {
            return Err(FsError::InvalidName);
        }
        let mut buf = [0u8; MAXNAME];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        let uid: u8 = uid
            .try_into()
            .expect("directory entry uid must fit a valid user table slot");
        Ok(Self {
            inum,
            size,
            mode,
            typ: match typ {
                InodeType::Unused => 0,
                InodeType::Dir => 1,
                InodeType::File => 2,
            },
            uid,
            name: buf,
        })
    }

    fn name_str(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(MAXNAME);
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    fn to_dir_entry(&self) -> DirEntry {
        DirEntry {
            inum: self.inum,
            size: self.size,
            typ: match self.typ {
                1 => InodeType::Dir,
                2 => InodeType::File,
                _ => InodeType::Unused,
            },
            mode: self.mode,
            uid: self.uid as u32,
            name: self.name_str().to_string(),
        }
    }
}

fn read_entries(dir: &mut Inode, disk: &mut Disk<'_>) -> FsResult<Vec<RawEntry>> {
    let bytes = dir.readi(disk, 0, dir.size as usize)?;
    Ok(bytes
        .chunks_exact(ENTRY_SIZE)
        .map(|c| RawEntry::read_from(c).expect("directory record is well-formed"))
        .collect())
}

/// Scans every record, returning the first whose name matches and whose type matches
/// (`want_type = None` matches any type). Returns `None` if no record matches.
pub fn find(
    dir: &mut Inode,
    disk: &mut Disk<'_>,
    name: &str,
    want_type: Option<InodeType>,
) -> FsResult<Option<u32>> {
    for e in read_entries(dir, disk)? {
        if e.inum == 0 {
            continue;
        }
        if e.name_str() == name {
            let matches_type = match want_type {
                None => true,
                Some(t) => e.to_dir_entry().typ == t,
            };
            if matches_type {
                return Ok(Some(e.inum));
            }
        }
    }
    Ok(None)
}

/// Collects every non-empty record in the directory.
pub fn collect(dir: &mut Inode, disk: &mut Disk<'_>) -> FsResult<Vec<DirEntry>> {
    Ok(read_entries(dir, disk)?
        .into_iter()
        .filter(|e| e.inum != 0)
        .map(|e| e.to_dir_entry())
        .collect())
}

/// Appends one record at the current end of the directory (`writei` extends as
/// needed). `dir.size` advances by `ENTRY_SIZE`.
#[allow(clippy::too_many_arguments)]
pub fn add(
    dir: &mut Inode,
    disk: &mut Disk<'_>,
    name: &str,
    inum: u32,
    typ: InodeType,
    mode: u16,
    uid: u32,
    size: u32,
) -> FsResult<()> {
    let raw = RawEntry::new(name, inum, typ, mode, uid, size)?;
    let off = dir.size as usize;
    let written = dir.writei(disk, off, raw.as_bytes())?;
    if written != ENTRY_SIZE {
        return Err(FsError::NoSpace);
    }
    Ok(())
}

/// Collects all records, drops the one matching `name`, truncates the directory to
/// zero and re-appends every remaining record in order. O(n) in the entry count;
/// simpler than in-place slot reuse, per the design note.
pub fn remove(dir: &mut Inode, disk: &mut Disk<'_>, name: &str) -> FsResult<()> {
    let mut entries = read_entries(dir, disk)?;
    let pos = entries
        .iter()
        .position(|e| e.inum != 0 && e.name_str() == name)
        .ok_or(FsError::NotFound)?;
    entries.remove(pos);

    dir.truncate(disk)?;
    for e in &entries {
        let off = dir.size as usize;
        let written = dir.writei(disk, off, e.as_bytes())?;
        if written != ENTRY_SIZE {
            return Err(FsError::NoSpace);
        }
    }
    Ok(())
}

/// True iff every record is `.` or `..`.
pub fn is_empty(dir: &mut Inode, disk: &mut Disk<'_>) -> FsResult<bool> {
    Ok(collect(dir, disk)?
        .iter()
        .all(|e| e.name == "." || e.name == ".."))
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
    fn add_find_collect_remove_roundtrip() {
        let (sb, mut cache, mut transport) = fresh();
        let mut disk = Disk {
            sb: &sb,
            cache: &mut cache,
            transport: &mut transport,
        };
        let mut dir = Inode::ialloc(&mut disk, InodeType::Dir).unwrap();
        add(&mut dir, &mut disk, ".", dir.inum, InodeType::Dir, 0o755, 0, 0).unwrap();
        add(&mut dir, &mut disk, "..", dir.inum, InodeType::Dir, 0o755, 0, 0).unwrap();

        let file = Inode::ialloc(&mut disk, InodeType::File).unwrap();
        add(
            &mut dir,
            &mut disk,
            "readme",
            file.inum,
            InodeType::File,
            0o644,
            0,
            0,
        )
        .unwrap();

        assert_eq!(
            find(&mut dir, &mut disk, "readme", None).unwrap(),
            Some(file.inum)
        );
        assert!(!is_empty(&mut dir, &mut disk).unwrap());

        let entries = collect(&mut dir, &mut disk).unwrap();
        assert_eq!(entries.len(), 3);

        remove(&mut dir, &mut disk, "readme").unwrap();
        assert_eq!(find(&mut dir, &mut disk, "readme", None).unwrap(), None);
        assert!(is_empty(&mut dir, &mut disk).unwrap());
    }

    #[test]
    fn find_respects_type_filter() {
        let (sb, mut cache, mut transport) = fresh();
        let mut disk = Disk {
            sb: &sb,
            cache: &mut cache,
            transport: &mut transport,
        };
        let mut dir = Inode::ialloc(&mut disk, InodeType::Dir).unwrap();
        let file = Inode::ialloc(&mut disk, InodeType::File).unwrap();
        add(&mut dir, &mut disk, "x", file.inum, InodeType::File, 0o644, 0, 0).unwrap();
        assert_eq!(
            find(&mut dir, &mut disk, "x", Some(InodeType::Dir))
                .unwrap(),
            None
        );
        assert_eq!(
            find(&mut dir, &mut disk, "x", Some(InodeType::File))
                .unwrap(),
            Some(file.inum)
        );
    }

    #[test]
    fn add_fails_with_no_space_instead_of_writing_a_truncated_entry() {
        let (sb, mut cache, mut transport) = fresh();
        let mut disk = Disk {
            sb: &sb,
            cache: &mut cache,
            transport: &mut transport,
        };
        let mut dir = Inode::ialloc(&mut disk, InodeType::Dir).unwrap();
        sb.data_bitmap()
            .set_range(disk.cache, disk.transport, 0, sb.size, true)
            .unwrap();
        let err = add(&mut dir, &mut disk, "x", 1, InodeType::File, 0o644, 0, 0).unwrap_err();
        assert!(matches!(err, FsError::NoSpace));
    }
}
