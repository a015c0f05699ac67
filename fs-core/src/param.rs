//! Sizing constants for the on-disk layout and in-memory bookkeeping structures.
//!
//! Mirrors the constant table in the original C headers (`fs.h`, `fs_internal.h`).

/// Block size in bytes. All transport and cache I/O moves whole blocks of this size.
pub const BSIZE: usize = 512;

/// Direct address slots in an inode.
pub const NDIRECT: usize = 10;

/// Addresses per block: how many `u32` block indices fit in one block.
pub const APB: usize = BSIZE / core::mem::size_of::<u32>();

/// Total address slots in a `Dinode`: direct + single-indirect + double-indirect.
pub const NADDRS: usize = NDIRECT + 2;

/// Maximum file size in blocks: direct + single-indirect + double-indirect data blocks.
pub const MAXFILEB: usize = NDIRECT + APB + APB * APB;

/// Maximum file size in bytes.
pub const MAXFILE: usize = MAXFILEB * BSIZE;

/// Bits per bitmap block.
pub const BPB: u32 = (BSIZE * 8) as u32;

/// Maximum length of a directory entry name, including the NUL terminator.
pub const MAXNAME: usize = 18;

/// Fixed size of the reserved log area. Reserved for parity with the source layout;
/// the core never writes to it.
pub const LOGS: u32 = 20;

/// Divisor used to size the inode table from the total block count (`ninodes = size / RATE`).
pub const RATE: u32 = 50;

/// Superblock magic number.
pub const FS_MAGIC: u32 = 0x1234_5678;

/// Block-cache capacity (number of cached 512-byte slots).
pub const N_CACHE: usize = 500;

/// Maximum number of user records in the user table.
pub const MAX_USERS: usize = 256;

/// Reserved inode number backing the user table file.
pub const USER_INFO_INODE: u32 = 1;

/// Root directory inode number.
pub const ROOT_INUM: u32 = 0;

/// The administrator's uid, seeded at format time.
pub const ADMIN_UID: u32 = 0;

static_assertions::const_assert_eq!(APB, 128);
static_assertions::const_assert_eq!(MAXFILEB, 16522);
