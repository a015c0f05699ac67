//! Thin layer over the bitmap engine that yields and returns data-block indices,
//! zero-filling on allocation.
//!
//! Grounded on `block.c::allocate_block`/`free_block`.

use tracing::warn;

use crate::diskctx::Disk;
use crate::error::CacheError;

/// Allocates the lowest free data block, marks it used, zeroes it, and returns its
/// index. `None` when the data region is exhausted.
pub fn allocate(disk: &mut Disk<'_>) -> Result<Option<u32>, CacheError> {
    let bitmap = disk.sb.data_bitmap();
    let free = bitmap.find_free(disk.cache, disk.transport)?;
    let Some(b) = free else {
        return Ok(None);
    };
    bitmap.set(disk.cache, disk.transport, b, true)?;
    disk.zero_block(b)?;
    Ok(Some(b))
}

/// Frees data block `b`: refuses (with a warning, not an error) blocks outside the
/// data region or already marked free, otherwise clears the bitmap bit and zeroes it.
pub fn free(disk: &mut Disk<'_>, b: u32) -> Result<(), CacheError> {
    if b < disk.sb.datastart || b >= disk.sb.size {
        warn!(block = b, "refusing to free block outside data region");
        return Ok(());
    }
    let bitmap = disk.sb.data_bitmap();
    if !bitmap.is_used(disk.cache, disk.transport, b)? {
        warn!(block = b, "freeing already-free block");
        return Ok(());
    }
    bitmap.set(disk.cache, disk.transport, b, false)?;
    disk.zero_block(b)?;
    Ok(())
}
