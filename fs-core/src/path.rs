//! Path resolution: absolute paths and single-component relatives only.
//!
//! Grounded on `fs_utils.c::resolve_absolute_path` and `fs.c::cmd_cd`. Per the
//! "path-resolution gaps" design note, forms the source silently mishandles — `a/b`,
//! an embedded `.`, or a trailing `/` on a non-root path — are rejected explicitly
//! with [`PathError::Unsupported`] here instead.

use crate::diskctx::Disk;
use crate::dir;
use crate::error::{FsError, FsResult, PathError};
use crate::inode::{Inode, InodeType};
use crate::param::{MAXNAME, ROOT_INUM};

fn validate_component(c: &str) -> Result<(), PathError> {
    if c.is_empty() || c == "." {
        return Err(PathError::Unsupported);
    }
    if c.len() >= MAXNAME {
        return Err(PathError::NameTooLong);
    }
    Ok(())
}

/// Resolves an absolute, `/`-separated path starting at the root inode. A bare `/`
/// resolves to the root. Every component must name a directory except possibly the
/// last, which may be of any type (directories and files alike are addressable by
/// absolute path for `cd`'s sibling commands, though `cd` itself rejects non-dir
/// targets at the call site).
pub fn resolve_absolute(disk: &mut Disk<'_>, path: &str) -> FsResult<u32> {
    debug_assert!(path.starts_with('/'));
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(ROOT_INUM);
    }
    if path.ends_with('/') {
        return Err(PathError::Unsupported.into());
    }
    let mut cur = ROOT_INUM;
    let components: Vec<&str> = trimmed.split('/').collect();
    for c in components {
        validate_component(c).map_err(FsError::from)?;
        let mut dir_ip = Inode::iget(disk, cur)?;
        if dir_ip.typ != InodeType::Dir {
            return Err(PathError::NotADirectory.into());
        }
        let found = dir::find(&mut dir_ip, disk, c, Some(InodeType::Dir))?;
        match found {
            Some(inum) => cur = inum,
            None => return Err(PathError::NotFound.into()),
        }
    }
    Ok(cur)
}

/// Resolves a `cd` target: `/`, an absolute path, `..`, or a single relative
/// component. Anything else (embedded `/` in a relative path, `.`) is rejected.
pub fn resolve_cd(disk: &mut Disk<'_>, current: u32, path: &str) -> FsResult<u32> {
    if path == "/" {
        return Ok(ROOT_INUM);
    }
    if path.starts_with('/') {
        return resolve_absolute(disk, path);
    }
    if path.contains('/') {
        return Err(PathError::Unsupported.into());
    }
    let mut dir_ip = Inode::iget(disk, current)?;
    if dir_ip.typ != InodeType::Dir {
        return Err(PathError::NotADirectory.into());
    }
    if path == ".." {
        return dir::find(&mut dir_ip, disk, "..", Some(InodeType::Dir))?
            .ok_or_else(|| PathError::NotFound.into());
    }
    validate_component(path).map_err(FsError::from)?;
    dir::find(&mut dir_ip, disk, path, Some(InodeType::Dir))?
        .ok_or_else(|| PathError::NotFound.into())
}

/// Updates the advisory current-path string after a successful `cd`. Absolute paths
/// replace it outright; `..` pops the last segment (never past `/`); anything else is
/// appended with a `/` separator.
pub fn update_current_path(current_path: &mut String, target: &str) {
    if target.starts_with('/') {
        *current_path = target.to_string();
        return;
    }
    if target == ".." {
        if current_path == "/" {
            return;
        }
        if let Some(pos) = current_path.rfind('/') {
            if pos == 0 {
                current_path.truncate(1);
            } else {
                current_path.truncate(pos);
            }
        }
        return;
    }
    if current_path == "/" {
        current_path.push_str(target);
    } else {
        current_path.push('/');
        current_path.push_str(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BlockCache;
    use crate::dir;
    use crate::superblock::Superblock;
    use crate::transport::test_support::MemTransport;

    fn mounted() -> (Superblock, BlockCache, MemTransport) {
        let sb = Superblock::compute(1024 * 63);
        let mut cache = BlockCache::new();
        let mut transport = MemTransport::new(1024, 63);
        sb.data_bitmap()
            .set_range(&mut cache, &mut transport, 0, sb.datastart, true)
            .unwrap();
        (sb, cache, transport)
    }

    fn mkroot(disk: &mut Disk<'_>) {
        let mut root = Inode::ialloc(disk, InodeType::Dir).unwrap();
        assert_eq!(root.inum, ROOT_INUM);
        dir::add(&mut root, disk, ".", ROOT_INUM, InodeType::Dir, 0o755, 0, 0).unwrap();
        dir::add(&mut root, disk, "..", ROOT_INUM, InodeType::Dir, 0o755, 0, 0).unwrap();
    }

    #[test]
    fn bare_slash_resolves_to_root() {
        let (sb, mut cache, mut transport) = mounted();
        let mut disk = Disk { sb: &sb, cache: &mut cache, transport: &mut transport };
        mkroot(&mut disk);
        assert_eq!(resolve_absolute(&mut disk, "/").unwrap(), ROOT_INUM);
    }

    #[test]
    fn absolute_child_then_cd_dotdot_returns_to_root() {
        let (sb, mut cache, mut transport) = mounted();
        let mut disk = Disk { sb: &sb, cache: &mut cache, transport: &mut transport };
        mkroot(&mut disk);
        let mut root = Inode::iget(&mut disk, ROOT_INUM).unwrap();
        let mut child = Inode::ialloc(&mut disk, InodeType::Dir).unwrap();
        dir::add(&mut child, &mut disk, ".", child.inum, InodeType::Dir, 0o755, 0, 0).unwrap();
        dir::add(&mut child, &mut disk, "..", ROOT_INUM, InodeType::Dir, 0o755, 0, 0).unwrap();
        dir::add(&mut root, &mut disk, "docs", child.inum, InodeType::Dir, 0o755, 0, 0).unwrap();

        let resolved = resolve_absolute(&mut disk, "/docs").unwrap();
        assert_eq!(resolved, child.inum);
        let back = resolve_cd(&mut disk, resolved, "..").unwrap();
        assert_eq!(back, ROOT_INUM);
    }

    #[test]
    fn rejects_multi_segment_relative_and_embedded_dot() {
        let (sb, mut cache, mut transport) = mounted();
        let mut disk = Disk { sb: &sb, cache: &mut cache, transport: &mut transport };
        mkroot(&mut disk);
        assert!(resolve_cd(&mut disk, ROOT_INUM, "a/b").is_err());
        assert!(resolve_cd(&mut disk, ROOT_INUM, ".").is_err());
    }
}
