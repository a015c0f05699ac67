//! The filesystem commands: the public surface consumed by the fs-server protocol
//! layer. Each command validates, permission-checks, then delegates to the lower
//! layers (inode store, addressing, byte I/O, directory engine, path resolver, user
//! engine).
//!
//! Grounded on `fs.c` (`cmd_f`, `cmd_mk`, `cmd_mkdir`, `cmd_rm`, `cmd_rmdir`,
//! `cmd_cd`, `cmd_ls`, `cmd_cat`, `cmd_w`, `cmd_i`, `cmd_d`, `cmd_login`,
//! `cmd_adduser`) for exact command semantics.

use tracing::instrument;

use crate::cache::BlockCache;
use crate::dir::{self, DirEntry};
use crate::diskctx::Disk;
use crate::error::{FsError, FsResult};
use crate::inode::{Inode, InodeType};
use crate::param::{ADMIN_UID, MAX_USERS, ROOT_INUM};
use crate::path;
use crate::session::Session;
use crate::superblock::Superblock;
use crate::transport::BlockTransport;
use crate::user::{self, Op};

/// `writei` may return a short count on allocation failure; every call site that
/// writes a single logical chunk must treat a short write as `NoSpace`, matching
/// `fs.c`'s `bytes_written != len` checks after every `writei` call.
fn writei_full(file: &mut Inode, disk: &mut Disk<'_>, off: usize, data: &[u8]) -> FsResult<()> {
    let written = file.writei(disk, off, data)?;
    if written != data.len() {
        return Err(FsError::NoSpace);
    }
    Ok(())
}

/// Owns the mounted superblock, the block cache, and the transport to the disk
/// server. Shared across all connections (per §5, commands run to completion
/// without yielding, so no locking is needed around this state).
pub struct Filesystem {
    sb: Option<Superblock>,
    cache: BlockCache,
    transport: Box<dyn BlockTransport + Send>,
}

impl Filesystem {
    pub fn new(transport: Box<dyn BlockTransport + Send>) -> Self {
        Self {
            sb: None,
            cache: BlockCache::new(),
            transport,
        }
    }

    /// Mounts an already-formatted device by reading and validating block 0.
    pub fn mount(&mut self) -> FsResult<()> {
        let block = self
            .cache
            .read(self.transport.as_mut(), 0)
            .map_err(FsError::from)?;
        self.sb = Superblock::from_block(&block);
        if self.sb.is_none() {
            return Err(FsError::NotFormatted);
        }
        Ok(())
    }

    pub fn is_formatted(&self) -> bool {
        self.sb.is_some()
    }

    fn disk(&mut self) -> FsResult<Disk<'_>> {
        let sb = self.sb.as_ref().ok_or(FsError::NotFormatted)?;
        Ok(Disk {
            sb,
            cache: &mut self.cache,
            transport: self.transport.as_mut(),
        })
    }

    pub fn flush(&mut self) -> FsResult<()> {
        self.cache.flush(self.transport.as_mut())?;
        Ok(())
    }

    /// `f(ncyl, nsec)`: admin-only format. Computes the superblock, clears both
    /// bitmaps, marks the system region used, allocates the root directory, zeroes
    /// the log area, and seeds the user table.
    #[instrument(skip(self))]
    pub fn format(&mut self, session: &Session, ncyl: u32, nsec: u32) -> FsResult<()> {
        if !session.is_admin() {
            return Err(FsError::PermissionDenied);
        }
        let size = ncyl * nsec;
        let sb = Superblock::compute(size);

        {
            let block = sb.to_block();
            self.cache
                .write(self.transport.as_mut(), 0, &block)
                .map_err(FsError::from)?;
        }
        self.sb = Some(sb);

        let mut disk = self.disk()?;
        disk.sb.data_bitmap().clear_all(disk.cache, disk.transport)?;
        disk.sb
            .inode_bitmap()
            .clear_all(disk.cache, disk.transport)?;
        disk.sb.data_bitmap().set_range(
            disk.cache,
            disk.transport,
            0,
            disk.sb.datastart,
            true,
        )?;
        let zero = [0u8; crate::param::BSIZE];
        for b in disk.sb.inodestart..disk.sb.logstart {
            disk.write_block(b, &zero)?;
        }
        for b in disk.sb.logstart..disk.sb.logstart + disk.sb.nlog {
            disk.write_block(b, &zero)?;
        }

        let mut root = Inode::ialloc(&mut disk, InodeType::Dir)?;
        assert_eq!(root.inum, ROOT_INUM);
        dir::add(
            &mut root,
            &mut disk,
            ".",
            ROOT_INUM,
            InodeType::Dir,
            0o755,
            ADMIN_UID,
            0,
        )?;
        dir::add(
            &mut root,
            &mut disk,
            "..",
            ROOT_INUM,
            InodeType::Dir,
            0o755,
            ADMIN_UID,
            0,
        )?;

        user::init_user_system(&mut disk)?;
        Ok(())
    }

    #[instrument(skip(self, session))]
    pub fn mk(&mut self, session: &Session, name: &str, mode: u16) -> FsResult<()> {
        let mut disk = self.disk()?;
        let mut parent = Inode::iget(&mut disk, session.current_dir)?;
        if !user::check(
            parent.mode,
            parent.uid,
            session.uid,
            session.is_admin(),
            Op::Write,
        ) {
            return Err(FsError::PermissionDenied);
        }
        if dir::find(&mut parent, &mut disk, name, None)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let mut ip = Inode::ialloc(&mut disk, InodeType::File)?;
        ip.mode = mode;
        ip.uid = session.uid;
        ip.dirty = true;
        ip.iupdate(&mut disk)?;
        dir::add(
            &mut parent,
            &mut disk,
            name,
            ip.inum,
            InodeType::File,
            mode,
            session.uid,
            0,
        )?;
        Ok(())
    }

    #[instrument(skip(self, session))]
    pub fn mkdir(&mut self, session: &Session, name: &str, mode: u16) -> FsResult<()> {
        let mut disk = self.disk()?;
        let mut parent = Inode::iget(&mut disk, session.current_dir)?;
        if !user::check(
            parent.mode,
            parent.uid,
            session.uid,
            session.is_admin(),
            Op::Write,
        ) {
            return Err(FsError::PermissionDenied);
        }
        if dir::find(&mut parent, &mut disk, name, None)?.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let mut ip = Inode::ialloc(&mut disk, InodeType::Dir)?;
        ip.mode = mode;
        ip.uid = session.uid;
        ip.dirty = true;
        dir::add(&mut ip, &mut disk, ".", ip.inum, InodeType::Dir, mode, session.uid, 0)?;
        dir::add(
            &mut ip,
            &mut disk,
            "..",
            parent.inum,
            InodeType::Dir,
            parent.mode,
            parent.uid,
            0,
        )?;
        ip.iupdate(&mut disk)?;
        dir::add(
            &mut parent,
            &mut disk,
            name,
            ip.inum,
            InodeType::Dir,
            mode,
            session.uid,
            0,
        )?;
        parent.nlink += 1;
        parent.dirty = true;
        parent.iupdate(&mut disk)?;
        Ok(())
    }

    #[instrument(skip(self, session))]
    pub fn rm(&mut self, session: &Session, name: &str) -> FsResult<()> {
        let mut disk = self.disk()?;
        let mut parent = Inode::iget(&mut disk, session.current_dir)?;
        let inum = dir::find(&mut parent, &mut disk, name, Some(InodeType::File))?
            .ok_or(FsError::NotFound)?;
        let mut file = Inode::iget(&mut disk, inum)?;
        if !user::check(
            file.mode,
            file.uid,
            session.uid,
            session.is_admin(),
            Op::Write,
        ) {
            return Err(FsError::PermissionDenied);
        }
        file.nlink -= 1;
        file.dirty = true;
        file.iput(&mut disk)?;
        dir::remove(&mut parent, &mut disk, name)?;
        Ok(())
    }

    #[instrument(skip(self, session))]
    pub fn rmdir(&mut self, session: &Session, name: &str) -> FsResult<()> {
        if name == "." || name == ".." {
            return Err(FsError::InvalidName);
        }
        let mut disk = self.disk()?;
        let mut parent = Inode::iget(&mut disk, session.current_dir)?;
        let inum = dir::find(&mut parent, &mut disk, name, Some(InodeType::Dir))?
            .ok_or(FsError::NotFound)?;
        let mut target = Inode::iget(&mut disk, inum)?;
        if !dir::is_empty(&mut target, &mut disk)? {
            return Err(FsError::DirectoryNotEmpty);
        }
        target.nlink = 0;
        target.dirty = true;
        target.iput(&mut disk)?;
        dir::remove(&mut parent, &mut disk, name)?;
        parent.nlink -= 1;
        parent.dirty = true;
        parent.iupdate(&mut disk)?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn cd(&mut self, session: &mut Session, target: &str) -> FsResult<()> {
        let mut disk = self.disk()?;
        let inum = path::resolve_cd(&mut disk, session.current_dir, target)?;
        session.current_dir = inum;
        path::update_current_path(&mut session.current_path, target);
        Ok(())
    }

    #[instrument(skip(self, session))]
    pub fn ls(&mut self, session: &Session) -> FsResult<Vec<DirEntry>> {
        let mut disk = self.disk()?;
        let mut dir_ip = Inode::iget(&mut disk, session.current_dir)?;
        let mut entries = dir::collect(&mut dir_ip, &mut disk)?;
        entries.retain(|e| e.name != "." && e.name != "..");
        for e in entries.iter_mut() {
            let fresh = Inode::iget(&mut disk, e.inum)?;
            e.size = fresh.size;
            e.mode = fresh.mode;
            e.uid = fresh.uid;
            e.typ = fresh.typ;
        }
        Ok(entries)
    }

    #[instrument(skip(self, session))]
    pub fn cat(&mut self, session: &Session, name: &str) -> FsResult<Vec<u8>> {
        let mut disk = self.disk()?;
        let mut dir_ip = Inode::iget(&mut disk, session.current_dir)?;
        let inum = dir::find(&mut dir_ip, &mut disk, name, Some(InodeType::File))?
            .ok_or(FsError::NotFound)?;
        let mut file = Inode::iget(&mut disk, inum)?;
        if !user::check(
            file.mode,
            file.uid,
            session.uid,
            session.is_admin(),
            Op::Read,
        ) {
            return Err(FsError::PermissionDenied);
        }
        file.readi(&mut disk, 0, file.size as usize)
    }

    /// `w(name, len, data)`: truncate to zero, write `len` bytes from offset 0. Does
    /// not free previously allocated blocks beyond the new content — they are simply
    /// overwritten in place by `writei`, matching the source.
    #[instrument(skip(self, session, data))]
    pub fn w(&mut self, session: &Session, name: &str, data: &[u8]) -> FsResult<()> {
        let mut disk = self.disk()?;
        let mut dir_ip = Inode::iget(&mut disk, session.current_dir)?;
        let inum = dir::find(&mut dir_ip, &mut disk, name, Some(InodeType::File))?
            .ok_or(FsError::NotFound)?;
        let mut file = Inode::iget(&mut disk, inum)?;
        if !user::check(
            file.mode,
            file.uid,
            session.uid,
            session.is_admin(),
            Op::Write,
        ) {
            return Err(FsError::PermissionDenied);
        }
        file.size = 0;
        file.dirty = true;
        writei_full(&mut file, &mut disk, 0, data)?;
        Ok(())
    }

    /// `i(name, pos, len, data)`: reads the original content, truncates, then
    /// rewrites `[0..pos) + data + [pos..original_size)`. Rejects `pos > size`.
    #[instrument(skip(self, session, data))]
    pub fn insert(&mut self, session: &Session, name: &str, pos: usize, data: &[u8]) -> FsResult<()> {
        let mut disk = self.disk()?;
        let mut dir_ip = Inode::iget(&mut disk, session.current_dir)?;
        let inum = dir::find(&mut dir_ip, &mut disk, name, Some(InodeType::File))?
            .ok_or(FsError::NotFound)?;
        let mut file = Inode::iget(&mut disk, inum)?;
        if !user::check(
            file.mode,
            file.uid,
            session.uid,
            session.is_admin(),
            Op::Write,
        ) {
            return Err(FsError::PermissionDenied);
        }
        let original_size = file.size as usize;
        if pos > original_size {
            return Err(FsError::InvalidRange);
        }
        let original = file.readi(&mut disk, 0, original_size)?;
        file.size = 0;
        file.dirty = true;
        writei_full(&mut file, &mut disk, 0, &original[..pos])?;
        writei_full(&mut file, &mut disk, pos, data)?;
        writei_full(&mut file, &mut disk, pos + data.len(), &original[pos..])?;
        Ok(())
    }

    /// `d(name, pos, len)`: reads the original content, truncates, then rewrites
    /// `[0..pos) + [pos+len..original_size)`. Clamps `len` to `size - pos`. Rejects
    /// `pos >= size`.
    #[instrument(skip(self, session))]
    pub fn delete(&mut self, session: &Session, name: &str, pos: usize, len: usize) -> FsResult<()> {
        let mut disk = self.disk()?;
        let mut dir_ip = Inode::iget(&mut disk, session.current_dir)?;
        let inum = dir::find(&mut dir_ip, &mut disk, name, Some(InodeType::File))?
            .ok_or(FsError::NotFound)?;
        let mut file = Inode::iget(&mut disk, inum)?;
        if !user::check(
            file.mode,
            file.uid,
            session.uid,
            session.is_admin(),
            Op::Write,
        ) {
            return Err(FsError::PermissionDenied);
        }
        let original_size = file.size as usize;
        if pos >= original_size {
            return Err(FsError::InvalidRange);
        }
        let actual_len = len.min(original_size - pos);
        let original = file.readi(&mut disk, 0, original_size)?;
        file.size = 0;
        file.dirty = true;
        writei_full(&mut file, &mut disk, 0, &original[..pos])?;
        writei_full(&mut file, &mut disk, pos, &original[pos + actual_len..])?;
        Ok(())
    }

    /// `login(uid)`: verifies the user exists, then drops the session into that
    /// user's home directory (root for the admin, `user_<uid>` for everyone else —
    /// the directory `adduser` created and chowned to them) rather than root, so a
    /// freshly logged-in user has a directory they actually hold write permission on.
    #[instrument(skip(self, session))]
    pub fn login(&mut self, session: &mut Session, uid: u32) -> FsResult<()> {
        if uid as usize >= MAX_USERS {
            return Err(FsError::InvalidUser);
        }
        let mut disk = self.disk()?;
        let info = user::get_user_info(&mut disk, uid)?.ok_or(FsError::InvalidUser)?;
        session.uid = uid;
        session.current_dir = info.home_dir_inum;
        session.current_path = if info.home_dir_inum == ROOT_INUM {
            "/".to_string()
        } else {
            format!("/{}", user::home_dir_name(uid))
        };
        Ok(())
    }

    #[instrument(skip(self, session))]
    pub fn adduser(&mut self, session: &Session, uid: u32) -> FsResult<()> {
        if !session.is_admin() {
            return Err(FsError::PermissionDenied);
        }
        let mut disk = self.disk()?;
        user::create_user(&mut disk, uid)
    }

    pub fn pwd(&self, session: &Session) -> String {
        session.current_path.clone()
    }
}
