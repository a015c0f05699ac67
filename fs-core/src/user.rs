//! User table and permission engine.
//!
//! Grounded on `user.c`: the user table lives in the file backed by the reserved
//! `USER_INFO_INODE`; every lookup re-reads the whole array and linear-scans it —
//! deliberately simple, no caching, matching the "small cost, simple invariant"
//! framing in the spec.

use zerocopy::{AsBytes, FromBytes};

use crate::dir;
use crate::diskctx::Disk;
use crate::error::{FsError, FsResult};
use crate::inode::{Inode, InodeType};
use crate::param::{ADMIN_UID, MAX_USERS, ROOT_INUM, USER_INFO_INODE};

#[derive(Debug, Clone, Copy, AsBytes, FromBytes)]
#[repr(C)]
pub struct UserRecord {
    pub uid: u32,
    pub active: u32,
    pub is_admin: u32,
    pub home_dir_inum: u32,
}

impl UserRecord {
    const EMPTY: UserRecord = UserRecord {
        uid: 0,
        active: 0,
        is_admin: 0,
        home_dir_inum: 0,
    };
}

const RECORD_SIZE: usize = core::mem::size_of::<UserRecord>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

fn read_table(disk: &mut Disk<'_>) -> FsResult<Vec<UserRecord>> {
    let mut ip = Inode::iget(disk, USER_INFO_INODE)?;
    let bytes = ip.readi(disk, 0, ip.size as usize)?;
    Ok(bytes
        .chunks_exact(RECORD_SIZE)
        .map(|c| UserRecord::read_from(c).expect("user record is well-formed"))
        .collect())
}

fn write_table(disk: &mut Disk<'_>, table: &[UserRecord]) -> FsResult<()> {
    let mut ip = Inode::iget(disk, USER_INFO_INODE)?;
    let mut bytes = Vec::with_capacity(table.len() * RECORD_SIZE);
    for r in table {
        bytes.extend_from_slice(r.as_bytes());
    }
    let written = ip.writei(disk, 0, &bytes)?;
    if written != bytes.len() {
        return Err(FsError::NoSpace);
    }
    Ok(())
}

/// Creates the reserved user-info inode (forced to `USER_INFO_INODE` by allocation
/// order, since it is the second inode ever allocated, right after the root
/// directory) and seeds it with `MAX_USERS` records, slot 0 active as the admin.
pub fn init_user_system(disk: &mut Disk<'_>) -> FsResult<()> {
    let mut ip = Inode::ialloc(disk, InodeType::File)?;
    assert_eq!(ip.inum, USER_INFO_INODE, "user-info inode must be the second allocated");
    ip.mode = 0o600;
    ip.uid = ADMIN_UID;
    ip.dirty = true;
    ip.iupdate(disk)?;

    let mut table = vec![UserRecord::EMPTY; MAX_USERS];
    table[0] = UserRecord {
        uid: ADMIN_UID,
        active: 1,
        is_admin: 1,
        home_dir_inum: ROOT_INUM,
    };
    write_table(disk, &table)
}

pub fn user_exists(disk: &mut Disk<'_>, uid: u32) -> FsResult<bool> {
    Ok(read_table(disk)?
        .iter()
        .any(|r| r.active != 0 && r.uid == uid))
}

pub fn is_admin_user(disk: &mut Disk<'_>, uid: u32) -> FsResult<bool> {
    Ok(read_table(disk)?
        .iter()
        .any(|r| r.active != 0 && r.uid == uid && r.is_admin != 0))
}

pub fn get_user_info(disk: &mut Disk<'_>, uid: u32) -> FsResult<Option<UserRecord>> {
    Ok(read_table(disk)?
        .into_iter()
        .find(|r| r.active != 0 && r.uid == uid))
}

/// Name of the home directory `adduser` creates for a non-admin uid, shared with
/// `login` so a freshly logged-in user lands in the same directory their account
/// owns rather than the admin-owned root.
pub fn home_dir_name(uid: u32) -> String {
    format!("user_{uid}")
}

/// Admin-only: validates the uid range and non-existence, creates `user_<uid>` under
/// root and re-chowns it, then appends a record to the first inactive slot.
pub fn create_user(disk: &mut Disk<'_>, uid: u32) -> FsResult<()> {
    if uid == 0 || uid as usize >= MAX_USERS {
        return Err(FsError::InvalidUser);
    }
    if user_exists(disk, uid)? {
        return Err(FsError::AlreadyExists);
    }

    let dirname = home_dir_name(uid);
    let mut root = Inode::iget(disk, ROOT_INUM)?;
    if dir::find(&mut root, disk, &dirname, None)?.is_some() {
        return Err(FsError::AlreadyExists);
    }
    let mut home = Inode::ialloc(disk, InodeType::Dir)?;
    home.uid = uid;
    home.dirty = true;
    dir::add(&mut home, disk, ".", home.inum, InodeType::Dir, 0o755, uid, 0)?;
    dir::add(&mut home, disk, "..", ROOT_INUM, InodeType::Dir, 0o755, uid, 0)?;
    home.iupdate(disk)?;
    dir::add(
        &mut root,
        disk,
        &dirname,
        home.inum,
        InodeType::Dir,
        0o755,
        uid,
        0,
    )?;
    root.nlink += 1;
    root.dirty = true;
    root.iupdate(disk)?;

    let mut table = read_table(disk)?;
    let slot = table
        .iter()
        .position(|r| r.active == 0)
        .ok_or(FsError::NoSpace)?;
    table[slot] = UserRecord {
        uid,
        active: 1,
        is_admin: 0,
        home_dir_inum: home.inum,
    };
    write_table(disk, &table)
}

/// `check(inum, uid, op)` per §4.K: admin bypasses, owner tests owner bits, everyone
/// else tests world bits. Group bits exist in the mode but are never consulted.
pub fn check(mode: u16, owner_uid: u32, requester_uid: u32, is_admin: bool, op: Op) -> bool {
    if is_admin {
        return true;
    }
    let (owner_bit, world_bit) = match op {
        Op::Read => (0o400, 0o004),
        Op::Write => (0o200, 0o002),
    };
    if requester_uid == owner_uid {
        mode & owner_bit != 0
    } else {
        mode & world_bit != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_bypasses_all_checks() {
        assert!(check(0o000, 5, 9, true, Op::Read));
        assert!(check(0o000, 5, 9, true, Op::Write));
    }

    #[test]
    fn owner_bits_gate_owner() {
        assert!(check(0o600, 5, 5, false, Op::Read));
        assert!(check(0o600, 5, 5, false, Op::Write));
        assert!(!check(0o000, 5, 5, false, Op::Read));
    }

    #[test]
    fn world_bits_gate_non_owner() {
        assert!(check(0o644, 5, 9, false, Op::Read));
        assert!(!check(0o644, 5, 9, false, Op::Write));
    }
}
