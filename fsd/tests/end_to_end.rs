//! End-to-end protocol scenarios driven directly against the command layer, in
//! process, with no real sockets — the scenarios are the literal ones from
//! `SPEC_FULL.md` §8.

use std::collections::HashMap;

use fs_core::error::TransportError;
use fs_core::inode::InodeType;
use fs_core::param::BSIZE;
use fs_core::transport::{BlockTransport, DiskGeometry};
use fs_core::{Filesystem, Session};

struct MemTransport {
    geometry: DiskGeometry,
    blocks: HashMap<u32, [u8; BSIZE]>,
}

impl MemTransport {
    fn new(ncyl: u32, nsec: u32) -> Self {
        Self {
            geometry: DiskGeometry { ncyl, nsec },
            blocks: HashMap::new(),
        }
    }
}

impl BlockTransport for MemTransport {
    fn info(&mut self) -> Result<DiskGeometry, TransportError> {
        Ok(self.geometry)
    }

    fn read_block(&mut self, b: u32) -> Result<[u8; BSIZE], TransportError> {
        Ok(self.blocks.get(&b).copied().unwrap_or([0u8; BSIZE]))
    }

    fn write_block(&mut self, b: u32, data: &[u8; BSIZE]) -> Result<(), TransportError> {
        self.blocks.insert(b, *data);
        Ok(())
    }
}

fn formatted_fs(ncyl: u32, nsec: u32) -> (Filesystem, Session) {
    let mut fs = Filesystem::new(Box::new(MemTransport::new(ncyl, nsec)));
    let admin = Session::new();
    fs.format(&admin, ncyl, nsec).expect("format");
    (fs, admin)
}

#[test]
fn format_then_ls_is_empty() {
    let (mut fs, session) = formatted_fs(1024, 63);
    let entries = fs.ls(&session).expect("ls");
    assert!(entries.is_empty());
}

#[test]
fn adduser_login_mkdir_cd_mk_w_cat() {
    let (mut fs, admin) = formatted_fs(1024, 63);
    fs.adduser(&admin, 7).expect("adduser");

    let mut session = Session::new();
    fs.login(&mut session, 7).expect("login");
    fs.mkdir(&session, "docs", 0o755).expect("mkdir");
    fs.cd(&mut session, "docs").expect("cd");
    fs.mk(&session, "readme", 0o644).expect("mk");
    fs.w(&session, "readme", b"hello").expect("w");

    let content = fs.cat(&session, "readme").expect("cat");
    assert_eq!(content, b"hello");
}

#[test]
fn insert_splices_bytes_into_existing_content() {
    let (mut fs, admin) = formatted_fs(1024, 63);
    fs.mk(&admin, "a", 0o644).expect("mk");
    fs.w(&admin, "a", b"xyz").expect("w");
    fs.insert(&admin, "a", 1, b"AB").expect("insert");

    let content = fs.cat(&admin, "a").expect("cat");
    assert_eq!(content, b"xAByz");
}

#[test]
fn delete_removes_byte_range() {
    let (mut fs, admin) = formatted_fs(1024, 63);
    fs.mk(&admin, "a", 0o644).expect("mk");
    fs.w(&admin, "a", b"abcdef").expect("w");
    fs.delete(&admin, "a", 2, 3).expect("delete");

    let content = fs.cat(&admin, "a").expect("cat");
    assert_eq!(content, b"abf");
}

#[test]
fn write_past_ndirect_allocates_indirect_block() {
    use fs_core::param::NDIRECT;

    let (mut fs, admin) = formatted_fs(1024, 63);
    fs.mk(&admin, "big", 0o644).expect("mk");

    let len = NDIRECT as usize * BSIZE + 1;
    let data: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
    fs.w(&admin, "big", &data).expect("w");

    let readback = fs.cat(&admin, "big").expect("cat");
    assert_eq!(readback, data);

    let entries = fs.ls(&admin).expect("ls");
    let entry = entries.iter().find(|e| e.name == "big").expect("entry");
    assert_eq!(entry.size as usize, len);
}

#[test]
fn adduser_zero_and_duplicate_fail() {
    let (mut fs, admin) = formatted_fs(1024, 63);
    assert!(fs.adduser(&admin, 0).is_err());
    fs.adduser(&admin, 9).expect("adduser 9");
    assert!(fs.adduser(&admin, 9).is_err());
}

#[test]
fn rmdir_refuses_nonempty_then_succeeds_once_emptied() {
    let (mut fs, admin) = formatted_fs(1024, 63);
    let mut session = admin.clone();
    fs.mkdir(&session, "x", 0o755).expect("mkdir x");
    fs.cd(&mut session, "x").expect("cd x");
    fs.mkdir(&session, "y", 0o755).expect("mkdir y");
    fs.cd(&mut session, "..").expect("cd ..");

    assert!(fs.rmdir(&session, "x").is_err());

    fs.cd(&mut session, "x").expect("cd x again");
    fs.rmdir(&session, "y").expect("rmdir y");
    fs.cd(&mut session, "..").expect("cd .. again");
    fs.rmdir(&session, "x").expect("rmdir x");
}

#[test]
fn cd_dotdot_returns_to_root() {
    let (mut fs, admin) = formatted_fs(1024, 63);
    let mut session = admin.clone();
    fs.mkdir(&session, "child", 0o755).expect("mkdir");
    fs.cd(&mut session, "child").expect("cd child");
    fs.cd(&mut session, "..").expect("cd ..");
    assert_eq!(session.current_dir, admin.current_dir);
}

#[test]
fn file_type_reported_correctly_in_listing() {
    let (mut fs, admin) = formatted_fs(1024, 63);
    fs.mk(&admin, "f", 0o644).expect("mk");
    fs.mkdir(&admin, "d", 0o755).expect("mkdir");
    let entries = fs.ls(&admin).expect("ls");
    let f = entries.iter().find(|e| e.name == "f").unwrap();
    let d = entries.iter().find(|e| e.name == "d").unwrap();
    assert_eq!(f.typ, InodeType::File);
    assert_eq!(d.typ, InodeType::Dir);
}
