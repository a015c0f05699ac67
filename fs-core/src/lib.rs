//! Core filesystem library: on-disk layout, bitmaps, inode store, addressing, byte
//! I/O, directory engine, path resolver, user/permission engine, and the public
//! filesystem-command surface. The disk transport and the two TCP protocols are
//! implemented by the `diskd`/`fsd`/`fsclient` binaries; this crate only defines the
//! [`transport::BlockTransport`] contract they satisfy.

pub mod allocator;
pub mod bitmap;
pub mod cache;
pub mod dir;
pub mod diskctx;
pub mod error;
pub mod fs;
pub mod inode;
pub mod param;
pub mod path;
pub mod session;
pub mod superblock;
pub mod transport;
pub mod user;

pub use error::{FsError, FsResult};
pub use fs::Filesystem;
pub use session::Session;
