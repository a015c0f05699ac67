//! Error taxonomy for the filesystem core.
//!
//! `FsError` is the taxonomy described by the command layer's reply contract: every
//! variant's `Display` text is exactly the reason string sent back to the client after
//! `No `. Lower layers have their own narrower error types that convert with `#[from]`.

use thiserror::Error;

/// Failure talking to the disk-server transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection to disk server failed: {0}")]
    Connect(String),
    #[error("disk server request failed: {0}")]
    Protocol(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure inside the block cache. Distinct from [`TransportError`] so the cache can
/// report its own bookkeeping errors (e.g. capacity exhaustion, which cannot actually
/// happen with the round-robin eviction policy but is modeled for completeness).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure resolving a path.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("path component exceeds maximum name length")]
    NameTooLong,
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("unsupported path form")]
    Unsupported,
}

/// Top-level error taxonomy surfaced by every filesystem command.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("wrong type")]
    WrongType,
    #[error("permission denied")]
    PermissionDenied,
    #[error("invalid range")]
    InvalidRange,
    #[error("no space left on device")]
    NoSpace,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("invalid name")]
    InvalidName,
    #[error("invalid user")]
    InvalidUser,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("filesystem not formatted")]
    NotFormatted,
    #[error("unsupported path form")]
    Unsupported,
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<CacheError> for FsError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Transport(t) => FsError::Transport(t),
        }
    }
}

impl From<PathError> for FsError {
    fn from(e: PathError) -> Self {
        match e {
            PathError::NameTooLong => FsError::InvalidName,
            PathError::NotFound => FsError::NotFound,
            PathError::NotADirectory => FsError::WrongType,
            PathError::Unsupported => FsError::Unsupported,
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
