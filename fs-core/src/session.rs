//! Per-connection session context: current uid, current directory, and the advisory
//! current-path string.
//!
//! Grounded on the "global mutable state" design note: the source keeps
//! `current_dir`/`current_uid`/`current_path` as process-wide statics; here they are
//! an explicit value threaded through every command instead.

use crate::param::{ADMIN_UID, ROOT_INUM};

#[derive(Debug, Clone)]
pub struct Session {
    pub uid: u32,
    pub current_dir: u32,
    pub current_path: String,
}

impl Session {
    /// A freshly connected session starts logged in as the administrator at root,
    /// matching the source's initial process state before any `login`.
    pub fn new() -> Self {
        Self {
            uid: ADMIN_UID,
            current_dir: ROOT_INUM,
            current_path: "/".to_string(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.uid == ADMIN_UID
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
