//! The simulated cylinder/sector block device.
//!
//! Grounded on `disk/src/disk.c`: block index maps to `(cyl, sec)`, a read/write
//! simulates seek cost proportional to cylinder travel. Unlike the source, the
//! in-memory array is the primary store rather than an `mmap`'d file (the exact
//! persistence mechanism is out of scope, per `SPEC_FULL.md` §1) — but an optional
//! backing file can still be supplied so the image survives a restart: loaded once at
//! startup and kept in sync with every write via plain positioned file I/O rather than
//! a memory mapping.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::warn;

pub const BLOCK_SIZE: usize = 512;

pub struct Device {
    ncyl: u32,
    nsec: u32,
    ttd_ms: u64,
    cur_cyl: u32,
    blocks: Vec<[u8; BLOCK_SIZE]>,
    image: Option<File>,
}

impl Device {
    pub fn new(ncyl: u32, nsec: u32, ttd_ms: u64) -> Self {
        let count = (ncyl as usize) * (nsec as usize);
        Self {
            ncyl,
            nsec,
            ttd_ms,
            cur_cyl: 0,
            blocks: vec![[0u8; BLOCK_SIZE]; count],
            image: None,
        }
    }

    /// Opens (creating if absent) a backing file for this device's image and loads
    /// any existing block contents from it. Blocks past the end of a short or
    /// freshly created file stay zero-filled; bytes past `ncyl*nsec*BLOCK_SIZE` in an
    /// oversized file are ignored.
    pub fn with_image(mut self, path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        for (i, block) in self.blocks.iter_mut().enumerate() {
            let start = i * BLOCK_SIZE;
            if start >= buf.len() {
                break;
            }
            let end = (start + BLOCK_SIZE).min(buf.len());
            block[..end - start].copy_from_slice(&buf[start..end]);
        }
        self.image = Some(file);
        Ok(self)
    }

    fn persist(&mut self, idx: usize) {
        let Some(file) = self.image.as_mut() else {
            return;
        };
        let offset = (idx * BLOCK_SIZE) as u64;
        if let Err(e) = file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| file.write_all(&self.blocks[idx]))
        {
            warn!(error = %e, block = idx, "failed to persist block to image file");
        }
    }

    pub fn geometry(&self) -> (u32, u32) {
        (self.ncyl, self.nsec)
    }

    fn seek(&mut self, cyl: u32) {
        if self.ttd_ms > 0 {
            let delay = (cyl as i64 - self.cur_cyl as i64).unsigned_abs() * self.ttd_ms;
            if delay > 0 {
                thread::sleep(Duration::from_millis(delay));
            }
        }
        self.cur_cyl = cyl;
    }

    fn in_range(&self, cyl: u32, sec: u32) -> bool {
        cyl < self.ncyl && sec < self.nsec
    }

    pub fn read(&mut self, cyl: u32, sec: u32) -> Option<[u8; BLOCK_SIZE]> {
        if !self.in_range(cyl, sec) {
            return None;
        }
        self.seek(cyl);
        let idx = (cyl as usize) * (self.nsec as usize) + sec as usize;
        Some(self.blocks[idx])
    }

    pub fn write(&mut self, cyl: u32, sec: u32, data: &[u8]) -> bool {
        if !self.in_range(cyl, sec) || data.len() > BLOCK_SIZE {
            return false;
        }
        self.seek(cyl);
        let idx = (cyl as usize) * (self.nsec as usize) + sec as usize;
        let mut block = [0u8; BLOCK_SIZE];
        block[..data.len()].copy_from_slice(data);
        self.blocks[idx] = block;
        self.persist(idx);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn temp_image_path() -> std::path::PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("diskd-test-{}-{n}.img", std::process::id()))
    }

    #[test]
    fn write_then_read_without_image_is_pure_memory() {
        let mut dev = Device::new(4, 4, 0);
        assert!(dev.write(1, 2, &[9u8; BLOCK_SIZE]));
        assert_eq!(dev.read(1, 2).unwrap()[0], 9);
    }

    #[test]
    fn out_of_range_read_and_write_fail() {
        let mut dev = Device::new(2, 2, 0);
        assert!(dev.read(5, 0).is_none());
        assert!(!dev.write(0, 5, &[1u8; BLOCK_SIZE]));
    }

    #[test]
    fn image_file_persists_writes_across_reopen() {
        let path = temp_image_path();
        {
            let mut dev = Device::new(2, 2, 0).with_image(&path).unwrap();
            assert!(dev.write(1, 1, &[42u8; BLOCK_SIZE]));
        }
        {
            let mut dev = Device::new(2, 2, 0).with_image(&path).unwrap();
            assert_eq!(dev.read(1, 1).unwrap()[0], 42);
        }
        std::fs::remove_file(&path).ok();
    }
}
