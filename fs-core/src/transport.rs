//! The block transport: the contract the core consumes from the remote disk device.
//!
//! Grounded on `block.c`'s `raw_read_block`/`raw_write_block`/`get_disk_info`: a block
//! index is mapped to `(cylinder, sector)` and shipped over whatever carries the bytes.
//! The core never constructs a concrete transport itself — `fsd` wires a TCP-backed
//! implementation (see the `diskclient` module in the `fsd` binary) in before mounting.

use crate::error::TransportError;
use crate::param::BSIZE;

/// Geometry of the remote disk device, as returned by the disk server's `I` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskGeometry {
    pub ncyl: u32,
    pub nsec: u32,
}

impl DiskGeometry {
    pub fn block_count(&self) -> u32 {
        self.ncyl * self.nsec
    }

    /// Maps a linear block index to `(cylinder, sector)`.
    pub fn block_to_cyl_sec(&self, b: u32) -> (u32, u32) {
        (b / self.nsec, b % self.nsec)
    }
}

/// A transport to the remote cylinder/sector block device.
///
/// Implementations are responsible for whatever connection state they need; the core
/// only ever calls these three operations, always with `b < geometry().block_count()`
/// already checked by the caller (the cache and allocator never pass out-of-range
/// indices to the transport).
pub trait BlockTransport {
    /// Query the device geometry. Called once at mount time.
    fn info(&mut self) -> Result<DiskGeometry, TransportError>;

    /// Read one `BSIZE`-byte block.
    fn read_block(&mut self, b: u32) -> Result<[u8; BSIZE], TransportError>;

    /// Write one `BSIZE`-byte block.
    fn write_block(&mut self, b: u32, data: &[u8; BSIZE]) -> Result<(), TransportError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;

    /// An in-memory transport double used by unit and end-to-end tests: no sockets,
    /// no simulated seek delay, just a sparse map of block index to payload.
    pub struct MemTransport {
        geometry: DiskGeometry,
        blocks: HashMap<u32, [u8; BSIZE]>,
    }

    impl MemTransport {
        pub fn new(ncyl: u32, nsec: u32) -> Self {
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
}
