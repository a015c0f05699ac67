//! TCP client implementation of [`fs_core::transport::BlockTransport`], speaking the
//! disk-server protocol to a `diskd` process.
//!
//! Grounded on `block.c`'s `init_disk_connection`/`raw_read_block`/`raw_write_block`/
//! `get_disk_info`.

use std::io::{Read, Write};
use std::net::TcpStream;

use fs_core::error::TransportError;
use fs_core::param::BSIZE;
use fs_core::transport::{BlockTransport, DiskGeometry};

pub struct DiskClient {
    stream: TcpStream,
    geometry: DiskGeometry,
}

impl DiskClient {
    /// Connects and immediately queries geometry, matching the source's
    /// `init_disk_connection` followed by `get_disk_info` at startup.
    pub fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port))
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let mut client = Self {
            stream,
            geometry: DiskGeometry { ncyl: 0, nsec: 0 },
        };
        client.geometry = client.query_info()?;
        Ok(client)
    }

    fn read_token(&mut self) -> Result<String, TransportError> {
        let mut tok = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = self.stream.read(&mut byte)?;
            if n == 0 {
                if tok.is_empty() {
                    return Err(TransportError::Protocol("connection closed".into()));
                }
                break;
            }
            let b = byte[0];
            if b == b' ' || b == b'\n' || b == b'\r' {
                if tok.is_empty() {
                    continue;
                }
                break;
            }
            tok.push(b);
        }
        Ok(String::from_utf8_lossy(&tok).into_owned())
    }

    /// Reads the rest of a `No <reason>` line, given the bytes of its status word
    /// already consumed.
    fn read_no_reason(&mut self, consumed: &[u8]) -> Result<String, TransportError> {
        let mut rest = consumed.to_vec();
        let mut byte = [0u8; 1];
        loop {
            let n = self.stream.read(&mut byte)?;
            if n == 0 || byte[0] == b'\n' {
                break;
            }
            if byte[0] != b'\r' {
                rest.push(byte[0]);
            }
        }
        Ok(String::from_utf8_lossy(&rest).trim().to_string())
    }

    fn query_info(&mut self) -> Result<DiskGeometry, TransportError> {
        self.stream.write_all(b"I\n")?;
        let ncyl: u32 = self
            .read_token()?
            .parse()
            .map_err(|_| TransportError::Protocol("bad ncyl in I reply".into()))?;
        let nsec: u32 = self
            .read_token()?
            .parse()
            .map_err(|_| TransportError::Protocol("bad nsec in I reply".into()))?;
        Ok(DiskGeometry { ncyl, nsec })
    }
}

impl BlockTransport for DiskClient {
    fn info(&mut self) -> Result<DiskGeometry, TransportError> {
        Ok(self.geometry)
    }

    fn read_block(&mut self, b: u32) -> Result<[u8; BSIZE], TransportError> {
        let (cyl, sec) = self.geometry.block_to_cyl_sec(b);
        self.stream
            .write_all(format!("R {cyl} {sec}\n").as_bytes())?;
        // "Yes" is followed immediately by the raw 512-byte payload with no
        // delimiter, so the status word can't be read with the whitespace-delimited
        // token reader used everywhere else: read exactly 3 header bytes up front.
        let mut header = [0u8; 3];
        self.stream.read_exact(&mut header)?;
        if &header == b"Yes" {
            let mut buf = [0u8; BSIZE];
            self.stream.read_exact(&mut buf)?;
            return Ok(buf);
        }
        let reason = self.read_no_reason(&header)?;
        Err(TransportError::Protocol(format!(
            "disk read rejected: {reason}"
        )))
    }

    fn write_block(&mut self, b: u32, data: &[u8; BSIZE]) -> Result<(), TransportError> {
        let (cyl, sec) = self.geometry.block_to_cyl_sec(b);
        self.stream
            .write_all(format!("W {cyl} {sec} {} ", data.len()).as_bytes())?;
        self.stream.write_all(data)?;
        let status = self.read_token()?;
        if status != "Yes" {
            let reason = self.read_no_reason(&[])?;
            return Err(TransportError::Protocol(format!(
                "disk write rejected: {reason}"
            )));
        }
        Ok(())
    }
}
