//! The disk-server wire protocol: `I`, `R <cyl> <sec>`, `W <cyl> <sec> <len> <bytes>`.
//!
//! Grounded on `server.c`'s `on_recv` dispatch loop, generalized from the source's
//! single-shared-connection model to one handler per accepted TCP stream (the disk
//! server still only expects one client — the `fsd` process — at a time, per §1).
//!
//! Tokens are read one at a time rather than line-at-a-time: the `W` command's raw
//! payload can contain arbitrary bytes, including `\n`, so framing on newlines (as a
//! naive `BufRead::read_line` loop would) could truncate a binary write mid-payload.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::device::{Device, BLOCK_SIZE};

struct TokenReader<R> {
    inner: R,
}

impl<R: Read> TokenReader<R> {
    fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads one whitespace-delimited token, skipping leading whitespace. Returns
    /// `None` at EOF with nothing read.
    fn read_token(&mut self) -> std::io::Result<Option<String>> {
        let mut byte = [0u8; 1];
        let mut tok = Vec::new();
        loop {
            let n = self.inner.read(&mut byte)?;
            if n == 0 {
                return Ok(if tok.is_empty() { None } else { Some(String::from_utf8_lossy(&tok).into_owned()) });
            }
            let b = byte[0];
            if b == b' ' || b == b'\n' || b == b'\r' {
                if tok.is_empty() {
                    continue;
                }
                return Ok(Some(String::from_utf8_lossy(&tok).into_owned()));
            }
            tok.push(b);
        }
    }

    fn read_exact_bytes(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }
}

pub fn handle_connection(stream: TcpStream, device: &Mutex<Device>) -> std::io::Result<()> {
    let peer = stream.peer_addr().ok();
    info!(?peer, "disk client connected");
    let mut reader = TokenReader::new(stream.try_clone()?);
    let mut writer = stream;

    loop {
        let cmd = match reader.read_token()? {
            Some(c) => c,
            None => break,
        };
        match cmd.as_str() {
            "I" => {
                let (ncyl, nsec) = device.lock().unwrap().geometry();
                writeln!(writer, "{ncyl} {nsec}")?;
            }
            "R" => {
                let cyl: Option<u32> = reader.read_token()?.and_then(|s| s.parse().ok());
                let sec: Option<u32> = reader.read_token()?.and_then(|s| s.parse().ok());
                match (cyl, sec) {
                    (Some(cyl), Some(sec)) => {
                        let data = device.lock().unwrap().read(cyl, sec);
                        match data {
                            Some(block) => {
                                writer.write_all(b"Yes")?;
                                writer.write_all(&block)?;
                            }
                            None => writeln!(writer, "No invalid cylinder or sector")?,
                        }
                    }
                    _ => writeln!(writer, "No malformed request")?,
                }
            }
            "W" => {
                let cyl: Option<u32> = reader.read_token()?.and_then(|s| s.parse().ok());
                let sec: Option<u32> = reader.read_token()?.and_then(|s| s.parse().ok());
                let len: Option<usize> = reader.read_token()?.and_then(|s| s.parse().ok());
                match (cyl, sec, len) {
                    (Some(cyl), Some(sec), Some(len)) if len <= BLOCK_SIZE => {
                        let buf = reader.read_exact_bytes(len)?;
                        let ok = device.lock().unwrap().write(cyl, sec, &buf);
                        if ok {
                            writeln!(writer, "Yes")?;
                        } else {
                            writeln!(writer, "No invalid cylinder or sector")?;
                        }
                    }
                    _ => {
                        warn!(cmd, "malformed write request");
                        writeln!(writer, "No malformed request")?;
                    }
                }
            }
            other => {
                warn!(command = other, "unknown disk command");
                writeln!(writer, "No unknown command")?;
            }
        }
    }
    info!(?peer, "disk client disconnected");
    Ok(())
}
