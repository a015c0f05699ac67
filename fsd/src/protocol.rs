//! The filesystem-server wire protocol: newline-terminated command lines in, `Yes
//! <payload>` / `No <reason>` lines out.
//!
//! Grounded on `fs.c`'s command dispatch table, generalized the same way
//! `diskd::protocol` is: tokens are read one at a time rather than line-at-a-time so a
//! `w`/`i` command's raw data argument (arbitrary file bytes) can never be mistaken
//! for a line terminator.

use std::io::{Read, Write};
use std::net::TcpStream;

use tracing::{info, warn};

use fs_core::{FsError, Filesystem, Session};

struct TokenReader<R> {
    inner: R,
}

impl<R: Read> TokenReader<R> {
    fn new(inner: R) -> Self {
        Self { inner }
    }

    fn read_token(&mut self) -> std::io::Result<Option<String>> {
        let mut byte = [0u8; 1];
        let mut tok = Vec::new();
        loop {
            let n = self.inner.read(&mut byte)?;
            if n == 0 {
                return Ok(if tok.is_empty() {
                    None
                } else {
                    Some(String::from_utf8_lossy(&tok).into_owned())
                });
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

fn parse_u32(tok: Option<String>) -> Result<u32, FsError> {
    tok.and_then(|s| s.parse().ok())
        .ok_or(FsError::InvalidName)
}

fn parse_usize(tok: Option<String>) -> Result<usize, FsError> {
    tok.and_then(|s| s.parse().ok())
        .ok_or(FsError::InvalidName)
}

/// Drives one client connection to completion: reads command lines, dispatches
/// against the shared `Filesystem`, and writes back replies until `e` or EOF.
pub fn handle_connection(stream: TcpStream, fs: &mut Filesystem) -> std::io::Result<()> {
    let peer = stream.peer_addr().ok();
    info!(?peer, "fs client connected");
    let mut reader = TokenReader::new(stream.try_clone()?);
    let mut writer = stream;
    let mut session = Session::new();

    loop {
        let cmd = match reader.read_token()? {
            Some(c) => c,
            None => break,
        };
        match dispatch(&cmd, &mut reader, fs, &mut session) {
            Dispatch::Reply(payload) => {
                writeln!(writer, "Yes{}", payload)?;
            }
            Dispatch::Error(reason) => {
                warn!(command = %cmd, error = %reason, "command failed");
                writeln!(writer, "No {reason}")?;
            }
            Dispatch::Bye => {
                writeln!(writer, "Bye!")?;
                break;
            }
            Dispatch::Unknown => {
                writeln!(writer, "No unknown command")?;
            }
        }
    }
    info!(?peer, "fs client disconnected");
    Ok(())
}

enum Dispatch {
    Reply(String),
    Error(String),
    Bye,
    Unknown,
}

fn dispatch<R: Read>(
    cmd: &str,
    reader: &mut TokenReader<R>,
    fs: &mut Filesystem,
    session: &mut Session,
) -> Dispatch {
    match run(cmd, reader, fs, session) {
        Ok(Some(payload)) => Dispatch::Reply(payload),
        Ok(None) => Dispatch::Reply(String::new()),
        Err(RunError::Fs(e)) => Dispatch::Error(e.to_string()),
        Err(RunError::Io(e)) => Dispatch::Error(e.to_string()),
        Err(RunError::Bye) => Dispatch::Bye,
        Err(RunError::Unknown) => Dispatch::Unknown,
    }
}

enum RunError {
    Fs(FsError),
    Io(std::io::Error),
    Bye,
    Unknown,
}

impl From<FsError> for RunError {
    fn from(e: FsError) -> Self {
        RunError::Fs(e)
    }
}

impl From<std::io::Error> for RunError {
    fn from(e: std::io::Error) -> Self {
        RunError::Io(e)
    }
}

fn run<R: Read>(
    cmd: &str,
    reader: &mut TokenReader<R>,
    fs: &mut Filesystem,
    session: &mut Session,
) -> Result<Option<String>, RunError> {
    match cmd {
        "f" => {
            let ncyl = parse_u32(reader.read_token()?)?;
            let nsec = parse_u32(reader.read_token()?)?;
            fs.format(session, ncyl, nsec)?;
            Ok(None)
        }
        "mk" => {
            let name = reader.read_token()?.ok_or(FsError::InvalidName)?;
            let mode = parse_u32(reader.read_token()?)? as u16;
            fs.mk(session, &name, mode)?;
            Ok(None)
        }
        "mkdir" => {
            let name = reader.read_token()?.ok_or(FsError::InvalidName)?;
            let mode = parse_u32(reader.read_token()?)? as u16;
            fs.mkdir(session, &name, mode)?;
            Ok(None)
        }
        "rm" => {
            let name = reader.read_token()?.ok_or(FsError::InvalidName)?;
            fs.rm(session, &name)?;
            Ok(None)
        }
        "rmdir" => {
            let name = reader.read_token()?.ok_or(FsError::InvalidName)?;
            fs.rmdir(session, &name)?;
            Ok(None)
        }
        "cd" => {
            let target = reader.read_token()?.ok_or(FsError::InvalidName)?;
            fs.cd(session, &target)?;
            Ok(None)
        }
        "ls" => {
            let entries = fs.ls(session)?;
            let mut out = String::new();
            for e in entries {
                out.push('\n');
                out.push_str(&format!(
                    "{} {} {} {}",
                    e.name,
                    e.size,
                    e.mode,
                    match e.typ {
                        fs_core::inode::InodeType::Dir => "d",
                        fs_core::inode::InodeType::File => "f",
                        fs_core::inode::InodeType::Unused => "?",
                    }
                ));
            }
            Ok(Some(out))
        }
        "cat" => {
            let name = reader.read_token()?.ok_or(FsError::InvalidName)?;
            let bytes = fs.cat(session, &name)?;
            Ok(Some(format!("\n{}", String::from_utf8_lossy(&bytes))))
        }
        "w" => {
            let name = reader.read_token()?.ok_or(FsError::InvalidName)?;
            let len = parse_usize(reader.read_token()?)?;
            let data = reader.read_exact_bytes(len)?;
            fs.w(session, &name, &data)?;
            Ok(None)
        }
        "i" => {
            let name = reader.read_token()?.ok_or(FsError::InvalidName)?;
            let pos = parse_usize(reader.read_token()?)?;
            let len = parse_usize(reader.read_token()?)?;
            let data = reader.read_exact_bytes(len)?;
            fs.insert(session, &name, pos, &data)?;
            Ok(None)
        }
        "d" => {
            let name = reader.read_token()?.ok_or(FsError::InvalidName)?;
            let pos = parse_usize(reader.read_token()?)?;
            let len = parse_usize(reader.read_token()?)?;
            fs.delete(session, &name, pos, len)?;
            Ok(None)
        }
        "login" => {
            let uid = parse_u32(reader.read_token()?)?;
            fs.login(session, uid)?;
            Ok(None)
        }
        "adduser" => {
            let uid = parse_u32(reader.read_token()?)?;
            fs.adduser(session, uid)?;
            Ok(None)
        }
        "pwd" => Ok(Some(format!("\n{}", fs.pwd(session)))),
        "e" => Err(RunError::Bye),
        _ => Err(RunError::Unknown),
    }
}
