//! `fsclient`: a plain REPL that connects to `fsd`, forwards stdin lines verbatim as
//! command lines, and prints the server's reply. Exits on `e` or EOF.

use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;

use anyhow::{Context, Result};
use clap::Parser;

/// Filesystem client REPL.
#[derive(Parser, Debug)]
#[command(name = "fsclient")]
struct Args {
    /// Hostname of the filesystem server.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port of the filesystem server.
    #[arg(long, default_value_t = 666)]
    port: u16,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let stream = TcpStream::connect((args.host.as_str(), args.port))
        .with_context(|| format!("connecting to fs server at {}:{}", args.host, args.port))?;
    let mut writer = stream.try_clone().context("cloning connection for writes")?;
    let mut reader = stream;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading command from stdin")?;
        writeln!(writer, "{line}").context("sending command")?;

        let reply = read_reply(&mut reader).context("reading reply")?;
        println!("{reply}");

        if line.trim() == "e" {
            break;
        }
    }
    Ok(())
}

/// Reads one reply: a payload like `ls`'s listing or `cat`'s file bytes may itself
/// contain embedded newlines, so framing can't stop at the first `\n` — instead read
/// whatever the server has flushed in one write, mirroring the original client's
/// single-`recv`-call read of a reply buffer.
fn read_reply<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut buf = [0u8; 64 * 1024];
    let n = reader.read(&mut buf)?;
    let s = String::from_utf8_lossy(&buf[..n]).into_owned();
    Ok(s.strip_suffix('\n').map(str::to_string).unwrap_or(s))
}
