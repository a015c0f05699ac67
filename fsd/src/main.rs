//! `fsd`: the filesystem-server binary. Connects to a running `diskd` as its block
//! transport, mounts (or waits to be formatted), then serves filesystem clients over
//! the line protocol described in `SPEC_FULL.md` §6.

mod diskclient;
mod protocol;

use std::net::TcpListener;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use diskclient::DiskClient;
use fs_core::Filesystem;

/// Filesystem server: mounts a remote block device and serves clients.
#[derive(Parser, Debug)]
#[command(name = "fsd")]
struct Args {
    /// Hostname of the disk server.
    #[arg(long, default_value = "127.0.0.1")]
    disk_host: String,

    /// Port of the disk server.
    #[arg(long, default_value_t = 7000)]
    disk_port: u16,

    /// TCP port to listen on for filesystem clients.
    #[arg(long, default_value_t = 666)]
    fs_port: u16,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let transport = DiskClient::connect(&args.disk_host, args.disk_port)
        .with_context(|| format!("connecting to disk server at {}:{}", args.disk_host, args.disk_port))?;
    let mut fs = Filesystem::new(Box::new(transport));
    match fs.mount() {
        Ok(()) => info!("mounted existing filesystem"),
        Err(_) => info!("disk not formatted yet; waiting for an `f` command from a client"),
    }

    let listener = TcpListener::bind(("0.0.0.0", args.fs_port))
        .with_context(|| format!("binding fs server to port {}", args.fs_port))?;
    info!(port = args.fs_port, "fs server listening");

    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                if let Err(e) = protocol::handle_connection(stream, &mut fs) {
                    error!(error = %e, "fs connection ended with error");
                }
                if let Err(e) = fs.flush() {
                    error!(error = %e, "flush after connection close failed");
                }
            }
            Err(e) => error!(error = %e, "failed to accept fs connection"),
        }
    }
    Ok(())
}
