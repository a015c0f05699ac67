//! `diskd`: the disk-server binary. Owns an in-memory cylinder/sector block device
//! and serves it over the line protocol described in `SPEC_FULL.md` §6.

mod device;
mod protocol;

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use device::Device;

/// Simulated cylinder/sector disk server.
#[derive(Parser, Debug)]
#[command(name = "diskd")]
struct Args {
    /// Number of cylinders.
    #[arg(long, default_value_t = 1024)]
    ncyl: u32,

    /// Sectors per cylinder.
    #[arg(long, default_value_t = 63)]
    nsec: u32,

    /// Simulated seek delay in milliseconds per cylinder of head travel.
    #[arg(long, default_value_t = 0)]
    ttd_ms: u64,

    /// TCP port to listen on.
    #[arg(long, default_value_t = 7000)]
    port: u16,

    /// Optional backing file for the disk image, loaded at startup and kept in sync
    /// with every write so the image survives a restart.
    #[arg(long)]
    image: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut dev = Device::new(args.ncyl, args.nsec, args.ttd_ms);
    if let Some(path) = &args.image {
        dev = dev
            .with_image(path)
            .with_context(|| format!("loading disk image from {}", path.display()))?;
        info!(path = %path.display(), "loaded disk image");
    }
    let device = Mutex::new(dev);
    let listener = TcpListener::bind(("0.0.0.0", args.port))
        .with_context(|| format!("binding disk server to port {}", args.port))?;
    info!(ncyl = args.ncyl, nsec = args.nsec, port = args.port, "disk server listening");

    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                if let Err(e) = protocol::handle_connection(stream, &device) {
                    error!(error = %e, "disk connection ended with error");
                }
            }
            Err(e) => error!(error = %e, "failed to accept disk connection"),
        }
    }
    Ok(())
}
