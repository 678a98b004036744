//! Set command implementation for WireGuard.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Args;
use wgctl::wg::{AllowedIp, Key, WgConnection};
use wgctl::{Error, Result};

#[derive(Args)]
pub struct SetArgs {
    /// Interface name
    pub interface: String,

    /// Listen port
    #[arg(long = "listen-port")]
    pub listen_port: Option<u16>,

    /// Private key file path
    #[arg(long = "private-key")]
    pub private_key: Option<PathBuf>,

    /// Firewall mark
    #[arg(long)]
    pub fwmark: Option<u32>,

    /// Peer public key (base64)
    #[arg(long)]
    pub peer: Option<String>,

    /// Remove the peer
    #[arg(long)]
    pub remove: bool,

    /// Peer endpoint (IP:port)
    #[arg(long)]
    pub endpoint: Option<SocketAddr>,

    /// Peer allowed IPs (comma-separated CIDR notation)
    #[arg(long = "allowed-ips")]
    pub allowed_ips: Option<String>,

    /// Persistent keepalive interval in seconds
    #[arg(long = "persistent-keepalive")]
    pub persistent_keepalive: Option<u16>,

    /// Preshared key file path
    #[arg(long = "preshared-key")]
    pub preshared_key: Option<PathBuf>,
}

/// Run the set command.
pub async fn run(args: SetArgs) -> Result<()> {
    let conn = WgConnection::new().await?;

    // Device-level options go in one SET_DEVICE call.
    if args.listen_port.is_some() || args.private_key.is_some() || args.fwmark.is_some() {
        let private_key = match &args.private_key {
            Some(path) => Some(read_key_file(path)?),
            None => None,
        };

        conn.set_device(&args.interface, |mut dev| {
            if let Some(port) = args.listen_port {
                dev = dev.listen_port(port);
            }
            if let Some(key) = private_key {
                dev = dev.private_key(key);
            }
            if let Some(mark) = args.fwmark {
                dev = dev.fwmark(mark);
            }
            dev
        })
        .await?;
    }

    // Peer options go in a second call, keyed by the peer's public key.
    if let Some(peer_key_str) = &args.peer {
        let peer_key = Key::from_base64(peer_key_str)?;

        if args.remove {
            conn.remove_peer(&args.interface, peer_key).await?;
        } else {
            let psk = match &args.preshared_key {
                Some(path) => Some(read_key_file(path)?),
                None => None,
            };

            let allowed_ips = match &args.allowed_ips {
                Some(ips_str) => parse_allowed_ips(ips_str)?,
                None => Vec::new(),
            };

            conn.set_peer(&args.interface, peer_key, |mut peer| {
                if let Some(endpoint) = args.endpoint {
                    peer = peer.endpoint(endpoint);
                }
                if let Some(keepalive) = args.persistent_keepalive {
                    peer = peer.persistent_keepalive(keepalive);
                }
                if let Some(key) = psk {
                    peer = peer.preshared_key(key);
                }
                if !allowed_ips.is_empty() {
                    peer = peer.allowed_ips(allowed_ips).replace_allowed_ips();
                }
                peer
            })
            .await?;
        }
    }

    Ok(())
}

/// Read a base64 key from a file.
fn read_key_file(path: &Path) -> Result<Key> {
    let content = fs::read_to_string(path).map_err(Error::Io)?;
    Key::from_base64(&content)
}

/// Parse a comma-separated list of allowed IPs in CIDR notation.
fn parse_allowed_ips(s: &str) -> Result<Vec<AllowedIp>> {
    s.split(',')
        .map(str::trim)
        .filter(|cidr| !cidr.is_empty())
        .map(str::parse)
        .collect()
}
