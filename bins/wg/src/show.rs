//! Show command implementation for WireGuard.

use std::time::UNIX_EPOCH;

use clap::{Args, ValueEnum};
use wgctl::wg::{Device, Peer, WgConnection};
use wgctl::Result;

use crate::output::{format_bytes, format_time_ago};

#[derive(Args)]
pub struct ShowArgs {
    /// Interface name (shows all if omitted)
    pub interface: Option<String>,

    /// Show only specific field
    #[arg(value_enum)]
    pub field: Option<ShowField>,
}

#[derive(Clone, ValueEnum)]
pub enum ShowField {
    /// Show public key
    PublicKey,
    /// Show private key
    PrivateKey,
    /// Show listen port
    ListenPort,
    /// Show firewall mark
    Fwmark,
    /// Show peer public keys
    Peers,
    /// Show preshared keys
    PresharedKeys,
    /// Show peer endpoints
    Endpoints,
    /// Show allowed IPs
    AllowedIps,
    /// Show latest handshake times
    LatestHandshakes,
    /// Show transfer statistics
    Transfer,
    /// Show persistent keepalive intervals
    PersistentKeepalive,
    /// Machine-readable dump format
    Dump,
}

/// Run show for all WireGuard interfaces.
pub async fn run_all() -> Result<()> {
    let conn = WgConnection::new().await?;
    let devices = conn.devices().await?;

    let mut first = true;
    for device in &devices {
        if !first {
            println!();
        }
        first = false;
        print_device(device);
    }

    Ok(())
}

/// Run show command with arguments.
pub async fn run(args: ShowArgs) -> Result<()> {
    let Some(interface) = args.interface else {
        return run_all().await;
    };

    let conn = WgConnection::new().await?;
    let device = conn.get_device(&interface).await?;

    match args.field {
        None => print_device(&device),
        Some(ShowField::PublicKey) => {
            if let Some(pk) = device.public_key {
                println!("{}", pk);
            }
        }
        Some(ShowField::PrivateKey) => {
            match device.private_key {
                Some(key) => println!("{}", key),
                None => println!("(none)"),
            }
        }
        Some(ShowField::ListenPort) => {
            println!("{}", device.listen_port);
        }
        Some(ShowField::Fwmark) => {
            if device.fwmark != 0 {
                println!("0x{:x}", device.fwmark);
            } else {
                println!("off");
            }
        }
        Some(ShowField::Peers) => {
            for peer in &device.peers {
                println!("{}", peer.public_key);
            }
        }
        Some(ShowField::PresharedKeys) => {
            for peer in &device.peers {
                match peer.preshared_key {
                    Some(psk) => println!("{}\t{}", peer.public_key, psk),
                    None => println!("{}\t(none)", peer.public_key),
                }
            }
        }
        Some(ShowField::Endpoints) => {
            for peer in &device.peers {
                let endpoint = peer
                    .endpoint
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "(none)".to_string());
                println!("{}\t{}", peer.public_key, endpoint);
            }
        }
        Some(ShowField::AllowedIps) => {
            for peer in &device.peers {
                let ips: Vec<String> = peer.allowed_ips.iter().map(|ip| ip.to_string()).collect();
                println!(
                    "{}\t{}",
                    peer.public_key,
                    if ips.is_empty() {
                        "(none)".to_string()
                    } else {
                        ips.join(" ")
                    }
                );
            }
        }
        Some(ShowField::LatestHandshakes) => {
            for peer in &device.peers {
                println!("{}\t{}", peer.public_key, handshake_epoch_secs(peer));
            }
        }
        Some(ShowField::Transfer) => {
            for peer in &device.peers {
                println!("{}\t{}\t{}", peer.public_key, peer.rx_bytes, peer.tx_bytes);
            }
        }
        Some(ShowField::PersistentKeepalive) => {
            for peer in &device.peers {
                let keepalive = if peer.persistent_keepalive > 0 {
                    peer.persistent_keepalive.to_string()
                } else {
                    "off".to_string()
                };
                println!("{}\t{}", peer.public_key, keepalive);
            }
        }
        Some(ShowField::Dump) => {
            print_dump(&device);
        }
    }

    Ok(())
}

/// Run showconf command - output in wg-quick format.
pub async fn run_conf(interface: &str) -> Result<()> {
    let conn = WgConnection::new().await?;
    let device = conn.get_device(interface).await?;

    println!("[Interface]");
    if device.listen_port != 0 {
        println!("ListenPort = {}", device.listen_port);
    }
    if device.fwmark != 0 {
        println!("FwMark = 0x{:x}", device.fwmark);
    }
    if let Some(key) = device.private_key {
        println!("PrivateKey = {}", key);
    }

    for peer in &device.peers {
        println!();
        println!("[Peer]");
        println!("PublicKey = {}", peer.public_key);
        if let Some(psk) = peer.preshared_key {
            println!("PresharedKey = {}", psk);
        }
        if !peer.allowed_ips.is_empty() {
            let ips: Vec<String> = peer.allowed_ips.iter().map(|ip| ip.to_string()).collect();
            println!("AllowedIPs = {}", ips.join(", "));
        }
        if let Some(endpoint) = peer.endpoint {
            println!("Endpoint = {}", endpoint);
        }
        if peer.persistent_keepalive > 0 {
            println!("PersistentKeepalive = {}", peer.persistent_keepalive);
        }
    }

    Ok(())
}

/// Print device information in human-readable format.
fn print_device(device: &Device) {
    println!("interface: {}", device.name);

    if let Some(pk) = device.public_key {
        println!("  public key: {}", pk);
    }
    if device.private_key.is_some() {
        println!("  private key: (hidden)");
    }

    if device.listen_port != 0 {
        println!("  listening port: {}", device.listen_port);
    }

    if device.fwmark != 0 {
        println!("  fwmark: 0x{:x}", device.fwmark);
    }

    for peer in &device.peers {
        println!();
        print_peer(peer);
    }
}

/// Print peer information.
fn print_peer(peer: &Peer) {
    println!("peer: {}", peer.public_key);

    if peer.preshared_key.is_some() {
        println!("  preshared key: (hidden)");
    }

    if let Some(endpoint) = peer.endpoint {
        println!("  endpoint: {}", endpoint);
    }

    if !peer.allowed_ips.is_empty() {
        let ips: Vec<String> = peer.allowed_ips.iter().map(|ip| ip.to_string()).collect();
        println!("  allowed ips: {}", ips.join(", "));
    }

    if let Some(time) = peer.last_handshake {
        println!("  latest handshake: {}", format_time_ago(time));
    }

    if peer.rx_bytes > 0 || peer.tx_bytes > 0 {
        println!(
            "  transfer: {} received, {} sent",
            format_bytes(peer.rx_bytes),
            format_bytes(peer.tx_bytes)
        );
    }

    if peer.persistent_keepalive > 0 {
        println!(
            "  persistent keepalive: every {} seconds",
            peer.persistent_keepalive
        );
    }
}

/// Print device in machine-readable dump format.
fn print_dump(device: &Device) {
    let private_key = device
        .private_key
        .map(|k| k.to_string())
        .unwrap_or_else(|| "(none)".to_string());
    let public_key = device
        .public_key
        .map(|k| k.to_string())
        .unwrap_or_else(|| "(none)".to_string());
    let fwmark = if device.fwmark != 0 {
        format!("0x{:x}", device.fwmark)
    } else {
        "off".to_string()
    };

    // Interface line
    println!(
        "{}\t{}\t{}\t{}\t{}",
        device.name, private_key, public_key, device.listen_port, fwmark
    );

    // Peer lines
    for peer in &device.peers {
        let psk = peer
            .preshared_key
            .map(|k| k.to_string())
            .unwrap_or_else(|| "(none)".to_string());
        let endpoint = peer
            .endpoint
            .map(|e| e.to_string())
            .unwrap_or_else(|| "(none)".to_string());
        let allowed_ips: Vec<String> = peer.allowed_ips.iter().map(|ip| ip.to_string()).collect();
        let allowed_ips_str = if allowed_ips.is_empty() {
            "(none)".to_string()
        } else {
            allowed_ips.join(",")
        };
        let keepalive = if peer.persistent_keepalive > 0 {
            peer.persistent_keepalive.to_string()
        } else {
            "off".to_string()
        };

        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            peer.public_key,
            psk,
            endpoint,
            allowed_ips_str,
            handshake_epoch_secs(peer),
            peer.rx_bytes,
            peer.tx_bytes,
            keepalive
        );
    }
}

/// Last handshake as seconds since the epoch, zero for never.
fn handshake_epoch_secs(peer: &Peer) -> u64 {
    peer.last_handshake
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
