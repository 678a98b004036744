//! WireGuard configuration via Generic Netlink.
//!
//! The kernel's WireGuard module registers a generic-netlink family with
//! two commands: `GET_DEVICE` (a dump that may answer in several messages
//! for large peer lists) and `SET_DEVICE`. Device, peer and allowed-IP
//! data travel as nested attribute sets; this module defines the data
//! model, the wire codec and a high-level connection.
//!
//! # Example
//!
//! ```rust,no_run
//! use wgctl::wg::WgConnection;
//!
//! # async fn example() -> wgctl::Result<()> {
//! let conn = WgConnection::new().await?;
//!
//! // Get device information
//! let device = conn.get_device("wg0").await?;
//! println!("listen port: {}", device.listen_port);
//!
//! for peer in &device.peers {
//!     println!("peer: {}", peer.public_key);
//!     println!("  endpoint: {:?}", peer.endpoint);
//!     println!("  allowed ips: {:?}", peer.allowed_ips);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Setting configuration
//!
//! Only fields the caller explicitly sets are sent to the kernel; an
//! untouched builder encodes nothing but the interface name.
//!
//! ```rust,no_run
//! use wgctl::wg::{AllowedIp, Key, WgConnection};
//! use std::net::{Ipv4Addr, SocketAddrV4};
//!
//! # async fn example(private_key: Key, peer_key: Key) -> wgctl::Result<()> {
//! let conn = WgConnection::new().await?;
//!
//! conn.set_device("wg0", |dev| {
//!     dev.private_key(private_key).listen_port(51820)
//! }).await?;
//!
//! conn.set_peer("wg0", peer_key, |peer| {
//!     peer.endpoint(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 51820).into())
//!         .persistent_keepalive(25)
//!         .allowed_ip(AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 0), 24))
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
mod connection;
mod types;

pub use connection::WgConnection;
pub use types::{
    AllowedIp, Device, DeviceConfig, KEY_LEN, Key, Peer, PeerConfig, PeerFlags,
};

/// WireGuard Generic Netlink family name.
pub const WG_GENL_NAME: &str = "wireguard";

/// WireGuard Generic Netlink version.
pub const WG_GENL_VERSION: u8 = 1;

/// WireGuard GENL commands.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WgCmd {
    GetDevice = 0,
    SetDevice = 1,
}

/// WireGuard device attributes.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WgDeviceAttr {
    Unspec = 0,
    Ifindex = 1,
    Ifname = 2,
    PrivateKey = 3,
    PublicKey = 4,
    Flags = 5,
    ListenPort = 6,
    Fwmark = 7,
    Peers = 8,
}

/// WireGuard peer attributes.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WgPeerAttr {
    Unspec = 0,
    PublicKey = 1,
    PresharedKey = 2,
    Flags = 3,
    Endpoint = 4,
    PersistentKeepalive = 5,
    LastHandshake = 6,
    RxBytes = 7,
    TxBytes = 8,
    AllowedIps = 9,
    ProtocolVersion = 10,
}

/// WireGuard allowed IP attributes.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WgAllowedIpAttr {
    Unspec = 0,
    Family = 1,
    IpAddr = 2,
    CidrMask = 3,
}

/// WireGuard device flags.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WgDeviceFlag {
    /// Replace all peers instead of adding
    ReplacePeers = 1 << 0,
}
