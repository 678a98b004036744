//! WireGuard type definitions.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use base64::prelude::*;

use crate::netlink::{Error, Result};

/// Size of a WireGuard key in bytes.
pub const KEY_LEN: usize = 32;

/// A WireGuard key: private, public or preshared.
///
/// An opaque 32-byte value. Equality is byte-wise; the base64 form is a
/// display encoding only. The all-zero key doubles as the kernel's "not
/// set" sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    /// Create a key from raw bytes.
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a key from a byte slice of exactly [`KEY_LEN`] bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() != KEY_LEN {
            return Err(Error::InvalidLength {
                what: "key",
                actual: data.len(),
            });
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(data);
        Ok(Self(bytes))
    }

    /// Parse a key from its base64 display encoding.
    pub fn from_base64(s: &str) -> Result<Self> {
        let data = BASE64_STANDARD
            .decode(s.trim())
            .map_err(|e| Error::Malformed(format!("invalid base64 key: {}", e)))?;
        Self::from_slice(&data)
    }

    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Check for the all-zero "not set" sentinel.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Encode the key as base64 for display.
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }
}

impl From<[u8; KEY_LEN]> for Key {
    fn from(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.to_base64())
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base64(s)
    }
}

/// An allowed IP range for a WireGuard peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedIp {
    /// IP address (network portion).
    pub addr: IpAddr,
    /// CIDR prefix length.
    pub cidr: u8,
}

impl AllowedIp {
    /// Create an IPv4 allowed IP range.
    ///
    /// Panics in debug builds if `cidr` exceeds 32.
    pub fn v4(addr: Ipv4Addr, cidr: u8) -> Self {
        debug_assert!(cidr <= 32, "IPv4 prefix length out of range: {cidr}");
        Self {
            addr: IpAddr::V4(addr),
            cidr,
        }
    }

    /// Create an IPv6 allowed IP range.
    ///
    /// Panics in debug builds if `cidr` exceeds 128.
    pub fn v6(addr: Ipv6Addr, cidr: u8) -> Self {
        debug_assert!(cidr <= 128, "IPv6 prefix length out of range: {cidr}");
        Self {
            addr: IpAddr::V6(addr),
            cidr,
        }
    }

    /// Get the address family (AF_INET or AF_INET6).
    pub fn family(&self) -> u16 {
        match self.addr {
            IpAddr::V4(_) => libc::AF_INET as u16,
            IpAddr::V6(_) => libc::AF_INET6 as u16,
        }
    }

    /// Get the maximum prefix length for the address family.
    pub fn max_prefix(&self) -> u8 {
        match self.addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    /// Get the address bytes.
    pub fn addr_bytes(&self) -> Vec<u8> {
        match self.addr {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        }
    }
}

impl fmt::Display for AllowedIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.cidr)
    }
}

impl FromStr for AllowedIp {
    type Err = Error;

    /// Parse CIDR notation ("10.0.0.0/24"). A bare address gets the
    /// full prefix for its family.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (addr_str, prefix_str) = match s.split_once('/') {
            Some((a, p)) => (a.trim(), Some(p.trim())),
            None => (s, None),
        };

        let addr: IpAddr = addr_str
            .parse()
            .map_err(|e| Error::Malformed(format!("invalid IP address '{}': {}", addr_str, e)))?;

        let max_prefix = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };

        let cidr = match prefix_str {
            Some(p) => {
                let prefix: u8 = p.parse().map_err(|e| {
                    Error::Malformed(format!("invalid prefix length '{}': {}", p, e))
                })?;
                if prefix > max_prefix {
                    return Err(Error::Malformed(format!(
                        "prefix length {} exceeds maximum {} for {}",
                        prefix, max_prefix, addr
                    )));
                }
                prefix
            }
            None => max_prefix,
        };

        Ok(Self { addr, cidr })
    }
}

/// One peer of a WireGuard device, as reported by the kernel.
#[derive(Debug, Clone, Default)]
pub struct Peer {
    /// Peer's public key (identifies the peer). All-zero if the kernel
    /// omitted the attribute.
    pub public_key: Key,
    /// Optional preshared key.
    pub preshared_key: Option<Key>,
    /// Peer's endpoint (IP:port).
    pub endpoint: Option<SocketAddr>,
    /// Persistent keepalive interval in seconds (0 = disabled).
    pub persistent_keepalive: u16,
    /// Last successful handshake time. `None` means never.
    pub last_handshake: Option<SystemTime>,
    /// Bytes received from this peer.
    pub rx_bytes: u64,
    /// Bytes sent to this peer.
    pub tx_bytes: u64,
    /// Allowed IP ranges for this peer, in kernel order.
    pub allowed_ips: Vec<AllowedIp>,
}

impl Peer {
    /// Create a new peer with the given public key.
    pub fn new(public_key: Key) -> Self {
        Self {
            public_key,
            ..Default::default()
        }
    }

    /// Get the duration since last handshake.
    pub fn time_since_handshake(&self) -> Option<Duration> {
        self.last_handshake
            .and_then(|t| SystemTime::now().duration_since(t).ok())
    }
}

/// A WireGuard device: one tunnel interface and its peer configuration.
///
/// Constructed by the decoder; the interface name is the device's
/// identity. After a multi-message decode, peer public keys are unique
/// within `peers`.
#[derive(Debug, Clone, Default)]
pub struct Device {
    /// Interface name.
    pub name: String,
    /// Private key, if the kernel reported one.
    pub private_key: Option<Key>,
    /// Public key (derived from the private key).
    pub public_key: Option<Key>,
    /// UDP listen port (0 = kernel chooses).
    pub listen_port: u16,
    /// Firewall mark for outgoing packets (0 = off).
    pub fwmark: u32,
    /// Configured peers.
    pub peers: Vec<Peer>,
}

impl Device {
    /// Look up a peer by its public key.
    pub fn peer(&self, public_key: &Key) -> Option<&Peer> {
        self.peers.iter().find(|p| p.public_key == *public_key)
    }
}

/// Peer flags for SET_DEVICE operations.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerFlags {
    /// Remove this peer.
    RemoveMe = 1 << 0,
    /// Replace all allowed IPs (instead of adding).
    ReplaceAllowedIps = 1 << 1,
    /// Only update the peer if it already exists.
    UpdateOnly = 1 << 2,
}

/// Sparse device configuration for SET_DEVICE.
///
/// Every field is present-or-absent: only fields the caller sets are
/// encoded, so an explicit zero (say `fwmark(0)` to clear the mark) is
/// distinct from leaving the field alone.
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    pub(crate) private_key: Option<Key>,
    pub(crate) listen_port: Option<u16>,
    pub(crate) fwmark: Option<u32>,
    pub(crate) replace_peers: bool,
    pub(crate) peers: Vec<PeerConfig>,
}

impl DeviceConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the private key.
    pub fn private_key(mut self, key: Key) -> Self {
        self.private_key = Some(key);
        self
    }

    /// Set the listen port.
    pub fn listen_port(mut self, port: u16) -> Self {
        self.listen_port = Some(port);
        self
    }

    /// Set the firewall mark. Zero clears an existing mark.
    pub fn fwmark(mut self, mark: u32) -> Self {
        self.fwmark = Some(mark);
        self
    }

    /// Replace all existing peers (instead of merging).
    pub fn replace_peers(mut self) -> Self {
        self.replace_peers = true;
        self
    }

    /// Add a peer to configure.
    pub fn peer(mut self, peer: PeerConfig) -> Self {
        self.peers.push(peer);
        self
    }
}

/// Sparse peer configuration for SET_DEVICE.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub(crate) public_key: Key,
    pub(crate) preshared_key: Option<Key>,
    pub(crate) endpoint: Option<SocketAddr>,
    pub(crate) persistent_keepalive: Option<u16>,
    pub(crate) allowed_ips: Vec<AllowedIp>,
    pub(crate) flags: u32,
}

impl PeerConfig {
    /// Create a new peer configuration with the given public key.
    pub fn new(public_key: Key) -> Self {
        Self {
            public_key,
            preshared_key: None,
            endpoint: None,
            persistent_keepalive: None,
            allowed_ips: Vec::new(),
            flags: 0,
        }
    }

    /// Set the preshared key.
    pub fn preshared_key(mut self, key: Key) -> Self {
        self.preshared_key = Some(key);
        self
    }

    /// Set the endpoint address.
    pub fn endpoint(mut self, addr: SocketAddr) -> Self {
        self.endpoint = Some(addr);
        self
    }

    /// Set the persistent keepalive interval in seconds. Zero disables it.
    pub fn persistent_keepalive(mut self, interval: u16) -> Self {
        self.persistent_keepalive = Some(interval);
        self
    }

    /// Add an allowed IP range.
    pub fn allowed_ip(mut self, ip: AllowedIp) -> Self {
        self.allowed_ips.push(ip);
        self
    }

    /// Add multiple allowed IP ranges.
    pub fn allowed_ips(mut self, ips: impl IntoIterator<Item = AllowedIp>) -> Self {
        self.allowed_ips.extend(ips);
        self
    }

    /// Replace all existing allowed IPs instead of adding.
    pub fn replace_allowed_ips(mut self) -> Self {
        self.flags |= PeerFlags::ReplaceAllowedIps as u32;
        self
    }

    /// Only apply if the peer already exists.
    pub fn update_only(mut self) -> Self {
        self.flags |= PeerFlags::UpdateOnly as u32;
        self
    }

    /// Mark this peer for removal.
    pub fn remove(mut self) -> Self {
        self.flags |= PeerFlags::RemoveMe as u32;
        self
    }
}
