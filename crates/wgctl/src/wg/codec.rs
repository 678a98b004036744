//! WireGuard wire codec: attribute decoding, message merging, config encoding.
//!
//! Everything here is pure computation over caller-owned buffers: no I/O,
//! no shared state, safe to call from any thread. The decode side turns
//! one or more GET_DEVICE response payloads into a [`Device`]; the encode
//! side emits a sparse [`DeviceConfig`] as SET_DEVICE attributes.
//!
//! Kernel structs embedded in attribute payloads (sockaddr, timespec) are
//! unpacked field-by-field at fixed offsets; no layout casts.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::types::{AllowedIp, Device, DeviceConfig, Key, Peer, PeerConfig};
use super::{WgAllowedIpAttr, WgDeviceAttr, WgDeviceFlag, WgPeerAttr};
use crate::netlink::attr::{AttrIter, get};
use crate::netlink::{Error, MessageBuilder, Result};

/// Size of struct sockaddr_in: family (2), port (2), addr (4), zero (8).
pub const SOCKADDR_IN_LEN: usize = 16;

/// Size of struct sockaddr_in6: family (2), port (2), flowinfo (4),
/// addr (16), scope_id (4).
pub const SOCKADDR_IN6_LEN: usize = 28;

/// Size of struct timespec on the wire: seconds (i64), nanoseconds (i64).
pub const TIMESPEC_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Attribute-set walking
// ---------------------------------------------------------------------------

/// Walk one attribute set, dispatching each record by type code.
///
/// Unknown type codes must be ignored by the dispatch function (return
/// `Ok(())`): the protocol adds attributes over time and older clients
/// are expected to tolerate them. Structural errors from the walk itself
/// abort the decode.
fn walk_attrs(data: &[u8], mut dispatch: impl FnMut(u16, &[u8]) -> Result<()>) -> Result<()> {
    for result in AttrIter::new(data) {
        let (attr_type, payload) = result?;
        dispatch(attr_type, payload)?;
    }
    Ok(())
}

/// Walk a netlink "array" attribute payload.
///
/// Each element's own type code is positional and carries no meaning; the
/// element payload is a nested attribute set describing one record.
fn walk_array(data: &[u8], mut each: impl FnMut(&[u8]) -> Result<()>) -> Result<()> {
    for result in AttrIter::new(data) {
        let (_idx, element) = result?;
        each(element)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Primitive decoders
// ---------------------------------------------------------------------------

/// Parse a raw in_addr or in6_addr payload.
pub fn parse_ip(data: &[u8]) -> Result<IpAddr> {
    match data.len() {
        4 => Ok(IpAddr::V4(Ipv4Addr::new(data[0], data[1], data[2], data[3]))),
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(data);
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        n => Err(Error::InvalidLength {
            what: "IP address",
            actual: n,
        }),
    }
}

/// Parse kernel sockaddr_in / sockaddr_in6 bytes into a socket address.
///
/// The payload must be exactly the size of one of the two layouts, with a
/// matching family tag. The port travels in network byte order.
pub fn parse_sockaddr(data: &[u8]) -> Result<SocketAddr> {
    if data.len() != SOCKADDR_IN_LEN && data.len() != SOCKADDR_IN6_LEN {
        return Err(Error::InvalidLength {
            what: "sockaddr",
            actual: data.len(),
        });
    }

    let family = u16::from_ne_bytes([data[0], data[1]]);
    let port = u16::from_be_bytes([data[2], data[3]]);

    match (family as i32, data.len()) {
        (libc::AF_INET, SOCKADDR_IN_LEN) => {
            let ip = Ipv4Addr::new(data[4], data[5], data[6], data[7]);
            Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
        }
        (libc::AF_INET6, SOCKADDR_IN6_LEN) => {
            let flowinfo = u32::from_ne_bytes([data[4], data[5], data[6], data[7]]);
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&data[8..24]);
            let ip = Ipv6Addr::from(octets);
            let scope_id = u32::from_ne_bytes([data[24], data[25], data[26], data[27]]);
            Ok(SocketAddr::V6(SocketAddrV6::new(ip, port, flowinfo, scope_id)))
        }
        _ => Err(Error::Malformed(format!(
            "sockaddr family {} does not match length {}",
            family,
            data.len()
        ))),
    }
}

/// Serialize a socket address as kernel sockaddr bytes.
pub fn sockaddr_to_bytes(addr: &SocketAddr) -> Vec<u8> {
    match addr {
        SocketAddr::V4(v4) => {
            let mut buf = vec![0u8; SOCKADDR_IN_LEN];
            buf[0..2].copy_from_slice(&(libc::AF_INET as u16).to_ne_bytes());
            buf[2..4].copy_from_slice(&v4.port().to_be_bytes());
            buf[4..8].copy_from_slice(&v4.ip().octets());
            buf
        }
        SocketAddr::V6(v6) => {
            let mut buf = vec![0u8; SOCKADDR_IN6_LEN];
            buf[0..2].copy_from_slice(&(libc::AF_INET6 as u16).to_ne_bytes());
            buf[2..4].copy_from_slice(&v6.port().to_be_bytes());
            buf[4..8].copy_from_slice(&v6.flowinfo().to_ne_bytes());
            buf[8..24].copy_from_slice(&v6.ip().octets());
            buf[24..28].copy_from_slice(&v6.scope_id().to_ne_bytes());
            buf
        }
    }
}

/// Parse a timespec payload into a wall-clock time.
///
/// The zero timespec is the kernel's "no handshake yet" sentinel and
/// decodes to `None`.
pub fn parse_timespec(data: &[u8]) -> Result<Option<SystemTime>> {
    if data.len() != TIMESPEC_LEN {
        return Err(Error::InvalidLength {
            what: "timespec",
            actual: data.len(),
        });
    }

    let secs = i64::from_ne_bytes([
        data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
    ]);
    let nsecs = i64::from_ne_bytes([
        data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
    ]);

    if secs == 0 && nsecs == 0 {
        return Ok(None);
    }

    Ok(Some(
        UNIX_EPOCH + Duration::new(secs as u64, nsecs as u32),
    ))
}

// ---------------------------------------------------------------------------
// Device / peer / allowed-IP decoding
// ---------------------------------------------------------------------------

/// Parse one GET_DEVICE response payload (attribute set after the GENL
/// header) into a [`Device`].
///
/// One message yields one device, possibly with a partial peer list; see
/// [`device_from_messages`] for reassembly.
pub fn parse_device(data: &[u8]) -> Result<Device> {
    let mut device = Device::default();

    walk_attrs(data, |attr_type, payload| {
        match attr_type {
            t if t == WgDeviceAttr::Ifindex as u16 => {
                // Validated but not kept; the name is the device identity.
                get::u32_ne(payload)?;
            }
            t if t == WgDeviceAttr::Ifname as u16 => {
                device.name = get::string(payload)?.to_string();
            }
            t if t == WgDeviceAttr::PrivateKey as u16 => {
                device.private_key = Some(Key::from_slice(payload)?);
            }
            t if t == WgDeviceAttr::PublicKey as u16 => {
                device.public_key = Some(Key::from_slice(payload)?);
            }
            t if t == WgDeviceAttr::ListenPort as u16 => {
                device.listen_port = get::u16_ne(payload)?;
            }
            t if t == WgDeviceAttr::Fwmark as u16 => {
                device.fwmark = get::u32_ne(payload)?;
            }
            t if t == WgDeviceAttr::Peers as u16 => {
                walk_array(payload, |peer_data| {
                    device.peers.push(parse_peer(peer_data)?);
                    Ok(())
                })?;
            }
            _ => {}
        }
        Ok(())
    })?;

    Ok(device)
}

/// Parse a single peer's nested attribute set.
///
/// A peer without a public-key attribute decodes with the all-zero key
/// rather than failing; the caller decides what to make of it.
fn parse_peer(data: &[u8]) -> Result<Peer> {
    let mut peer = Peer::default();

    walk_attrs(data, |attr_type, payload| {
        match attr_type {
            t if t == WgPeerAttr::PublicKey as u16 => {
                peer.public_key = Key::from_slice(payload)?;
            }
            t if t == WgPeerAttr::PresharedKey as u16 => {
                let key = Key::from_slice(payload)?;
                // The kernel sends all zeroes when no preshared key is set.
                if !key.is_zero() {
                    peer.preshared_key = Some(key);
                }
            }
            t if t == WgPeerAttr::Endpoint as u16 => {
                peer.endpoint = Some(parse_sockaddr(payload)?);
            }
            t if t == WgPeerAttr::PersistentKeepalive as u16 => {
                peer.persistent_keepalive = get::u16_ne(payload)?;
            }
            t if t == WgPeerAttr::LastHandshake as u16 => {
                peer.last_handshake = parse_timespec(payload)?;
            }
            t if t == WgPeerAttr::RxBytes as u16 => {
                peer.rx_bytes = get::u64_ne(payload)?;
            }
            t if t == WgPeerAttr::TxBytes as u16 => {
                peer.tx_bytes = get::u64_ne(payload)?;
            }
            t if t == WgPeerAttr::AllowedIps as u16 => {
                walk_array(payload, |ip_data| {
                    if let Some(ip) = parse_allowed_ip(ip_data)? {
                        peer.allowed_ips.push(ip);
                    }
                    Ok(())
                })?;
            }
            _ => {}
        }
        Ok(())
    })?;

    Ok(peer)
}

/// Parse a single allowed-IP nested attribute set.
///
/// An element missing any of its three attributes is skipped (`None`):
/// there is nothing meaningful to build from it.
fn parse_allowed_ip(data: &[u8]) -> Result<Option<AllowedIp>> {
    let mut family: Option<u16> = None;
    let mut addr: Option<IpAddr> = None;
    let mut cidr: Option<u8> = None;

    walk_attrs(data, |attr_type, payload| {
        match attr_type {
            t if t == WgAllowedIpAttr::Family as u16 => {
                family = Some(get::u16_ne(payload)?);
            }
            t if t == WgAllowedIpAttr::IpAddr as u16 => {
                addr = Some(parse_ip(payload)?);
            }
            t if t == WgAllowedIpAttr::CidrMask as u16 => {
                cidr = Some(get::u8(payload)?);
            }
            _ => {}
        }
        Ok(())
    })?;

    let (family, addr, cidr) = match (family, addr, cidr) {
        (Some(f), Some(a), Some(c)) => (f, a, c),
        _ => return Ok(None),
    };

    // The family attribute must agree with the address payload size.
    match (family as i32, addr) {
        (libc::AF_INET, IpAddr::V4(_)) | (libc::AF_INET6, IpAddr::V6(_)) => {}
        _ => return Ok(None),
    }

    // The prefix length is bounded by the address family.
    let max_prefix = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    if cidr > max_prefix {
        return Ok(None);
    }

    Ok(Some(AllowedIp { addr, cidr }))
}

// ---------------------------------------------------------------------------
// Multi-message reassembly
// ---------------------------------------------------------------------------

/// Decode a full device from one or more GET_DEVICE response payloads.
///
/// A device whose peer list (with all allowed IPs) exceeds one message's
/// capacity is dumped as several messages. The first message is the
/// target, authoritative for all non-peer fields; peers from subsequent
/// messages are folded in with [`merge_device`].
pub fn device_from_messages<B: AsRef<[u8]>>(msgs: &[B]) -> Result<Device> {
    let mut iter = msgs.iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::Malformed("empty device response".into()))?;

    let mut device = parse_device(first.as_ref())?;
    for msg in iter {
        let aux = parse_device(msg.as_ref())?;
        merge_device(&mut device, aux);
    }

    Ok(device)
}

/// Fold one continuation message's peers into the target device.
///
/// For every auxiliary peer: if its public key matches a peer already in
/// the target before this fold, its allowed IPs are appended to that peer
/// (a large allowed-IP set is split across messages this way); otherwise
/// it is appended as a new peer, at most once per fold. Matching is
/// against the pre-fold target list only, so allowed-IP continuation for
/// a peer introduced *within the same fold* is best-effort — continuation
/// in a later message attaches normally, since by then the peer is part
/// of the target.
pub fn merge_device(target: &mut Device, aux: Device) {
    // Peers present in the target before this fold.
    let before = target.peers.len();
    let mut known: HashSet<Key> = target.peers.iter().map(|p| p.public_key).collect();

    for aux_peer in aux.peers {
        if let Some(existing) = target.peers[..before]
            .iter_mut()
            .find(|p| p.public_key == aux_peer.public_key)
        {
            existing.allowed_ips.extend(aux_peer.allowed_ips);
            continue;
        }

        if known.contains(&aux_peer.public_key) {
            continue;
        }

        known.insert(aux_peer.public_key);
        target.peers.push(aux_peer);
    }
}

// ---------------------------------------------------------------------------
// Config encoding
// ---------------------------------------------------------------------------

/// Append SET_DEVICE attributes for a sparse device configuration.
///
/// The interface name is always emitted; beyond that, exactly the fields
/// the configuration sets. Nothing is dropped silently: every builder
/// field has an encoding.
pub fn append_device(builder: &mut MessageBuilder, ifname: &str, config: &DeviceConfig) {
    builder.append_attr_str(WgDeviceAttr::Ifname as u16, ifname);

    if config.replace_peers {
        builder.append_attr_u32(
            WgDeviceAttr::Flags as u16,
            WgDeviceFlag::ReplacePeers as u32,
        );
    }

    if let Some(key) = &config.private_key {
        builder.append_attr(WgDeviceAttr::PrivateKey as u16, key.as_bytes());
    }

    if let Some(port) = config.listen_port {
        builder.append_attr_u16(WgDeviceAttr::ListenPort as u16, port);
    }

    if let Some(mark) = config.fwmark {
        builder.append_attr_u32(WgDeviceAttr::Fwmark as u16, mark);
    }

    if !config.peers.is_empty() {
        let peers_token = builder.nest_start(WgDeviceAttr::Peers as u16);
        for (idx, peer) in config.peers.iter().enumerate() {
            append_peer(builder, idx as u16, peer);
        }
        builder.nest_end(peers_token);
    }
}

/// Append one peer's nested attribute set.
fn append_peer(builder: &mut MessageBuilder, idx: u16, peer: &PeerConfig) {
    let peer_token = builder.nest_start(idx);

    builder.append_attr(WgPeerAttr::PublicKey as u16, peer.public_key.as_bytes());

    if peer.flags != 0 {
        builder.append_attr_u32(WgPeerAttr::Flags as u16, peer.flags);
    }

    if let Some(psk) = &peer.preshared_key {
        builder.append_attr(WgPeerAttr::PresharedKey as u16, psk.as_bytes());
    }

    if let Some(endpoint) = &peer.endpoint {
        builder.append_attr(WgPeerAttr::Endpoint as u16, &sockaddr_to_bytes(endpoint));
    }

    if let Some(interval) = peer.persistent_keepalive {
        builder.append_attr_u16(WgPeerAttr::PersistentKeepalive as u16, interval);
    }

    if !peer.allowed_ips.is_empty() {
        let ips_token = builder.nest_start(WgPeerAttr::AllowedIps as u16);
        for (ip_idx, allowed_ip) in peer.allowed_ips.iter().enumerate() {
            let ip_token = builder.nest_start(ip_idx as u16);
            builder.append_attr_u16(WgAllowedIpAttr::Family as u16, allowed_ip.family());
            builder.append_attr(WgAllowedIpAttr::IpAddr as u16, &allowed_ip.addr_bytes());
            builder.append_attr_u8(WgAllowedIpAttr::CidrMask as u16, allowed_ip.cidr);
            builder.nest_end(ip_token);
        }
        builder.nest_end(ips_token);
    }

    builder.nest_end(peer_token);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::{NLA_F_NESTED, NLA_HDRLEN, NlAttr, nla_align};
    use crate::netlink::message::NLMSG_HDRLEN;
    use crate::wg::PeerFlags;

    // Build an attribute payload (no netlink header) with the builder.
    fn build_attrs(f: impl FnOnce(&mut MessageBuilder)) -> Vec<u8> {
        let mut builder = MessageBuilder::new(0, 0);
        f(&mut builder);
        builder.finish()[NLMSG_HDRLEN..].to_vec()
    }

    fn raw_attr(attr_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = NlAttr::new(attr_type, payload.len()).as_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf.resize(nla_align(buf.len()), 0);
        buf
    }

    fn sockaddr_v4(ip: [u8; 4], port: u16) -> Vec<u8> {
        // struct sockaddr_in: family, port (network order), addr, zero padding
        let mut buf = vec![0u8; SOCKADDR_IN_LEN];
        buf[0..2].copy_from_slice(&(libc::AF_INET as u16).to_ne_bytes());
        buf[2..4].copy_from_slice(&port.to_be_bytes());
        buf[4..8].copy_from_slice(&ip);
        buf
    }

    // A device message with one peer carrying the given allowed IPs.
    fn device_message(name: &str, peers: &[(Key, &[AllowedIp])]) -> Vec<u8> {
        build_attrs(|b| {
            b.append_attr_u32(WgDeviceAttr::Ifindex as u16, 7);
            b.append_attr_str(WgDeviceAttr::Ifname as u16, name);
            b.append_attr_u16(WgDeviceAttr::ListenPort as u16, 51820);
            let peers_token = b.nest_start(WgDeviceAttr::Peers as u16);
            for (idx, (key, ips)) in peers.iter().enumerate() {
                let peer_token = b.nest_start(idx as u16);
                b.append_attr(WgPeerAttr::PublicKey as u16, key.as_bytes());
                if !ips.is_empty() {
                    let ips_token = b.nest_start(WgPeerAttr::AllowedIps as u16);
                    for (ip_idx, ip) in ips.iter().enumerate() {
                        let ip_token = b.nest_start(ip_idx as u16);
                        b.append_attr_u16(WgAllowedIpAttr::Family as u16, ip.family());
                        b.append_attr(WgAllowedIpAttr::IpAddr as u16, &ip.addr_bytes());
                        b.append_attr_u8(WgAllowedIpAttr::CidrMask as u16, ip.cidr);
                        b.nest_end(ip_token);
                    }
                    b.nest_end(ips_token);
                }
                b.nest_end(peer_token);
            }
            b.nest_end(peers_token);
        })
    }

    #[test]
    fn test_parse_ip() {
        assert_eq!(
            parse_ip(&[10, 0, 0, 1]).unwrap(),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(parse_ip(&[0u8; 16]).unwrap(), IpAddr::V6(Ipv6Addr::UNSPECIFIED));
        assert!(matches!(
            parse_ip(&[1, 2, 3]).unwrap_err(),
            Error::InvalidLength { actual: 3, .. }
        ));
        assert!(parse_ip(&[0u8; 5]).is_err());
    }

    #[test]
    fn test_parse_sockaddr_v4() {
        let data = sockaddr_v4([192, 168, 1, 1], 51820);
        let addr = parse_sockaddr(&data).unwrap();
        assert_eq!(
            addr,
            SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 51820))
        );
    }

    #[test]
    fn test_parse_sockaddr_wrong_size() {
        // One byte short of sockaddr_in.
        let err = parse_sockaddr(&vec![0u8; SOCKADDR_IN_LEN - 1]).unwrap_err();
        assert!(matches!(err, Error::InvalidLength { actual: 15, .. }));
        assert!(parse_sockaddr(&vec![0u8; SOCKADDR_IN_LEN + 1]).is_err());
        assert!(parse_sockaddr(&[]).is_err());
    }

    #[test]
    fn test_parse_sockaddr_family_mismatch() {
        // v4 length with an AF_INET6 family tag.
        let mut data = sockaddr_v4([1, 2, 3, 4], 80);
        data[0..2].copy_from_slice(&(libc::AF_INET6 as u16).to_ne_bytes());
        assert!(matches!(
            parse_sockaddr(&data).unwrap_err(),
            Error::Malformed(_)
        ));
    }

    #[test]
    fn test_sockaddr_v6_roundtrip() {
        let addr = SocketAddr::V6(SocketAddrV6::new(
            Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1),
            51820,
            0,
            3,
        ));
        let bytes = sockaddr_to_bytes(&addr);
        assert_eq!(bytes.len(), SOCKADDR_IN6_LEN);
        assert_eq!(parse_sockaddr(&bytes).unwrap(), addr);
    }

    #[test]
    fn test_sockaddr_v4_roundtrip() {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 51820));
        let bytes = sockaddr_to_bytes(&addr);
        assert_eq!(bytes.len(), SOCKADDR_IN_LEN);
        assert_eq!(parse_sockaddr(&bytes).unwrap(), addr);
    }

    #[test]
    fn test_parse_timespec() {
        // Zero timespec is the "never" sentinel, not an error.
        assert_eq!(parse_timespec(&[0u8; TIMESPEC_LEN]).unwrap(), None);

        // 2021-01-01 00:00:00 UTC plus 500ns.
        let mut data = [0u8; TIMESPEC_LEN];
        data[0..8].copy_from_slice(&1609459200i64.to_ne_bytes());
        data[8..16].copy_from_slice(&500i64.to_ne_bytes());
        let time = parse_timespec(&data).unwrap().unwrap();
        assert_eq!(time, UNIX_EPOCH + Duration::new(1609459200, 500));

        assert!(matches!(
            parse_timespec(&[0u8; 8]).unwrap_err(),
            Error::InvalidLength { actual: 8, .. }
        ));
    }

    #[test]
    fn test_parse_device_basic() {
        let private = Key::new([1u8; 32]);
        let public = Key::new([2u8; 32]);
        let data = build_attrs(|b| {
            b.append_attr_u32(WgDeviceAttr::Ifindex as u16, 3);
            b.append_attr_str(WgDeviceAttr::Ifname as u16, "wg0");
            b.append_attr(WgDeviceAttr::PrivateKey as u16, private.as_bytes());
            b.append_attr(WgDeviceAttr::PublicKey as u16, public.as_bytes());
            b.append_attr_u16(WgDeviceAttr::ListenPort as u16, 51820);
            b.append_attr_u32(WgDeviceAttr::Fwmark as u16, 0x51);
        });

        let device = parse_device(&data).unwrap();
        assert_eq!(device.name, "wg0");
        assert_eq!(device.private_key, Some(private));
        assert_eq!(device.public_key, Some(public));
        assert_eq!(device.listen_port, 51820);
        assert_eq!(device.fwmark, 0x51);
        assert!(device.peers.is_empty());
    }

    #[test]
    fn test_parse_device_unknown_attr_tolerated() {
        // An unrecognized type code between two known attributes is skipped.
        let mut data = raw_attr(WgDeviceAttr::Ifname as u16, b"wg0\0");
        data.extend_from_slice(&raw_attr(0x4242, &[1, 2, 3, 4, 5]));
        data.extend_from_slice(&raw_attr(
            WgDeviceAttr::ListenPort as u16,
            &51820u16.to_ne_bytes(),
        ));

        let device = parse_device(&data).unwrap();
        assert_eq!(device.name, "wg0");
        assert_eq!(device.listen_port, 51820);
    }

    #[test]
    fn test_parse_device_truncated_attr_fails() {
        let mut data = raw_attr(WgDeviceAttr::Ifname as u16, b"wg0\0");
        // Header declares 40 bytes; only the 4-byte header is present.
        data.extend_from_slice(&[40, 0, WgDeviceAttr::PrivateKey as u8, 0]);

        let err = parse_device(&data).unwrap_err();
        assert!(matches!(err, Error::Truncated { expected: 40, .. }));
    }

    #[test]
    fn test_parse_device_bad_key_length_fails() {
        let data = raw_attr(WgDeviceAttr::PrivateKey as u16, &[0u8; 31]);
        let err = parse_device(&data).unwrap_err();
        assert!(matches!(err, Error::InvalidLength { actual: 31, .. }));
    }

    #[test]
    fn test_parse_peer_full() {
        let key = Key::new([9u8; 32]);
        let psk = Key::new([8u8; 32]);
        let mut handshake = [0u8; TIMESPEC_LEN];
        handshake[0..8].copy_from_slice(&1700000000i64.to_ne_bytes());

        let data = build_attrs(|b| {
            let peers = b.nest_start(WgDeviceAttr::Peers as u16);
            let peer = b.nest_start(0);
            b.append_attr(WgPeerAttr::PublicKey as u16, key.as_bytes());
            b.append_attr(WgPeerAttr::PresharedKey as u16, psk.as_bytes());
            b.append_attr(WgPeerAttr::Endpoint as u16, &sockaddr_v4([10, 1, 2, 3], 1234));
            b.append_attr_u16(WgPeerAttr::PersistentKeepalive as u16, 25);
            b.append_attr(WgPeerAttr::LastHandshake as u16, &handshake);
            b.append_attr(WgPeerAttr::RxBytes as u16, &100u64.to_ne_bytes());
            b.append_attr(WgPeerAttr::TxBytes as u16, &200u64.to_ne_bytes());
            // Protocol version is not modeled; it must be skipped, not fail.
            b.append_attr_u32(WgPeerAttr::ProtocolVersion as u16, 1);
            b.nest_end(peer);
            b.nest_end(peers);
        });

        let device = parse_device(&data).unwrap();
        assert_eq!(device.peers.len(), 1);
        let peer = &device.peers[0];
        assert_eq!(peer.public_key, key);
        assert_eq!(peer.preshared_key, Some(psk));
        assert_eq!(
            peer.endpoint,
            Some(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::new(10, 1, 2, 3),
                1234
            )))
        );
        assert_eq!(peer.persistent_keepalive, 25);
        assert_eq!(
            peer.last_handshake,
            Some(UNIX_EPOCH + Duration::from_secs(1700000000))
        );
        assert_eq!(peer.rx_bytes, 100);
        assert_eq!(peer.tx_bytes, 200);
    }

    #[test]
    fn test_parse_peer_zero_psk_is_unset() {
        let data = build_attrs(|b| {
            let peers = b.nest_start(WgDeviceAttr::Peers as u16);
            let peer = b.nest_start(0);
            b.append_attr(WgPeerAttr::PublicKey as u16, &[1u8; 32]);
            b.append_attr(WgPeerAttr::PresharedKey as u16, &[0u8; 32]);
            b.nest_end(peer);
            b.nest_end(peers);
        });

        let device = parse_device(&data).unwrap();
        assert_eq!(device.peers[0].preshared_key, None);
    }

    #[test]
    fn test_parse_peer_missing_public_key() {
        // A peer with no public-key attribute still decodes, with the
        // all-zero key.
        let data = build_attrs(|b| {
            let peers = b.nest_start(WgDeviceAttr::Peers as u16);
            let peer = b.nest_start(0);
            b.append_attr_u16(WgPeerAttr::PersistentKeepalive as u16, 10);
            b.nest_end(peer);
            b.nest_end(peers);
        });

        let device = parse_device(&data).unwrap();
        assert_eq!(device.peers.len(), 1);
        assert!(device.peers[0].public_key.is_zero());
        assert_eq!(device.peers[0].persistent_keepalive, 10);
    }

    #[test]
    fn test_parse_peer_unknown_attr_tolerated() {
        let data = build_attrs(|b| {
            let peers = b.nest_start(WgDeviceAttr::Peers as u16);
            let peer = b.nest_start(0);
            b.append_attr(WgPeerAttr::PublicKey as u16, &[5u8; 32]);
            b.append_attr(0x7777, &[0xde, 0xad]);
            b.append_attr_u16(WgPeerAttr::PersistentKeepalive as u16, 15);
            b.nest_end(peer);
            b.nest_end(peers);
        });

        let device = parse_device(&data).unwrap();
        assert_eq!(device.peers[0].persistent_keepalive, 15);
    }

    #[test]
    fn test_parse_allowed_ips() {
        let key = Key::new([3u8; 32]);
        let ips = [
            AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 0), 24),
            AllowedIp::v6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 0), 64),
        ];
        let data = device_message("wg0", &[(key, &ips)]);

        let device = parse_device(&data).unwrap();
        assert_eq!(device.peers[0].allowed_ips, ips.to_vec());
    }

    #[test]
    fn test_parse_allowed_ip_unknown_attr_tolerated() {
        let data = build_attrs(|b| {
            let peers = b.nest_start(WgDeviceAttr::Peers as u16);
            let peer = b.nest_start(0);
            b.append_attr(WgPeerAttr::PublicKey as u16, &[3u8; 32]);
            let ips = b.nest_start(WgPeerAttr::AllowedIps as u16);
            let ip = b.nest_start(0);
            b.append_attr_u16(WgAllowedIpAttr::Family as u16, libc::AF_INET as u16);
            b.append_attr(WgAllowedIpAttr::IpAddr as u16, &[10, 0, 0, 1]);
            b.append_attr(0x5555, &[9, 9, 9, 9]);
            b.append_attr_u8(WgAllowedIpAttr::CidrMask as u16, 32);
            b.nest_end(ip);
            b.nest_end(ips);
            b.nest_end(peer);
            b.nest_end(peers);
        });

        let device = parse_device(&data).unwrap();
        assert_eq!(
            device.peers[0].allowed_ips,
            vec![AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 1), 32)]
        );
    }

    #[test]
    fn test_parse_allowed_ip_out_of_range_prefix_skipped() {
        // A v4 element claiming prefix length 200 is dropped, like the
        // family-mismatch case; the decode itself succeeds.
        let data = build_attrs(|b| {
            let peers = b.nest_start(WgDeviceAttr::Peers as u16);
            let peer = b.nest_start(0);
            b.append_attr(WgPeerAttr::PublicKey as u16, &[3u8; 32]);
            let ips = b.nest_start(WgPeerAttr::AllowedIps as u16);
            let bad = b.nest_start(0);
            b.append_attr_u16(WgAllowedIpAttr::Family as u16, libc::AF_INET as u16);
            b.append_attr(WgAllowedIpAttr::IpAddr as u16, &[10, 0, 0, 1]);
            b.append_attr_u8(WgAllowedIpAttr::CidrMask as u16, 200);
            b.nest_end(bad);
            let good = b.nest_start(1);
            b.append_attr_u16(WgAllowedIpAttr::Family as u16, libc::AF_INET as u16);
            b.append_attr(WgAllowedIpAttr::IpAddr as u16, &[10, 0, 0, 2]);
            b.append_attr_u8(WgAllowedIpAttr::CidrMask as u16, 32);
            b.nest_end(good);
            b.nest_end(ips);
            b.nest_end(peer);
            b.nest_end(peers);
        });

        let device = parse_device(&data).unwrap();
        assert_eq!(
            device.peers[0].allowed_ips,
            vec![AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 2), 32)]
        );

        // /128 is valid for v6 but not v4.
        let v6_only = build_attrs(|b| {
            let peers = b.nest_start(WgDeviceAttr::Peers as u16);
            let peer = b.nest_start(0);
            b.append_attr(WgPeerAttr::PublicKey as u16, &[3u8; 32]);
            let ips = b.nest_start(WgPeerAttr::AllowedIps as u16);
            let ip = b.nest_start(0);
            b.append_attr_u16(WgAllowedIpAttr::Family as u16, libc::AF_INET as u16);
            b.append_attr(WgAllowedIpAttr::IpAddr as u16, &[10, 0, 0, 1]);
            b.append_attr_u8(WgAllowedIpAttr::CidrMask as u16, 128);
            b.nest_end(ip);
            b.nest_end(ips);
            b.nest_end(peer);
            b.nest_end(peers);
        });
        let device = parse_device(&v6_only).unwrap();
        assert!(device.peers[0].allowed_ips.is_empty());
    }

    #[test]
    fn test_parse_allowed_ip_incomplete_skipped() {
        // Family + address but no CIDR mask: the element is dropped, the
        // decode succeeds.
        let data = build_attrs(|b| {
            let peers = b.nest_start(WgDeviceAttr::Peers as u16);
            let peer = b.nest_start(0);
            b.append_attr(WgPeerAttr::PublicKey as u16, &[3u8; 32]);
            let ips = b.nest_start(WgPeerAttr::AllowedIps as u16);
            let ip = b.nest_start(0);
            b.append_attr_u16(WgAllowedIpAttr::Family as u16, libc::AF_INET as u16);
            b.append_attr(WgAllowedIpAttr::IpAddr as u16, &[10, 0, 0, 1]);
            b.nest_end(ip);
            b.nest_end(ips);
            b.nest_end(peer);
            b.nest_end(peers);
        });

        let device = parse_device(&data).unwrap();
        assert!(device.peers[0].allowed_ips.is_empty());
    }

    #[test]
    fn test_merge_no_continuation_is_identity() {
        let key = Key::new([1u8; 32]);
        let ips = [AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 0), 24)];
        let msg = device_message("wg0", &[(key, &ips)]);

        let alone = parse_device(&msg).unwrap();
        let merged = device_from_messages(&[msg]).unwrap();

        assert_eq!(merged.name, alone.name);
        assert_eq!(merged.peers.len(), alone.peers.len());
        assert_eq!(merged.peers[0].public_key, alone.peers[0].public_key);
        assert_eq!(merged.peers[0].allowed_ips, alone.peers[0].allowed_ips);
    }

    #[test]
    fn test_merge_union() {
        let key_a = Key::new([0xaa; 32]);
        let key_b = Key::new([0xbb; 32]);
        let key_c = Key::new([0xcc; 32]);

        let a_ips = [AllowedIp::v4(Ipv4Addr::new(192, 168, 0, 0), 16)];
        let b_ips = [AllowedIp::v4(Ipv4Addr::new(172, 16, 0, 0), 12)];
        let a_more = [AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 1), 32)];
        let c_ips = [AllowedIp::v6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 0), 48)];

        let first = device_message("wg0", &[(key_a, &a_ips), (key_b, &b_ips)]);
        let second = device_message("wg0", &[(key_a, &a_more), (key_c, &c_ips)]);

        let device = device_from_messages(&[first, second]).unwrap();

        // Order preserved: original peers first, new peer appended.
        assert_eq!(device.peers.len(), 3);
        assert_eq!(device.peers[0].public_key, key_a);
        assert_eq!(device.peers[1].public_key, key_b);
        assert_eq!(device.peers[2].public_key, key_c);

        // A's allowed IPs are the concatenation across messages.
        assert_eq!(device.peers[0].allowed_ips, vec![a_ips[0], a_more[0]]);
        assert_eq!(device.peers[1].allowed_ips, b_ips.to_vec());
        assert_eq!(device.peers[2].allowed_ips, c_ips.to_vec());
    }

    #[test]
    fn test_merge_continuation_of_new_peer_across_messages() {
        // Peer C first appears in message 2; message 3 continues its
        // allowed IPs. By then C is part of the target, so the
        // continuation attaches.
        let key_a = Key::new([0xaa; 32]);
        let key_c = Key::new([0xcc; 32]);

        let c_first = [AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 0), 24)];
        let c_more = [AllowedIp::v4(Ipv4Addr::new(10, 0, 1, 0), 24)];

        let msgs = vec![
            device_message("wg0", &[(key_a, &[])]),
            device_message("wg0", &[(key_c, &c_first)]),
            device_message("wg0", &[(key_c, &c_more)]),
        ];

        let device = device_from_messages(&msgs).unwrap();
        assert_eq!(device.peers.len(), 2);
        assert_eq!(device.peers[1].public_key, key_c);
        assert_eq!(device.peers[1].allowed_ips, vec![c_first[0], c_more[0]]);
    }

    #[test]
    fn test_merge_duplicate_new_peer_within_one_message() {
        // The same new key twice in one continuation: the second
        // occurrence is dropped (single pass against the pre-fold target).
        let key_a = Key::new([0xaa; 32]);
        let key_c = Key::new([0xcc; 32]);

        let c_first = [AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 0), 24)];
        let c_dup = [AllowedIp::v4(Ipv4Addr::new(10, 0, 1, 0), 24)];

        let msgs = vec![
            device_message("wg0", &[(key_a, &[])]),
            device_message("wg0", &[(key_c, &c_first), (key_c, &c_dup)]),
        ];

        let device = device_from_messages(&msgs).unwrap();
        assert_eq!(device.peers.len(), 2);
        assert_eq!(device.peers[1].allowed_ips, c_first.to_vec());
    }

    #[test]
    fn test_merge_empty_target_peer_list() {
        let key_a = Key::new([0xaa; 32]);
        let ips = [AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 0), 24)];

        let msgs = vec![
            device_message("wg0", &[]),
            device_message("wg0", &[(key_a, &ips)]),
        ];

        let device = device_from_messages(&msgs).unwrap();
        assert_eq!(device.peers.len(), 1);
        assert_eq!(device.peers[0].public_key, key_a);
    }

    #[test]
    fn test_merge_keeps_target_fields() {
        // Non-peer fields come from the first message only.
        let first = build_attrs(|b| {
            b.append_attr_str(WgDeviceAttr::Ifname as u16, "wg0");
            b.append_attr_u16(WgDeviceAttr::ListenPort as u16, 51820);
        });
        let second = build_attrs(|b| {
            b.append_attr_str(WgDeviceAttr::Ifname as u16, "wg0");
            b.append_attr_u16(WgDeviceAttr::ListenPort as u16, 0);
        });

        let device = device_from_messages(&[first, second]).unwrap();
        assert_eq!(device.listen_port, 51820);
    }

    #[test]
    fn test_device_from_no_messages_fails() {
        let msgs: Vec<Vec<u8>> = Vec::new();
        assert!(device_from_messages(&msgs).is_err());
    }

    #[test]
    fn test_encode_minimal_config() {
        // Only the interface name for an empty config.
        let data = build_attrs(|b| append_device(b, "wg0", &DeviceConfig::new()));

        let attrs: Vec<_> = AttrIter::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].0, WgDeviceAttr::Ifname as u16);
        assert_eq!(attrs[0].1, b"wg0\0");
    }

    #[test]
    fn test_encode_private_key_roundtrip() {
        let key = Key::new([0x42; 32]);
        let config = DeviceConfig::new().private_key(key);
        let data = build_attrs(|b| append_device(b, "wg0", &config));

        // Decoding the encoded attribute set as a device message yields
        // the same key bytes.
        let device = parse_device(&data).unwrap();
        assert_eq!(device.name, "wg0");
        assert_eq!(device.private_key, Some(key));
    }

    #[test]
    fn test_encode_explicit_zero_fwmark() {
        // fwmark(0) is an explicit value and must be emitted; an unset
        // listen port must not be.
        let config = DeviceConfig::new().fwmark(0);
        let data = build_attrs(|b| append_device(b, "wg0", &config));

        let types: Vec<u16> = AttrIter::new(&data)
            .map(|r| r.unwrap().0)
            .collect();
        assert!(types.contains(&(WgDeviceAttr::Fwmark as u16)));
        assert!(!types.contains(&(WgDeviceAttr::ListenPort as u16)));
    }

    #[test]
    fn test_encode_full_config_decodes_back() {
        let private = Key::new([1u8; 32]);
        let peer_key = Key::new([2u8; 32]);
        let psk = Key::new([3u8; 32]);
        let endpoint = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 5), 51820));
        let ips = [
            AllowedIp::v4(Ipv4Addr::new(10, 0, 0, 0), 24),
            AllowedIp::v6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 0), 64),
        ];

        let config = DeviceConfig::new()
            .private_key(private)
            .listen_port(51820)
            .fwmark(0x51)
            .replace_peers()
            .peer(
                PeerConfig::new(peer_key)
                    .preshared_key(psk)
                    .endpoint(endpoint)
                    .persistent_keepalive(25)
                    .allowed_ips(ips),
            );

        let data = build_attrs(|b| append_device(b, "wg0", &config));
        let device = parse_device(&data).unwrap();

        assert_eq!(device.name, "wg0");
        assert_eq!(device.private_key, Some(private));
        assert_eq!(device.listen_port, 51820);
        assert_eq!(device.fwmark, 0x51);
        assert_eq!(device.peers.len(), 1);

        let peer = &device.peers[0];
        assert_eq!(peer.public_key, peer_key);
        assert_eq!(peer.preshared_key, Some(psk));
        assert_eq!(peer.endpoint, Some(endpoint));
        assert_eq!(peer.persistent_keepalive, 25);
        assert_eq!(peer.allowed_ips, ips.to_vec());
    }

    #[test]
    fn test_encode_peer_flags() {
        let peer_key = Key::new([2u8; 32]);
        let config = DeviceConfig::new().peer(PeerConfig::new(peer_key).remove());
        let data = build_attrs(|b| append_device(b, "wg0", &config));

        // Dig out the peer element and check its flags attribute.
        let mut flags = None;
        for result in AttrIter::new(&data) {
            let (attr_type, payload) = result.unwrap();
            if attr_type == WgDeviceAttr::Peers as u16 {
                walk_array(payload, |peer_data| {
                    walk_attrs(peer_data, |t, p| {
                        if t == WgPeerAttr::Flags as u16 {
                            flags = Some(get::u32_ne(p)?);
                        }
                        Ok(())
                    })
                })
                .unwrap();
            }
        }
        assert_eq!(flags, Some(PeerFlags::RemoveMe as u32));
    }

    #[test]
    fn test_encode_nested_flag_set() {
        // Array attributes carry NLA_F_NESTED on the wire.
        let config = DeviceConfig::new().peer(PeerConfig::new(Key::new([2u8; 32])));
        let data = build_attrs(|b| append_device(b, "wg0", &config));

        // Read the raw headers without masking.
        let mut offset = 0;
        let mut found_nested = false;
        while offset + NLA_HDRLEN <= data.len() {
            let attr = NlAttr::from_bytes(&data[offset..]).unwrap();
            if attr.kind() == WgDeviceAttr::Peers as u16 {
                assert!(attr.nla_type & NLA_F_NESTED != 0);
                found_nested = true;
            }
            offset += nla_align(attr.nla_len as usize);
        }
        assert!(found_nested);
    }
}
