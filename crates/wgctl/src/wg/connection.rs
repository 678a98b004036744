//! WireGuard connection for device queries and configuration.

use tracing::debug;

use super::codec;
use super::types::{Device, DeviceConfig, Key, PeerConfig};
use super::{WG_GENL_NAME, WG_GENL_VERSION, WgCmd, WgDeviceAttr};
use crate::netlink::genl::{GENL_HDRLEN, GenlConnection};
use crate::netlink::{Error, MessageBuilder, Result};
use crate::util::ifname;

/// Connection for managing WireGuard interfaces.
///
/// Wraps a Generic Netlink connection and speaks the WireGuard family's
/// two commands: device queries (GET_DEVICE dumps, reassembled with the
/// codec's merge) and sparse configuration updates (SET_DEVICE).
pub struct WgConnection {
    genl: GenlConnection,
    family_id: u16,
}

impl WgConnection {
    /// Create a new WireGuard connection.
    ///
    /// Resolves the WireGuard GENL family ID, so this fails up front on
    /// kernels without the WireGuard module.
    pub async fn new() -> Result<Self> {
        let genl = GenlConnection::new()?;
        Self::from_genl(genl).await
    }

    /// Create a WireGuard connection from an existing GENL connection.
    pub async fn from_genl(genl: GenlConnection) -> Result<Self> {
        let family_id = genl.get_family_id(WG_GENL_NAME).await?;
        Ok(Self { genl, family_id })
    }

    /// Get the underlying GENL connection.
    pub fn genl(&self) -> &GenlConnection {
        &self.genl
    }

    /// Get a device's full configuration and status by interface name.
    pub async fn get_device(&self, ifname: &str) -> Result<Device> {
        if ifname.is_empty() {
            return Err(Error::UnknownIdentity);
        }
        self.query_device(ifname, |builder| {
            builder.append_attr_str(WgDeviceAttr::Ifname as u16, ifname);
        })
        .await
    }

    /// Get a device's full configuration and status by interface index.
    pub async fn get_device_by_index(&self, index: u32) -> Result<Device> {
        if index == 0 {
            return Err(Error::UnknownIdentity);
        }
        self.query_device(&format!("ifindex {}", index), |builder| {
            builder.append_attr_u32(WgDeviceAttr::Ifindex as u16, index);
        })
        .await
    }

    /// Run a GET_DEVICE dump and reassemble the response messages.
    async fn query_device(
        &self,
        identity: &str,
        build_attrs: impl FnOnce(&mut MessageBuilder),
    ) -> Result<Device> {
        let responses = self
            .genl
            .dump_command(
                self.family_id,
                WgCmd::GetDevice as u8,
                WG_GENL_VERSION,
                build_attrs,
            )
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    Error::InterfaceNotFound {
                        name: identity.to_string(),
                    }
                } else {
                    e
                }
            })?;

        if responses.is_empty() {
            return Err(Error::InterfaceNotFound {
                name: identity.to_string(),
            });
        }

        debug!(identity, messages = responses.len(), "wg device dump");

        // Strip the GENL header from each message; the rest is the
        // device attribute set.
        let mut payloads = Vec::with_capacity(responses.len());
        for response in &responses {
            if response.len() < GENL_HDRLEN {
                return Err(Error::Malformed("GENL header too short".into()));
            }
            payloads.push(&response[GENL_HDRLEN..]);
        }

        codec::device_from_messages(&payloads)
    }

    /// Get all WireGuard devices on the system.
    ///
    /// Enumerates network interfaces and queries each one; interfaces
    /// that are not WireGuard devices are skipped.
    pub async fn devices(&self) -> Result<Vec<Device>> {
        let mut devices = Vec::new();

        for name in ifname::list_interfaces()? {
            match self.get_device(&name).await {
                Ok(device) => devices.push(device),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(devices)
    }

    /// Set device configuration.
    ///
    /// Only fields the closure sets are sent; everything else keeps its
    /// current kernel value.
    ///
    /// # Example
    ///
    /// ```ignore
    /// wg.set_device("wg0", |dev| {
    ///     dev.private_key(my_key).listen_port(51820)
    /// }).await?;
    /// ```
    pub async fn set_device(
        &self,
        ifname: &str,
        configure: impl FnOnce(DeviceConfig) -> DeviceConfig,
    ) -> Result<()> {
        let config = configure(DeviceConfig::new());
        self.apply(ifname, &config).await
    }

    /// Add or update a peer.
    ///
    /// If a peer with this public key already exists, its configuration
    /// is updated; otherwise a new peer is added.
    pub async fn set_peer(
        &self,
        ifname: &str,
        public_key: Key,
        configure: impl FnOnce(PeerConfig) -> PeerConfig,
    ) -> Result<()> {
        let peer = configure(PeerConfig::new(public_key));
        self.apply(ifname, &DeviceConfig::new().peer(peer)).await
    }

    /// Remove a peer by public key.
    pub async fn remove_peer(&self, ifname: &str, public_key: Key) -> Result<()> {
        let peer = PeerConfig::new(public_key).remove();
        self.apply(ifname, &DeviceConfig::new().peer(peer)).await
    }

    /// Apply a device configuration via SET_DEVICE.
    pub async fn apply(&self, ifname: &str, config: &DeviceConfig) -> Result<()> {
        if ifname.is_empty() {
            return Err(Error::UnknownIdentity);
        }
        ifname::validate(ifname)?;

        self.genl
            .command(
                self.family_id,
                WgCmd::SetDevice as u8,
                WG_GENL_VERSION,
                |builder| {
                    codec::append_device(builder, ifname, config);
                },
            )
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    Error::InterfaceNotFound {
                        name: ifname.to_string(),
                    }
                } else {
                    e
                }
            })?;

        debug!(ifname, peers = config.peers.len(), "wg device configured");
        Ok(())
    }
}
