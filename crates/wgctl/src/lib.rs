//! Async WireGuard configuration library for Linux.
//!
//! This crate talks to the kernel's WireGuard module over Generic
//! Netlink: query a device's full configuration and transfer statistics,
//! or apply sparse configuration updates (keys, listen port, firewall
//! mark, peers and their allowed IPs).
//!
//! # Features
//!
//! - `output` - human-readable formatting helpers for CLI output
//!
//! # Example
//!
//! ```ignore
//! use wgctl::WgConnection;
//!
//! #[tokio::main]
//! async fn main() -> wgctl::Result<()> {
//!     let wg = WgConnection::new().await?;
//!
//!     let device = wg.get_device("wg0").await?;
//!     println!("{}: port {}", device.name, device.listen_port);
//!     for peer in &device.peers {
//!         println!("  peer {}", peer.public_key);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! Updates are sparse: only fields the caller sets are sent, so setting
//! a listen port does not disturb keys or peers.
//!
//! ```ignore
//! wg.set_device("wg0", |dev| dev.listen_port(51820)).await?;
//! wg.remove_peer("wg0", stale_peer_key).await?;
//! ```

// Core modules (always available)
pub mod netlink;
pub mod util;
pub mod wg;

// Feature-gated modules
#[cfg(feature = "output")]
pub mod output;

pub use netlink::{Error, Result};
pub use wg::WgConnection;
