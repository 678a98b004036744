//! Generic netlink transport and framing.
//!
//! This module provides the pieces the WireGuard layer is built on: an
//! async NETLINK_GENERIC socket, message/attribute framing, a message
//! builder, and generic-netlink family resolution.

pub mod attr;
mod builder;
mod error;
pub mod genl;
pub mod message;
mod socket;

pub use attr::{AttrIter, NlAttr};
pub use builder::{MessageBuilder, NestToken};
pub use error::{Error, Result};
pub use message::{MessageIter, NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
pub use socket::NetlinkSocket;
