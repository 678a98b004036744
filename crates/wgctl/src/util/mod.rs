//! Small host utilities that do not touch netlink.

pub mod ifname;
