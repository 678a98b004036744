//! Interface name and index utilities.
//!
//! Resolution goes through /sys/class/net rather than netlink: it is a
//! handful of file reads and needs no socket.

use crate::netlink::{Error, Result};

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

/// Validate an interface name.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Malformed("empty interface name".to_string()));
    }

    if name.len() >= IFNAMSIZ {
        return Err(Error::Malformed(format!(
            "interface name too long (max {} chars)",
            IFNAMSIZ - 1
        )));
    }

    if name.contains('/') || name.contains('\0') || name.chars().any(|c| c.is_whitespace()) {
        return Err(Error::Malformed(format!(
            "interface name '{}' contains invalid characters",
            name.escape_default()
        )));
    }

    Ok(())
}

/// Convert an interface name to its index.
pub fn name_to_index(name: &str) -> Result<u32> {
    validate(name)?;

    let path = format!("/sys/class/net/{}/ifindex", name);
    let content = std::fs::read_to_string(&path).map_err(|_| Error::InterfaceNotFound {
        name: name.to_string(),
    })?;

    content.trim().parse().map_err(|_| Error::InterfaceNotFound {
        name: name.to_string(),
    })
}

/// Convert an interface index to its name.
pub fn index_to_name(index: u32) -> Result<String> {
    if index == 0 {
        return Err(Error::UnknownIdentity);
    }

    for entry in std::fs::read_dir("/sys/class/net")?.flatten() {
        let path = entry.path().join("ifindex");
        if let Ok(content) = std::fs::read_to_string(&path) {
            if content.trim().parse::<u32>() == Ok(index) {
                return Ok(entry.file_name().to_string_lossy().to_string());
            }
        }
    }

    Err(Error::InterfaceNotFound {
        name: format!("ifindex {}", index),
    })
}

/// Get all interface names, sorted.
pub fn list_interfaces() -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir("/sys/class/net")?.flatten() {
        names.push(entry.file_name().to_string_lossy().to_string());
    }

    names.sort();
    Ok(names)
}
