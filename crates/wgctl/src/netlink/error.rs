//! Error types for netlink operations.

use std::io;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during netlink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Kernel returned an error code.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// A declared record length extends past the end of the buffer.
    #[error("truncated: need {expected} bytes, {actual} remain")]
    Truncated {
        /// Bytes the record header declared.
        expected: usize,
        /// Bytes actually remaining.
        actual: usize,
    },

    /// Structurally invalid message or attribute record.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A fixed-size payload was not the exact required size.
    #[error("invalid {what} length: {actual} bytes")]
    InvalidLength {
        /// What was being decoded (key, sockaddr, ...).
        what: &'static str,
        /// Actual payload size.
        actual: usize,
    },

    /// A device query specified neither an interface index nor a name.
    #[error("device query specified neither interface index nor name")]
    UnknownIdentity,

    /// Interface not found.
    #[error("interface not found: {name}")]
    InterfaceNotFound {
        /// The interface name that was not found.
        name: String,
    },

    /// Generic netlink family not registered with the kernel.
    #[error("generic netlink family not found: {name}")]
    FamilyNotFound {
        /// The family name that was not found.
        name: String,
    },
}

impl Error {
    /// Create a kernel error from a (negative) errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Check if this is a "not found" error.
    ///
    /// Covers ENOENT/ENODEV as well as ENOTSUP, which the WireGuard module
    /// returns when the queried interface exists but is not a WireGuard
    /// device. A query with no identity is classified the same way.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } => {
                matches!(*errno, libc::ENOENT | libc::ENODEV | libc::ENOTSUP)
            }
            Self::UnknownIdentity
            | Self::InterfaceNotFound { .. }
            | Self::FamilyNotFound { .. } => true,
            _ => false,
        }
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } => matches!(*errno, libc::EPERM | libc::EACCES),
            _ => false,
        }
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}
