//! Error types for netlink operations.
//!
//! The wire protocol distinguishes three failure shapes, and this crate
//! keeps them as three separate variants rather than folding everything
//! into one bag of strings: a kernel-reported `NLMSG_ERROR`, a dump that
//! the kernel flagged as inconsistent (`NLM_F_DUMP_INTR`), and malformed
//! bytes that never reached the kernel at all.

use std::io;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during netlink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The kernel answered with `NLMSG_ERROR` and a nonzero code.
    #[error("netlink error: {errno} ({strerror}); request: {request_hex}")]
    NetlinkError {
        /// Positive errno (kernel carries it negated on the wire).
        errno: i32,
        /// `strerror(errno)`.
        strerror: String,
        /// Hex dump of the request that provoked the error.
        request_hex: String,
    },

    /// The kernel set `NLM_F_DUMP_INTR` on one or more dump messages.
    ///
    /// Raised *after* the dump stream ends; results already yielded are a
    /// valid prefix of a (possibly stale) snapshot.
    #[error("dump interrupted, partial results may be inconsistent")]
    DumpInterrupted,

    /// Bytes on the wire did not match the expected shape: a short read, a
    /// struct that didn't fit, an attribute whose declared length runs past
    /// the buffer, or a send that the kernel rejected outright.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// Underlying socket I/O failure (not a kernel-level netlink error).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a [`Error::NetlinkError`] from a negative errno as carried on
    /// the wire in `nlmsgerr.error`, plus the request bytes that provoked it.
    pub fn from_nlmsgerr(neg_errno: i32, request: &[u8]) -> Self {
        let errno = -neg_errno;
        let strerror = io::Error::from_raw_os_error(errno).to_string();
        Self::NetlinkError {
            errno,
            strerror,
            request_hex: hex_encode(request),
        }
    }

    /// The errno, if this is a [`Error::NetlinkError`].
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::NetlinkError { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// True for ENODEV/ENOENT style "the object is gone" errors, which
    /// per-object collaborators routinely translate into `None` rather
    /// than propagating.
    pub fn is_not_found(&self) -> bool {
        matches!(self.errno(), Some(libc::ENODEV) | Some(libc::ENOENT))
    }

    /// True for a dump that was flagged as interrupted.
    pub fn is_dump_interrupted(&self) -> bool {
        matches!(self, Self::DumpInterrupted)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_nlmsgerr_negates_errno() {
        let err = Error::from_nlmsgerr(-libc::ENODEV, &[0xde, 0xad]);
        assert_eq!(err.errno(), Some(libc::ENODEV));
        assert!(err.is_not_found());
        assert!(err.to_string().contains("dead"));
    }

    #[test]
    fn not_found_is_specific_to_enodev_enoent() {
        let err = Error::from_nlmsgerr(-libc::EPERM, &[]);
        assert!(!err.is_not_found());
    }

    #[test]
    fn dump_interrupted_is_distinguishable() {
        let err = Error::DumpInterrupted;
        assert!(err.is_dump_interrupted());
        assert_eq!(err.errno(), None);
    }

    #[test]
    fn protocol_error_message() {
        let err = Error::ProtocolError("short read: wanted 16, got 4".into());
        assert_eq!(
            err.to_string(),
            "protocol error: short read: wanted 16, got 4"
        );
    }
}
