//! Netlink socket lifecycle.
//!
//! Sockets here are blocking by default — this crate does not integrate
//! with an async reactor. The one exception is the event listener in
//! [`crate::transport::listen`], which may put its socket in non-blocking
//! mode to support a caller-driven poll loop.

use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU32, Ordering};

use netlink_sys::{Socket, SocketAddr, protocols};

use crate::defs::{NETLINK_GET_STRICT_CHK, SOL_NETLINK};
use crate::error::{Error, Result};

/// Netlink protocol families. Only `Route` is exercised by the message
/// layer in this crate; the others are kept for sockets callers open
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Route,
    Generic,
    Netfilter,
}

impl Protocol {
    fn as_isize(self) -> isize {
        match self {
            Protocol::Route => protocols::NETLINK_ROUTE,
            Protocol::Generic => protocols::NETLINK_GENERIC,
            Protocol::Netfilter => protocols::NETLINK_NETFILTER,
        }
    }
}

/// A bound, blocking netlink socket.
pub struct NetlinkSocket {
    inner: Socket,
    seq: AtomicU32,
    pid: u32,
    protocol: Protocol,
}

impl NetlinkSocket {
    /// Open a new socket for `Protocol::Route`, bound to an ephemeral port.
    pub fn new() -> Result<Self> {
        Self::for_protocol(Protocol::Route)
    }

    /// Open a new socket for the given protocol, bound to an ephemeral port.
    pub fn for_protocol(protocol: Protocol) -> Result<Self> {
        let mut socket = Socket::new(protocol.as_isize())?;

        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr)?;
        socket.get_address(&mut addr)?;
        let pid = addr.port_number();

        Ok(Self {
            inner: socket,
            seq: AtomicU32::new(1),
            pid,
            protocol,
        })
    }

    /// Enable `NETLINK_GET_STRICT_CHK`. The dump driver turns this on for
    /// ephemeral sockets it opens itself; callers supplying their own
    /// socket decide for themselves.
    pub fn enable_strict_checking(&self) -> Result<()> {
        let rc = unsafe {
            libc::setsockopt(
                self.inner.as_raw_fd(),
                SOL_NETLINK,
                NETLINK_GET_STRICT_CHK,
                &1i32 as *const i32 as *const libc::c_void,
                std::mem::size_of::<i32>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Switch the socket to non-blocking mode. Only meaningful for the
    /// event listener; dump/transact never call this.
    pub fn set_non_blocking(&mut self, non_blocking: bool) -> Result<()> {
        self.inner.set_non_blocking(non_blocking)?;
        Ok(())
    }

    /// Join a multicast group (`RTNLGRP_*`).
    pub fn add_membership(&mut self, group: u32) -> Result<()> {
        self.inner.add_membership(group)?;
        Ok(())
    }

    pub fn drop_membership(&mut self, group: u32) -> Result<()> {
        self.inner.drop_membership(group)?;
        Ok(())
    }

    /// Allocate the next outgoing sequence number.
    pub fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Send one datagram, blocking until the kernel accepts it.
    pub fn send(&self, msg: &[u8]) -> Result<()> {
        self.inner.send(msg, 0)?;
        Ok(())
    }

    /// Receive one datagram. Blocks unless the socket is in non-blocking
    /// mode, in which case a `WouldBlock` I/O error surfaces to the caller
    /// (the event listener treats that as "nothing to read yet").
    pub fn recv(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; 65536];
        let n = self.inner.recv(&mut buf, 0)?;
        buf.truncate(n);
        Ok(buf)
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_maps_to_known_netlink_family() {
        assert_eq!(Protocol::Route.as_isize(), protocols::NETLINK_ROUTE);
    }
}
