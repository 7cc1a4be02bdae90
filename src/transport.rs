//! Dump/transact/listen drivers.
//!
//! This is the layer that turns a request body and a parser callback into
//! kernel traffic: it owns message framing, sequence assignment, and the
//! translation of `NLMSG_ERROR`/`NLM_F_DUMP_INTR` into [`crate::Error`].
//! It knows nothing about `IFLA_*`/`RTA_*` shapes — those live in
//! [`crate::messages`], which hands this layer a request body and an
//! [`crate::nla::NlaNode`]-backed parser closure.

use tracing::{debug, warn};
use zerocopy::IntoBytes;

use crate::defs::{
    NLM_F_ACK, NLM_F_DUMP, NLM_F_ECHO, NLM_F_REQUEST, NLMSG_DONE, NLMSG_ERROR, NLMSG_NOOP,
};
use crate::error::{Error, Result};
use crate::nla::ParseSignal;
use crate::socket::NetlinkSocket;
use crate::structs::{self, NlMsgErr, NlMsgHdr};

/// One message found inside a datagram, before per-object parsing.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub msg_type: u16,
    pub flags: u16,
    pub seq: u32,
    pub pid: u32,
    pub payload: &'a [u8],
}

/// Split one datagram into `(type, flags, seq, pid, payload)` frames.
/// Lazy: walks `data` in place, never copies. Stops at `NLMSG_DONE` or a
/// malformed header (short read / length running past the buffer), in
/// which case the remaining bytes are dropped rather than raising — a
/// transport-level check validates lengths it actually cares about.
pub fn frame_datagram(data: &[u8]) -> impl Iterator<Item = Frame<'_>> {
    FrameIter { data }
}

struct FrameIter<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NlMsgHdr::SIZE {
            return None;
        }
        let hdr: NlMsgHdr = structs::read(self.data).ok()?;
        let len = hdr.nlmsg_len as usize;
        if len < NlMsgHdr::SIZE || len > self.data.len() {
            return None;
        }
        let payload = &self.data[NlMsgHdr::SIZE..len];
        let aligned = structs::align(len);
        let frame = Frame {
            msg_type: hdr.nlmsg_type,
            flags: hdr.nlmsg_flags,
            seq: hdr.nlmsg_seq,
            pid: hdr.nlmsg_pid,
            payload,
        };
        self.data = if aligned >= self.data.len() || hdr.nlmsg_type == NLMSG_DONE {
            &[]
        } else {
            &self.data[aligned..]
        };
        Some(frame)
    }
}

/// Build one request datagram: `nlmsghdr` + body, `nlmsg_len` filled in.
pub fn build_request(msg_type: u16, flags: u16, seq: u32, pid: u32, body: &[u8]) -> Vec<u8> {
    let hdr = NlMsgHdr {
        nlmsg_len: (NlMsgHdr::SIZE + body.len()) as u32,
        nlmsg_type: msg_type,
        nlmsg_flags: flags,
        nlmsg_seq: seq,
        nlmsg_pid: pid,
    };
    let mut out = hdr.as_bytes().to_vec();
    out.extend_from_slice(body);
    out
}

fn read_nlmsgerr(payload: &[u8]) -> Result<i32> {
    let err: NlMsgErr = structs::read(payload)?;
    Ok(err.error)
}

/// A handle to either a caller-supplied socket (not owned, never closed by
/// this crate) or one opened for the duration of a single operation
/// (closed on drop, including on error unwind — `NetlinkSocket` itself
/// closes its fd in its own `Drop`).
enum SocketHandle<'a> {
    Borrowed(&'a NetlinkSocket),
    Owned(NetlinkSocket),
}

impl std::ops::Deref for SocketHandle<'_> {
    type Target = NetlinkSocket;
    fn deref(&self) -> &NetlinkSocket {
        match self {
            SocketHandle::Borrowed(s) => s,
            SocketHandle::Owned(s) => s,
        }
    }
}

/// Run a dump: request/multi-response terminated by `NLMSG_DONE`.
///
/// `make_accum` builds a fresh accumulator per yielded message; `parse`
/// populates it from one message's payload, returning `Err(StopParsing)`
/// (silently skip this message) or a protocol error (abort the dump).
///
/// Returns a lazy iterator. [`Error::DumpInterrupted`] is raised as the
/// final item, *after* every otherwise-valid message has been yielded, if
/// any message in the stream carried `NLM_F_DUMP_INTR`.
pub fn dump<'a, A>(
    socket: Option<&'a NetlinkSocket>,
    req_type: u16,
    expected_reply_type: u16,
    body: &[u8],
    make_accum: impl Fn() -> A + 'a,
    parse: impl Fn(&mut A, &[u8]) -> crate::nla::ParseResult + 'a,
) -> Result<DumpIter<'a, A>> {
    let socket = match socket {
        Some(s) => SocketHandle::Borrowed(s),
        None => {
            let s = NetlinkSocket::new()?;
            s.enable_strict_checking()?;
            SocketHandle::Owned(s)
        }
    };

    let seq = socket.next_seq();
    let pid = socket.pid();
    let req = build_request(req_type, NLM_F_REQUEST | NLM_F_DUMP, seq, pid, body);
    debug!(req_type, seq, len = req.len(), "sending dump request");
    socket.send(&req)?;

    Ok(DumpIter {
        socket,
        seq,
        expected_reply_type,
        request_hex: hex(&req),
        make_accum: Box::new(make_accum),
        parse: Box::new(parse),
        buf: Vec::new(),
        cursor: 0,
        done: false,
        dump_intr: false,
        dump_intr_raised: false,
    })
}

/// Lazy iterator over the accumulators a [`dump`] yields.
pub struct DumpIter<'a, A> {
    socket: SocketHandle<'a>,
    seq: u32,
    expected_reply_type: u16,
    request_hex: String,
    make_accum: Box<dyn Fn() -> A + 'a>,
    parse: Box<dyn Fn(&mut A, &[u8]) -> crate::nla::ParseResult + 'a>,
    buf: Vec<u8>,
    cursor: usize,
    done: bool,
    dump_intr: bool,
    dump_intr_raised: bool,
}

impl<A> DumpIter<'_, A> {
    fn next_frame_owned(&mut self) -> Result<Option<(u16, u16, Vec<u8>)>> {
        loop {
            if self.cursor >= self.buf.len() {
                if self.done {
                    return Ok(None);
                }
                let datagram = self.socket.recv()?;
                if datagram.is_empty() {
                    self.done = true;
                    return Ok(None);
                }
                self.buf = datagram;
                self.cursor = 0;
            }

            let rest = &self.buf[self.cursor..];
            if rest.len() < NlMsgHdr::SIZE {
                self.cursor = self.buf.len();
                continue;
            }
            let hdr: NlMsgHdr = structs::read(rest)?;
            let len = hdr.nlmsg_len as usize;
            if len < NlMsgHdr::SIZE || len > rest.len() {
                return Err(Error::ProtocolError(format!(
                    "dump: message length {len} out of bounds ({} remaining)",
                    rest.len()
                )));
            }
            let payload = rest[NlMsgHdr::SIZE..len].to_vec();
            let aligned = structs::align(len);
            self.cursor += aligned.max(1).min(rest.len());
            if hdr.nlmsg_seq != self.seq {
                continue;
            }
            if hdr.nlmsg_flags & crate::defs::NLM_F_DUMP_INTR != 0 {
                if !self.dump_intr {
                    warn!(seq = self.seq, "NLM_F_DUMP_INTR observed, dump may be inconsistent");
                }
                self.dump_intr = true;
            }
            if hdr.nlmsg_type == NLMSG_NOOP {
                continue;
            }
            if hdr.nlmsg_type == NLMSG_DONE {
                debug!(seq = self.seq, "dump complete");
                self.done = true;
                return Ok(None);
            }
            debug!(seq = self.seq, msg_type = hdr.nlmsg_type, len, "received dump message");
            return Ok(Some((hdr.nlmsg_type, hdr.nlmsg_flags, payload)));
        }
    }
}

impl<A> Iterator for DumpIter<'_, A> {
    type Item = Result<A>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                if self.dump_intr && !self.dump_intr_raised {
                    self.dump_intr_raised = true;
                    return Some(Err(Error::DumpInterrupted));
                }
                return None;
            }

            let frame = match self.next_frame_owned() {
                Ok(Some(f)) => f,
                Ok(None) => {
                    if self.dump_intr && !self.dump_intr_raised {
                        self.dump_intr_raised = true;
                        return Some(Err(Error::DumpInterrupted));
                    }
                    return None;
                }
                Err(e) => return Some(Err(e)),
            };
            let (msg_type, _flags, payload) = frame;

            if msg_type == NLMSG_ERROR {
                let errno = match read_nlmsgerr(&payload) {
                    Ok(e) => e,
                    Err(e) => return Some(Err(e)),
                };
                self.done = true;
                return Some(Err(Error::from_nlmsgerr(errno, self.request_hex.as_bytes())));
            }
            if msg_type != self.expected_reply_type {
                self.done = true;
                return Some(Err(Error::ProtocolError(format!(
                    "dump: expected message type {}, got {msg_type}",
                    self.expected_reply_type
                ))));
            }

            let mut accum = (self.make_accum)();
            match (self.parse)(&mut accum, &payload) {
                Ok(()) => return Some(Ok(accum)),
                Err(ParseSignal::Stop) => continue,
                Err(ParseSignal::Error(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Run a single-ack transact, including echo replies.
///
/// `user_flags` should carry `NLM_F_CREATE`/`NLM_F_EXCL`/`NLM_F_REPLACE`/
/// `NLM_F_ECHO` as appropriate; `REQUEST`/`ACK` are added automatically.
/// Returns empty bytes for a bare ACK, or the echoed payload when
/// `NLM_F_ECHO` was set and the kernel replied with the caller's expected
/// type instead of `NLMSG_ERROR`.
pub fn transact(
    socket: Option<&NetlinkSocket>,
    req_type: u16,
    expected_reply_type: u16,
    body: &[u8],
    user_flags: u16,
) -> Result<Vec<u8>> {
    let owned;
    let socket: &NetlinkSocket = match socket {
        Some(s) => s,
        None => {
            owned = NetlinkSocket::new()?;
            &owned
        }
    };

    let seq = socket.next_seq();
    let pid = socket.pid();
    let flags = NLM_F_REQUEST | NLM_F_ACK | user_flags;
    let req = build_request(req_type, flags, seq, pid, body);
    let request_hex = hex(&req);
    debug!(req_type, seq, len = req.len(), "sending transact request");
    socket.send(&req)?;

    loop {
        let datagram = socket.recv()?;
        if datagram.is_empty() {
            return Err(Error::ProtocolError("transact: connection closed".into()));
        }
        for frame in frame_datagram(&datagram) {
            if frame.seq != seq {
                continue;
            }
            if frame.msg_type == NLMSG_NOOP {
                continue;
            }
            debug!(seq, msg_type = frame.msg_type, "received transact reply");
            if frame.msg_type == NLMSG_ERROR {
                let errno = read_nlmsgerr(frame.payload)?;
                if errno == 0 {
                    return Ok(Vec::new());
                }
                return Err(Error::from_nlmsgerr(errno, request_hex.as_bytes()));
            }
            if user_flags & NLM_F_ECHO != 0 && frame.msg_type == expected_reply_type {
                return Ok(frame.payload.to_vec());
            }
            return Err(Error::ProtocolError(format!(
                "transact: expected NLMSG_ERROR or type {expected_reply_type}, got {}",
                frame.msg_type
            )));
        }
    }
}

/// Open a socket joined to each of the given multicast groups
/// (`RTNLGRP_*` numbers, via `NETLINK_ADD_MEMBERSHIP`) and put it in
/// non-blocking mode unless `block` is set.
pub fn make_event_listener(groups: &[u32], block: bool) -> Result<NetlinkSocket> {
    let mut socket = NetlinkSocket::new()?;
    for &group in groups {
        socket.add_membership(group)?;
    }
    socket.set_non_blocking(!block)?;
    Ok(socket)
}

/// One multicast notification, dispatched by message type.
pub struct Event<'a> {
    pub msg_type: u16,
    pub payload: &'a [u8],
}

/// Drain one pending datagram from `socket` and hand each frame in it to
/// `dispatch`. In blocking mode this blocks until a datagram arrives; in
/// non-blocking mode a `WouldBlock` surfaces as `Ok(false)` ("nothing
/// ready, call again later") rather than an error, so the caller can
/// integrate this into an external poll loop.
pub fn listen_once(
    socket: &NetlinkSocket,
    mut dispatch: impl FnMut(Event<'_>) -> Result<()>,
) -> Result<bool> {
    let datagram = match socket.recv() {
        Ok(d) => d,
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(false),
        Err(e) => return Err(e),
    };
    for frame in frame_datagram(&datagram) {
        if frame.msg_type == NLMSG_NOOP {
            continue;
        }
        dispatch(Event {
            msg_type: frame.msg_type,
            payload: frame.payload,
        })?;
    }
    Ok(true)
}

fn hex(bytes: &[u8]) -> String {
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
    use crate::defs::{NLM_F_MULTI, RTM_NEWLINK};

    fn encode_msg(msg_type: u16, flags: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
        build_request(msg_type, flags, seq, 0, payload)
    }

    #[test]
    fn frame_datagram_splits_concatenated_messages() {
        let mut data = encode_msg(RTM_NEWLINK, NLM_F_MULTI, 1, &[1, 2, 3, 4]);
        data.extend(encode_msg(NLMSG_DONE, NLM_F_MULTI, 1, &[]));
        let frames: Vec<_> = frame_datagram(&data).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].msg_type, RTM_NEWLINK);
        assert_eq!(frames[0].payload, &[1, 2, 3, 4]);
        assert_eq!(frames[1].msg_type, NLMSG_DONE);
    }

    #[test]
    fn frame_datagram_stops_at_short_header() {
        let frames: Vec<_> = frame_datagram(&[0, 1, 2]).collect();
        assert!(frames.is_empty());
    }

    #[test]
    fn build_request_sets_len_and_fields() {
        let req = build_request(RTM_NEWLINK, NLM_F_REQUEST, 7, 1234, &[9, 9]);
        let hdr: NlMsgHdr = structs::read(&req).unwrap();
        assert_eq!(hdr.nlmsg_len as usize, NlMsgHdr::SIZE + 2);
        assert_eq!(hdr.nlmsg_type, RTM_NEWLINK);
        assert_eq!(hdr.nlmsg_seq, 7);
        assert_eq!(hdr.nlmsg_pid, 1234);
    }
}
