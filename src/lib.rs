//! Blocking rtnetlink library for Linux network configuration.
//!
//! This crate implements the wire protocol spoken over `AF_NETLINK` /
//! `NETLINK_ROUTE` sockets: fixed-layout kernel structs, a declarative
//! attribute-tree (NLA) codec, and a blocking transport driving the two
//! request patterns the kernel supports — *dump* (request/multi-response)
//! and *transact* (request/single-ack) — plus an event listener for
//! multicast groups.
//!
//! # Layers
//!
//! - [`defs`] — kernel constants (`RTM_*`, `NLM_F_*`, `IFLA_*`, ...).
//! - [`structs`] — `repr(C)` structs mirroring kernel wire layouts, decoded
//!   zero-copy via `zerocopy`.
//! - [`nla`] — the [`nla::NlaNode`] tree: a compositional, declarative
//!   description of an attribute list that can both encode a request and
//!   decode a reply into a caller-defined accumulator struct.
//! - [`socket`] — netlink socket lifecycle (ephemeral or caller-supplied).
//! - [`transport`] — the dump/transact/listen drivers.
//! - [`messages`] — per-object parsers/builders (link, route, neighbor, tc)
//!   built as collaborators on top of the layers above.
//!
//! ```ignore
//! use rtnl::messages::link;
//!
//! for acc in link::get_links(None)? {
//!     let acc = acc?;
//!     println!("{:?}", acc);
//! }
//! # Ok::<(), rtnl::Error>(())
//! ```

pub mod defs;
pub mod error;
pub mod nla;
pub mod socket;
pub mod structs;
pub mod transport;

#[cfg(feature = "messages")]
pub mod messages;

pub use error::{Error, Result};
