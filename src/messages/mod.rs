//! Per-object parsers and request builders: collaborators built on top of
//! [`crate::nla`] and [`crate::transport`]. None of this module's types
//! are consulted by the core — it exists to show the core doing real
//! work, and is gated behind the `messages` feature so a caller who only
//! wants the codec/transport layers doesn't pay for it.

pub mod link;
pub mod neigh;
pub mod route;
pub mod tc;
