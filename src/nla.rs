//! The declarative attribute-tree (NLA) codec.
//!
//! Kernel netlink attribute lists are TLVs: `{len, type}` header followed
//! by a payload, padded to 4 bytes. The obvious way to handle them is a
//! deep hierarchy of attribute classes (a scalar base class, subclassed
//! per wire type, with parallel "nested" / "union" / "list" containers).
//! This module instead describes a message shape as one value of the
//! [`NlaNode`] enum: a tree that both *encodes* a request and *decodes* a
//! reply, without a parser object per kernel attribute kind.
//!
//! A tree is built fresh for each request/response (its closures are cheap
//! to construct and own nothing but the describing logic), so the same
//! [`NlaNode`] never needs to be shared across messages in a dump — each
//! per-message parser function in [`crate::messages`] builds one, uses it
//! once, and drops it.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::Error;
use crate::structs::{self, RtAttr};

/// Attribute type flags (mirrors `NLA_F_NESTED` / `NLA_F_NET_BYTEORDER`).
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

/// Decoding of a single top-level message stops here without surfacing an
/// error: the message simply isn't yielded. See module docs and
/// [`crate::transport`] for how this is mapped at the dump/transact
/// boundary.
#[derive(Debug)]
pub struct StopParsing;

/// Either "keep decoding" (`Ok`), "drop this message, no error"
/// (`Err(ParseSignal::Stop)`), or a genuine wire-format problem
/// (`Err(ParseSignal::Error)`) that must propagate as a real failure.
#[derive(Debug)]
pub enum ParseSignal {
    Stop,
    Error(Error),
}

impl From<Error> for ParseSignal {
    fn from(e: Error) -> Self {
        ParseSignal::Error(e)
    }
}

impl From<StopParsing> for ParseSignal {
    fn from(_: StopParsing) -> Self {
        ParseSignal::Stop
    }
}

pub type ParseResult = std::result::Result<(), ParseSignal>;

/// Run a root [`NlaNode`] against one top-level message's bytes. Maps
/// `StopParsing` to `Ok(None)` (silent skip) and a real protocol error to
/// `Err`; a clean parse hands back the populated accumulator.
pub fn run_top_level<A>(node: &NlaNode<A>, mut accum: A, data: &[u8]) -> crate::Result<Option<A>> {
    match node.parse(&mut accum, data) {
        Ok(()) => Ok(Some(accum)),
        Err(ParseSignal::Stop) => Ok(None),
        Err(ParseSignal::Error(e)) => Err(e),
    }
}

/// The scalar wire kinds this tree can encode/decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    U16Be,
    U32Be,
    U64Be,
    /// Null-terminated string (trailing NUL stripped on decode).
    Str,
    Ipv4,
    Ipv6,
    /// IPv4 if the payload is 4 bytes, IPv6 if 16 bytes.
    IpAddr,
    /// 6-byte hardware address.
    Mac,
    /// Zero-length marker attribute; presence alone is the signal.
    Flag,
    /// Uninterpreted bytes.
    Bytes,
}

/// A decoded (or to-be-encoded) scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Str(String),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Mac([u8; 6]),
    Flag,
    Bytes(Vec<u8>),
}

fn truncated(kind: ScalarKind, data: &[u8]) -> Error {
    Error::ProtocolError(format!("truncated {kind:?} attribute: {} bytes", data.len()))
}

/// Decode a raw attribute payload per `kind`.
pub fn decode_scalar(kind: ScalarKind, data: &[u8]) -> crate::Result<ScalarValue> {
    Ok(match kind {
        ScalarKind::U8 => ScalarValue::U8(*data.first().ok_or_else(|| truncated(kind, data))?),
        ScalarKind::I8 => ScalarValue::I8(*data.first().ok_or_else(|| truncated(kind, data))? as i8),
        ScalarKind::U16 => {
            let b: [u8; 2] = data.get(..2).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::U16(u16::from_ne_bytes(b))
        }
        ScalarKind::I16 => {
            let b: [u8; 2] = data.get(..2).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::I16(i16::from_ne_bytes(b))
        }
        ScalarKind::U32 => {
            let b: [u8; 4] = data.get(..4).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::U32(u32::from_ne_bytes(b))
        }
        ScalarKind::I32 => {
            let b: [u8; 4] = data.get(..4).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::I32(i32::from_ne_bytes(b))
        }
        ScalarKind::U64 => {
            let b: [u8; 8] = data.get(..8).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::U64(u64::from_ne_bytes(b))
        }
        ScalarKind::I64 => {
            let b: [u8; 8] = data.get(..8).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::I64(i64::from_ne_bytes(b))
        }
        ScalarKind::U16Be => {
            let b: [u8; 2] = data.get(..2).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::U16(u16::from_be_bytes(b))
        }
        ScalarKind::U32Be => {
            let b: [u8; 4] = data.get(..4).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::U32(u32::from_be_bytes(b))
        }
        ScalarKind::U64Be => {
            let b: [u8; 8] = data.get(..8).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::U64(u64::from_be_bytes(b))
        }
        ScalarKind::Str => {
            let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
            let s = std::str::from_utf8(&data[..end])
                .map_err(|e| Error::ProtocolError(format!("invalid utf-8 in string attribute: {e}")))?;
            ScalarValue::Str(s.to_string())
        }
        ScalarKind::Ipv4 => {
            let b: [u8; 4] = data.get(..4).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::Ipv4(Ipv4Addr::from(b))
        }
        ScalarKind::Ipv6 => {
            let b: [u8; 16] = data.get(..16).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::Ipv6(Ipv6Addr::from(b))
        }
        ScalarKind::IpAddr => match data.len() {
            4 => {
                let b: [u8; 4] = data.try_into().unwrap();
                ScalarValue::Ipv4(Ipv4Addr::from(b))
            }
            16 => {
                let b: [u8; 16] = data.try_into().unwrap();
                ScalarValue::Ipv6(Ipv6Addr::from(b))
            }
            _ => return Err(truncated(kind, data)),
        },
        ScalarKind::Mac => {
            let b: [u8; 6] = data.get(..6).ok_or_else(|| truncated(kind, data))?.try_into().unwrap();
            ScalarValue::Mac(b)
        }
        ScalarKind::Flag => ScalarValue::Flag,
        ScalarKind::Bytes => ScalarValue::Bytes(data.to_vec()),
    })
}

/// Encode a scalar value to its raw wire payload (no attribute header).
pub fn encode_scalar(value: &ScalarValue) -> Vec<u8> {
    match value {
        ScalarValue::U8(v) => vec![*v],
        ScalarValue::I8(v) => vec![*v as u8],
        ScalarValue::U16(v) => v.to_ne_bytes().to_vec(),
        ScalarValue::I16(v) => v.to_ne_bytes().to_vec(),
        ScalarValue::U32(v) => v.to_ne_bytes().to_vec(),
        ScalarValue::I32(v) => v.to_ne_bytes().to_vec(),
        ScalarValue::U64(v) => v.to_ne_bytes().to_vec(),
        ScalarValue::I64(v) => v.to_ne_bytes().to_vec(),
        ScalarValue::Str(s) => {
            let mut b = s.as_bytes().to_vec();
            b.push(0);
            b
        }
        ScalarValue::Ipv4(a) => a.octets().to_vec(),
        ScalarValue::Ipv6(a) => a.octets().to_vec(),
        ScalarValue::Mac(m) => m.to_vec(),
        ScalarValue::Flag => Vec::new(),
        ScalarValue::Bytes(b) => b.clone(),
    }
}

/// Build one TLV: header + payload, padded to 4 bytes.
pub fn encode_attr(tag: u16, payload: &[u8]) -> Vec<u8> {
    let hdr = RtAttr {
        rta_len: (RtAttr::SIZE + payload.len()) as u16,
        rta_type: tag,
    };
    let mut out = hdr.as_bytes_vec();
    out.extend_from_slice(payload);
    out.resize(structs::align(out.len()), 0);
    out
}

impl RtAttr {
    fn as_bytes_vec(&self) -> Vec<u8> {
        use zerocopy::IntoBytes;
        self.as_bytes().to_vec()
    }
}

/// Iterate over the TLVs in `data`, stopping at the first malformed
/// header or truncated payload rather than erroring: callers that need a
/// strict walk (e.g. `tc_u32_sel`'s key count check) validate separately.
pub fn iter_attrs(data: &[u8]) -> impl Iterator<Item = (u16, &[u8])> {
    AttrIter { data }
}

struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < RtAttr::SIZE {
            return None;
        }
        let hdr: RtAttr = structs::read(self.data).ok()?;
        let len = hdr.rta_len as usize;
        if len < RtAttr::SIZE || len > self.data.len() {
            return None;
        }
        let payload = &self.data[RtAttr::SIZE..len];
        let tag = hdr.rta_type & NLA_TYPE_MASK;
        let aligned = structs::align(len);
        self.data = if aligned >= self.data.len() {
            &[]
        } else {
            &self.data[aligned..]
        };
        Some((tag, payload))
    }
}

/// One node of the attribute tree. See module docs for the rationale
/// behind modeling this as a flat enum rather than a class hierarchy.
pub enum NlaNode<A> {
    Scalar(ScalarNode<A>),
    Nested(NestedNode<A>),
    Union(UnionNode<A>),
    StructWithTail(StructWithTailNode<A>),
    ListOfStruct(ListOfStructNode<A>),
}

impl<A> NlaNode<A> {
    fn tag(&self) -> u16 {
        match self {
            NlaNode::Scalar(n) => n.tag,
            NlaNode::Nested(n) => n.tag,
            NlaNode::Union(n) => n.tag,
            NlaNode::ListOfStruct(n) => n.tag,
            NlaNode::StructWithTail(_) => 0,
        }
    }

    fn required(&self) -> bool {
        match self {
            NlaNode::Scalar(n) => n.required,
            NlaNode::Nested(n) => n.required,
            NlaNode::Union(n) => n.required,
            NlaNode::ListOfStruct(n) => n.required,
            NlaNode::StructWithTail(n) => n.required,
        }
    }

    fn is_filter(&self) -> bool {
        matches!(self, NlaNode::Scalar(n) if n.serialize.is_some())
    }

    fn provides_context(&self) -> bool {
        match self {
            NlaNode::Scalar(n) => n.provides_context,
            NlaNode::Nested(n) => n.provides_context,
            _ => false,
        }
    }

    /// Encode this node to wire bytes (its own TLV header included, except
    /// for [`NlaNode::StructWithTail`] which is a bare header + flat
    /// attribute list used only at message-body root).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            NlaNode::Scalar(n) => match &n.serialize {
                Some(v) => encode_attr(n.tag, &encode_scalar(v)),
                None => Vec::new(),
            },
            NlaNode::Nested(n) => {
                let mut inner = Vec::new();
                for child in &n.children {
                    inner.extend(child.encode());
                }
                encode_attr(n.tag | NLA_F_NESTED, &inner)
            }
            NlaNode::Union(_) => Vec::new(),
            NlaNode::ListOfStruct(_) => Vec::new(),
            NlaNode::StructWithTail(n) => {
                let mut out = (n.encode_header)();
                for child in &n.tail {
                    out.extend(child.encode());
                }
                out
            }
        }
    }

    /// Decode `data` into `accum`. For [`NlaNode::Scalar`]/[`NlaNode::Union`]
    /// `data` is the attribute's raw payload; for [`NlaNode::Nested`] it is
    /// the inner TLV list; for [`NlaNode::StructWithTail`] it is the fixed
    /// header followed by its flat attribute list.
    pub fn parse(&self, accum: &mut A, data: &[u8]) -> ParseResult {
        match self {
            NlaNode::Scalar(n) => n.parse(accum, data),
            NlaNode::Nested(n) => parse_children(&n.children, accum, data),
            NlaNode::Union(n) => n.parse(accum, data),
            NlaNode::ListOfStruct(n) => n.parse(accum, data),
            NlaNode::StructWithTail(n) => n.parse(accum, data),
        }
    }
}

/// Walk `data` as a TLV list and dispatch each `children` entry to the
/// attribute whose tag matches, in the order mandated by the decode
/// ordering rule: filters first, context-providing children next,
/// everything else last.
pub fn parse_children<A>(children: &[NlaNode<A>], accum: &mut A, data: &[u8]) -> ParseResult {
    let tlvs: Vec<(u16, &[u8])> = iter_attrs(data).collect();

    let mut stage1 = Vec::new();
    let mut stage2 = Vec::new();
    let mut stage3 = Vec::new();
    for child in children {
        if child.is_filter() {
            stage1.push(child);
        } else if child.provides_context() {
            stage2.push(child);
        } else {
            stage3.push(child);
        }
    }

    for child in stage1.into_iter().chain(stage2).chain(stage3) {
        match tlvs.iter().find(|(tag, _)| *tag == child.tag()) {
            Some((_, payload)) => child.parse(accum, payload)?,
            None if child.required() => return Err(StopParsing.into()),
            None => {}
        }
    }
    Ok(())
}

/// A leaf scalar attribute.
pub struct ScalarNode<A> {
    tag: u16,
    kind: ScalarKind,
    serialize: Option<ScalarValue>,
    on_decode: Option<Box<dyn Fn(&mut A, ScalarValue) -> ParseResult>>,
    required: bool,
    provides_context: bool,
}

impl<A> ScalarNode<A> {
    pub fn new(tag: u16, kind: ScalarKind) -> Self {
        Self {
            tag,
            kind,
            serialize: None,
            on_decode: None,
            required: false,
            provides_context: false,
        }
    }

    /// Value to emit when this node is encoded into a request; when set,
    /// also makes the node a *filter* for decode-ordering purposes (see
    /// the ordering rule in the module docs).
    pub fn serialize(mut self, value: ScalarValue) -> Self {
        self.serialize = Some(value);
        self
    }

    pub fn on_decode(mut self, f: impl Fn(&mut A, ScalarValue) -> ParseResult + 'static) -> Self {
        self.on_decode = Some(Box::new(f));
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark that this scalar's decoded value is consulted by a sibling
    /// [`UnionNode`]'s resolver, so it must decode before the union does.
    pub fn as_context(mut self) -> Self {
        self.provides_context = true;
        self
    }

    fn parse(&self, accum: &mut A, data: &[u8]) -> ParseResult {
        let value = decode_scalar(self.kind, data)?;
        if let Some(expected) = &self.serialize {
            if *expected != value {
                return Err(StopParsing.into());
            }
        }
        if let Some(cb) = &self.on_decode {
            cb(accum, value)?;
        }
        Ok(())
    }
}

impl<A> From<ScalarNode<A>> for NlaNode<A> {
    fn from(n: ScalarNode<A>) -> Self {
        NlaNode::Scalar(n)
    }
}

/// A tag plus an ordered set of child nodes.
pub struct NestedNode<A> {
    tag: u16,
    children: Vec<NlaNode<A>>,
    required: bool,
    provides_context: bool,
}

impl<A> NestedNode<A> {
    pub fn new(tag: u16, children: Vec<NlaNode<A>>) -> Self {
        Self {
            tag,
            children,
            required: false,
            provides_context: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn as_context(mut self) -> Self {
        self.provides_context = true;
        self
    }
}

impl<A> From<NestedNode<A>> for NlaNode<A> {
    fn from(n: NestedNode<A>) -> Self {
        NlaNode::Nested(n)
    }
}

/// A tag plus a resolver choosing the concrete child from state already
/// set in the accumulator (e.g. `IFLA_INFO_KIND` resolving the shape of
/// `IFLA_INFO_DATA`). A resolver returning `None` leaves the attribute
/// unparsed rather than raising `StopParsing`, unless `required()`.
pub struct UnionNode<A> {
    tag: u16,
    resolve: Box<dyn Fn(&A) -> Option<NlaNode<A>>>,
    required: bool,
}

impl<A> UnionNode<A> {
    pub fn new(tag: u16, resolve: impl Fn(&A) -> Option<NlaNode<A>> + 'static) -> Self {
        Self {
            tag,
            resolve: Box::new(resolve),
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn parse(&self, accum: &mut A, data: &[u8]) -> ParseResult {
        match (self.resolve)(accum) {
            Some(node) => node.parse(accum, data),
            None if self.required => Err(StopParsing.into()),
            None => Ok(()),
        }
    }
}

impl<A> From<UnionNode<A>> for NlaNode<A> {
    fn from(n: UnionNode<A>) -> Self {
        NlaNode::Union(n)
    }
}

/// A fixed struct header followed by a flat attribute list; used for
/// root message bodies (`ifinfomsg` + `IFLA_*`, `rtmsg` + `RTA_*`, ...).
pub struct StructWithTailNode<A> {
    header_size: usize,
    parse_header: Box<dyn Fn(&mut A, &[u8]) -> ParseResult>,
    encode_header: Box<dyn Fn() -> Vec<u8>>,
    tail: Vec<NlaNode<A>>,
    required: bool,
}

impl<A> StructWithTailNode<A> {
    pub fn new(
        header_size: usize,
        parse_header: impl Fn(&mut A, &[u8]) -> ParseResult + 'static,
        encode_header: impl Fn() -> Vec<u8> + 'static,
        tail: Vec<NlaNode<A>>,
    ) -> Self {
        Self {
            header_size,
            parse_header: Box::new(parse_header),
            encode_header: Box::new(encode_header),
            tail,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn parse(&self, accum: &mut A, data: &[u8]) -> ParseResult {
        if data.len() < self.header_size {
            return Err(Error::ProtocolError(format!(
                "message body too short: wanted {} header bytes, got {}",
                self.header_size,
                data.len()
            ))
            .into());
        }
        let (header, rest) = data.split_at(self.header_size);
        (self.parse_header)(accum, header)?;
        parse_children(&self.tail, accum, rest)
    }
}

impl<A> From<StructWithTailNode<A>> for NlaNode<A> {
    fn from(n: StructWithTailNode<A>) -> Self {
        NlaNode::StructWithTail(n)
    }
}

/// A tag whose payload is a run of fixed-size entries, each a small
/// struct header (e.g. `rtnexthop`) followed by its own tail attributes
/// (e.g. `RTA_GATEWAY`). Modeled after `RTA_MULTIPATH`.
///
/// Unlike [`StructWithTailNode`], the per-entry accumulation is left to
/// the caller's `on_entry` callback: multipath routes fan out into one
/// result per nexthop, which this generic tree does not itself know how
/// to produce from a single `&mut A`.
pub struct ListOfStructNode<A> {
    tag: u16,
    header_size: usize,
    entry_len: Box<dyn Fn(&[u8]) -> usize>,
    on_entry: Box<dyn Fn(&mut A, &[u8], &[u8]) -> ParseResult>,
    required: bool,
}

impl<A> ListOfStructNode<A> {
    /// `entry_len` reads the entry's total length (header + tail) from its
    /// leading bytes, e.g. `rtnh_len` for `rtnexthop`.
    pub fn new(
        tag: u16,
        header_size: usize,
        entry_len: impl Fn(&[u8]) -> usize + 'static,
        on_entry: impl Fn(&mut A, &[u8], &[u8]) -> ParseResult + 'static,
    ) -> Self {
        Self {
            tag,
            header_size,
            entry_len: Box::new(entry_len),
            on_entry: Box::new(on_entry),
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn parse(&self, accum: &mut A, data: &[u8]) -> ParseResult {
        let mut remaining = data;
        let mut saw_any = false;
        while !remaining.is_empty() {
            if remaining.len() < self.header_size {
                return Err(Error::ProtocolError(format!(
                    "list entry: {} trailing bytes too short for a {}-byte header",
                    remaining.len(),
                    self.header_size
                ))
                .into());
            }
            let total = (self.entry_len)(remaining);
            if total < self.header_size || total > remaining.len() {
                return Err(Error::ProtocolError(format!(
                    "list entry: declared length {} invalid for {} remaining bytes",
                    total,
                    remaining.len()
                ))
                .into());
            }
            let header = &remaining[..self.header_size];
            let tail = &remaining[self.header_size..total];
            (self.on_entry)(accum, header, tail)?;
            saw_any = true;
            let step = structs::align(total).max(1);
            remaining = if step >= remaining.len() {
                &[]
            } else {
                &remaining[step..]
            };
        }
        if self.required && !saw_any {
            return Err(StopParsing.into());
        }
        Ok(())
    }
}

impl<A> From<ListOfStructNode<A>> for NlaNode<A> {
    fn from(n: ListOfStructNode<A>) -> Self {
        NlaNode::ListOfStruct(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Accum {
        name: Option<String>,
        index: Option<i32>,
        kind: Option<String>,
        krt: Option<u32>,
    }

    fn name_scalar() -> NlaNode<Accum> {
        ScalarNode::new(3, ScalarKind::Str)
            .on_decode(|a, v| {
                if let ScalarValue::Str(s) = v {
                    a.name = Some(s);
                }
                Ok(())
            })
            .into()
    }

    #[test]
    fn scalar_roundtrips_through_attr_header() {
        let node: NlaNode<Accum> = ScalarNode::new(3, ScalarKind::Str)
            .serialize(ScalarValue::Str("eth0".into()))
            .into();
        let bytes = node.encode();
        // header(4) + "eth0\0"(5) = 9, aligned to 12
        assert_eq!(bytes.len(), 12);
        let (tag, payload) = iter_attrs(&bytes).next().unwrap();
        assert_eq!(tag, 3);
        assert_eq!(decode_scalar(ScalarKind::Str, payload).unwrap(), ScalarValue::Str("eth0".into()));
    }

    #[test]
    fn nested_dispatches_children_by_tag() {
        let inner = encode_attr(3, b"lo\0\0");
        let tree: NlaNode<Accum> = NestedNode::new(18, vec![name_scalar()]).into();
        let data = encode_attr(18 | NLA_F_NESTED, &inner);
        let (_, payload) = iter_attrs(&data).next().unwrap();
        let mut accum = Accum::default();
        tree.parse(&mut accum, payload).unwrap();
        assert_eq!(accum.name.as_deref(), Some("lo"));
    }

    #[test]
    fn required_child_missing_stops_parsing() {
        let tree: NlaNode<Accum> = NestedNode::new(18, vec![
            ScalarNode::new(99, ScalarKind::U32).required().into(),
        ])
        .into();
        let mut accum = Accum::default();
        let err = tree.parse(&mut accum, &[]).unwrap_err();
        assert!(matches!(err, ParseSignal::Stop));
    }

    #[test]
    fn filter_mismatch_stops_parsing() {
        let node: NlaNode<Accum> = ScalarNode::new(5, ScalarKind::U32)
            .serialize(ScalarValue::U32(254))
            .into();
        let mut accum = Accum::default();
        let payload = 100u32.to_ne_bytes();
        let err = node.parse(&mut accum, &payload).unwrap_err();
        assert!(matches!(err, ParseSignal::Stop));
    }

    #[test]
    fn union_resolves_from_context_and_leaves_unknown_kind_unparsed() {
        let kind_scalar: NlaNode<Accum> = ScalarNode::new(1, ScalarKind::Str)
            .as_context()
            .on_decode(|a, v| {
                if let ScalarValue::Str(s) = v {
                    a.kind = Some(s);
                }
                Ok(())
            })
            .into();
        let data_union: NlaNode<Accum> = UnionNode::new(2, |a: &Accum| match a.kind.as_deref() {
            Some("vrf") => Some(
                NestedNode::new(
                    2,
                    vec![
                        ScalarNode::new(1, ScalarKind::U32)
                            .on_decode(|a, v| {
                                if let ScalarValue::U32(n) = v {
                                    a.krt = Some(n);
                                }
                                Ok(())
                            })
                            .into(),
                    ],
                )
                .into(),
            ),
            _ => None,
        })
        .into();
        let tree: NlaNode<Accum> = NestedNode::new(18, vec![kind_scalar, data_union]).into();

        let vrf_table_attr = encode_attr(1, &999u32.to_ne_bytes());
        let kind_attr = encode_attr(1, b"vrf\0");
        let data_attr = encode_attr(2 | NLA_F_NESTED, &vrf_table_attr);
        let mut body = kind_attr;
        body.extend(data_attr);

        let mut accum = Accum::default();
        tree.parse(&mut accum, &body).unwrap();
        assert_eq!(accum.kind.as_deref(), Some("vrf"));
        assert_eq!(accum.krt, Some(999));

        let kind_attr = encode_attr(1, b"bridge\0");
        let data_attr = encode_attr(2 | NLA_F_NESTED, &[]);
        let mut body2 = kind_attr;
        body2.extend(data_attr);
        let mut accum2 = Accum::default();
        tree.parse(&mut accum2, &body2).unwrap();
        assert_eq!(accum2.kind.as_deref(), Some("bridge"));
        assert_eq!(accum2.krt, None);
    }

    #[test]
    fn decode_scalar_rejects_truncated_u32() {
        let err = decode_scalar(ScalarKind::U32, &[0, 1]).unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[test]
    fn ip_addr_kind_dispatches_on_length() {
        let v4 = decode_scalar(ScalarKind::IpAddr, &[10, 0, 0, 1]).unwrap();
        assert_eq!(v4, ScalarValue::Ipv4(Ipv4Addr::new(10, 0, 0, 1)));
        let v6 = decode_scalar(ScalarKind::IpAddr, &[0u8; 16]).unwrap();
        assert_eq!(v6, ScalarValue::Ipv6(Ipv6Addr::UNSPECIFIED));
    }
}
