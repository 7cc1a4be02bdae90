//! Link (`RTM_*LINK`) request builders and the dump/lookup parser.
//!
//! Grounded on the original `netlinklib.api_link`/`parser_link` pair: a
//! dump selector that walks `IFLA_LINKINFO` into `kind`/`krt`, and a
//! `link_lookup` that turns `ENODEV` into `None` rather than propagating
//! it (the one error the source treats as expected rather than
//! exceptional).

use std::net::Ipv4Addr;

use crate::defs::*;
use crate::error::Result;
use crate::nla::{self, NestedNode, NlaNode, ParseResult, ScalarKind, ScalarNode, ScalarValue, StructWithTailNode, UnionNode};
use crate::socket::NetlinkSocket;
use crate::structs::{self, IfInfoMsg};
use crate::transport;

/// Everything this crate's link parser can extract from one `RTM_NEWLINK`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LinkAccum {
    pub ifindex: i32,
    pub is_up: bool,
    pub name: Option<String>,
    pub peer: Option<i32>,
    pub master: Option<i32>,
    pub kind: Option<String>,
    /// VRF table id (`kind == "vrf"`).
    pub krt: Option<u32>,
    /// GRE/ERSPAN tunnel endpoints (`kind` one of gre/gretap/erspan/ip6erspan).
    pub gre_local: Option<Ipv4Addr>,
    pub gre_remote: Option<Ipv4Addr>,
    pub gre_ikey: Option<u32>,
    pub gre_okey: Option<u32>,
    pub gre_ttl: Option<u8>,
    pub erspan_ver: Option<u32>,
    pub erspan_index: Option<u32>,
}

/// `RTM_GETLINK` dump request body: `ifinfomsg` with every field zero.
pub fn get_links_request() -> Vec<u8> {
    use zerocopy::IntoBytes;
    IfInfoMsg::default().as_bytes().to_vec()
}

fn u32_scalar(tag: u16, on: impl Fn(&mut LinkAccum, u32) + 'static) -> NlaNode<LinkAccum> {
    ScalarNode::new(tag, ScalarKind::U32)
        .on_decode(move |a, v| {
            if let ScalarValue::U32(n) = v {
                on(a, n);
            }
            Ok(())
        })
        .into()
}

fn u32be_scalar(tag: u16, on: impl Fn(&mut LinkAccum, u32) + 'static) -> NlaNode<LinkAccum> {
    ScalarNode::new(tag, ScalarKind::U32Be)
        .on_decode(move |a, v| {
            if let ScalarValue::U32(n) = v {
                on(a, n);
            }
            Ok(())
        })
        .into()
}

fn ipv4_scalar(tag: u16, on: impl Fn(&mut LinkAccum, Ipv4Addr) + 'static) -> NlaNode<LinkAccum> {
    ScalarNode::new(tag, ScalarKind::Ipv4)
        .on_decode(move |a, v| {
            if let ScalarValue::Ipv4(ip) = v {
                on(a, ip);
            }
            Ok(())
        })
        .into()
}

fn gre_children(erspan: bool) -> Vec<NlaNode<LinkAccum>> {
    let mut v = vec![
        ipv4_scalar(IFLA_GRE_LOCAL, |a, ip| a.gre_local = Some(ip)),
        ipv4_scalar(IFLA_GRE_REMOTE, |a, ip| a.gre_remote = Some(ip)),
        u32be_scalar(IFLA_GRE_IKEY, |a, v| a.gre_ikey = Some(v)),
        u32be_scalar(IFLA_GRE_OKEY, |a, v| a.gre_okey = Some(v)),
        ScalarNode::new(IFLA_GRE_TTL, ScalarKind::U8)
            .on_decode(|a, v| {
                if let ScalarValue::U8(n) = v {
                    a.gre_ttl = Some(n);
                }
                Ok(())
            })
            .into(),
    ];
    if erspan {
        v.push(u32_scalar(IFLA_GRE_ERSPAN_VER, |a, v| a.erspan_ver = Some(v)));
        v.push(u32_scalar(IFLA_GRE_ERSPAN_INDEX, |a, v| {
            a.erspan_index = Some(v)
        }));
    }
    v
}

/// Resolve `IFLA_INFO_DATA`'s shape from `IFLA_INFO_KIND`, already
/// decoded into `accum.kind` by the time this runs (the tree's decode
/// ordering rule guarantees `kind`, a context-providing sibling, parses
/// before this union does).
fn info_data_node(accum: &LinkAccum) -> Option<NlaNode<LinkAccum>> {
    match accum.kind.as_deref() {
        Some("vrf") => Some(NestedNode::new(0, vec![u32_scalar(IFLA_VRF_TABLE, |a, v| a.krt = Some(v))]).into()),
        Some("gre") | Some("gretap") => Some(NestedNode::new(0, gre_children(false)).into()),
        Some("erspan") | Some("ip6erspan") => Some(NestedNode::new(0, gre_children(true)).into()),
        _ => None,
    }
}

fn linkinfo_node() -> NlaNode<LinkAccum> {
    let kind = ScalarNode::new(IFLA_INFO_KIND, ScalarKind::Str)
        .as_context()
        .on_decode(|a, v| {
            if let ScalarValue::Str(s) = v {
                a.kind = Some(s);
            }
            Ok(())
        })
        .into();
    let data = UnionNode::new(IFLA_INFO_DATA, info_data_node).into();
    NestedNode::new(IFLA_LINKINFO, vec![kind, data]).into()
}

/// Build the root parser tree for one `RTM_NEWLINK` message.
pub fn parser() -> NlaNode<LinkAccum> {
    StructWithTailNode::new(
        IfInfoMsg::SIZE,
        |a: &mut LinkAccum, header: &[u8]| -> ParseResult {
            let ifi: IfInfoMsg = structs::read(header)?;
            a.ifindex = ifi.ifi_index;
            a.is_up = ifi.ifi_flags & IFF_UP != 0;
            Ok(())
        },
        || {
            use zerocopy::IntoBytes;
            IfInfoMsg::default().as_bytes().to_vec()
        },
        vec![
            ScalarNode::new(IFLA_IFNAME, ScalarKind::Str)
                .on_decode(|a, v| {
                    if let ScalarValue::Str(s) = v {
                        a.name = Some(s);
                    }
                    Ok(())
                })
                .into(),
            ScalarNode::new(IFLA_LINK, ScalarKind::I32)
                .on_decode(|a, v| {
                    if let ScalarValue::I32(n) = v {
                        a.peer = Some(n);
                    }
                    Ok(())
                })
                .into(),
            ScalarNode::new(IFLA_MASTER, ScalarKind::I32)
                .on_decode(|a, v| {
                    if let ScalarValue::I32(n) = v {
                        a.master = Some(n);
                    }
                    Ok(())
                })
                .into(),
            linkinfo_node(),
        ],
    )
    .into()
}

/// Enumerate every link on the system.
pub fn get_links(socket: Option<&NetlinkSocket>) -> Result<impl Iterator<Item = Result<LinkAccum>> + '_> {
    let tree = parser();
    transport::dump(socket, RTM_GETLINK, RTM_NEWLINK, &get_links_request(), LinkAccum::default, move |a, d| {
        tree.parse(a, d)
    })
}

/// Look up an interface's index by name. Translates the kernel's `ENODEV`
/// (unknown interface) into `Ok(None)`; every other error propagates.
pub fn link_lookup(ifname: &str, socket: Option<&NetlinkSocket>) -> Result<Option<i32>> {
    let mut req_body = get_links_request();
    req_body.extend(nla::encode_attr(IFLA_IFNAME, format!("{ifname}\0").as_bytes()));
    match transport::transact(socket, RTM_GETLINK, RTM_NEWLINK, &req_body, 0) {
        Ok(reply) if reply.len() >= IfInfoMsg::SIZE => {
            let ifi: IfInfoMsg = structs::read(&reply)?;
            Ok(Some(ifi.ifi_index))
        }
        Ok(_) => Ok(None),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Create a link (`RTM_NEWLINK` with `NLM_F_CREATE|NLM_F_EXCL`, no echo
/// expected). `kind` drives `IFLA_LINKINFO{IFLA_INFO_KIND}`, e.g. `"vrf"`
/// or `"dummy"`; omit it to create a type the kernel infers on its own.
pub fn link_add(ifname: &str, kind: Option<&str>, socket: Option<&NetlinkSocket>) -> Result<()> {
    use zerocopy::IntoBytes;
    let mut body = IfInfoMsg::default().as_bytes().to_vec();
    body.extend(nla::encode_attr(IFLA_IFNAME, format!("{ifname}\0").as_bytes()));
    if let Some(kind) = kind {
        let info_kind = nla::encode_attr(IFLA_INFO_KIND, format!("{kind}\0").as_bytes());
        body.extend(nla::encode_attr(IFLA_LINKINFO | nla::NLA_F_NESTED, &info_kind));
    }
    transport::transact(socket, RTM_NEWLINK, RTM_NEWLINK, &body, NLM_F_CREATE | NLM_F_EXCL)?;
    Ok(())
}

/// Delete a link by name (`RTM_DELLINK`, no echo expected).
pub fn link_delete(ifname: &str, socket: Option<&NetlinkSocket>) -> Result<()> {
    use zerocopy::IntoBytes;
    let mut body = IfInfoMsg::default().as_bytes().to_vec();
    body.extend(nla::encode_attr(IFLA_IFNAME, format!("{ifname}\0").as_bytes()));
    transport::transact(socket, RTM_DELLINK, RTM_NEWLINK, &body, 0)?;
    Ok(())
}
