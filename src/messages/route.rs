//! Route (`RTM_*ROUTE`) request builder and dump parser.
//!
//! Grounded on `netlinklib.parser_route`: the filter short-circuit
//! against the raw `rtmsg` header before the attribute walk, and the
//! multipath flattening that turns one `RTA_MULTIPATH` attribute into
//! N yielded records (one per nexthop) rather than one record carrying a
//! nested list.

use std::net::IpAddr;

use crate::defs::*;
use crate::error::Result;
use crate::nla::{self, ListOfStructNode, NlaNode, ParseResult, ScalarKind, ScalarNode, ScalarValue, StructWithTailNode};
use crate::socket::NetlinkSocket;
use crate::structs::{self, RtMsg, RtNexthop};
use crate::transport;

/// Route-level fields, merged with nexthop-level fields on flatten.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RouteAccum {
    pub family: u8,
    pub dst_prefixlen: u8,
    pub table: u8,
    pub rtype: u8,
    pub protocol: u8,
    pub scope: u8,
    pub dst: Option<IpAddr>,
    pub gateway: Option<IpAddr>,
    pub metric: Option<u32>,
    pub ifindex: Option<i32>,
    pub multipath: Vec<NexthopAccum>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NexthopAccum {
    pub ifindex: i32,
    pub gateway: Option<IpAddr>,
}

/// One flattened route: either the route itself (no multipath) or one
/// nexthop's view of it, merging route-level and nexthop-level fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRecord {
    pub family: u8,
    pub dst_prefixlen: u8,
    pub table: u8,
    pub rtype: u8,
    pub protocol: u8,
    pub scope: u8,
    pub dst: Option<IpAddr>,
    pub gateway: Option<IpAddr>,
    pub metric: Option<u32>,
    pub ifindex: Option<i32>,
}

impl RouteAccum {
    /// Flatten: one record per nexthop if `RTA_MULTIPATH` was present,
    /// otherwise one record for the route itself.
    pub fn flatten(self) -> Vec<RouteRecord> {
        let base = RouteRecord {
            family: self.family,
            dst_prefixlen: self.dst_prefixlen,
            table: self.table,
            rtype: self.rtype,
            protocol: self.protocol,
            scope: self.scope,
            dst: self.dst,
            gateway: self.gateway,
            metric: self.metric,
            ifindex: self.ifindex,
        };
        if self.multipath.is_empty() {
            return vec![base];
        }
        self.multipath
            .into_iter()
            .map(|nh| RouteRecord {
                ifindex: Some(nh.ifindex),
                gateway: nh.gateway.or(base.gateway),
                ..base.clone()
            })
            .collect()
    }
}

/// Optional pre-attribute-walk filters applied against the raw `rtmsg`
/// header: short-circuit, reject before building the attribute tree. A
/// message failing any set filter never reaches the (expensive) `NlaNode`
/// tree walk.
#[derive(Debug, Default, Clone)]
pub struct RouteFilter {
    pub table: Option<u8>,
    pub protocol: Option<u8>,
    pub scope: Option<u8>,
    pub rtype: Option<u8>,
    /// Reject unless `rtm_table` is a member of this set; distinct from
    /// `table`'s single-value equality test.
    pub table_set: Option<std::collections::BTreeSet<u8>>,
}

impl RouteFilter {
    fn rejects(&self, rtm: &RtMsg) -> bool {
        self.table.is_some_and(|t| rtm.rtm_table != t)
            || self.protocol.is_some_and(|p| rtm.rtm_protocol != p)
            || self.scope.is_some_and(|s| rtm.rtm_scope != s)
            || self.rtype.is_some_and(|t| rtm.rtm_type != t)
            || self.table_set.as_ref().is_some_and(|s| !s.contains(&rtm.rtm_table))
    }
}

pub fn get_routes_request(family: u8) -> Vec<u8> {
    use zerocopy::IntoBytes;
    RtMsg {
        rtm_family: family,
        ..Default::default()
    }
    .as_bytes()
    .to_vec()
}

fn ipaddr_scalar(tag: u16, on: impl Fn(&mut RouteAccum, IpAddr) + 'static) -> NlaNode<RouteAccum> {
    ScalarNode::new(tag, ScalarKind::IpAddr)
        .on_decode(move |a, v| {
            match v {
                ScalarValue::Ipv4(ip) => on(a, IpAddr::V4(ip)),
                ScalarValue::Ipv6(ip) => on(a, IpAddr::V6(ip)),
                _ => {}
            }
            Ok(())
        })
        .into()
}

fn multipath_node() -> NlaNode<RouteAccum> {
    ListOfStructNode::new(
        RTA_MULTIPATH,
        RtNexthop::SIZE,
        |header: &[u8]| -> usize {
            structs::read::<RtNexthop>(header)
                .map(|nh| nh.rtnh_len as usize)
                .unwrap_or(0)
        },
        |accum: &mut RouteAccum, header: &[u8], tail: &[u8]| -> ParseResult {
            let nh: RtNexthop = structs::read(header)?;
            let mut gateway = None;
            for (tag, payload) in nla::iter_attrs(tail) {
                if tag == RTA_GATEWAY {
                    if let Ok(v) = nla::decode_scalar(ScalarKind::IpAddr, payload) {
                        gateway = match v {
                            ScalarValue::Ipv4(ip) => Some(IpAddr::V4(ip)),
                            ScalarValue::Ipv6(ip) => Some(IpAddr::V6(ip)),
                            _ => None,
                        };
                    }
                }
            }
            accum.multipath.push(NexthopAccum {
                ifindex: nh.rtnh_ifindex,
                gateway,
            });
            Ok(())
        },
    )
    .into()
}

pub fn parser() -> NlaNode<RouteAccum> {
    StructWithTailNode::new(
        RtMsg::SIZE,
        |a: &mut RouteAccum, header: &[u8]| -> ParseResult {
            let rtm: RtMsg = structs::read(header)?;
            a.family = rtm.rtm_family;
            a.dst_prefixlen = rtm.rtm_dst_len;
            a.table = rtm.rtm_table;
            a.rtype = rtm.rtm_type;
            a.protocol = rtm.rtm_protocol;
            a.scope = rtm.rtm_scope;
            Ok(())
        },
        || {
            use zerocopy::IntoBytes;
            RtMsg::default().as_bytes().to_vec()
        },
        vec![
            ipaddr_scalar(RTA_DST, |a, ip| a.dst = Some(ip)),
            ipaddr_scalar(RTA_GATEWAY, |a, ip| a.gateway = Some(ip)),
            ScalarNode::new(RTA_PRIORITY, ScalarKind::U32)
                .on_decode(|a, v| {
                    if let ScalarValue::U32(n) = v {
                        a.metric = Some(n);
                    }
                    Ok(())
                })
                .into(),
            ScalarNode::new(RTA_OIF, ScalarKind::I32)
                .on_decode(|a, v| {
                    if let ScalarValue::I32(n) = v {
                        a.ifindex = Some(n);
                    }
                    Ok(())
                })
                .into(),
            multipath_node(),
        ],
    )
    .into()
}

/// Enumerate routes, applying `filter` before the (expensive) attribute
/// walk and flattening multipath routes into one [`RouteRecord`] per
/// nexthop.
pub fn get_routes(
    family: u8,
    filter: RouteFilter,
    socket: Option<&NetlinkSocket>,
) -> Result<impl Iterator<Item = Result<RouteRecord>> + '_> {
    let tree = parser();
    let dump = transport::dump(
        socket,
        RTM_GETROUTE,
        RTM_NEWROUTE,
        &get_routes_request(family),
        RouteAccum::default,
        move |a, d| {
            let rtm: RtMsg = structs::read(d).map_err(nla::ParseSignal::from)?;
            if filter.rejects(&rtm) {
                return Err(nla::StopParsing.into());
            }
            tree.parse(a, d)
        },
    )?;
    Ok(dump.flat_map(|r| match r {
        Ok(accum) => accum.flatten().into_iter().map(Ok).collect::<Vec<_>>(),
        Err(e) => vec![Err(e)],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nla::encode_attr;
    use std::net::Ipv4Addr;

    fn rtmsg_bytes(table: u8, rtype: u8) -> Vec<u8> {
        use zerocopy::IntoBytes;
        RtMsg {
            rtm_family: AF_INET,
            rtm_table: table,
            rtm_type: rtype,
            ..Default::default()
        }
        .as_bytes()
        .to_vec()
    }

    fn nexthop_bytes(ifindex: i32, gateway: Ipv4Addr) -> Vec<u8> {
        use zerocopy::IntoBytes;
        let gw_attr = encode_attr(RTA_GATEWAY, &gateway.octets());
        let nh = RtNexthop {
            rtnh_len: (RtNexthop::SIZE + gw_attr.len()) as u16,
            rtnh_ifindex: ifindex,
            ..Default::default()
        };
        let mut out = nh.as_bytes().to_vec();
        out.extend(gw_attr);
        out
    }

    #[test]
    fn route_with_multipath_yields_one_record_per_nexthop() {
        let tree = parser();
        let mut msg = rtmsg_bytes(RT_TABLE_MAIN, RTN_UNICAST);
        let mut mp = nexthop_bytes(2, Ipv4Addr::new(1, 1, 1, 1));
        mp.extend(nexthop_bytes(3, Ipv4Addr::new(2, 2, 2, 2)));
        msg.extend(encode_attr(RTA_MULTIPATH, &mp));

        let mut accum = RouteAccum::default();
        tree.parse(&mut accum, &msg).unwrap();
        let records = accum.flatten();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ifindex, Some(2));
        assert_eq!(records[0].gateway, Some(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))));
        assert_eq!(records[1].ifindex, Some(3));
        assert_eq!(records[1].gateway, Some(IpAddr::V4(Ipv4Addr::new(2, 2, 2, 2))));
    }

    #[test]
    fn route_without_multipath_yields_single_record() {
        let tree = parser();
        let mut msg = rtmsg_bytes(RT_TABLE_MAIN, RTN_UNICAST);
        msg.extend(encode_attr(RTA_OIF, &4i32.to_ne_bytes()));
        let mut accum = RouteAccum::default();
        tree.parse(&mut accum, &msg).unwrap();
        let records = accum.flatten();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ifindex, Some(4));
    }

    #[test]
    fn filter_short_circuit_rejects_before_attribute_walk() {
        let filter = RouteFilter {
            table: Some(254),
            ..Default::default()
        };
        let rtm_wrong_table = RtMsg {
            rtm_family: AF_INET,
            rtm_table: 255,
            ..Default::default()
        };
        assert!(filter.rejects(&rtm_wrong_table));
    }

    #[test]
    fn table_set_filter_rejects_tables_outside_membership() {
        let filter = RouteFilter {
            table_set: Some([RT_TABLE_MAIN, 100].into_iter().collect()),
            ..Default::default()
        };
        let in_set = RtMsg {
            rtm_family: AF_INET,
            rtm_table: RT_TABLE_MAIN,
            ..Default::default()
        };
        let out_of_set = RtMsg {
            rtm_family: AF_INET,
            rtm_table: RT_TABLE_LOCAL,
            ..Default::default()
        };
        assert!(!filter.rejects(&in_set));
        assert!(filter.rejects(&out_of_set));
    }
}
