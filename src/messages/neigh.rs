//! Neighbour table (`RTM_*NEIGH`) request builder and dump parser.

use std::net::IpAddr;

use crate::defs::*;
use crate::error::Result;
use crate::nla::{NlaNode, ParseResult, ScalarKind, ScalarNode, ScalarValue, StructWithTailNode};
use crate::socket::NetlinkSocket;
use crate::structs::{self, NdMsg};
use crate::transport;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NeighAccum {
    pub ifindex: i32,
    pub state: u16,
    pub ndm_flags: u8,
    pub ndm_type: u8,
    pub dst: Option<IpAddr>,
    pub lladdr: Option<[u8; 6]>,
}

pub fn get_neigh_request(family: u8) -> Vec<u8> {
    use zerocopy::IntoBytes;
    NdMsg {
        ndm_family: family,
        ..Default::default()
    }
    .as_bytes()
    .to_vec()
}

pub fn parser() -> NlaNode<NeighAccum> {
    StructWithTailNode::new(
        NdMsg::SIZE,
        |a: &mut NeighAccum, header: &[u8]| -> ParseResult {
            let ndm: NdMsg = structs::read(header)?;
            a.ifindex = ndm.ndm_ifindex;
            a.state = ndm.ndm_state;
            a.ndm_flags = ndm.ndm_flags;
            a.ndm_type = ndm.ndm_type;
            Ok(())
        },
        || {
            use zerocopy::IntoBytes;
            NdMsg::default().as_bytes().to_vec()
        },
        vec![
            ScalarNode::new(NDA_DST, ScalarKind::IpAddr)
                .on_decode(|a, v| {
                    a.dst = match v {
                        ScalarValue::Ipv4(ip) => Some(IpAddr::V4(ip)),
                        ScalarValue::Ipv6(ip) => Some(IpAddr::V6(ip)),
                        _ => None,
                    };
                    Ok(())
                })
                .into(),
            ScalarNode::new(NDA_LLADDR, ScalarKind::Mac)
                .on_decode(|a, v| {
                    if let ScalarValue::Mac(addr) = v {
                        a.lladdr = Some(addr);
                    }
                    Ok(())
                })
                .into(),
        ],
    )
    .into()
}

pub fn get_neigh(
    family: u8,
    socket: Option<&NetlinkSocket>,
) -> Result<impl Iterator<Item = Result<NeighAccum>> + '_> {
    let tree = parser();
    transport::dump(
        socket,
        RTM_GETNEIGH,
        RTM_NEWNEIGH,
        &get_neigh_request(family),
        NeighAccum::default,
        move |a, d| tree.parse(a, d),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nla::encode_attr;
    use std::net::Ipv4Addr;

    #[test]
    fn neigh_parses_dst_and_lladdr() {
        use zerocopy::IntoBytes;
        let ndm = NdMsg {
            ndm_family: AF_INET,
            ndm_ifindex: 2,
            ndm_state: nud::NUD_REACHABLE,
            ..Default::default()
        };
        let mut msg = ndm.as_bytes().to_vec();
        msg.extend(encode_attr(NDA_DST, &Ipv4Addr::new(192, 168, 1, 1).octets()));
        msg.extend(encode_attr(NDA_LLADDR, &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));

        let tree = parser();
        let mut accum = NeighAccum::default();
        tree.parse(&mut accum, &msg).unwrap();
        assert_eq!(accum.ifindex, 2);
        assert_eq!(accum.state, nud::NUD_REACHABLE);
        assert_eq!(accum.dst, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
        assert_eq!(accum.lladdr, Some([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
    }
}
