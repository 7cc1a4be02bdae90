//! Queuing discipline / class / filter (`RTM_*QDISC`, `RTM_*TCLASS`,
//! `RTM_*TFILTER`) request builders and dump parsers.
//!
//! `TCA_OPTIONS` is a kind-resolved union like `IFLA_INFO_DATA` in
//! [`crate::messages::link`], except the set of kinds it dispatches over
//! differs by object (qdisc vs. class vs. filter) — so each object gets
//! its own option-union resolver rather than sharing one table.

use crate::defs::*;
use crate::error::{Error, Result};
use crate::nla::{self, NestedNode, NlaNode, ParseResult, ScalarKind, ScalarNode, ScalarValue, StructWithTailNode, UnionNode};
use crate::socket::NetlinkSocket;
use crate::structs::{self, TcEstimator, TcHtbGlob, TcHtbOpt, TcMirred, TcMsg, TcMultiqQopt, TcPrioQopt};
use crate::transport;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TcAccum {
    pub ifindex: i32,
    pub handle: u32,
    pub parent: u32,
    pub kind: Option<String>,
    pub htb_rate: Option<u32>,
    pub htb_ceil: Option<u32>,
    pub htb_rate64: Option<u64>,
    pub htb_ceil64: Option<u64>,
    pub htb_quantum: Option<u32>,
    pub fifo_limit: Option<u32>,
    pub prio_bands: Option<i32>,
    pub u32_classid: Option<u32>,
    pub u32_nkeys: Option<u8>,
    pub u32_keys: Option<Vec<structs::TcU32Key>>,
    pub mirred_ifindex: Option<u32>,
    pub mirred_action: Option<i32>,
    pub multiq_bands: Option<u16>,
    pub flow_keys: Option<u32>,
    pub flow_mode: Option<u32>,
    pub flow_baseclass: Option<u32>,
    /// Legacy rate estimator (`TCA_RATE`), shared by qdisc/class/filter.
    pub rate_est_interval: Option<i8>,
    pub rate_est_ewma_log: Option<u8>,
}

pub fn get_tc_request(ifindex: i32, handle: u32, parent: u32) -> Vec<u8> {
    use zerocopy::IntoBytes;
    TcMsg {
        tcm_ifindex: ifindex,
        tcm_handle: handle,
        tcm_parent: parent,
        ..Default::default()
    }
    .as_bytes()
    .to_vec()
}

fn u32_field(tag: u16, on: impl Fn(&mut TcAccum, u32) + 'static) -> NlaNode<TcAccum> {
    ScalarNode::new(tag, ScalarKind::U32)
        .on_decode(move |a, v| {
            if let ScalarValue::U32(n) = v {
                on(a, n);
            }
            Ok(())
        })
        .into()
}

fn u64_field(tag: u16, on: impl Fn(&mut TcAccum, u64) + 'static) -> NlaNode<TcAccum> {
    ScalarNode::new(tag, ScalarKind::U64)
        .on_decode(move |a, v| {
            if let ScalarValue::U64(n) = v {
                on(a, n);
            }
            Ok(())
        })
        .into()
}

/// Reads the fixed-size `tc_htb_opt`/`tc_htb_glob`/`tc_fifo_qopt`/
/// `tc_prio_qopt` payload directly, since these have no nested attribute
/// structure of their own — they're a single struct per `TCA_OPTIONS`
/// child tag, not a TLV list. `TCA_HTB_RATE64`/`CEIL64` are newer
/// siblings the kernel adds when a rate exceeds what `tc_rate_spec`'s
/// 32-bit field can hold; when present they override the value already
/// read from `TCA_HTB_PARMS`.
fn htb_class_options() -> NlaNode<TcAccum> {
    StructWithTailNode::new(
        0,
        |_a: &mut TcAccum, _header: &[u8]| -> ParseResult { Ok(()) },
        Vec::new,
        vec![
            raw_struct_child::<TcHtbOpt>(TCA_HTB_PARMS, |a, opt| {
                a.htb_rate = Some(opt.rate.rate);
                a.htb_ceil = Some(opt.ceil.rate);
                a.htb_quantum = Some(opt.quantum);
            }),
            u64_field(TCA_HTB_RATE64, |a, v| a.htb_rate64 = Some(v)),
            u64_field(TCA_HTB_CEIL64, |a, v| a.htb_ceil64 = Some(v)),
        ],
    )
    .into()
}

fn htb_qdisc_options() -> NlaNode<TcAccum> {
    StructWithTailNode::new(
        0,
        |_a: &mut TcAccum, _header: &[u8]| -> ParseResult { Ok(()) },
        Vec::new,
        vec![raw_struct_child::<TcHtbGlob>(TCA_HTB_INIT, |a, glob| {
            a.htb_quantum = Some(glob.rate2quantum);
        })],
    )
    .into()
}

fn fifo_qdisc_options() -> NlaNode<TcAccum> {
    StructWithTailNode::new(
        structs::TcFifoQopt::SIZE,
        |a: &mut TcAccum, header: &[u8]| -> ParseResult {
            let opt: structs::TcFifoQopt = structs::read(header)?;
            a.fifo_limit = Some(opt.limit);
            Ok(())
        },
        || vec![0u8; structs::TcFifoQopt::SIZE],
        vec![],
    )
    .into()
}

fn prio_qdisc_options() -> NlaNode<TcAccum> {
    StructWithTailNode::new(
        TcPrioQopt::SIZE,
        |a: &mut TcAccum, header: &[u8]| -> ParseResult {
            let opt: TcPrioQopt = structs::read(header)?;
            a.prio_bands = Some(opt.bands);
            Ok(())
        },
        || vec![0u8; TcPrioQopt::SIZE],
        vec![],
    )
    .into()
}

fn multiq_qdisc_options() -> NlaNode<TcAccum> {
    StructWithTailNode::new(
        TcMultiqQopt::SIZE,
        |a: &mut TcAccum, header: &[u8]| -> ParseResult {
            let opt: TcMultiqQopt = structs::read(header)?;
            a.multiq_bands = Some(opt.bands);
            Ok(())
        },
        || vec![0u8; TcMultiqQopt::SIZE],
        vec![],
    )
    .into()
}

/// A `TCA_OPTIONS` child that is itself a bare fixed-size struct (no TLV
/// framing of its own), e.g. `TCA_HTB_PARMS`/`TCA_HTB_INIT`. Modeled as a
/// single-child `Nested` whose payload is consumed wholesale.
fn raw_struct_child<T>(tag: u16, on: impl Fn(&mut TcAccum, T) + 'static) -> NlaNode<TcAccum>
where
    T: zerocopy::FromBytes + zerocopy::KnownLayout + zerocopy::Immutable + Copy + 'static,
{
    ScalarNode::new(tag, ScalarKind::Bytes)
        .on_decode(move |a, v| {
            if let ScalarValue::Bytes(raw) = v {
                if let Ok(parsed) = structs::read::<T>(&raw) {
                    on(a, parsed);
                }
            }
            Ok(())
        })
        .into()
}

/// `TCA_U32_SEL` carries a fixed `tc_u32_sel` head followed by `nkeys`
/// many `tc_u32_key` entries appended by the kernel, not framed as their
/// own attributes. A payload too short for its own declared `nkeys` is a
/// malformed message, not an absent one.
fn u32_filter_options() -> NlaNode<TcAccum> {
    NestedNode::new(
        TCA_OPTIONS,
        vec![
            ScalarNode::new(TCA_U32_SEL, ScalarKind::Bytes)
                .on_decode(|a, v| {
                    let ScalarValue::Bytes(raw) = v else {
                        return Ok(());
                    };
                    let sel: structs::TcU32Sel = structs::read(&raw)?;
                    let nkeys = sel.nkeys as usize;
                    let want = structs::TcU32Sel::SIZE + nkeys * structs::TcU32Key::SIZE;
                    if raw.len() < want {
                        return Err(Error::ProtocolError(format!(
                            "TCA_U32_SEL: {} bytes too short for nkeys={} (need {})",
                            raw.len(),
                            sel.nkeys,
                            want
                        ))
                        .into());
                    }
                    let mut keys = Vec::with_capacity(nkeys);
                    for i in 0..nkeys {
                        let start = structs::TcU32Sel::SIZE + i * structs::TcU32Key::SIZE;
                        let key: structs::TcU32Key =
                            structs::read(&raw[start..start + structs::TcU32Key::SIZE])?;
                        keys.push(key);
                    }
                    a.u32_nkeys = Some(sel.nkeys);
                    a.u32_keys = Some(keys);
                    Ok(())
                })
                .into(),
            u32_field(TCA_U32_CLASSID, |a, v| a.u32_classid = Some(v)),
        ],
    )
    .into()
}

fn flow_filter_options() -> NlaNode<TcAccum> {
    NestedNode::new(
        TCA_OPTIONS,
        vec![
            u32_field(TCA_FLOW_KEYS, |a, v| a.flow_keys = Some(v)),
            u32_field(TCA_FLOW_MODE, |a, v| a.flow_mode = Some(v)),
            u32_field(TCA_FLOW_BASECLASS, |a, v| a.flow_baseclass = Some(v)),
        ],
    )
    .into()
}

fn mirred_action_options() -> NlaNode<TcAccum> {
    NestedNode::new(
        TCA_ACT_OPTIONS,
        vec![raw_struct_child::<TcMirred>(TCA_MIRRED_PARMS, |a, m| {
            a.mirred_ifindex = Some(m.ifindex);
            a.mirred_action = Some(m.action);
        })],
    )
    .into()
}

/// Resolve `TCA_OPTIONS` by `kind` for a qdisc dump/parse.
fn qdisc_options(accum: &TcAccum) -> Option<NlaNode<TcAccum>> {
    match accum.kind.as_deref() {
        Some("htb") => Some(htb_qdisc_options()),
        Some("pfifo") | Some("bfifo") => Some(fifo_qdisc_options()),
        Some("prio") => Some(prio_qdisc_options()),
        Some("multiq") => Some(multiq_qdisc_options()),
        _ => None,
    }
}

/// Resolve `TCA_OPTIONS` by `kind` for a class dump/parse.
fn class_options(accum: &TcAccum) -> Option<NlaNode<TcAccum>> {
    match accum.kind.as_deref() {
        Some("htb") => Some(htb_class_options()),
        _ => None,
    }
}

/// Resolve `TCA_OPTIONS` by `kind` for a filter dump/parse.
fn filter_options(accum: &TcAccum) -> Option<NlaNode<TcAccum>> {
    match accum.kind.as_deref() {
        Some("u32") => Some(u32_filter_options()),
        Some("flow") => Some(flow_filter_options()),
        Some("mirred") => Some(mirred_action_options()),
        _ => None,
    }
}

fn parser(resolve: fn(&TcAccum) -> Option<NlaNode<TcAccum>>) -> NlaNode<TcAccum> {
    StructWithTailNode::new(
        TcMsg::SIZE,
        |a: &mut TcAccum, header: &[u8]| -> ParseResult {
            let tcm: TcMsg = structs::read(header)?;
            a.ifindex = tcm.tcm_ifindex;
            a.handle = tcm.tcm_handle;
            a.parent = tcm.tcm_parent;
            Ok(())
        },
        || {
            use zerocopy::IntoBytes;
            TcMsg::default().as_bytes().to_vec()
        },
        vec![
            ScalarNode::new(TCA_KIND, ScalarKind::Str)
                .as_context()
                .on_decode(|a, v| {
                    if let ScalarValue::Str(s) = v {
                        a.kind = Some(s);
                    }
                    Ok(())
                })
                .into(),
            UnionNode::new(TCA_OPTIONS, resolve).into(),
            raw_struct_child::<TcEstimator>(TCA_RATE, |a, est| {
                a.rate_est_interval = Some(est.interval);
                a.rate_est_ewma_log = Some(est.ewma_log);
            }),
        ],
    )
    .into()
}

pub fn qdisc_parser() -> NlaNode<TcAccum> {
    parser(qdisc_options)
}

pub fn class_parser() -> NlaNode<TcAccum> {
    parser(class_options)
}

pub fn filter_parser() -> NlaNode<TcAccum> {
    parser(filter_options)
}

pub fn get_qdiscs(
    ifindex: i32,
    socket: Option<&NetlinkSocket>,
) -> Result<impl Iterator<Item = Result<TcAccum>> + '_> {
    let tree = qdisc_parser();
    transport::dump(
        socket,
        RTM_GETQDISC,
        RTM_NEWQDISC,
        &get_tc_request(ifindex, 0, 0),
        TcAccum::default,
        move |a, d| tree.parse(a, d),
    )
}

pub fn get_classes(
    ifindex: i32,
    parent: u32,
    socket: Option<&NetlinkSocket>,
) -> Result<impl Iterator<Item = Result<TcAccum>> + '_> {
    let tree = class_parser();
    transport::dump(
        socket,
        RTM_GETTCLASS,
        RTM_NEWTCLASS,
        &get_tc_request(ifindex, 0, parent),
        TcAccum::default,
        move |a, d| tree.parse(a, d),
    )
}

pub fn get_filters(
    ifindex: i32,
    parent: u32,
    socket: Option<&NetlinkSocket>,
) -> Result<impl Iterator<Item = Result<TcAccum>> + '_> {
    let tree = filter_parser();
    transport::dump(
        socket,
        RTM_GETTFILTER,
        RTM_NEWTFILTER,
        &get_tc_request(ifindex, 0, parent),
        TcAccum::default,
        move |a, d| tree.parse(a, d),
    )
}

/// `tcmsg` + `TCA_KIND` + (optionally) `TCA_OPTIONS`, shared by every
/// qdisc/class/filter add. `options` is the already-concatenated set of
/// `TCA_OPTIONS` children (e.g. a `TCA_HTB_PARMS` attribute built from
/// `TcHtbOpt::as_bytes()`), mirroring how `raw_struct_child` consumes the
/// same shape on decode.
fn tc_modify_request(ifindex: i32, handle: u32, parent: u32, kind: &str, options: &[u8]) -> Vec<u8> {
    let mut body = get_tc_request(ifindex, handle, parent);
    body.extend(nla::encode_attr(TCA_KIND, format!("{kind}\0").as_bytes()));
    if !options.is_empty() {
        body.extend(nla::encode_attr(TCA_OPTIONS | nla::NLA_F_NESTED, options));
    }
    body
}

/// Create a qdisc (`RTM_NEWQDISC` with `NLM_F_CREATE|NLM_F_EXCL`).
pub fn qdisc_add(ifindex: i32, handle: u32, parent: u32, kind: &str, options: &[u8], socket: Option<&NetlinkSocket>) -> Result<()> {
    let body = tc_modify_request(ifindex, handle, parent, kind, options);
    transport::transact(socket, RTM_NEWQDISC, RTM_NEWQDISC, &body, NLM_F_CREATE | NLM_F_EXCL)?;
    Ok(())
}

/// Delete a qdisc (`RTM_DELQDISC`, no echo expected).
pub fn qdisc_delete(ifindex: i32, handle: u32, parent: u32, socket: Option<&NetlinkSocket>) -> Result<()> {
    transport::transact(socket, RTM_DELQDISC, RTM_NEWQDISC, &get_tc_request(ifindex, handle, parent), 0)?;
    Ok(())
}

/// Create a class (`RTM_NEWTCLASS` with `NLM_F_CREATE|NLM_F_EXCL`).
pub fn class_add(ifindex: i32, handle: u32, parent: u32, kind: &str, options: &[u8], socket: Option<&NetlinkSocket>) -> Result<()> {
    let body = tc_modify_request(ifindex, handle, parent, kind, options);
    transport::transact(socket, RTM_NEWTCLASS, RTM_NEWTCLASS, &body, NLM_F_CREATE | NLM_F_EXCL)?;
    Ok(())
}

/// Delete a class (`RTM_DELTCLASS`, no echo expected).
pub fn class_delete(ifindex: i32, handle: u32, parent: u32, socket: Option<&NetlinkSocket>) -> Result<()> {
    transport::transact(socket, RTM_DELTCLASS, RTM_NEWTCLASS, &get_tc_request(ifindex, handle, parent), 0)?;
    Ok(())
}

/// Create a filter (`RTM_NEWTFILTER` with `NLM_F_CREATE|NLM_F_EXCL`).
pub fn filter_add(ifindex: i32, handle: u32, parent: u32, kind: &str, options: &[u8], socket: Option<&NetlinkSocket>) -> Result<()> {
    let body = tc_modify_request(ifindex, handle, parent, kind, options);
    transport::transact(socket, RTM_NEWTFILTER, RTM_NEWTFILTER, &body, NLM_F_CREATE | NLM_F_EXCL)?;
    Ok(())
}

/// Delete a filter (`RTM_DELTFILTER`, no echo expected).
pub fn filter_delete(ifindex: i32, handle: u32, parent: u32, socket: Option<&NetlinkSocket>) -> Result<()> {
    transport::transact(socket, RTM_DELTFILTER, RTM_NEWTFILTER, &get_tc_request(ifindex, handle, parent), 0)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nla::encode_attr;

    fn tcmsg_bytes(ifindex: i32, handle: u32, parent: u32) -> Vec<u8> {
        use zerocopy::IntoBytes;
        TcMsg {
            tcm_family: AF_UNSPEC as u8,
            tcm_ifindex: ifindex,
            tcm_handle: handle,
            tcm_parent: parent,
            ..Default::default()
        }
        .as_bytes()
        .to_vec()
    }

    #[test]
    fn htb_class_parses_rate_and_ceil() {
        use zerocopy::IntoBytes;
        let opt = TcHtbOpt {
            rate: structs::TcRateSpec {
                rate: 1_000_000,
                ..Default::default()
            },
            ceil: structs::TcRateSpec {
                rate: 2_000_000,
                ..Default::default()
            },
            quantum: 1500,
            ..Default::default()
        };
        let mut msg = tcmsg_bytes(3, tc_h_make(1, 10), TC_H_ROOT);
        msg.extend(encode_attr(TCA_KIND, b"htb\0"));
        let mut options = Vec::new();
        options.extend(encode_attr(TCA_HTB_PARMS, opt.as_bytes()));
        msg.extend(encode_attr(TCA_OPTIONS, &options));

        let tree = class_parser();
        let mut accum = TcAccum::default();
        tree.parse(&mut accum, &msg).unwrap();
        assert_eq!(accum.kind.as_deref(), Some("htb"));
        assert_eq!(accum.htb_rate, Some(1_000_000));
        assert_eq!(accum.htb_ceil, Some(2_000_000));
    }

    #[test]
    fn htb_class_rate64_and_ceil64_present_alongside_32_bit_fields() {
        use zerocopy::IntoBytes;
        let opt = TcHtbOpt {
            rate: structs::TcRateSpec {
                rate: u32::MAX,
                ..Default::default()
            },
            ceil: structs::TcRateSpec {
                rate: u32::MAX,
                ..Default::default()
            },
            quantum: 1500,
            ..Default::default()
        };
        let mut msg = tcmsg_bytes(3, tc_h_make(1, 10), TC_H_ROOT);
        msg.extend(encode_attr(TCA_KIND, b"htb\0"));
        let mut options = Vec::new();
        options.extend(encode_attr(TCA_HTB_PARMS, opt.as_bytes()));
        options.extend(encode_attr(TCA_HTB_RATE64, &12_500_000_000u64.to_ne_bytes()));
        options.extend(encode_attr(TCA_HTB_CEIL64, &25_000_000_000u64.to_ne_bytes()));
        msg.extend(encode_attr(TCA_OPTIONS, &options));

        let tree = class_parser();
        let mut accum = TcAccum::default();
        tree.parse(&mut accum, &msg).unwrap();
        assert_eq!(accum.htb_rate64, Some(12_500_000_000));
        assert_eq!(accum.htb_ceil64, Some(25_000_000_000));
    }

    #[test]
    fn multiq_qdisc_parses_band_count() {
        use zerocopy::IntoBytes;
        let opt = TcMultiqQopt { bands: 4, max_bands: 16 };
        let mut msg = tcmsg_bytes(3, 0, TC_H_ROOT);
        msg.extend(encode_attr(TCA_KIND, b"multiq\0"));
        msg.extend(encode_attr(TCA_OPTIONS, opt.as_bytes()));

        let tree = qdisc_parser();
        let mut accum = TcAccum::default();
        tree.parse(&mut accum, &msg).unwrap();
        assert_eq!(accum.kind.as_deref(), Some("multiq"));
        assert_eq!(accum.multiq_bands, Some(4));
    }

    #[test]
    fn flow_filter_parses_keys_mode_and_baseclass() {
        let mut msg = tcmsg_bytes(3, 0, tc_h_make(1, 0));
        msg.extend(encode_attr(TCA_KIND, b"flow\0"));
        let mut options = Vec::new();
        options.extend(encode_attr(TCA_FLOW_KEYS, &3u32.to_ne_bytes()));
        options.extend(encode_attr(TCA_FLOW_MODE, &1u32.to_ne_bytes()));
        options.extend(encode_attr(TCA_FLOW_BASECLASS, &tc_h_make(1, 1).to_ne_bytes()));
        msg.extend(encode_attr(TCA_OPTIONS, &options));

        let tree = filter_parser();
        let mut accum = TcAccum::default();
        tree.parse(&mut accum, &msg).unwrap();
        assert_eq!(accum.flow_keys, Some(3));
        assert_eq!(accum.flow_mode, Some(1));
        assert_eq!(accum.flow_baseclass, Some(tc_h_make(1, 1)));
    }

    #[test]
    fn u32_filter_parses_selector_and_trailing_keys() {
        use zerocopy::IntoBytes;
        let sel = structs::TcU32Sel {
            nkeys: 2,
            ..Default::default()
        };
        let keys = [
            structs::TcU32Key {
                mask: 0xffff_ffff,
                val: 0x0a00_0001,
                off: 12,
                offmask: 0,
            },
            structs::TcU32Key {
                mask: 0x0000_ffff,
                val: 0x0050,
                off: 20,
                offmask: 0,
            },
        ];
        let mut sel_bytes = sel.as_bytes().to_vec();
        sel_bytes.extend(keys[0].as_bytes());
        sel_bytes.extend(keys[1].as_bytes());

        let mut msg = tcmsg_bytes(3, 0, tc_h_make(1, 0));
        msg.extend(encode_attr(TCA_KIND, b"u32\0"));
        let mut options = Vec::new();
        options.extend(encode_attr(TCA_U32_SEL, &sel_bytes));
        options.extend(encode_attr(TCA_U32_CLASSID, &1u32.to_ne_bytes()));
        msg.extend(encode_attr(TCA_OPTIONS, &options));

        let tree = filter_parser();
        let mut accum = TcAccum::default();
        tree.parse(&mut accum, &msg).unwrap();
        assert_eq!(accum.u32_nkeys, Some(2));
        assert_eq!(accum.u32_classid, Some(1));
        let parsed_keys = accum.u32_keys.expect("keys should be parsed");
        assert_eq!(parsed_keys.len(), 2);
        assert_eq!(parsed_keys[0].val, 0x0a00_0001);
        assert_eq!(parsed_keys[1].off, 20);
    }

    #[test]
    fn u32_filter_rejects_selector_truncated_before_declared_keys() {
        use zerocopy::IntoBytes;
        let sel = structs::TcU32Sel {
            nkeys: 2,
            ..Default::default()
        };
        // Only the head, none of the two keys `nkeys` promises.
        let sel_bytes = sel.as_bytes().to_vec();

        let mut msg = tcmsg_bytes(3, 0, tc_h_make(1, 0));
        msg.extend(encode_attr(TCA_KIND, b"u32\0"));
        let mut options = Vec::new();
        options.extend(encode_attr(TCA_U32_SEL, &sel_bytes));
        msg.extend(encode_attr(TCA_OPTIONS, &options));

        let tree = filter_parser();
        let mut accum = TcAccum::default();
        let err = tree.parse(&mut accum, &msg).unwrap_err();
        assert!(matches!(err, crate::nla::ParseSignal::Error(Error::ProtocolError(_))));
    }

    #[test]
    fn unknown_filter_kind_leaves_options_unresolved() {
        let mut msg = tcmsg_bytes(3, 0, tc_h_make(1, 0));
        msg.extend(encode_attr(TCA_KIND, b"basic\0"));
        msg.extend(encode_attr(TCA_OPTIONS, &[]));

        let tree = filter_parser();
        let mut accum = TcAccum::default();
        tree.parse(&mut accum, &msg).unwrap();
        assert_eq!(accum.kind.as_deref(), Some("basic"));
        assert_eq!(accum.u32_classid, None);
    }

    #[test]
    fn tca_rate_estimator_parses_alongside_qdisc_options() {
        use zerocopy::IntoBytes;
        let est = TcEstimator {
            interval: 2,
            ewma_log: 200,
        };
        let mut msg = tcmsg_bytes(3, 0, TC_H_ROOT);
        msg.extend(encode_attr(TCA_KIND, b"pfifo\0"));
        msg.extend(encode_attr(TCA_OPTIONS, structs::TcFifoQopt { limit: 1000 }.as_bytes()));
        msg.extend(encode_attr(TCA_RATE, est.as_bytes()));

        let tree = qdisc_parser();
        let mut accum = TcAccum::default();
        tree.parse(&mut accum, &msg).unwrap();
        assert_eq!(accum.fifo_limit, Some(1000));
        assert_eq!(accum.rate_est_interval, Some(2));
        assert_eq!(accum.rate_est_ewma_log, Some(200));
    }
}
