//! Fixed-layout kernel structs.
//!
//! Every struct here mirrors a `repr(C)` layout from the kernel UAPI
//! headers byte-for-byte: packed, natively aligned, fixed-size arrays.
//! None of them own a "remainder" — the bytes past `SIZE` belong to the
//! enclosing [`crate::nla`] tree, never to the struct itself.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// Parse a `repr(C)` struct from the front of `data`, requiring at least
/// `size_of::<T>()` bytes.
pub fn read<T: FromBytes + KnownLayout + Immutable>(data: &[u8]) -> Result<T>
where
    T: Copy,
{
    T::read_from_prefix(data)
        .map(|(v, _)| v)
        .map_err(|_| {
            Error::ProtocolError(format!(
                "short read: wanted {} bytes, got {}",
                std::mem::size_of::<T>(),
                data.len()
            ))
        })
}

/// Every netlink message begins with this header.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    pub nlmsg_len: u32,
    pub nlmsg_type: u16,
    pub nlmsg_flags: u16,
    pub nlmsg_seq: u32,
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Payload of `NLMSG_ERROR`. The kernel follows this with a copy of the
/// offending request, which this crate ignores beyond using it for the
/// error's hex dump (already captured from the outgoing request).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgErr {
    pub error: i32,
    pub msg: NlMsgHdr,
}

impl NlMsgErr {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Header of every TLV attribute in an attribute list. 4-byte aligned;
/// `rta_len` is the exact encoded length, the storage gap to the next
/// attribute is rounded up to 4.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtAttr {
    pub rta_len: u16,
    pub rta_type: u16,
}

impl RtAttr {
    pub const SIZE: usize = std::mem::size_of::<Self>();
    pub const ALIGNTO: usize = 4;
}

/// 4-byte align a length.
#[inline]
pub const fn align(len: usize) -> usize {
    (len + RtAttr::ALIGNTO - 1) & !(RtAttr::ALIGNTO - 1)
}

/// `RTM_{NEW,DEL,GET}LINK` payload header.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub _pad: u8,
    pub ifi_type: u16,
    pub ifi_index: i32,
    pub ifi_flags: u32,
    pub ifi_change: u32,
}

impl IfInfoMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// `RTM_{NEW,DEL,GET}ROUTE` payload header.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtMsg {
    pub rtm_family: u8,
    pub rtm_dst_len: u8,
    pub rtm_src_len: u8,
    pub rtm_tos: u8,
    pub rtm_table: u8,
    pub rtm_protocol: u8,
    pub rtm_scope: u8,
    pub rtm_type: u8,
    pub rtm_flags: u32,
}

impl RtMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// `RTM_{NEW,DEL,GET}NEIGH` payload header.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NdMsg {
    pub ndm_family: u8,
    pub _pad1: u8,
    pub _pad2: u16,
    pub ndm_ifindex: i32,
    pub ndm_state: u16,
    pub ndm_flags: u8,
    pub ndm_type: u8,
}

impl NdMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Traffic-control payload header, shared by qdisc/class/filter messages.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TcMsg {
    pub tcm_family: u8,
    pub _pad1: u8,
    pub _pad2: u16,
    pub tcm_ifindex: i32,
    pub tcm_handle: u32,
    pub tcm_parent: u32,
    pub tcm_info: u32,
}

impl TcMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// One nexthop entry in a `RTA_MULTIPATH` attribute. `len` covers this
/// entry's header plus its own tail attributes (e.g. `RTA_GATEWAY`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtNexthop {
    pub rtnh_len: u16,
    pub rtnh_flags: u8,
    pub rtnh_hops: u8,
    pub rtnh_ifindex: i32,
}

impl RtNexthop {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Rate specification shared by several TC option structs.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TcRateSpec {
    pub cell_log: u8,
    pub linklayer: u8,
    pub overhead: u16,
    pub cell_align: i16,
    pub mpu: u16,
    pub rate: u32,
}

impl TcRateSpec {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// `TCA_HTB_PARMS` payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TcHtbOpt {
    pub rate: TcRateSpec,
    pub ceil: TcRateSpec,
    pub buffer: u32,
    pub cbuffer: u32,
    pub quantum: u32,
    pub level: u32,
    pub prio: u32,
}

impl TcHtbOpt {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// `TCA_HTB_INIT` payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TcHtbGlob {
    pub version: u32,
    pub rate2quantum: u32,
    pub defcls: u32,
    pub debug: u32,
    pub direct_pkts: u32,
}

impl TcHtbGlob {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// `pfifo`/`bfifo` qdisc options.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TcFifoQopt {
    pub limit: u32,
}

impl TcFifoQopt {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// `TCA_OPTIONS` payload for `sch_prio`: priority band count, 16-entry
/// priomap, no trailing attributes.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TcPrioQopt {
    pub bands: i32,
    pub priomap: [u8; 16],
}

impl Default for TcPrioQopt {
    fn default() -> Self {
        Self {
            bands: 0,
            priomap: [0; 16],
        }
    }
}

impl TcPrioQopt {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// `TCA_OPTIONS` payload for `sch_multiq`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TcMultiqQopt {
    pub bands: u16,
    pub max_bands: u16,
}

impl TcMultiqQopt {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Fixed-size head of a `cls_u32` selector; followed by `nkeys` many
/// [`TcU32Key`] entries, hence variable-length overall.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TcU32Sel {
    pub flags: u8,
    pub offshift: u8,
    pub nkeys: u8,
    pub _pad: u8,
    pub offmask: u16,
    pub off: u16,
    pub offoff: i16,
    pub hoff: i16,
    pub hmask: u32,
}

impl TcU32Sel {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// One match key trailing a [`TcU32Sel`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TcU32Key {
    pub mask: u32,
    pub val: u32,
    pub off: i32,
    pub offmask: i32,
}

impl TcU32Key {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// `act_mirred` action parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TcMirred {
    pub index: u32,
    pub capab: u32,
    pub action: i32,
    pub refcnt: i32,
    pub bindcnt: i32,
    pub eaction: i32,
    pub ifindex: u32,
}

impl TcMirred {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Rate estimator configuration (`TCA_{RATE,STAB}` style payloads).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TcEstimator {
    pub interval: i8,
    pub ewma_log: u8,
}

impl TcEstimator {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up_to_four() {
        assert_eq!(align(0), 0);
        assert_eq!(align(1), 4);
        assert_eq!(align(4), 4);
        assert_eq!(align(5), 8);
    }

    #[test]
    fn nlmsghdr_size_is_sixteen() {
        assert_eq!(NlMsgHdr::SIZE, 16);
    }

    #[test]
    fn rtattr_size_is_four() {
        assert_eq!(RtAttr::SIZE, 4);
    }

    #[test]
    fn read_rejects_short_buffer() {
        let buf = [0u8; 3];
        let err = read::<RtAttr>(&buf).unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[test]
    fn read_roundtrips_nlmsghdr() {
        let hdr = NlMsgHdr {
            nlmsg_len: 32,
            nlmsg_type: 16,
            nlmsg_flags: 0,
            nlmsg_seq: 7,
            nlmsg_pid: 1234,
        };
        let bytes = hdr.as_bytes();
        let back: NlMsgHdr = read(bytes).unwrap();
        assert_eq!(back, hdr);
    }

    #[test]
    fn tc_prio_qopt_roundtrips_priomap() {
        let mut priomap = [0u8; 16];
        priomap[0] = 1;
        let opt = TcPrioQopt { bands: 4, priomap };
        let bytes = opt.as_bytes();
        let back: TcPrioQopt = read(bytes).unwrap();
        assert_eq!(back.bands, 4);
        assert_eq!(back.priomap[0], 1);
    }
}
