// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 xlat64 project

//! Typed record marshallers: prefixes, transport addresses, EAM entries,
//! pool4 entries, BIB entries, session entries and plateau lists.
//!
//! Each record maps to exactly one nested attribute sub-tree. Decoders fail
//! fast on the first missing or malformed sub-attribute; encoders write
//! sub-attributes in a fixed canonical order and cancel the whole nested
//! container on buffer exhaustion, so no partial record is ever emitted.

use std::net::{Ipv4Addr, Ipv6Addr};

use super::attr::{AttrIter, AttrTable, AttrWriter};
use super::schema::{
    self, BA_PROTO, BA_SRC4, BA_SRC6, BA_STATIC, EA_PREFIX4, EA_PREFIX6, LA_ENTRY, P4A_FLAGS,
    P4A_ITERATIONS, P4A_MARK, P4A_PORT_MAX, P4A_PORT_MIN, P4A_PREFIX, P4A_PROTO, PA_ADDR, PA_LEN,
    SEA_DST4, SEA_DST6, SEA_EXPIRATION, SEA_PROTO, SEA_SRC4, SEA_SRC6, SEA_STATE, TAA_ADDR,
    TAA_PORT,
};
use super::{validate_list, CodecError, CodecResult};
use crate::cfg::plateaus::PLATEAUS_MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix6 {
    pub addr: Ipv6Addr,
    pub len: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix4 {
    pub addr: Ipv4Addr,
    pub len: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportAddr6 {
    pub addr: Ipv6Addr,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportAddr4 {
    pub addr: Ipv4Addr,
    pub port: u16,
}

/// Explicit address mapping: an IPv6 prefix paired with an IPv4 prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EamEntry {
    pub prefix6: Prefix6,
    pub prefix4: Prefix4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pool4Entry {
    pub mark: u32,
    pub iterations: u32,
    pub flags: u8,
    pub proto: u8,
    pub prefix: Prefix4,
    pub port_min: u16,
    pub port_max: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BibEntry {
    pub addr6: TransportAddr6,
    pub addr4: TransportAddr4,
    pub proto: u8,
    pub is_static: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEntry {
    pub src6: TransportAddr6,
    pub dst6: TransportAddr6,
    pub src4: TransportAddr4,
    pub dst4: TransportAddr4,
    pub proto: u8,
    pub state: u8,
    pub expiration_secs: u32,
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

/// A zero-valued prefix is a legitimate distinct value, so an empty payload
/// (legal at schema level for "global" objects) is rejected here instead of
/// being defaulted.
pub fn decode_prefix6(payload: &[u8]) -> CodecResult<Prefix6> {
    if payload.is_empty() {
        return Err(CodecError::EmptyPrefix {
            record: schema::PREFIX6.name,
        });
    }
    let attrs = AttrTable::parse_nested(payload, &schema::PREFIX6)?;
    Ok(Prefix6 {
        addr: attrs.addr6_at(PA_ADDR)?,
        len: attrs.u8_at(PA_LEN)?,
    })
}

pub fn decode_prefix4(payload: &[u8]) -> CodecResult<Prefix4> {
    if payload.is_empty() {
        return Err(CodecError::EmptyPrefix {
            record: schema::PREFIX4.name,
        });
    }
    let attrs = AttrTable::parse_nested(payload, &schema::PREFIX4)?;
    Ok(Prefix4 {
        addr: attrs.addr4_at(PA_ADDR)?,
        len: attrs.u8_at(PA_LEN)?,
    })
}

pub fn decode_taddr6(payload: &[u8]) -> CodecResult<TransportAddr6> {
    let attrs = AttrTable::parse_nested(payload, &schema::TADDR6)?;
    Ok(TransportAddr6 {
        addr: attrs.addr6_at(TAA_ADDR)?,
        port: attrs.u16_at(TAA_PORT)?,
    })
}

pub fn decode_taddr4(payload: &[u8]) -> CodecResult<TransportAddr4> {
    let attrs = AttrTable::parse_nested(payload, &schema::TADDR4)?;
    Ok(TransportAddr4 {
        addr: attrs.addr4_at(TAA_ADDR)?,
        port: attrs.u16_at(TAA_PORT)?,
    })
}

pub fn decode_eam_entry(payload: &[u8]) -> CodecResult<EamEntry> {
    let attrs = AttrTable::parse_nested(payload, &schema::EAM_ENTRY)?;
    Ok(EamEntry {
        prefix6: decode_prefix6(attrs.attr(EA_PREFIX6)?)?,
        prefix4: decode_prefix4(attrs.attr(EA_PREFIX4)?)?,
    })
}

pub fn decode_pool4_entry(payload: &[u8]) -> CodecResult<Pool4Entry> {
    let attrs = AttrTable::parse_nested(payload, &schema::POOL4_ENTRY)?;
    Ok(Pool4Entry {
        mark: attrs.u32_at(P4A_MARK)?,
        iterations: attrs.u32_at(P4A_ITERATIONS)?,
        flags: attrs.u8_at(P4A_FLAGS)?,
        proto: attrs.u8_at(P4A_PROTO)?,
        prefix: decode_prefix4(attrs.attr(P4A_PREFIX)?)?,
        port_min: attrs.u16_at(P4A_PORT_MIN)?,
        port_max: attrs.u16_at(P4A_PORT_MAX)?,
    })
}

pub fn decode_bib_entry(payload: &[u8]) -> CodecResult<BibEntry> {
    let attrs = AttrTable::parse_nested(payload, &schema::BIB_ENTRY)?;
    Ok(BibEntry {
        addr6: decode_taddr6(attrs.attr(BA_SRC6)?)?,
        addr4: decode_taddr4(attrs.attr(BA_SRC4)?)?,
        proto: attrs.u8_at(BA_PROTO)?,
        is_static: attrs.u8_at(BA_STATIC)? != 0,
    })
}

pub fn decode_session_entry(payload: &[u8]) -> CodecResult<SessionEntry> {
    let attrs = AttrTable::parse_nested(payload, &schema::SESSION_ENTRY)?;
    Ok(SessionEntry {
        src6: decode_taddr6(attrs.attr(SEA_SRC6)?)?,
        dst6: decode_taddr6(attrs.attr(SEA_DST6)?)?,
        src4: decode_taddr4(attrs.attr(SEA_SRC4)?)?,
        dst4: decode_taddr4(attrs.attr(SEA_DST4)?)?,
        proto: attrs.u8_at(SEA_PROTO)?,
        state: attrs.u8_at(SEA_STATE)?,
        expiration_secs: attrs.u32_at(SEA_EXPIRATION)?,
    })
}

/// Decode a plateau list payload into raw values (not yet canonicalized).
pub fn decode_plateau_list(payload: &[u8]) -> CodecResult<Vec<u16>> {
    validate_list(payload, &schema::PLATEAU_LIST)?;

    let mut values = Vec::new();
    for attr in AttrIter::new(payload, schema::PLATEAU_LIST.name) {
        let attr = attr?;
        if values.len() >= PLATEAUS_MAX {
            return Err(CodecError::Malformed {
                record: schema::PLATEAU_LIST.name,
                reason: format!("more than {} plateaus", PLATEAUS_MAX),
            });
        }
        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(attr.payload);
        values.push(u16::from_ne_bytes(bytes));
    }
    Ok(values)
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

fn nest<F>(w: &mut AttrWriter<'_>, tag: u16, fill: F) -> CodecResult<()>
where
    F: FnOnce(&mut AttrWriter<'_>) -> CodecResult<()>,
{
    let root = w.nest_start(tag)?;
    match fill(w) {
        Ok(()) => w.nest_end(root),
        Err(err) => {
            w.nest_cancel(root);
            Err(err)
        }
    }
}

/// `None` encodes as an empty attribute; "global" objects use this to mean
/// "prefix unset", which is distinct from any actual prefix value.
pub fn encode_prefix6(
    w: &mut AttrWriter<'_>,
    tag: u16,
    prefix: Option<&Prefix6>,
) -> CodecResult<()> {
    match prefix {
        None => w.put_empty(tag),
        Some(prefix) => nest(w, tag, |w| {
            w.put_addr6(PA_ADDR, &prefix.addr)?;
            w.put_u8(PA_LEN, prefix.len)
        }),
    }
}

pub fn encode_prefix4(
    w: &mut AttrWriter<'_>,
    tag: u16,
    prefix: Option<&Prefix4>,
) -> CodecResult<()> {
    match prefix {
        None => w.put_empty(tag),
        Some(prefix) => nest(w, tag, |w| {
            w.put_addr4(PA_ADDR, &prefix.addr)?;
            w.put_u8(PA_LEN, prefix.len)
        }),
    }
}

pub fn encode_taddr6(w: &mut AttrWriter<'_>, tag: u16, taddr: &TransportAddr6) -> CodecResult<()> {
    nest(w, tag, |w| {
        w.put_addr6(TAA_ADDR, &taddr.addr)?;
        w.put_u16(TAA_PORT, taddr.port)
    })
}

pub fn encode_taddr4(w: &mut AttrWriter<'_>, tag: u16, taddr: &TransportAddr4) -> CodecResult<()> {
    nest(w, tag, |w| {
        w.put_addr4(TAA_ADDR, &taddr.addr)?;
        w.put_u16(TAA_PORT, taddr.port)
    })
}

pub fn encode_eam_entry(w: &mut AttrWriter<'_>, tag: u16, entry: &EamEntry) -> CodecResult<()> {
    nest(w, tag, |w| {
        encode_prefix6(w, EA_PREFIX6, Some(&entry.prefix6))?;
        encode_prefix4(w, EA_PREFIX4, Some(&entry.prefix4))
    })
}

pub fn encode_pool4_entry(w: &mut AttrWriter<'_>, tag: u16, entry: &Pool4Entry) -> CodecResult<()> {
    nest(w, tag, |w| {
        w.put_u32(P4A_MARK, entry.mark)?;
        w.put_u32(P4A_ITERATIONS, entry.iterations)?;
        w.put_u8(P4A_FLAGS, entry.flags)?;
        w.put_u8(P4A_PROTO, entry.proto)?;
        encode_prefix4(w, P4A_PREFIX, Some(&entry.prefix))?;
        w.put_u16(P4A_PORT_MIN, entry.port_min)?;
        w.put_u16(P4A_PORT_MAX, entry.port_max)
    })
}

/// Attrs-level BIB encoder: query paths encode only the transport addresses
/// they know. [`encode_bib_entry`] delegates here with both present.
pub fn encode_bib_attrs(
    w: &mut AttrWriter<'_>,
    tag: u16,
    addr6: Option<&TransportAddr6>,
    addr4: Option<&TransportAddr4>,
    proto: u8,
    is_static: bool,
) -> CodecResult<()> {
    nest(w, tag, |w| {
        if let Some(addr6) = addr6 {
            encode_taddr6(w, BA_SRC6, addr6)?;
        }
        if let Some(addr4) = addr4 {
            encode_taddr4(w, BA_SRC4, addr4)?;
        }
        w.put_u8(BA_PROTO, proto)?;
        w.put_u8(BA_STATIC, is_static as u8)
    })
}

pub fn encode_bib_entry(w: &mut AttrWriter<'_>, tag: u16, entry: &BibEntry) -> CodecResult<()> {
    encode_bib_attrs(
        w,
        tag,
        Some(&entry.addr6),
        Some(&entry.addr4),
        entry.proto,
        entry.is_static,
    )
}

pub fn encode_session_entry(
    w: &mut AttrWriter<'_>,
    tag: u16,
    entry: &SessionEntry,
) -> CodecResult<()> {
    nest(w, tag, |w| {
        encode_taddr6(w, SEA_SRC6, &entry.src6)?;
        encode_taddr6(w, SEA_DST6, &entry.dst6)?;
        encode_taddr4(w, SEA_SRC4, &entry.src4)?;
        encode_taddr4(w, SEA_DST4, &entry.dst4)?;
        w.put_u8(SEA_PROTO, entry.proto)?;
        w.put_u8(SEA_STATE, entry.state)?;
        w.put_u32(SEA_EXPIRATION, entry.expiration_secs)
    })
}

pub fn encode_plateau_list(w: &mut AttrWriter<'_>, tag: u16, values: &[u16]) -> CodecResult<()> {
    nest(w, tag, |w| {
        for &value in values {
            w.put_u16(LA_ENTRY, value)?;
        }
        Ok(())
    })
}
