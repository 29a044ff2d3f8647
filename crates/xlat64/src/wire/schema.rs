// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 xlat64 project

//! Attribute schemas: one static table per record kind, declaring each tag's
//! primitive type and whether it is mandatory within its enclosing record.
//!
//! Schemas are validation metadata only; they are never mutated at runtime.

/// Primitive type of an attribute payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    U8,
    U16,
    U32,
    U64,
    /// Raw IPv4 address, exactly 4 bytes.
    Addr4,
    /// Raw IPv6 address, exactly 16 bytes.
    Addr6,
    /// Payload is itself an attribute stream.
    Nested,
    /// Opaque variable-width payload (e.g. a plateau array).
    Binary,
}

impl AttrType {
    /// Exact payload width for fixed-width types, `None` otherwise.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            AttrType::U8 => Some(1),
            AttrType::U16 => Some(2),
            AttrType::U32 => Some(4),
            AttrType::U64 => Some(8),
            AttrType::Addr4 => Some(4),
            AttrType::Addr6 => Some(16),
            AttrType::Nested | AttrType::Binary => None,
        }
    }
}

/// Declaration for a single tag within a record.
#[derive(Debug, Clone, Copy)]
pub struct AttrSpec {
    pub ty: AttrType,
    pub required: bool,
}

const fn req(ty: AttrType) -> Option<AttrSpec> {
    Some(AttrSpec { ty, required: true })
}

const fn opt(ty: AttrType) -> Option<AttrSpec> {
    Some(AttrSpec {
        ty,
        required: false,
    })
}

/// Static schema for one record kind. `specs` is indexed by tag; index 0 is
/// unused (tag 0 is not a legal attribute type).
#[derive(Debug)]
pub struct Schema {
    /// Logical record name, used in error messages.
    pub name: &'static str,
    pub specs: &'static [Option<AttrSpec>],
}

impl Schema {
    pub fn spec(&self, tag: u16) -> Option<&AttrSpec> {
        self.specs.get(tag as usize).and_then(|s| s.as_ref())
    }

    /// Highest tag this schema knows about. Anything beyond it is a
    /// forward-compatibility unknown, accepted and ignored on parse.
    pub fn max_tag(&self) -> u16 {
        (self.specs.len().saturating_sub(1)) as u16
    }
}

// Prefix record: address + length.
pub const PA_ADDR: u16 = 1;
pub const PA_LEN: u16 = 2;

// Transport address record: address + port.
pub const TAA_ADDR: u16 = 1;
pub const TAA_PORT: u16 = 2;

// EAM entry: an IPv6 prefix paired with an IPv4 prefix.
pub const EA_PREFIX6: u16 = 1;
pub const EA_PREFIX4: u16 = 2;

// Closed lists carry every element under this single tag.
pub const LA_ENTRY: u16 = 1;

// Pool4 entry.
pub const P4A_MARK: u16 = 1;
pub const P4A_ITERATIONS: u16 = 2;
pub const P4A_FLAGS: u16 = 3;
pub const P4A_PROTO: u16 = 4;
pub const P4A_PREFIX: u16 = 5;
pub const P4A_PORT_MIN: u16 = 6;
pub const P4A_PORT_MAX: u16 = 7;

// BIB entry.
pub const BA_SRC6: u16 = 1;
pub const BA_SRC4: u16 = 2;
pub const BA_PROTO: u16 = 3;
pub const BA_STATIC: u16 = 4;

// Session entry.
pub const SEA_SRC6: u16 = 1;
pub const SEA_DST6: u16 = 2;
pub const SEA_SRC4: u16 = 3;
pub const SEA_DST4: u16 = 4;
pub const SEA_PROTO: u16 = 5;
pub const SEA_STATE: u16 = 6;
pub const SEA_EXPIRATION: u16 = 7;

pub static PREFIX6: Schema = Schema {
    name: "IPv6 prefix",
    specs: &[None, req(AttrType::Addr6), req(AttrType::U8)],
};

pub static PREFIX4: Schema = Schema {
    name: "IPv4 prefix",
    specs: &[None, req(AttrType::Addr4), req(AttrType::U8)],
};

pub static TADDR6: Schema = Schema {
    name: "IPv6 transport address",
    specs: &[None, req(AttrType::Addr6), req(AttrType::U16)],
};

pub static TADDR4: Schema = Schema {
    name: "IPv4 transport address",
    specs: &[None, req(AttrType::Addr4), req(AttrType::U16)],
};

// Prefix-bearing tags are declared optional: a "global" object may carry a
// legally-empty prefix payload, which a fixed-width spec would reject at
// parse time. The prefix decoders enforce presence and non-emptiness.
pub static EAM_ENTRY: Schema = Schema {
    name: "EAM entry",
    specs: &[None, opt(AttrType::Nested), opt(AttrType::Nested)],
};

pub static POOL4_ENTRY: Schema = Schema {
    name: "pool4 entry",
    specs: &[
        None,
        req(AttrType::U32),    // P4A_MARK
        req(AttrType::U32),    // P4A_ITERATIONS
        req(AttrType::U8),     // P4A_FLAGS
        req(AttrType::U8),     // P4A_PROTO
        opt(AttrType::Nested), // P4A_PREFIX
        req(AttrType::U16),    // P4A_PORT_MIN
        req(AttrType::U16),    // P4A_PORT_MAX
    ],
};

pub static BIB_ENTRY: Schema = Schema {
    name: "BIB entry",
    specs: &[
        None,
        req(AttrType::Nested), // BA_SRC6
        req(AttrType::Nested), // BA_SRC4
        req(AttrType::U8),     // BA_PROTO
        req(AttrType::U8),     // BA_STATIC
    ],
};

pub static SESSION_ENTRY: Schema = Schema {
    name: "session entry",
    specs: &[
        None,
        req(AttrType::Nested), // SEA_SRC6
        req(AttrType::Nested), // SEA_DST6
        req(AttrType::Nested), // SEA_SRC4
        req(AttrType::Nested), // SEA_DST4
        req(AttrType::U8),     // SEA_PROTO
        req(AttrType::U8),     // SEA_STATE
        req(AttrType::U32),    // SEA_EXPIRATION
    ],
};

pub static PLATEAU_LIST: Schema = Schema {
    name: "plateaus",
    specs: &[None, req(AttrType::U16)],
};

/// Top-level configuration fields consumed by `ConfigStore::set`. Tags match
/// [`crate::cfg::store::FieldId`] wire identifiers; none is mandatory since
/// a request updates a single field at a time.
pub static GLOBALS: Schema = Schema {
    name: "globals",
    specs: &[
        None,
        opt(AttrType::U64),    // max-queued-packets
        opt(AttrType::U64),    // udp-timeout
        opt(AttrType::U64),    // icmp-timeout
        opt(AttrType::U64),    // tcp-established-timeout
        opt(AttrType::U64),    // tcp-transitory-timeout
        opt(AttrType::U64),    // fragment-timeout
        opt(AttrType::U8),     // drop-by-address
        opt(AttrType::U8),     // drop-icmp-info
        opt(AttrType::U8),     // drop-external-tcp
        opt(AttrType::U8),     // reset-traffic-class
        opt(AttrType::U8),     // reset-tos
        opt(AttrType::U8),     // new-tos
        opt(AttrType::U8),     // df-always-on
        opt(AttrType::U8),     // build-ipv6-fragment-header
        opt(AttrType::U8),     // build-ipv4-identification
        opt(AttrType::U8),     // fail-on-lower-mtu
        opt(AttrType::Binary), // mtu-plateaus
        opt(AttrType::U16),    // min-ipv6-mtu
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_widths_match_wire_format() {
        assert_eq!(AttrType::U8.fixed_width(), Some(1));
        assert_eq!(AttrType::U64.fixed_width(), Some(8));
        assert_eq!(AttrType::Addr4.fixed_width(), Some(4));
        assert_eq!(AttrType::Addr6.fixed_width(), Some(16));
        assert_eq!(AttrType::Nested.fixed_width(), None);
        assert_eq!(AttrType::Binary.fixed_width(), None);
    }

    #[test]
    fn max_tag_covers_declared_specs() {
        assert_eq!(SESSION_ENTRY.max_tag(), SEA_EXPIRATION);
        assert_eq!(PLATEAU_LIST.max_tag(), LA_ENTRY);
        assert!(GLOBALS.spec(18).is_some());
        assert!(GLOBALS.spec(19).is_none());
    }
}
