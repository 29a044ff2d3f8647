// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 xlat64 project

//! Binary attribute codec for the administrative control channel.
//!
//! The wire format is a generic-netlink-style attribute stream: a flat or
//! nested sequence of `(tag: u16, length: u16, value)` records, where
//! `length` covers the 4-byte header and the value is padded to a 4-byte
//! boundary. Integers travel in native byte order, addresses as raw 4- or
//! 16-byte blobs.
//!
//! The codec holds no shared state; every call operates on caller-supplied
//! buffers and is safe for unlimited concurrent use.

pub mod attr;
pub mod cursor;
pub mod records;
pub mod schema;

pub use attr::{validate_list, AttrIter, AttrTable, AttrWriter, RawAttr};
pub use cursor::{Cursor, CursorMut};
pub use schema::{AttrSpec, AttrType, Schema};

use std::fmt;

/// Decode/encode error for the attribute codec.
///
/// Always recoverable by the caller; the message names the offending tag and
/// the record it appeared in so admin tooling can surface a useful cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Structurally broken stream (header shorter than 4 bytes, length past
    /// the end of the buffer, odd plateau payload, ...).
    Malformed { record: &'static str, reason: String },
    /// An attribute's payload width does not match its declared type.
    BadLength {
        record: &'static str,
        tag: u16,
        expected: usize,
        actual: usize,
    },
    /// A mandatory attribute is absent from the stream.
    MissingMandatory { record: &'static str, tag: u16 },
    /// A closed list carried an attribute under a tag other than its entry tag.
    UnexpectedTag { list: &'static str, tag: u16 },
    /// A prefix attribute arrived with an empty payload. Globals may omit a
    /// prefix this way, but a decoded prefix must be an actual value.
    EmptyPrefix { record: &'static str },
    /// The output buffer cannot hold the attribute being encoded.
    Exhausted,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Malformed { record, reason } => {
                write!(f, "malformed '{}' attribute stream: {}", record, reason)
            }
            CodecError::BadLength {
                record,
                tag,
                expected,
                actual,
            } => write!(
                f,
                "attribute {} of '{}' is {} bytes long, expected {}",
                tag, record, actual, expected
            ),
            CodecError::MissingMandatory { record, tag } => {
                write!(f, "'{}' is missing mandatory attribute {}", record, tag)
            }
            CodecError::UnexpectedTag { list, tag } => {
                write!(f, "unexpected attribute {} in '{}' list", tag, list)
            }
            CodecError::EmptyPrefix { record } => {
                write!(f, "the '{}' prefix attribute is empty", record)
            }
            CodecError::Exhausted => write!(f, "output buffer exhausted"),
        }
    }
}

impl std::error::Error for CodecError {}

pub type CodecResult<T> = std::result::Result<T, CodecError>;
