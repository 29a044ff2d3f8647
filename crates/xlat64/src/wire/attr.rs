// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 xlat64 project

//! Generic attribute engine: schema-validated parsing of flat and nested
//! TLV streams, and the inverse nested encoder.

use std::net::{Ipv4Addr, Ipv6Addr};

use super::cursor::{Cursor, CursorMut};
use super::schema::Schema;
use super::{CodecError, CodecResult};

/// Attribute header: tag (u16) + length (u16, header included).
pub const HDR_LEN: usize = 4;

/// A raw attribute as found in a stream.
#[derive(Debug, Clone, Copy)]
pub struct RawAttr<'a> {
    pub tag: u16,
    pub payload: &'a [u8],
}

/// Iterator over the attributes of a stream. Yields an error and stops on a
/// structurally broken header; trailing bytes shorter than a header are
/// ignored.
pub struct AttrIter<'a> {
    cursor: Cursor<'a>,
    record: &'static str,
    failed: bool,
}

impl<'a> AttrIter<'a> {
    pub fn new(buffer: &'a [u8], record: &'static str) -> Self {
        Self {
            cursor: Cursor::new(buffer, record),
            record,
            failed: false,
        }
    }

    fn next_attr(&mut self) -> CodecResult<RawAttr<'a>> {
        let tag = self.cursor.read_u16()?;
        let len = self.cursor.read_u16()? as usize;
        if len < HDR_LEN {
            return Err(CodecError::Malformed {
                record: self.record,
                reason: format!("attribute {} declares length {} (< header)", tag, len),
            });
        }
        let payload = self.cursor.read_bytes(len - HDR_LEN)?;
        self.cursor.skip_pad(len);
        Ok(RawAttr { tag, payload })
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = CodecResult<RawAttr<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.remaining() < HDR_LEN {
            return None;
        }
        let result = self.next_attr();
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Parsed view of an attribute stream: one slot per schema tag, borrowing
/// payloads from the input buffer.
#[derive(Debug)]
pub struct AttrTable<'a> {
    schema: &'static Schema,
    slots: Vec<Option<&'a [u8]>>,
}

impl<'a> AttrTable<'a> {
    /// Parse a top-level stream against `schema`.
    ///
    /// Tags beyond the schema's maximum (and tag 0) are accepted and ignored
    /// for forward compatibility. A declared fixed-width tag with the wrong
    /// payload width fails immediately. When `validate_mandatory` is set,
    /// every tag the schema marks required must be present.
    pub fn parse(
        buffer: &'a [u8],
        schema: &'static Schema,
        validate_mandatory: bool,
    ) -> CodecResult<Self> {
        let mut slots = vec![None; schema.specs.len()];

        for attr in AttrIter::new(buffer, schema.name) {
            let attr = attr?;
            let spec = match schema.spec(attr.tag) {
                Some(spec) => spec,
                None => continue, // unknown tag, skip
            };
            if let Some(width) = spec.ty.fixed_width() {
                if attr.payload.len() != width {
                    return Err(CodecError::BadLength {
                        record: schema.name,
                        tag: attr.tag,
                        expected: width,
                        actual: attr.payload.len(),
                    });
                }
            }
            // Last occurrence wins, as in netlink.
            slots[attr.tag as usize] = Some(attr.payload);
        }

        let table = Self { schema, slots };
        if validate_mandatory {
            table.validate_mandatory()?;
        }
        Ok(table)
    }

    /// Parse a single attribute's payload as a nested stream. Mandatory
    /// validation is always on for nested records.
    pub fn parse_nested(payload: &'a [u8], schema: &'static Schema) -> CodecResult<Self> {
        Self::parse(payload, schema, true)
    }

    fn validate_mandatory(&self) -> CodecResult<()> {
        for (tag, spec) in self.schema.specs.iter().enumerate() {
            if let Some(spec) = spec {
                if spec.required && self.slots[tag].is_none() {
                    return Err(CodecError::MissingMandatory {
                        record: self.schema.name,
                        tag: tag as u16,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, tag: u16) -> Option<&'a [u8]> {
        self.slots.get(tag as usize).copied().flatten()
    }

    /// Payload of `tag`, failing with `MissingMandatory` if absent. Record
    /// decoders use this even for schema-optional tags (e.g. prefixes) that
    /// the record itself cannot do without.
    pub fn attr(&self, tag: u16) -> CodecResult<&'a [u8]> {
        self.get(tag).ok_or(CodecError::MissingMandatory {
            record: self.schema.name,
            tag,
        })
    }

    fn fixed(&self, tag: u16, width: usize) -> CodecResult<&'a [u8]> {
        let payload = self.attr(tag)?;
        if payload.len() != width {
            return Err(CodecError::BadLength {
                record: self.schema.name,
                tag,
                expected: width,
                actual: payload.len(),
            });
        }
        Ok(payload)
    }

    pub fn u8_at(&self, tag: u16) -> CodecResult<u8> {
        Ok(self.fixed(tag, 1)?[0])
    }

    pub fn u16_at(&self, tag: u16) -> CodecResult<u16> {
        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(self.fixed(tag, 2)?);
        Ok(u16::from_ne_bytes(bytes))
    }

    pub fn u32_at(&self, tag: u16) -> CodecResult<u32> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.fixed(tag, 4)?);
        Ok(u32::from_ne_bytes(bytes))
    }

    pub fn u64_at(&self, tag: u16) -> CodecResult<u64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.fixed(tag, 8)?);
        Ok(u64::from_ne_bytes(bytes))
    }

    pub fn addr4_at(&self, tag: u16) -> CodecResult<Ipv4Addr> {
        let mut octets = [0u8; 4];
        octets.copy_from_slice(self.fixed(tag, 4)?);
        Ok(Ipv4Addr::from(octets))
    }

    pub fn addr6_at(&self, tag: u16) -> CodecResult<Ipv6Addr> {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(self.fixed(tag, 16)?);
        Ok(Ipv6Addr::from(octets))
    }
}

/// Validate a repeated-entry list: every element must carry the schema's
/// single entry tag, with the declared width. Any other tag is a hard
/// failure naming the offender and the list.
pub fn validate_list(buffer: &[u8], schema: &'static Schema) -> CodecResult<()> {
    for attr in AttrIter::new(buffer, schema.name) {
        let attr = attr?;
        let spec = match schema.spec(attr.tag) {
            Some(spec) => spec,
            None => {
                return Err(CodecError::UnexpectedTag {
                    list: schema.name,
                    tag: attr.tag,
                })
            }
        };
        if let Some(width) = spec.ty.fixed_width() {
            if attr.payload.len() != width {
                return Err(CodecError::BadLength {
                    record: schema.name,
                    tag: attr.tag,
                    expected: width,
                    actual: attr.payload.len(),
                });
            }
        }
    }
    Ok(())
}

/// Encoder for flat and nested attribute streams over a caller-supplied
/// buffer. Any overflow leaves no partial attribute behind: `put` rewinds
/// its own record, and a cancelled nest discards everything written since
/// `nest_start`.
pub struct AttrWriter<'a> {
    cursor: CursorMut<'a>,
}

impl<'a> AttrWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            cursor: CursorMut::new(buffer),
        }
    }

    /// Append one attribute (header + payload + padding), all or nothing.
    pub fn put(&mut self, tag: u16, payload: &[u8]) -> CodecResult<()> {
        let mark = self.cursor.offset();
        self.put_inner(tag, payload).inspect_err(|_| {
            self.cursor.rewind(mark);
        })
    }

    fn put_inner(&mut self, tag: u16, payload: &[u8]) -> CodecResult<()> {
        let len = HDR_LEN + payload.len();
        if len > u16::MAX as usize {
            return Err(CodecError::Exhausted);
        }
        self.cursor.write_u16(tag)?;
        self.cursor.write_u16(len as u16)?;
        self.cursor.write_bytes(payload)?;
        self.cursor.pad()
    }

    pub fn put_u8(&mut self, tag: u16, value: u8) -> CodecResult<()> {
        self.put(tag, &value.to_ne_bytes())
    }

    pub fn put_u16(&mut self, tag: u16, value: u16) -> CodecResult<()> {
        self.put(tag, &value.to_ne_bytes())
    }

    pub fn put_u32(&mut self, tag: u16, value: u32) -> CodecResult<()> {
        self.put(tag, &value.to_ne_bytes())
    }

    pub fn put_u64(&mut self, tag: u16, value: u64) -> CodecResult<()> {
        self.put(tag, &value.to_ne_bytes())
    }

    pub fn put_addr4(&mut self, tag: u16, addr: &Ipv4Addr) -> CodecResult<()> {
        self.put(tag, &addr.octets())
    }

    pub fn put_addr6(&mut self, tag: u16, addr: &Ipv6Addr) -> CodecResult<()> {
        self.put(tag, &addr.octets())
    }

    /// Append an attribute with an empty payload (an omitted "global" prefix).
    pub fn put_empty(&mut self, tag: u16) -> CodecResult<()> {
        self.put(tag, &[])
    }

    /// Open a nested container. Returns a handle for `nest_end`/`nest_cancel`.
    pub fn nest_start(&mut self, tag: u16) -> CodecResult<usize> {
        let start = self.cursor.offset();
        self.cursor.write_u16(tag).inspect_err(|_| {
            self.cursor.rewind(start);
        })?;
        // Length placeholder, patched by nest_end.
        self.cursor.write_u16(0).inspect_err(|_| {
            self.cursor.rewind(start);
        })?;
        Ok(start)
    }

    /// Close a nested container, filling in its length.
    pub fn nest_end(&mut self, start: usize) -> CodecResult<()> {
        let len = self.cursor.offset() - start;
        if len > u16::MAX as usize {
            self.cursor.rewind(start);
            return Err(CodecError::Exhausted);
        }
        self.cursor.patch_u16(start + 2, len as u16);
        Ok(())
    }

    /// Discard a partially built nested container.
    pub fn nest_cancel(&mut self, start: usize) {
        self.cursor.rewind(start);
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.cursor.offset()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.offset() == 0
    }

    /// Finish encoding and return the number of bytes written.
    pub fn finish(self) -> usize {
        self.cursor.offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::schema::{self, LA_ENTRY, TAA_ADDR, TAA_PORT};

    fn encode_taddr6_bytes(port: u16) -> Vec<u8> {
        let mut buf = vec![0u8; 64];
        let mut w = AttrWriter::new(&mut buf);
        w.put_addr6(TAA_ADDR, &Ipv6Addr::LOCALHOST)
            .expect("encode addr");
        w.put_u16(TAA_PORT, port).expect("encode port");
        let len = w.finish();
        buf.truncate(len);
        buf
    }

    #[test]
    fn parse_reads_back_written_attributes() {
        let buf = encode_taddr6_bytes(6969);
        let table = AttrTable::parse(&buf, &schema::TADDR6, true).expect("parse");
        assert_eq!(table.addr6_at(TAA_ADDR).expect("addr"), Ipv6Addr::LOCALHOST);
        assert_eq!(table.u16_at(TAA_PORT).expect("port"), 6969);
    }

    #[test]
    fn missing_mandatory_names_the_tag() {
        let mut buf = vec![0u8; 32];
        let mut w = AttrWriter::new(&mut buf);
        w.put_addr6(TAA_ADDR, &Ipv6Addr::UNSPECIFIED)
            .expect("encode addr");
        let len = w.finish();

        let err = AttrTable::parse(&buf[..len], &schema::TADDR6, true).unwrap_err();
        assert_eq!(
            err,
            CodecError::MissingMandatory {
                record: "IPv6 transport address",
                tag: TAA_PORT,
            }
        );
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let mut buf = vec![0u8; 64];
        let mut w = AttrWriter::new(&mut buf);
        w.put_addr6(TAA_ADDR, &Ipv6Addr::LOCALHOST).expect("addr");
        w.put_u16(TAA_PORT, 80).expect("port");
        w.put_u32(900, 0xDEAD_BEEF).expect("future tag");
        let len = w.finish();

        let table = AttrTable::parse(&buf[..len], &schema::TADDR6, true).expect("parse");
        assert_eq!(table.u16_at(TAA_PORT).expect("port"), 80);
    }

    #[test]
    fn declared_width_is_enforced_at_parse() {
        let mut buf = vec![0u8; 32];
        let mut w = AttrWriter::new(&mut buf);
        w.put_u32(TAA_PORT, 80).expect("wrong-width port");
        let len = w.finish();

        let err = AttrTable::parse(&buf[..len], &schema::TADDR6, false).unwrap_err();
        assert_eq!(
            err,
            CodecError::BadLength {
                record: "IPv6 transport address",
                tag: TAA_PORT,
                expected: 2,
                actual: 4,
            }
        );
    }

    #[test]
    fn truncated_header_length_is_malformed() {
        // Attribute claims 2 bytes of total length, less than its own header.
        let mut buf = vec![0u8; 8];
        buf[..2].copy_from_slice(&1u16.to_ne_bytes());
        buf[2..4].copy_from_slice(&2u16.to_ne_bytes());
        let err = AttrTable::parse(&buf, &schema::TADDR6, false).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn validate_list_rejects_foreign_tag() {
        let mut buf = vec![0u8; 64];
        let mut w = AttrWriter::new(&mut buf);
        w.put_u16(LA_ENTRY, 1500).expect("entry");
        w.put_u16(7, 1280).expect("foreign tag");
        w.put_u16(LA_ENTRY, 1492).expect("entry");
        let len = w.finish();

        let err = validate_list(&buf[..len], &schema::PLATEAU_LIST).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnexpectedTag {
                list: "plateaus",
                tag: 7,
            }
        );
    }

    #[test]
    fn nest_cancel_leaves_no_partial_bytes() {
        let mut buf = vec![0u8; 24];
        let mut w = AttrWriter::new(&mut buf);
        w.put_u16(1, 42).expect("first attribute");
        let before = w.len();

        let root = w.nest_start(2).expect("nest fits");
        w.put_u32(1, 7).expect("inner fits");
        // The second inner attribute overflows the 24-byte buffer.
        assert_eq!(w.put_u32(2, 8).unwrap_err(), CodecError::Exhausted);
        w.nest_cancel(root);

        assert_eq!(w.len(), before);
    }

    #[test]
    fn nested_roundtrip() {
        let mut buf = vec![0u8; 64];
        let mut w = AttrWriter::new(&mut buf);
        let root = w.nest_start(5).expect("nest");
        w.put_addr6(TAA_ADDR, &Ipv6Addr::LOCALHOST).expect("addr");
        w.put_u16(TAA_PORT, 443).expect("port");
        w.nest_end(root).expect("end");
        let len = w.finish();

        // Outer stream has a single nested attribute under tag 5.
        let mut iter = AttrIter::new(&buf[..len], "outer");
        let outer = iter.next().expect("one attribute").expect("well-formed");
        assert_eq!(outer.tag, 5);
        assert!(iter.next().is_none());

        let table = AttrTable::parse_nested(outer.payload, &schema::TADDR6).expect("nested");
        assert_eq!(table.u16_at(TAA_PORT).expect("port"), 443);
    }
}
