// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 xlat64 project

//! Read/write cursors for attribute stream manipulation.
//!
//! Attribute payloads carry integers in native byte order (netlink
//! convention) and pad every record to [`ALIGNTO`] bytes. The cursors are
//! bounds-checked; an overflow surfaces as [`CodecError::Exhausted`] on the
//! write side and a malformed-stream error on the read side, never a panic
//! or a silent truncation.

use super::{CodecError, CodecResult};

/// Attribute alignment unit. Every record starts on a 4-byte boundary.
pub const ALIGNTO: usize = 4;

/// Round `len` up to the next [`ALIGNTO`] boundary.
#[inline]
pub const fn align(len: usize) -> usize {
    (len + ALIGNTO - 1) & !(ALIGNTO - 1)
}

/// Generate read methods for native-endian primitives.
macro_rules! impl_read_ne {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> CodecResult<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(<$type>::from_ne_bytes(bytes))
        }
    };
}

/// Generate write methods for native-endian primitives.
macro_rules! impl_write_ne {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) -> CodecResult<()> {
            self.write_bytes(&value.to_ne_bytes())
        }
    };
}

/// Immutable cursor for reading (bounds-checked, zero-copy).
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
    record: &'static str,
}

impl<'a> Cursor<'a> {
    /// `record` is the logical name reported in decode errors.
    pub fn new(buffer: &'a [u8], record: &'static str) -> Self {
        Self {
            buffer,
            offset: 0,
            record,
        }
    }

    impl_read_ne!(read_u16, u16, 2);

    pub fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.offset + len > self.buffer.len() {
            return Err(CodecError::Malformed {
                record: self.record,
                reason: format!("unexpected end of stream at offset {}", self.offset),
            });
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Skip the padding that follows a record of `len` bytes, clamped to the
    /// end of the buffer (a missing trailing pad on the last attribute is
    /// tolerated, as in netlink).
    pub fn skip_pad(&mut self, len: usize) {
        self.offset = (self.offset + (align(len) - len)).min(self.buffer.len());
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }
}

/// Mutable cursor for writing (bounds-checked, zero-copy).
pub struct CursorMut<'a> {
    buffer: &'a mut [u8],
    offset: usize,
}

impl<'a> CursorMut<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_write_ne!(write_u8, u8);
    impl_write_ne!(write_u16, u16);
    impl_write_ne!(write_u32, u32);
    impl_write_ne!(write_u64, u64);

    pub fn write_bytes(&mut self, data: &[u8]) -> CodecResult<()> {
        if self.offset + data.len() > self.buffer.len() {
            return Err(CodecError::Exhausted);
        }
        self.buffer[self.offset..self.offset + data.len()].copy_from_slice(data);
        self.offset += data.len();
        Ok(())
    }

    /// Zero-fill up to the next alignment boundary.
    pub fn pad(&mut self) -> CodecResult<()> {
        let target = align(self.offset);
        if target > self.buffer.len() {
            return Err(CodecError::Exhausted);
        }
        self.buffer[self.offset..target].fill(0);
        self.offset = target;
        Ok(())
    }

    /// Overwrite a previously written u16 without moving the cursor.
    /// Used to fill in a nested container's length after its payload.
    pub fn patch_u16(&mut self, at: usize, value: u16) {
        debug_assert!(at + 2 <= self.offset);
        self.buffer[at..at + 2].copy_from_slice(&value.to_ne_bytes());
    }

    /// Rewind to a previously recorded offset, discarding everything
    /// written past it. Used to cancel a partially built nested attribute.
    pub fn rewind(&mut self, offset: usize) {
        debug_assert!(offset <= self.offset);
        self.offset = offset;
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}
