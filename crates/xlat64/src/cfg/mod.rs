// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 xlat64 project

//! Runtime configuration: the immutable snapshot, the lock-free store and
//! the MTU plateau canonicalizer.

pub mod plateaus;
pub mod store;

pub use plateaus::{canonicalize, canonicalize_bytes, PlateauList, PLATEAUS_MAX};
pub use store::{ConfigSnapshot, ConfigStore, FieldId, Hdr4Config, SnapshotGuard};

use std::fmt;

/// Validation error for configuration updates.
///
/// Always recoverable: the store never publishes an invalid snapshot, so the
/// running translator keeps using its last-valid configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The raw value's byte length does not match the field's fixed width.
    WrongSize {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The value is below the field's protocol-mandated floor or beyond the
    /// representable range of the internal tick unit.
    OutOfRange { field: &'static str, reason: String },
    /// Structurally broken value (empty plateau list, odd byte count, ...).
    Malformed { reason: String },
    /// The plateau list contains nothing but zeroes.
    AllZero,
    /// The canonical plateau list exceeds the fixed maximum capacity.
    TooMany { max: usize, actual: usize },
    /// The field identifier is not a known tunable.
    UnknownField(u16),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::WrongSize {
                field,
                expected,
                actual,
            } => write!(
                f,
                "'{}' expects a {}-byte value, got {} bytes",
                field, expected, actual
            ),
            ConfigError::OutOfRange { field, reason } => {
                write!(f, "'{}' is out of range: {}", field, reason)
            }
            ConfigError::Malformed { reason } => write!(f, "malformed value: {}", reason),
            ConfigError::AllZero => write!(f, "the plateau list contains nothing but zeroes"),
            ConfigError::TooMany { max, actual } => {
                write!(f, "too many plateaus: {} (maximum is {})", actual, max)
            }
            ConfigError::UnknownField(id) => write!(f, "unknown configuration field: {}", id),
        }
    }
}

impl std::error::Error for ConfigError {}
