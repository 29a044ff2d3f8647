// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 xlat64 project

//! MTU plateau canonicalization.
//!
//! Fragmentation decisions walk a descending list of MTU plateaus. The list
//! arrives as an arbitrary multiset of 16-bit values (from the compiled-in
//! defaults at startup, or from the admin tool at runtime); both paths go
//! through [`canonicalize`], a pure function producing the strictly
//! descending, deduplicated, zero-free list a snapshot publishes.

use super::ConfigError;

/// Maximum number of canonical plateaus a snapshot can hold.
pub const PLATEAUS_MAX: usize = 64;

/// Compiled-in default plateaus (the RFC 1191 table).
pub const DEFAULT_PLATEAUS: [u16; 11] = [
    65535, 32000, 17914, 8166, 4352, 2002, 1492, 1006, 508, 296, 68,
];

/// Canonical plateau list: unique positive values, strictly descending,
/// 1..=[`PLATEAUS_MAX`] entries. Only [`canonicalize`] constructs one, so
/// the invariants hold by construction; published lists are never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateauList {
    values: Vec<u16>,
}

impl PlateauList {
    pub fn values(&self) -> &[u16] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        // Never true: canonicalize rejects degenerate input.
        self.values.is_empty()
    }
}

/// Canonicalize a raw plateau multiset.
///
/// Sorts descending, then drops zeros and duplicates in one pass (zeros sort
/// last, so collection stops at the first zero). Identical input multisets
/// yield the identical list regardless of input order.
pub fn canonicalize(input: &[u16]) -> Result<PlateauList, ConfigError> {
    if input.is_empty() {
        return Err(ConfigError::Malformed {
            reason: "the plateau list is empty".into(),
        });
    }

    let mut sorted = input.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let mut values: Vec<u16> = Vec::with_capacity(sorted.len().min(PLATEAUS_MAX + 1));
    for value in sorted {
        if value == 0 {
            break;
        }
        if values.last() != Some(&value) {
            values.push(value);
        }
    }

    if values.is_empty() {
        return Err(ConfigError::AllZero);
    }
    if values.len() > PLATEAUS_MAX {
        return Err(ConfigError::TooMany {
            max: PLATEAUS_MAX,
            actual: values.len(),
        });
    }

    Ok(PlateauList { values })
}

/// Canonicalize a raw byte buffer as received on the wire: an array of
/// native-endian 16-bit values, even byte count required.
pub fn canonicalize_bytes(payload: &[u8]) -> Result<PlateauList, ConfigError> {
    if payload.is_empty() {
        return Err(ConfigError::Malformed {
            reason: "the plateau list is empty".into(),
        });
    }
    if payload.len() % 2 != 0 {
        return Err(ConfigError::Malformed {
            reason: "expected an array of 16-bit values, got an odd number of bytes".into(),
        });
    }

    let values: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
        .collect();
    canonicalize(&values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_example() {
        let list = canonicalize(&[0, 1500, 1500, 9000, 0, 1492]).expect("canonicalize");
        assert_eq!(list.values(), &[9000, 1500, 1492]);
    }

    #[test]
    fn all_zero_is_rejected() {
        assert_eq!(canonicalize(&[0, 0, 0]).unwrap_err(), ConfigError::AllZero);
    }

    #[test]
    fn empty_input_is_malformed() {
        assert!(matches!(
            canonicalize(&[]).unwrap_err(),
            ConfigError::Malformed { .. }
        ));
    }

    #[test]
    fn odd_byte_count_is_malformed() {
        assert!(matches!(
            canonicalize_bytes(&[0x05, 0xDC, 0x05]).unwrap_err(),
            ConfigError::Malformed { .. }
        ));
    }

    #[test]
    fn over_capacity_is_rejected_not_truncated() {
        let input: Vec<u16> = (1..=(PLATEAUS_MAX as u16 + 1)).collect();
        assert_eq!(
            canonicalize(&input).unwrap_err(),
            ConfigError::TooMany {
                max: PLATEAUS_MAX,
                actual: PLATEAUS_MAX + 1,
            }
        );
    }

    #[test]
    fn exactly_max_is_accepted() {
        let input: Vec<u16> = (1..=(PLATEAUS_MAX as u16)).collect();
        let list = canonicalize(&input).expect("canonicalize");
        assert_eq!(list.len(), PLATEAUS_MAX);
    }

    #[test]
    fn defaults_are_already_canonical() {
        let list = canonicalize(&DEFAULT_PLATEAUS).expect("canonicalize");
        assert_eq!(list.values(), &DEFAULT_PLATEAUS);
    }

    #[test]
    fn output_is_strictly_descending_and_idempotent() {
        // Random multisets with at least one nonzero value; canonicalizing
        // twice must equal canonicalizing once, independent of input order.
        for _ in 0..200 {
            let len = fastrand::usize(1..40);
            let mut input: Vec<u16> = (0..len).map(|_| fastrand::u16(0..10)).collect();
            input.push(fastrand::u16(1..u16::MAX));

            let once = canonicalize(&input).expect("at least one nonzero value");
            assert!(once.values().windows(2).all(|w| w[0] > w[1]));
            assert!(!once.values().contains(&0));

            let twice = canonicalize(once.values()).expect("canonical input");
            assert_eq!(once, twice);

            fastrand::shuffle(&mut input);
            let shuffled = canonicalize(&input).expect("same multiset");
            assert_eq!(once, shuffled);
        }
    }
}
