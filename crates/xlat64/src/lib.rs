// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 xlat64 project

//! # xlat64 - IPv4/IPv6 translator control plane
//!
//! Configuration synchronization and wire codec core for a NAT64/SIIT
//! protocol translator. The translator's packet path reads configuration on
//! every filtering/translation decision and must never block; an
//! administrative tool reconfigures it concurrently and rarely. This crate
//! owns the two pieces everything else is built on:
//!
//! - a lock-free configuration store (atomic snapshot pointer, copy-on-write
//!   updates, refcounted reclamation of superseded snapshots), and
//! - a schema-driven binary attribute codec (netlink-style tag/length/value
//!   streams) plus the typed record marshallers layered on it.
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                    Administrative tool                       |
//! |        encode/decode requests via wire::records              |
//! +--------------------------------------------------------------+
//! |                        wire codec                            |
//! |   AttrTable (parse/validate) | AttrWriter (nested encode)    |
//! +--------------------------------------------------------------+
//! |                     configuration core                       |
//! |   ConfigStore (ArcSwap snapshot) | plateau canonicalizer     |
//! +--------------------------------------------------------------+
//! |                   instance lifetime                          |
//! |   InstanceRegistry (one TranslatorInstance per namespace)    |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConfigStore`] | Published-snapshot store; lock-free reads, validated writes |
//! | [`ConfigSnapshot`] | Immutable value holding every tunable |
//! | [`AttrTable`](wire::AttrTable) | Parsed view of an attribute stream |
//! | [`AttrWriter`](wire::AttrWriter) | Nested attribute encoder |
//! | [`InstanceRegistry`] | Per-namespace translator instances, refcounted |
//!
//! Packet-header rewriting, the pool/BIB/session table internals and the
//! control-channel transport live outside this crate; they consume the
//! store and the codec through the interfaces re-exported below.

/// Configuration snapshot, store and plateau canonicalizer.
pub mod cfg;
/// Translator instances and the per-namespace registry.
pub mod instance;
/// Attribute wire codec: cursors, schemas, generic TLV engine, typed records.
pub mod wire;

pub use cfg::plateaus::{canonicalize, PlateauList, PLATEAUS_MAX};
pub use cfg::store::{ConfigSnapshot, ConfigStore, FieldId, SnapshotGuard};
pub use cfg::ConfigError;
pub use instance::{InstanceRegistry, NamespaceId, RegistryError, TranslatorInstance};
pub use wire::{CodecError, CodecResult};
