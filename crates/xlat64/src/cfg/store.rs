// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 xlat64 project

//! The configuration store: an atomic snapshot pointer with lock-free reads
//! and validated copy-on-write updates.
//!
//! Readers run on the packet path and must never block or sleep: `get()` is
//! a single atomic load whose guard pins the observed snapshot for the
//! caller's read duration. The writer (the admin channel, externally
//! serialized to at most one `set` in flight) clones the current snapshot,
//! validates the one field change, and publishes the copy with an atomic
//! swap. Readers that already hold the old snapshot keep observing it; the
//! superseded snapshot is reclaimed once the last guard drops, which is the
//! grace period here (per-snapshot reference counts instead of an RCU
//! synchronize).

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, Guard};

use super::plateaus::{self, PlateauList, DEFAULT_PLATEAUS};
use super::ConfigError;

// Session timeout defaults; the TCP values double as their own floors
// (RFC 6146 minimums), as do the fragment and UDP floors.
const TTL_UDP_DEFAULT: Duration = Duration::from_secs(300);
const TTL_UDP_MIN: Duration = Duration::from_secs(120);
const TTL_ICMP_DEFAULT: Duration = Duration::from_secs(60);
const TTL_ICMP_MIN: Duration = Duration::ZERO;
const TTL_TCP_EST_DEFAULT: Duration = Duration::from_secs(7200);
const TTL_TCP_TRANS_DEFAULT: Duration = Duration::from_secs(240);
const FRAG_TIMEOUT_DEFAULT: Duration = Duration::from_secs(2);

const MAX_STORED_PKTS_DEFAULT: u64 = 16;
const NEW_TOS_DEFAULT: u8 = 0;
const MIN_IPV6_MTU_DEFAULT: u16 = 1280;

/// Timeouts travel as u64 milliseconds but are stored in a 32-bit tick unit,
/// so anything above this cannot be represented.
const TIMEOUT_CEILING_MS: u64 = u32::MAX as u64;

/// Wire identifier of a tunable, as carried by the admin attribute stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldId {
    MaxStoredPkts = 1,
    UdpTimeout = 2,
    IcmpTimeout = 3,
    TcpEstTimeout = 4,
    TcpTransTimeout = 5,
    FragTimeout = 6,
    DropByAddr = 7,
    DropIcmp6Info = 8,
    DropExternalTcp = 9,
    ResetTrafficClass = 10,
    ResetTos = 11,
    NewTos = 12,
    DfAlwaysOn = 13,
    BuildIpv6Fh = 14,
    BuildIpv4Id = 15,
    LowerMtuFail = 16,
    MtuPlateaus = 17,
    MinIpv6Mtu = 18,
}

impl FieldId {
    pub fn name(self) -> &'static str {
        match self {
            FieldId::MaxStoredPkts => "max-queued-packets",
            FieldId::UdpTimeout => "udp-timeout",
            FieldId::IcmpTimeout => "icmp-timeout",
            FieldId::TcpEstTimeout => "tcp-established-timeout",
            FieldId::TcpTransTimeout => "tcp-transitory-timeout",
            FieldId::FragTimeout => "fragment-timeout",
            FieldId::DropByAddr => "drop-by-address",
            FieldId::DropIcmp6Info => "drop-icmp-info",
            FieldId::DropExternalTcp => "drop-external-tcp",
            FieldId::ResetTrafficClass => "reset-traffic-class",
            FieldId::ResetTos => "reset-tos",
            FieldId::NewTos => "new-tos",
            FieldId::DfAlwaysOn => "df-always-on",
            FieldId::BuildIpv6Fh => "build-ipv6-fragment-header",
            FieldId::BuildIpv4Id => "build-ipv4-identification",
            FieldId::LowerMtuFail => "fail-on-lower-mtu",
            FieldId::MtuPlateaus => "mtu-plateaus",
            FieldId::MinIpv6Mtu => "min-ipv6-mtu",
        }
    }

    fn from_raw(raw: u16) -> Result<Self, ConfigError> {
        Ok(match raw {
            1 => FieldId::MaxStoredPkts,
            2 => FieldId::UdpTimeout,
            3 => FieldId::IcmpTimeout,
            4 => FieldId::TcpEstTimeout,
            5 => FieldId::TcpTransTimeout,
            6 => FieldId::FragTimeout,
            7 => FieldId::DropByAddr,
            8 => FieldId::DropIcmp6Info,
            9 => FieldId::DropExternalTcp,
            10 => FieldId::ResetTrafficClass,
            11 => FieldId::ResetTos,
            12 => FieldId::NewTos,
            13 => FieldId::DfAlwaysOn,
            14 => FieldId::BuildIpv6Fh,
            15 => FieldId::BuildIpv4Id,
            16 => FieldId::LowerMtuFail,
            17 => FieldId::MtuPlateaus,
            18 => FieldId::MinIpv6Mtu,
            other => return Err(ConfigError::UnknownField(other)),
        })
    }
}

/// One IPv4-header-build decision's worth of tunables, read under a single
/// snapshot so the fields are mutually consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hdr4Config {
    pub reset_tos: bool,
    pub new_tos: u8,
    pub build_ipv4_id: bool,
    pub df_always_on: bool,
}

/// An immutable, fully-populated configuration value.
///
/// Published snapshots are never mutated in place; every update constructs a
/// new one. The plateau list is shared by `Arc` across snapshots that did
/// not change it; published lists are never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub ttl_udp: Duration,
    pub ttl_icmp: Duration,
    pub ttl_tcp_est: Duration,
    pub ttl_tcp_trans: Duration,
    pub frag_timeout: Duration,
    pub max_stored_pkts: u64,

    pub drop_by_addr: bool,
    pub drop_icmp6_info: bool,
    pub drop_external_tcp: bool,

    pub reset_traffic_class: bool,
    pub reset_tos: bool,
    pub new_tos: u8,
    pub df_always_on: bool,
    pub build_ipv6_fh: bool,
    pub build_ipv4_id: bool,
    pub lower_mtu_fail: bool,

    pub plateaus: Arc<PlateauList>,
    pub min_ipv6_mtu: u16,
}

impl ConfigSnapshot {
    /// Compiled-in defaults. The default plateau list goes through the
    /// canonicalizer so startup and runtime updates share one code path.
    pub fn defaults() -> Result<Self, ConfigError> {
        Ok(Self {
            ttl_udp: TTL_UDP_DEFAULT,
            ttl_icmp: TTL_ICMP_DEFAULT,
            ttl_tcp_est: TTL_TCP_EST_DEFAULT,
            ttl_tcp_trans: TTL_TCP_TRANS_DEFAULT,
            frag_timeout: FRAG_TIMEOUT_DEFAULT,
            max_stored_pkts: MAX_STORED_PKTS_DEFAULT,
            drop_by_addr: false,
            drop_icmp6_info: false,
            drop_external_tcp: false,
            reset_traffic_class: false,
            reset_tos: false,
            new_tos: NEW_TOS_DEFAULT,
            df_always_on: false,
            build_ipv6_fh: false,
            build_ipv4_id: true,
            lower_mtu_fail: true,
            plateaus: Arc::new(plateaus::canonicalize(&DEFAULT_PLATEAUS)?),
            min_ipv6_mtu: MIN_IPV6_MTU_DEFAULT,
        })
    }

    pub fn hdr4_config(&self) -> Hdr4Config {
        Hdr4Config {
            reset_tos: self.reset_tos,
            new_tos: self.new_tos,
            build_ipv4_id: self.build_ipv4_id,
            df_always_on: self.df_always_on,
        }
    }
}

/// Scoped handle to a published snapshot.
///
/// Keeps the snapshot alive for the caller's read duration without a lock;
/// release (drop) before leaving the critical section.
pub struct SnapshotGuard {
    inner: Guard<Arc<ConfigSnapshot>>,
}

impl Deref for SnapshotGuard {
    type Target = ConfigSnapshot;

    fn deref(&self) -> &ConfigSnapshot {
        &self.inner
    }
}

/// The live configuration of one translator instance.
///
/// Dropping the store releases the current snapshot; by then the owning
/// instance is unreachable, so no reader can still hold a guard into it.
pub struct ConfigStore {
    current: ArcSwap<ConfigSnapshot>,
}

impl ConfigStore {
    /// Build the first snapshot from compiled-in defaults.
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            current: ArcSwap::from_pointee(ConfigSnapshot::defaults()?),
        })
    }

    /// Current snapshot, lock-free. Safe to call concurrently from
    /// arbitrarily many readers, including contexts that must not sleep.
    pub fn get(&self) -> SnapshotGuard {
        SnapshotGuard {
            inner: self.current.load(),
        }
    }

    /// Validate and apply a single field change, then publish.
    ///
    /// Callers serialize writers externally; `set` is never mutually
    /// exclusive with readers. Any validation failure discards the working
    /// copy and leaves the live snapshot completely untouched.
    pub fn set(&self, field: u16, payload: &[u8]) -> Result<(), ConfigError> {
        let field = FieldId::from_raw(field)?;
        let current = self.current.load_full();
        let mut next = ConfigSnapshot::clone(&current);

        match field {
            FieldId::MaxStoredPkts => next.max_stored_pkts = read_u64(field, payload)?,
            FieldId::UdpTimeout => next.ttl_udp = read_timeout(field, payload, TTL_UDP_MIN)?,
            FieldId::IcmpTimeout => next.ttl_icmp = read_timeout(field, payload, TTL_ICMP_MIN)?,
            FieldId::TcpEstTimeout => {
                next.ttl_tcp_est = read_timeout(field, payload, TTL_TCP_EST_DEFAULT)?
            }
            FieldId::TcpTransTimeout => {
                next.ttl_tcp_trans = read_timeout(field, payload, TTL_TCP_TRANS_DEFAULT)?
            }
            FieldId::FragTimeout => {
                next.frag_timeout = read_timeout(field, payload, FRAG_TIMEOUT_DEFAULT)?
            }
            FieldId::DropByAddr => next.drop_by_addr = read_bool(field, payload)?,
            FieldId::DropIcmp6Info => next.drop_icmp6_info = read_bool(field, payload)?,
            FieldId::DropExternalTcp => next.drop_external_tcp = read_bool(field, payload)?,
            FieldId::ResetTrafficClass => next.reset_traffic_class = read_bool(field, payload)?,
            FieldId::ResetTos => next.reset_tos = read_bool(field, payload)?,
            FieldId::NewTos => next.new_tos = read_u8(field, payload)?,
            FieldId::DfAlwaysOn => next.df_always_on = read_bool(field, payload)?,
            FieldId::BuildIpv6Fh => next.build_ipv6_fh = read_bool(field, payload)?,
            FieldId::BuildIpv4Id => next.build_ipv4_id = read_bool(field, payload)?,
            FieldId::LowerMtuFail => next.lower_mtu_fail = read_bool(field, payload)?,
            FieldId::MtuPlateaus => {
                // The only field whose backing storage is deep-replaced;
                // everything else may alias the prior list.
                next.plateaus = Arc::new(plateaus::canonicalize_bytes(payload)?);
            }
            FieldId::MinIpv6Mtu => next.min_ipv6_mtu = read_u16(field, payload)?,
        }

        self.current.store(Arc::new(next));
        log::debug!("config: updated '{}'", field.name());
        Ok(())
    }
}

fn expect_width(field: FieldId, payload: &[u8], expected: usize) -> Result<(), ConfigError> {
    if payload.len() != expected {
        return Err(ConfigError::WrongSize {
            field: field.name(),
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

fn read_u8(field: FieldId, payload: &[u8]) -> Result<u8, ConfigError> {
    expect_width(field, payload, 1)?;
    Ok(payload[0])
}

fn read_bool(field: FieldId, payload: &[u8]) -> Result<bool, ConfigError> {
    Ok(read_u8(field, payload)? != 0)
}

fn read_u16(field: FieldId, payload: &[u8]) -> Result<u16, ConfigError> {
    expect_width(field, payload, 2)?;
    Ok(u16::from_ne_bytes([payload[0], payload[1]]))
}

fn read_u64(field: FieldId, payload: &[u8]) -> Result<u64, ConfigError> {
    expect_width(field, payload, 8)?;
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(payload);
    Ok(u64::from_ne_bytes(bytes))
}

/// Timeouts arrive as u64 milliseconds; enforce the field's floor and the
/// 32-bit tick ceiling.
fn read_timeout(field: FieldId, payload: &[u8], floor: Duration) -> Result<Duration, ConfigError> {
    let ms = read_u64(field, payload)?;
    if ms < floor.as_millis() as u64 {
        return Err(ConfigError::OutOfRange {
            field: field.name(),
            reason: format!("must be at least {} seconds", floor.as_secs()),
        });
    }
    if ms > TIMEOUT_CEILING_MS {
        return Err(ConfigError::OutOfRange {
            field: field.name(),
            reason: format!("must be at most {} milliseconds", TIMEOUT_CEILING_MS),
        });
    }
    Ok(Duration::from_millis(ms))
}
