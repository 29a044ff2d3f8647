// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 xlat64 project

//! End-to-end administrative flow: encode a configuration request with the
//! wire codec, parse it back, apply each field to a registered translator
//! instance, and check what the packet path observes.

use std::time::Duration;

use xlat64::wire::schema::GLOBALS;
use xlat64::wire::{AttrTable, AttrWriter};
use xlat64::{ConfigError, FieldId, InstanceRegistry, NamespaceId, TranslatorInstance};

/// Apply every attribute of a parsed globals request to an instance,
/// the way the admin channel handler does.
fn apply_globals(
    instance: &TranslatorInstance,
    table: &AttrTable<'_>,
) -> Result<(), ConfigError> {
    for tag in 1..=GLOBALS.max_tag() {
        if let Some(payload) = table.get(tag) {
            instance.config().set(tag, payload)?;
        }
    }
    Ok(())
}

#[test]
fn globals_request_updates_a_registered_instance() {
    let registry = InstanceRegistry::new();
    let ns = NamespaceId(4026531840);
    registry
        .add(TranslatorInstance::new(ns).expect("defaults"))
        .expect("add");

    // Admin tool side: one request touching several fields.
    let mut buf = vec![0u8; 256];
    let mut w = AttrWriter::new(&mut buf);
    w.put_u64(FieldId::UdpTimeout as u16, 600_000).expect("udp");
    w.put_u64(FieldId::FragTimeout as u16, 5_000).expect("frag");
    w.put_u8(FieldId::NewTos as u16, 0x2E).expect("tos");
    w.put_u8(FieldId::DfAlwaysOn as u16, 1).expect("df");
    w.put_u16(FieldId::MinIpv6Mtu as u16, 1500).expect("mtu");
    let len = w.finish();

    // Handler side: parse (no field is mandatory) and apply.
    let table = AttrTable::parse(&buf[..len], &GLOBALS, false).expect("parse");
    let instance = registry.get(ns).expect("present");

    // A reader that grabbed its snapshot before the update keeps it.
    let stale = instance.config().get();
    apply_globals(&instance, &table).expect("apply");

    assert_eq!(stale.ttl_udp, Duration::from_secs(300));
    assert_eq!(stale.new_tos, 0);

    let fresh = instance.config().get();
    assert_eq!(fresh.ttl_udp, Duration::from_secs(600));
    assert_eq!(fresh.frag_timeout, Duration::from_secs(5));
    assert_eq!(fresh.new_tos, 0x2E);
    assert!(fresh.df_always_on);
    assert_eq!(fresh.min_ipv6_mtu, 1500);

    registry.put(&instance);
}

#[test]
fn invalid_field_aborts_without_corrupting_the_snapshot() {
    let instance = TranslatorInstance::new(NamespaceId(1)).expect("defaults");

    // The TCP established timeout is below its RFC floor; the new TOS value
    // before it must still not be visible afterwards, because the handler
    // stops at the first failure and reports it to the admin tool.
    let mut buf = vec![0u8; 128];
    let mut w = AttrWriter::new(&mut buf);
    w.put_u64(FieldId::TcpEstTimeout as u16, 1_000).expect("tcp");
    w.put_u8(FieldId::NewTos as u16, 0x2E).expect("tos");
    let len = w.finish();

    let table = AttrTable::parse(&buf[..len], &GLOBALS, false).expect("parse");
    let err = apply_globals(&instance, &table).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::OutOfRange { field, .. } if field == "tcp-established-timeout"
    ));

    let snapshot = instance.config().get();
    assert_eq!(snapshot.ttl_tcp_est, Duration::from_secs(7200));
    assert_eq!(snapshot.new_tos, 0);
}

#[test]
fn plateau_list_travels_as_one_binary_attribute() {
    let instance = TranslatorInstance::new(NamespaceId(2)).expect("defaults");

    let mut payload = Vec::new();
    for value in [1500u16, 0, 9000, 1500, 1492] {
        payload.extend_from_slice(&value.to_ne_bytes());
    }

    let mut buf = vec![0u8; 64];
    let mut w = AttrWriter::new(&mut buf);
    w.put(FieldId::MtuPlateaus as u16, &payload).expect("plateaus");
    let len = w.finish();

    let table = AttrTable::parse(&buf[..len], &GLOBALS, false).expect("parse");
    apply_globals(&instance, &table).expect("apply");

    assert_eq!(
        instance.config().get().plateaus.values(),
        &[9000, 1500, 1492]
    );
}

#[test]
fn requests_from_newer_tools_are_parsed_leniently() {
    let instance = TranslatorInstance::new(NamespaceId(3)).expect("defaults");

    // A future tool revision sends a tag this build does not know. Parsing
    // skips it; only the known field is applied.
    let mut buf = vec![0u8; 64];
    let mut w = AttrWriter::new(&mut buf);
    w.put_u32(GLOBALS.max_tag() + 10, 7).expect("future");
    w.put_u16(FieldId::MinIpv6Mtu as u16, 1400).expect("mtu");
    let len = w.finish();

    let table = AttrTable::parse(&buf[..len], &GLOBALS, false).expect("parse");
    apply_globals(&instance, &table).expect("apply");

    assert_eq!(instance.config().get().min_ipv6_mtu, 1400);
}
