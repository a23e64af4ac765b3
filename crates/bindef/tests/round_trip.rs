// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Round-trip integration tests.
//!
//! Trees filled with random values must serialize to bytes that parse back
//! into the same values, and the `pair` format must produce the exact
//! bytes documented in the crate root.

use bindef::traversal::{parse, serialize_to_vec};
use bindef::{node, sanitize, Descriptor, FieldSpec, Meta, Tree, Value};
use std::sync::Arc;

fn pair() -> Arc<Descriptor> {
    sanitize(
        &FieldSpec::container("pair")
            .entry(FieldSpec::field("len", "UInt8"))
            .entry(FieldSpec::field("payload", "StrRawAscii").size_path(".len")),
    )
    .expect("pair is valid")
}

fn record() -> Arc<Descriptor> {
    sanitize(
        &FieldSpec::container("record")
            .endian(">")
            .entry(FieldSpec::field("magic", "UInt32").default_value(0x4244_4546u32))
            .entry(FieldSpec::field("count", "UInt8"))
            .entry(FieldSpec::array(
                "items",
                Meta::path(".count"),
                FieldSpec::field("item", "SInt16"),
            ))
            .entry(FieldSpec::field("name_len", "UInt8"))
            .entry(FieldSpec::field("name", "StrRawAscii").size_path(".name_len"))
            .entry(FieldSpec::field("label", "CStrUtf8"))
            .entry(FieldSpec::field("ratio", "Double").align(8))
            .entry(FieldSpec::field("gain", "Float"))
            .entry(
                FieldSpec::field("flags", "BitStruct")
                    .entry(FieldSpec::field("ready", "Bit"))
                    .entry(
                        FieldSpec::field("mode", "UBitEnum")
                            .size(3)
                            .option("idle")
                            .option("busy")
                            .option("done"),
                    )
                    .entry(FieldSpec::field("delta", "SBitInt").size(4)),
            )
            .entry(FieldSpec::field("stamp", "SIntBig").size(6))
            .entry(FieldSpec::field("kind", "UInt8"))
            .entry(
                FieldSpec::switch("body", Meta::path(".kind"))
                    .add_case(0, FieldSpec::field("short", "LUInt16"))
                    .add_case(1, FieldSpec::field("text", "CStrAscii")),
            )
            .entry(FieldSpec::field("trailer", "StrAscii").size(6)),
    )
    .expect("record is valid")
}

fn random_text(rng: &mut fastrand::Rng, max: usize) -> String {
    let len = rng.usize(0..=max);
    (0..len).map(|_| rng.alphanumeric()).collect()
}

fn random_record(desc: &Arc<Descriptor>, rng: &mut fastrand::Rng) -> Tree {
    let mut tree = node::build(desc, None).expect("default tree");
    let root = tree.root();

    let count = rng.u8(0..6);
    tree.set(root, "count", count).expect("count");
    let items = tree.child(root, "items").expect("items");
    for _ in 0..count {
        let item = tree.append(items).expect("append");
        tree.set_value(item, rng.i16(..)).expect("item");
    }

    let name = random_text(rng, 12);
    tree.set(root, "name_len", name.len()).expect("name_len");
    tree.set(root, "name", name.as_str()).expect("name");
    tree.set(root, "label", random_text(rng, 20)).expect("label");
    tree.set(root, "ratio", rng.f64() * 1000.0 - 500.0).expect("ratio");
    tree.set(root, "gain", rng.f64() * 200.0 - 100.0).expect("gain");
    let flags = tree.child(root, "flags").expect("flags");
    tree.set(flags, "ready", rng.bool()).expect("ready");
    tree.set(flags, "mode", rng.u8(0..8)).expect("mode");
    tree.set(flags, "delta", rng.i8(-8..8)).expect("delta");
    tree.set(root, "stamp", rng.i64(-(1 << 47)..(1 << 47))).expect("stamp");

    let kind = rng.u8(0..2);
    tree.set(root, "kind", kind).expect("kind");
    let body = tree.child(root, "body").expect("body");
    let case = tree.set_active(body, i64::from(kind)).expect("case").expect("active");
    if kind == 0 {
        tree.set_value(case, rng.u16(..)).expect("short");
    } else {
        tree.set_value(case, random_text(rng, 8)).expect("text");
    }

    tree.set(root, "trailer", random_text(rng, 6)).expect("trailer");
    tree
}

#[test]
fn test_pair_end_to_end() {
    let desc = pair();
    let mut tree = node::build(&desc, None).expect("build");
    let root = tree.root();
    tree.set(root, "len", 5u8).expect("len");
    tree.set(root, "payload", "abcde").expect("payload");

    let bytes = serialize_to_vec(&tree).expect("serialize");
    assert_eq!(bytes, vec![0x05, b'a', b'b', b'c', b'd', b'e']);

    let back = parse(&desc, &bytes).expect("parse");
    let root = back.root();
    assert_eq!(back.get(root, "len").expect("len"), Value::UInt(5));
    assert_eq!(back.get(root, "payload").expect("payload"), Value::Str("abcde".into()));
}

#[test]
fn test_random_records_round_trip() {
    let desc = record();
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for round in 0..200 {
        let tree = random_record(&desc, &mut rng);
        let bytes = serialize_to_vec(&tree).expect("serialize");
        let back = parse(&desc, &bytes).expect("parse");
        assert!(back.values_eq(&tree), "round {} differs", round);
        assert_eq!(serialize_to_vec(&back).expect("reserialize"), bytes);
    }
}

#[test]
fn test_default_tree_round_trips() {
    let desc = record();
    let tree = node::build(&desc, None).expect("build");
    let bytes = serialize_to_vec(&tree).expect("serialize");
    assert_eq!(&bytes[..4], &[0x42, 0x44, 0x45, 0x46]);
    let back = parse(&desc, &bytes).expect("parse");
    assert!(back.values_eq(&tree));
}

#[test]
fn test_truncated_input_is_an_error() {
    let desc = pair();
    assert!(parse(&desc, &[5u8, b'a', b'b']).is_err());
}
