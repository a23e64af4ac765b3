// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Descriptor integration tests: sanitize idempotence, collected schema
//! errors and name/position equivalence on built trees.

use bindef::error::SchemaErrorKind;
use bindef::{node, sanitize, FieldSpec, Key, Meta, NodeKind};

fn specs() -> Vec<FieldSpec> {
    vec![
        FieldSpec::container("pair")
            .entry(FieldSpec::field("len", "UInt8"))
            .entry(FieldSpec::field("payload", "StrRawAscii").size_path(".len")),
        FieldSpec::structure("header")
            .endian(">")
            .entry(FieldSpec::field("tag", "UInt8"))
            .entry(FieldSpec::pad(1))
            .entry(FieldSpec::field("value", "UInt32").align(4))
            .entry(FieldSpec::field("flags", "UInt16").offset(12)),
        FieldSpec::container("message")
            .entry(
                FieldSpec::field("mode", "UEnum8")
                    .option("idle")
                    .option_value("run", 4u8)
                    .option("stop"),
            )
            .entry(FieldSpec::field("bits", "Bool8").option("a").option("b"))
            .entry(
                FieldSpec::switch("body", Meta::path(".mode"))
                    .size(4)
                    .add_case(4, FieldSpec::field("speed", "Float"))
                    .add_case(5, FieldSpec::field("code", "StrAscii"))
                    .default_case(FieldSpec::field("raw", "BytesRaw")),
            )
            .entry(
                FieldSpec::field("packed", "StreamAdapter")
                    .decoder("zlib")
                    .sub_struct(FieldSpec::field("inner", "CStrUtf8")),
            ),
        FieldSpec::container("chunks")
            .steptree_root()
            .entry(FieldSpec::field("count", "LUInt16"))
            .entry(FieldSpec::array(
                "chunk",
                Meta::path(".count"),
                FieldSpec::container("entry")
                    .entry(FieldSpec::field("size", "UInt8"))
                    .steptree(FieldSpec::field("data", "BytesRaw").size_path(".size")),
            ))
            .entry(
                FieldSpec::field("far", "UInt32")
                    .pointer(Meta::literal(64u8))
                    .carry_off(false),
            ),
    ]
}

#[test]
fn test_sanitize_is_idempotent() {
    for spec in specs() {
        let once = sanitize(&spec).expect("valid spec");
        let twice = sanitize(&once.to_spec()).expect("re-sanitize");
        assert_eq!(*once, *twice, "'{}' changed on re-sanitize", once.name);
    }
}

#[test]
fn test_names_and_positions_reach_the_same_node() {
    for spec in specs() {
        let desc = sanitize(&spec).expect("valid spec");
        let tree = node::build(&desc, None).expect("build");
        let root = tree.root();
        for (index, entry) in desc.entries.iter().enumerate() {
            let by_name = tree.child(root, entry.name.as_str()).expect("by name");
            let by_index = tree.child(root, Key::Index(index)).expect("by index");
            assert_eq!(by_name, by_index, "'{}'", entry.name);
            if tree.kind(by_name) == NodeKind::Scalar {
                assert_eq!(
                    tree.get(root, entry.name.as_str()).expect("value by name"),
                    tree.get(root, index).expect("value by index")
                );
            }
        }
    }
}

#[test]
fn test_schema_errors_are_collected() {
    let spec = FieldSpec::container("broken")
        .entry(FieldSpec::field("a", "UInt8"))
        .entry(FieldSpec::field("a", "UInt8"))
        .entry(FieldSpec::field("list", "Array"))
        .entry(FieldSpec {
            name: Some("untyped".into()),
            ..FieldSpec::default()
        })
        .entry(FieldSpec::field("e", "UInt16").endian("sideways"));
    let err = sanitize(&spec).expect_err("broken spec");
    let kinds: Vec<&SchemaErrorKind> = err.schema_errors().iter().map(|e| &e.kind).collect();
    assert!(kinds.contains(&&SchemaErrorKind::DuplicateName("a".into())));
    assert!(kinds.contains(&&SchemaErrorKind::MissingSubStruct));
    assert!(kinds.contains(&&SchemaErrorKind::MissingSize));
    assert!(kinds.contains(&&SchemaErrorKind::MissingType));
    assert!(kinds.contains(&&SchemaErrorKind::InvalidEndian("sideways".into())));
}

#[test]
fn test_descriptors_are_shared_between_trees() {
    let desc = sanitize(&specs()[0]).expect("valid");
    let a = node::build(&desc, None).expect("a");
    let b = node::build(&desc, None).expect("b");
    assert!(std::sync::Arc::ptr_eq(a.descriptor(a.root()), b.descriptor(b.root())));
    assert!(std::sync::Arc::ptr_eq(a.descriptor(a.root()), &desc));
}
