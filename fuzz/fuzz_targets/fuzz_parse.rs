// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use std::sync::{Arc, OnceLock};

use bindef::traversal::{parse, serialize_to_vec};
use bindef::{sanitize, Descriptor, FieldSpec, Meta};
use libfuzzer_sys::fuzz_target;

fn descriptor() -> &'static Arc<Descriptor> {
    static DESC: OnceLock<Arc<Descriptor>> = OnceLock::new();
    DESC.get_or_init(|| {
        sanitize(
            &FieldSpec::container("msg")
                .entry(FieldSpec::field("kind", "UInt8"))
                .entry(FieldSpec::field("count", "UInt8"))
                .entry(FieldSpec::array(
                    "items",
                    Meta::path(".count"),
                    FieldSpec::container("item")
                        .entry(FieldSpec::field("len", "UInt8"))
                        .steptree(FieldSpec::field("data", "BytesRaw").size_path(".len")),
                ))
                .entry(
                    FieldSpec::switch("body", Meta::path(".kind"))
                        .add_case(1, FieldSpec::field("text", "CStrUtf8"))
                        .add_case(2, FieldSpec::field("wide", "CStrUtf16"))
                        .add_case(3, FieldSpec::field("packed", "StreamAdapter")
                            .decoder("zlib")
                            .sub_struct(FieldSpec::field("inner", "CStrAscii")))
                        .add_case(4, FieldSpec::field("bits", "LBitStruct")
                            .entry(FieldSpec::field("lo", "SBitInt").size(3))
                            .entry(FieldSpec::field("hi", "UBitInt").size(13))),
                )
                .entry(FieldSpec::field("off", "UInt8"))
                .entry(FieldSpec::field("far", "UInt16").pointer_path(".off").carry_off(false)),
        )
        .expect("fuzz descriptor is valid")
    })
}

fuzz_target!(|data: &[u8]| {
    // Whatever parses must serialize again
    if let Ok(tree) = parse(descriptor(), &data) {
        if let Err(err) = serialize_to_vec(&tree) {
            panic!("parsed tree does not serialize: {}", err);
        }
    }
});
