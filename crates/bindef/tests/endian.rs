// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide endianness mode.
//!
//! Kept in its own test binary and a single test function: the mode is global
//! and other tests would observe it.

use bindef::config::endian_mode;
use bindef::traversal::serialize_to_vec;
use bindef::{force_endian, node, sanitize, EndianGuard, EndianMode, FieldSpec};

#[test]
fn test_forced_endianness() {
    let desc = sanitize(
        &FieldSpec::container("c")
            .entry(FieldSpec::field("native", "UInt16").default_value(0x0102u16))
            .entry(FieldSpec::field("big", "BUInt16").default_value(0x0102u16))
            .entry(FieldSpec::field("little", "LUInt16").default_value(0x0102u16))
            .entry(
                FieldSpec::field("declared", "UInt16")
                    .endian("<")
                    .default_value(0x0102u16),
            ),
    )
    .expect("valid");
    let tree = node::build(&desc, None).expect("build");

    assert_eq!(endian_mode(), EndianMode::Native);
    assert_eq!(
        serialize_to_vec(&tree).expect("native"),
        vec![0x02, 0x01, 0x01, 0x02, 0x02, 0x01, 0x02, 0x01]
    );

    {
        let _guard = EndianGuard::force(EndianMode::Big);
        assert_eq!(endian_mode(), EndianMode::Big);
        // only the ambiguous field without its own ENDIAN follows the mode
        assert_eq!(
            serialize_to_vec(&tree).expect("forced big"),
            vec![0x01, 0x02, 0x01, 0x02, 0x02, 0x01, 0x02, 0x01]
        );
    }
    assert_eq!(endian_mode(), EndianMode::Native);

    force_endian(EndianMode::Little);
    assert_eq!(
        serialize_to_vec(&tree).expect("forced little"),
        vec![0x02, 0x01, 0x01, 0x02, 0x02, 0x01, 0x02, 0x01]
    );
    force_endian(EndianMode::Native);
}
