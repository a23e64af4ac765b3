// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Built-in field type catalogue.

use std::sync::Arc;

use super::codec::{
    BigIntCodec, BitIntCodec, BytesCodec, FloatCodec, HexCodec, IntCodec, IntSign, NoCodec,
    TextCodec, TextEncoding, TextMode,
};
use super::{FieldFlags, FieldType, Layout};

const INT_KINDS: [(&str, usize); 5] = [
    ("8", 1),
    ("16", 2),
    ("24", 3),
    ("32", 4),
    ("64", 8),
];

const ENCODINGS: [(&str, TextEncoding); 5] = [
    ("Ascii", TextEncoding::Ascii),
    ("Latin1", TextEncoding::Latin1),
    ("Utf8", TextEncoding::Utf8),
    ("Utf16", TextEncoding::Utf16),
    ("Utf32", TextEncoding::Utf32),
];

/// Push `ft`, plus its endian variants when byte order matters.
fn push(out: &mut Vec<FieldType>, ft: FieldType, multi_byte: bool) {
    if multi_byte {
        let (big, little) = ft.endian_variants();
        out.push(big);
        out.push(little);
    }
    out.push(ft);
}

fn integer(name: &str, size: usize, signed: bool, extra: FieldFlags) -> FieldType {
    FieldType::new(name, Layout::Data, Arc::new(IntCodec { signed }))
        .with_flags(FieldFlags::IS_DATA | extra)
        .with_size(size)
}

fn bits(name: &str, sign: IntSign, extra: FieldFlags) -> FieldType {
    FieldType::new(name, Layout::Bits, Arc::new(BitIntCodec { sign }))
        .with_flags(FieldFlags::IS_DATA | FieldFlags::IS_BIT_BASED | extra)
}

fn big(name: &str, sign: IntSign, extra: FieldFlags) -> FieldType {
    FieldType::new(name, Layout::Data, Arc::new(BigIntCodec { sign }))
        .with_flags(FieldFlags::IS_DATA | FieldFlags::IS_VAR_SIZE | extra)
        .with_size(1)
}

fn block(name: &str, layout: Layout, flags: FieldFlags) -> FieldType {
    FieldType::new(name, layout, Arc::new(NoCodec)).with_flags(flags)
}

pub(super) fn builtin() -> Vec<FieldType> {
    let mut out = Vec::with_capacity(160);

    for (suffix, size) in INT_KINDS {
        let none = FieldFlags::empty();
        push(&mut out, integer(&format!("UInt{}", suffix), size, false, none), size > 1);
        push(&mut out, integer(&format!("SInt{}", suffix), size, true, none), size > 1);
        push(
            &mut out,
            integer(&format!("UEnum{}", suffix), size, false, FieldFlags::IS_ENUM),
            size > 1,
        );
        push(
            &mut out,
            integer(&format!("SEnum{}", suffix), size, true, FieldFlags::IS_ENUM),
            size > 1,
        );
        push(
            &mut out,
            integer(&format!("Bool{}", suffix), size, false, FieldFlags::IS_BOOL),
            size > 1,
        );
    }
    push(&mut out, integer("Pointer32", 4, false, FieldFlags::IS_POINTER), true);
    push(&mut out, integer("Pointer64", 8, false, FieldFlags::IS_POINTER), true);

    // SIZE of a bit field counts bits
    let var = FieldFlags::IS_VAR_SIZE;
    out.push(bits("Bit", IntSign::Unsigned, FieldFlags::empty()).with_size(1));
    out.push(bits("UBitInt", IntSign::Unsigned, var));
    out.push(bits("SBitInt", IntSign::TwosComplement, var));
    out.push(bits("S1BitInt", IntSign::OnesComplement, var));
    out.push(bits("UBitEnum", IntSign::Unsigned, var | FieldFlags::IS_ENUM));
    out.push(bits("SBitEnum", IntSign::TwosComplement, var | FieldFlags::IS_ENUM));
    out.push(bits("BitBool", IntSign::Unsigned, var | FieldFlags::IS_BOOL));

    for (name, sign, extra) in [
        ("UIntBig", IntSign::Unsigned, FieldFlags::empty()),
        ("SIntBig", IntSign::TwosComplement, FieldFlags::empty()),
        ("S1IntBig", IntSign::OnesComplement, FieldFlags::empty()),
        ("UEnumBig", IntSign::Unsigned, FieldFlags::IS_ENUM),
        ("SEnumBig", IntSign::TwosComplement, FieldFlags::IS_ENUM),
        ("BoolBig", IntSign::Unsigned, FieldFlags::IS_BOOL),
    ] {
        push(&mut out, big(name, sign, extra), true);
    }

    for (name, size) in [("Float", 4), ("Double", 8)] {
        let ft = FieldType::new(name, Layout::Data, Arc::new(FloatCodec))
            .with_flags(FieldFlags::IS_DATA)
            .with_size(size);
        push(&mut out, ft, true);
    }

    let var_str = FieldFlags::IS_DATA | FieldFlags::IS_STR | FieldFlags::IS_VAR_SIZE;
    for (enc_name, enc) in ENCODINGS {
        let families = [
            (
                format!("Str{}", enc_name),
                Layout::Data,
                TextMode::Delimited,
                var_str | FieldFlags::IS_DELIMITED,
            ),
            (
                format!("StrNnt{}", enc_name),
                Layout::Data,
                TextMode::NonTerminated,
                var_str,
            ),
            (format!("StrRaw{}", enc_name), Layout::Data, TextMode::Raw, var_str),
            (
                format!("CStr{}", enc_name),
                Layout::CString,
                TextMode::Delimited,
                FieldFlags::IS_DATA
                    | FieldFlags::IS_STR
                    | FieldFlags::IS_DELIMITED
                    | FieldFlags::IS_OE_SIZE,
            ),
        ];
        for (name, layout, mode, flags) in families {
            let ft = FieldType::new(&name, layout, Arc::new(TextCodec { mode }))
                .with_flags(flags)
                .with_size(enc.unit())
                .with_text(enc);
            push(&mut out, ft, enc.unit() > 1);
        }
    }

    out.push(
        FieldType::new("StrHex", Layout::Data, Arc::new(HexCodec))
            .with_flags(var_str)
            .with_size(1),
    );
    out.push(
        FieldType::new("BytesRaw", Layout::Data, Arc::new(BytesCodec))
            .with_flags(FieldFlags::IS_DATA | FieldFlags::IS_VAR_SIZE)
            .with_size(1),
    );

    out.push(block("Pad", Layout::Pad, FieldFlags::IS_PAD));
    out.push(block("Void", Layout::Void, FieldFlags::IS_VOID));
    out.push(block("Container", Layout::Container, FieldFlags::IS_CONTAINER));
    out.push(block(
        "Struct",
        Layout::Struct,
        FieldFlags::IS_CONTAINER | FieldFlags::IS_STRUCT,
    ));
    push(
        &mut out,
        block(
            "BitStruct",
            Layout::BitStruct,
            FieldFlags::IS_CONTAINER | FieldFlags::IS_STRUCT,
        ),
        true,
    );
    out.push(block("Array", Layout::Array, FieldFlags::IS_ARRAY));
    out.push(block(
        "WhileArray",
        Layout::WhileArray,
        FieldFlags::IS_ARRAY | FieldFlags::IS_OE_SIZE,
    ));
    out.push(block("Switch", Layout::Switch, FieldFlags::IS_SWITCH));
    out.push(block("Union", Layout::Union, FieldFlags::IS_UNION));
    out.push(block(
        "StreamAdapter",
        Layout::StreamAdapter,
        FieldFlags::IS_WRAPPER | FieldFlags::IS_OE_SIZE,
    ));

    out
}
