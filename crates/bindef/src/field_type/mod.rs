// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field-Type Registry
//!
//! A [`FieldType`] bundles capability flags, encoding parameters, the
//! parse/serialize operation slot ([`Layout`]) and a [`FieldCodec`] that
//! supplies decode, encode and size calculation for leaf values.
//!
//! The registry is built once from the built-in catalogue and then only
//! grows through [`register`]. Reads are lock-free snapshot loads.
//!
//! # Naming
//!
//! Every multi-byte kind is registered three times under one logical
//! identity: `UInt16` (ambiguous, follows ENDIAN and the process-wide mode),
//! `BUInt16` (always big-endian) and `LUInt16` (always little-endian).

mod catalogue;
mod codec;

pub use codec::{
    BigIntCodec, BitIntCodec, BytesCodec, FieldCodec, FloatCodec, HexCodec, IntCodec, IntSign,
    NoCodec, TextCodec, TextEncoding, TextMode,
};
pub(crate) use codec::{read_uint, write_uint};

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::config;
use crate::node::NodeKind;
use crate::value::Value;

/// Concrete byte order used to read or write one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Big,
    Little,
}

/// Byte order declared by a field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Ambiguous: decided by the descriptor, then the global mode.
    Native,
    Big,
    Little,
}

impl Endian {
    /// Effective byte order for a field of this endianness.
    ///
    /// Priority: fixed field type, then the descriptor's ENDIAN, then the
    /// forced mode, then [`config::DEFAULT_BYTE_ORDER`].
    pub fn resolve(self, declared: Option<ByteOrder>) -> ByteOrder {
        match self {
            Self::Big => ByteOrder::Big,
            Self::Little => ByteOrder::Little,
            Self::Native => declared
                .or_else(|| config::endian_mode().forced_order())
                .unwrap_or(config::DEFAULT_BYTE_ORDER),
        }
    }
}

/// Capability flags of a field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FieldFlags(pub u32);

impl FieldFlags {
    /// Leaf value stored in a scalar node
    pub const IS_DATA: Self = Self(0x0001);
    pub const IS_STR: Self = Self(0x0002);
    pub const IS_CONTAINER: Self = Self(0x0004);
    /// Fixed layout with per-field offsets (ATTR_OFFS)
    pub const IS_STRUCT: Self = Self(0x0008);
    pub const IS_ARRAY: Self = Self(0x0010);
    pub const IS_SWITCH: Self = Self(0x0020);
    pub const IS_UNION: Self = Self(0x0040);
    pub const IS_ENUM: Self = Self(0x0080);
    pub const IS_BOOL: Self = Self(0x0100);
    /// Integer that typically carries a POINTER target
    pub const IS_POINTER: Self = Self(0x0200);
    pub const IS_DELIMITED: Self = Self(0x0400);
    /// Size comes from SIZE rather than the type
    pub const IS_VAR_SIZE: Self = Self(0x0800);
    /// Size is only known once the data is read (open-ended)
    pub const IS_OE_SIZE: Self = Self(0x1000);
    pub const IS_PAD: Self = Self(0x2000);
    pub const IS_VOID: Self = Self(0x4000);
    /// Node delegates to one inner node (stream adapters)
    pub const IS_WRAPPER: Self = Self(0x8000);
    /// Packed into a BitStruct word; SIZE counts bits
    pub const IS_BIT_BASED: Self = Self(0x10000);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, flag: Self) -> bool {
        (self.0 & flag.0) != 0
    }
}

impl std::ops::BitOr for FieldFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Parse/serialize operation slot, dispatched by the traversal engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Sized leaf: fixed by the type or by SIZE.
    Data,
    /// Leaf terminated by a delimiter character.
    CString,
    Container,
    Struct,
    /// Integer word of at most 8 bytes split into bit fields.
    BitStruct,
    /// Bit field inside a BitStruct.
    Bits,
    Array,
    WhileArray,
    Switch,
    Union,
    StreamAdapter,
    Pad,
    Void,
}

impl Layout {
    /// Node variant produced for this layout unless BLOCK_CLS says otherwise.
    pub fn default_node_kind(self) -> NodeKind {
        match self {
            Self::Data | Self::CString | Self::Bits => NodeKind::Scalar,
            Self::Container | Self::Struct | Self::BitStruct => NodeKind::Container,
            Self::Array | Self::WhileArray => NodeKind::Array,
            Self::Switch => NodeKind::Switch,
            Self::Union => NodeKind::Union,
            Self::StreamAdapter => NodeKind::Wrapper,
            Self::Pad | Self::Void => NodeKind::Placeholder,
        }
    }

    /// Whether BLOCK_CLS may select `kind` for this layout.
    pub fn accepts(self, kind: NodeKind) -> bool {
        kind == self.default_node_kind()
    }

    /// Layouts that own ordered children and may open a steptree schedule.
    pub fn is_block(self) -> bool {
        matches!(
            self,
            Self::Container | Self::Struct | Self::Array | Self::WhileArray
        )
    }
}

/// Immutable description of one field kind.
#[derive(Clone)]
pub struct FieldType {
    /// Registered name (`BUInt16`).
    pub name: Arc<str>,
    /// Logical identity shared by the endian variants (`UInt16`).
    pub base: Arc<str>,
    pub flags: FieldFlags,
    pub layout: Layout,
    pub endian: Endian,
    /// Fixed byte size, or the character width of text types.
    pub size: usize,
    pub text: Option<TextEncoding>,
    pub codec: Arc<dyn FieldCodec>,
}

impl FieldType {
    pub fn new(name: &str, layout: Layout, codec: Arc<dyn FieldCodec>) -> Self {
        Self {
            name: name.into(),
            base: name.into(),
            flags: FieldFlags::empty(),
            layout,
            endian: Endian::Native,
            size: 0,
            text: None,
            codec,
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: FieldFlags) -> Self {
        self.flags = self.flags | flags;
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: TextEncoding) -> Self {
        self.text = Some(text);
        self
    }

    /// Big- and little-endian copies named `B<name>` and `L<name>`.
    pub fn endian_variants(&self) -> (Self, Self) {
        let mut big = self.clone();
        big.name = format!("B{}", self.base).into();
        big.endian = Endian::Big;
        let mut little = self.clone();
        little.name = format!("L{}", self.base).into();
        little.endian = Endian::Little;
        (big, little)
    }

    #[inline]
    pub fn is(&self, flag: FieldFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Fixed serialized size (bits for bit fields), if the type alone determines it.
    pub fn fixed_size(&self) -> Option<usize> {
        match self.layout {
            Layout::Data | Layout::Bits if !self.is(FieldFlags::IS_VAR_SIZE) => Some(self.size),
            Layout::Void => Some(0),
            _ => None,
        }
    }

    /// Normalize `value` to what this type's codec stores, if it can hold it.
    ///
    /// Integers cross signedness when in range; integers widen to floats;
    /// strings become bytes for byte fields. Floats stored in 4 bytes are
    /// narrowed to single precision, so the held value is the one a parse
    /// of the written bytes yields.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        let target = self.codec.default_value(self);
        let value = match (&target, value) {
            (Value::UInt(_), Value::SInt(v)) => Value::UInt(u64::try_from(v).ok()?),
            (Value::SInt(_), Value::UInt(v)) => Value::SInt(i64::try_from(v).ok()?),
            (Value::UInt(_), Value::Bool(b)) => Value::UInt(u64::from(b)),
            (Value::SInt(_), Value::Bool(b)) => Value::SInt(i64::from(b)),
            (Value::Float(_), Value::UInt(v)) => Value::Float(v as f64),
            (Value::Float(_), Value::SInt(v)) => Value::Float(v as f64),
            (Value::Bytes(_), Value::Str(s)) => Value::Bytes(s.into_bytes()),
            (_, v) => v,
        };
        let value = match value {
            Value::Float(v) if self.size == 4 && matches!(target, Value::Float(_)) => {
                let single = v as f32;
                if v.is_finite() && single.is_infinite() {
                    return None;
                }
                Value::Float(f64::from(single))
            }
            v => v,
        };
        self.codec.accepts(&value).then_some(value)
    }

    /// Character delimiter bytes for text types (`size` zero bytes).
    pub fn delimiter(&self) -> Vec<u8> {
        vec![0; self.size.max(1)]
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldType")
            .field("name", &self.name)
            .field("layout", &self.layout)
            .field("endian", &self.endian)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

// =======================================================================
// Global registry
// =======================================================================

type Catalogue = HashMap<Arc<str>, Arc<FieldType>>;

static REGISTRY: OnceLock<ArcSwap<Catalogue>> = OnceLock::new();

fn registry() -> &'static ArcSwap<Catalogue> {
    REGISTRY.get_or_init(|| {
        let mut map = Catalogue::new();
        for ft in catalogue::builtin() {
            map.insert(Arc::clone(&ft.name), Arc::new(ft));
        }
        log::debug!("[registry] {} built-in field types", map.len());
        ArcSwap::from_pointee(map)
    })
}

/// Add (or replace) a field type. Returns the shared handle.
pub fn register(field_type: FieldType) -> Arc<FieldType> {
    let handle = Arc::new(field_type);
    registry().rcu(|current| {
        let mut next = Catalogue::clone(current);
        next.insert(Arc::clone(&handle.name), Arc::clone(&handle));
        next
    });
    log::debug!("[registry] registered '{}'", handle.name);
    handle
}

/// Register a type together with its `B`/`L` endian variants.
pub fn register_with_variants(field_type: FieldType) -> Arc<FieldType> {
    let (big, little) = field_type.endian_variants();
    register(big);
    register(little);
    register(field_type)
}

pub fn lookup(name: &str) -> Option<Arc<FieldType>> {
    registry().load().get(name).cloned()
}

/// Names of every registered field type, sorted.
pub fn names() -> Vec<Arc<str>> {
    let mut names: Vec<_> = registry().load().keys().cloned().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_and_variants() {
        let native = lookup("UInt16").expect("UInt16");
        let big = lookup("BUInt16").expect("BUInt16");
        let little = lookup("LUInt16").expect("LUInt16");
        assert_eq!(native.endian, Endian::Native);
        assert_eq!(big.endian, Endian::Big);
        assert_eq!(little.endian, Endian::Little);
        assert_eq!(big.base, native.base);
        assert_eq!(native.fixed_size(), Some(2));
        assert!(lookup("NoSuchType").is_none());
    }

    #[test]
    fn test_fixed_endian_ignores_declared_order() {
        assert_eq!(Endian::Big.resolve(Some(ByteOrder::Little)), ByteOrder::Big);
        assert_eq!(Endian::Little.resolve(Some(ByteOrder::Big)), ByteOrder::Little);
        assert_eq!(Endian::Native.resolve(Some(ByteOrder::Big)), ByteOrder::Big);
    }

    #[test]
    fn test_register_custom_type() {
        let ft = FieldType::new("Test24Bits", Layout::Data, Arc::new(IntCodec { signed: false }))
            .with_flags(FieldFlags::IS_DATA)
            .with_size(3);
        register_with_variants(ft);
        assert!(lookup("Test24Bits").is_some());
        assert_eq!(lookup("BTest24Bits").expect("variant").endian, Endian::Big);
        assert!(names().iter().any(|n| &**n == "LTest24Bits"));
    }

    #[test]
    fn test_coerce_crosses_signedness() {
        let u8t = lookup("UInt8").expect("UInt8");
        assert_eq!(u8t.coerce(Value::SInt(5)), Some(Value::UInt(5)));
        assert_eq!(u8t.coerce(Value::SInt(-5)), None);
        assert_eq!(u8t.coerce(Value::Str("x".into())), None);
        let f = lookup("Float").expect("Float");
        assert_eq!(f.coerce(Value::UInt(2)), Some(Value::Float(2.0)));
        assert_eq!(f.coerce(Value::Float(0.1)), Some(Value::Float(f64::from(0.1f32))));
        assert_eq!(f.coerce(Value::Float(1e300)), None);
        let d = lookup("Double").expect("Double");
        assert_eq!(d.coerce(Value::Float(0.1)), Some(Value::Float(0.1)));
        let raw = lookup("BytesRaw").expect("BytesRaw");
        assert_eq!(raw.coerce("ab".into()), Some(Value::Bytes(b"ab".to_vec())));
    }

    #[test]
    fn test_layout_node_kinds() {
        assert_eq!(Layout::Struct.default_node_kind(), NodeKind::Container);
        assert!(Layout::Data.accepts(NodeKind::Scalar));
        assert!(!Layout::Data.accepts(NodeKind::Placeholder));
        assert!(!Layout::Container.accepts(NodeKind::Scalar));
        assert!(Layout::Array.is_block());
        assert!(!Layout::Switch.is_block());
        assert_eq!(Layout::BitStruct.default_node_kind(), NodeKind::Container);
        assert!(!Layout::BitStruct.is_block());
        assert_eq!(Layout::Bits.default_node_kind(), NodeKind::Scalar);
    }
}
