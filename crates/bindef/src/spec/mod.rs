// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Declarative spec surface.
//!
//! A [`FieldSpec`] is the unsanitized, author-supplied description of one
//! field. Nothing here is validated; [`crate::sanitize`] turns a spec tree
//! into an immutable [`crate::Descriptor`].
//!
//! # Example
//!
//! ```rust
//! use bindef::{sanitize, FieldSpec};
//!
//! let spec = FieldSpec::container("pair")
//!     .entry(FieldSpec::field("len", "UInt8"))
//!     .entry(FieldSpec::field("payload", "StrRawAscii").size_path(".len"));
//! let desc = sanitize(&spec).unwrap();
//! assert_eq!(desc.entry_count(), 2);
//! ```

#[cfg(feature = "yaml")]
pub mod yaml;

use std::fmt;
use std::sync::Arc;

use crate::hooks::{MetaContext, MetaFn};
use crate::value::{CaseKey, Value};
use crate::Result;

/// A descriptor value that is a literal, a NodePath, or computed.
#[derive(Clone)]
pub enum Meta {
    Literal(Value),
    /// NodePath evaluated against the node owning the meta entry.
    Path(String),
    /// Named function evaluated against the node at traversal time.
    Computed { name: Arc<str>, func: MetaFn },
}

impl Meta {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn computed<F>(name: &str, func: F) -> Self
    where
        F: Fn(&MetaContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Computed {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&str> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "Literal({})", v),
            Self::Path(p) => write!(f, "Path({:?})", p),
            Self::Computed { name, .. } => write!(f, "Computed({})", name),
        }
    }
}

impl PartialEq for Meta {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Path(a), Self::Path(b)) => a == b,
            (Self::Computed { name: na, func: fa }, Self::Computed { name: nb, func: fb }) => {
                na == nb && Arc::ptr_eq(fa, fb)
            }
            _ => false,
        }
    }
}

/// One option of an enum or bool field.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumOption {
    pub name: String,
    /// Defaults to previous + 1 for enums and `1 << index` for bools.
    pub value: Option<Value>,
}

/// Unsanitized field description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSpec {
    pub name: Option<String>,
    /// TYPE: registered field type name.
    pub type_name: Option<String>,
    pub size: Option<Meta>,
    pub sub_struct: Option<Box<FieldSpec>>,
    pub case: Option<Meta>,
    /// CASES: `None` means the key was not given at all.
    pub cases: Option<Vec<(CaseKey, FieldSpec)>>,
    pub default_case: Option<Box<FieldSpec>>,
    /// Enum/bool options, each with an optional VALUE.
    pub options: Vec<EnumOption>,
    pub decoder: Option<String>,
    pub encoder: Option<String>,
    pub align: Option<usize>,
    pub include: Option<Box<FieldSpec>>,
    pub default: Option<Value>,
    pub block_cls: Option<String>,
    pub endian: Option<String>,
    pub offset: Option<usize>,
    pub pointer: Option<Meta>,
    pub carry_off: Option<bool>,
    pub steptree: Option<Box<FieldSpec>>,
    pub steptree_root: Option<bool>,
    pub entries: Vec<FieldSpec>,
}

impl FieldSpec {
    pub fn field(name: &str, type_name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            type_name: Some(type_name.to_string()),
            ..Self::default()
        }
    }

    pub fn container(name: &str) -> Self {
        Self::field(name, "Container")
    }

    pub fn structure(name: &str) -> Self {
        Self::field(name, "Struct")
    }

    pub fn array(name: &str, count: Meta, element: FieldSpec) -> Self {
        Self::field(name, "Array").size_meta(count).sub_struct(element)
    }

    pub fn switch(name: &str, case: Meta) -> Self {
        Self::field(name, "Switch").case(case)
    }

    pub fn pad(size: usize) -> Self {
        Self {
            type_name: Some("Pad".to_string()),
            size: Some(Meta::literal(size)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn entry(mut self, child: FieldSpec) -> Self {
        self.entries.push(child);
        self
    }

    #[must_use]
    pub fn size(self, size: usize) -> Self {
        self.size_meta(Meta::literal(size))
    }

    #[must_use]
    pub fn size_path(self, path: &str) -> Self {
        self.size_meta(Meta::path(path))
    }

    #[must_use]
    pub fn size_meta(mut self, size: Meta) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn sub_struct(mut self, sub: FieldSpec) -> Self {
        self.sub_struct = Some(Box::new(sub));
        self
    }

    #[must_use]
    pub fn case(mut self, case: Meta) -> Self {
        self.case = Some(case);
        self
    }

    #[must_use]
    pub fn case_path(self, path: &str) -> Self {
        self.case(Meta::path(path))
    }

    #[must_use]
    pub fn add_case(mut self, key: impl Into<CaseKey>, spec: FieldSpec) -> Self {
        self.cases.get_or_insert_with(Vec::new).push((key.into(), spec));
        self
    }

    #[must_use]
    pub fn default_case(mut self, spec: FieldSpec) -> Self {
        self.default_case = Some(Box::new(spec));
        self
    }

    #[must_use]
    pub fn option(mut self, name: &str) -> Self {
        self.options.push(EnumOption {
            name: name.to_string(),
            value: None,
        });
        self
    }

    #[must_use]
    pub fn option_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.options.push(EnumOption {
            name: name.to_string(),
            value: Some(value.into()),
        });
        self
    }

    #[must_use]
    pub fn decoder(mut self, codec: &str) -> Self {
        self.decoder = Some(codec.to_string());
        self
    }

    #[must_use]
    pub fn encoder(mut self, codec: &str) -> Self {
        self.encoder = Some(codec.to_string());
        self
    }

    #[must_use]
    pub fn align(mut self, align: usize) -> Self {
        self.align = Some(align);
        self
    }

    #[must_use]
    pub fn include(mut self, base: FieldSpec) -> Self {
        self.include = Some(Box::new(base));
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn block_cls(mut self, kind: &str) -> Self {
        self.block_cls = Some(kind.to_string());
        self
    }

    #[must_use]
    pub fn endian(mut self, endian: &str) -> Self {
        self.endian = Some(endian.to_string());
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn pointer(mut self, pointer: Meta) -> Self {
        self.pointer = Some(pointer);
        self
    }

    #[must_use]
    pub fn pointer_path(self, path: &str) -> Self {
        self.pointer(Meta::path(path))
    }

    #[must_use]
    pub fn carry_off(mut self, carry: bool) -> Self {
        self.carry_off = Some(carry);
        self
    }

    #[must_use]
    pub fn steptree(mut self, sub: FieldSpec) -> Self {
        self.steptree = Some(Box::new(sub));
        self
    }

    #[must_use]
    pub fn steptree_root(mut self) -> Self {
        self.steptree_root = Some(true);
        self
    }

    /// Fill every key absent here from `base` (INCLUDE semantics).
    pub(crate) fn fill_from(&mut self, base: &FieldSpec) {
        macro_rules! fill {
            ($($field:ident),*) => {
                $(if self.$field.is_none() {
                    self.$field = base.$field.clone();
                })*
            };
        }
        fill!(
            name,
            type_name,
            size,
            sub_struct,
            case,
            cases,
            default_case,
            decoder,
            encoder,
            align,
            default,
            block_cls,
            endian,
            offset,
            pointer,
            carry_off,
            steptree,
            steptree_root
        );
        if self.options.is_empty() {
            self.options = base.options.clone();
        }
        if self.entries.is_empty() {
            self.entries = base.entries.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_keys() {
        let spec = FieldSpec::switch("body", Meta::path(".kind"))
            .add_case(1, FieldSpec::field("a", "UInt8"))
            .add_case("two", FieldSpec::field("b", "UInt16"))
            .align(4);
        assert_eq!(spec.type_name.as_deref(), Some("Switch"));
        assert_eq!(spec.cases.as_ref().map(Vec::len), Some(2));
        assert_eq!(spec.align, Some(4));
        assert_eq!(spec.case, Some(Meta::path(".kind")));
    }

    #[test]
    fn test_fill_from_keeps_explicit_keys() {
        let base = FieldSpec::field("base", "UInt32").endian(">").default_value(7u32);
        let mut spec = FieldSpec {
            name: Some("mine".into()),
            endian: Some("<".into()),
            ..FieldSpec::default()
        };
        spec.fill_from(&base);
        assert_eq!(spec.name.as_deref(), Some("mine"));
        assert_eq!(spec.endian.as_deref(), Some("<"));
        assert_eq!(spec.type_name.as_deref(), Some("UInt32"));
        assert_eq!(spec.default, Some(Value::UInt(7)));
    }

    #[test]
    fn test_computed_meta_equality_is_identity() {
        let a = Meta::computed("always", |_| Ok(Value::Bool(true)));
        let b = Meta::computed("always", |_| Ok(Value::Bool(true)));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
