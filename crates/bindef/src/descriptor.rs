// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Immutable schema node produced by the sanitizer.
//!
//! A `Descriptor` is shared through `Arc` by every tree node it describes.
//! Derived tables (NAME_MAP, ATTR_OFFS, CASE_MAP, VALUE_MAP) are computed once
//! so the traversal engine never scans by name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::field_type::{ByteOrder, FieldType, Layout};
use crate::hooks::StreamCodec;
use crate::node::NodeKind;
use crate::spec::{EnumOption, FieldSpec, Meta};
use crate::value::{CaseKey, Value};

/// Descriptor meta entries that may be literal, computed or a NodePath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKey {
    Size,
    Pointer,
    Case,
}

impl MetaKey {
    pub fn name(self) -> &'static str {
        match self {
            Self::Size => "SIZE",
            Self::Pointer => "POINTER",
            Self::Case => "CASE",
        }
    }
}

/// Storage slot a NAME_MAP alias points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Ordered child position.
    Index(usize),
    /// The node's steptree child.
    Steptree,
    /// The wrapped node of a stream adapter.
    Inner,
}

/// Stream codec resolved at sanitize time.
#[derive(Clone)]
pub struct StreamRef {
    pub name: Arc<str>,
    pub codec: Arc<dyn StreamCodec>,
}

impl fmt::Debug for StreamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamRef({})", self.name)
    }
}

impl PartialEq for StreamRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub name: String,
    pub field_type: Arc<FieldType>,
    /// ENDIAN after inheritance. `None` defers to the global mode.
    pub endian: Option<ByteOrder>,
    pub size: Option<Meta>,
    pub pointer: Option<Meta>,
    pub case: Option<Meta>,
    pub align: Option<usize>,
    pub carry_off: bool,
    pub default: Option<Value>,
    pub node_kind: NodeKind,
    pub steptree: Option<Arc<Descriptor>>,
    pub steptree_root: bool,
    pub sub_struct: Option<Arc<Descriptor>>,
    pub entries: Vec<Arc<Descriptor>>,
    pub name_map: HashMap<String, Slot>,
    /// Struct only: byte offset of each entry from the struct start.
    pub attr_offs: Vec<usize>,
    pub cases: Vec<(CaseKey, Arc<Descriptor>)>,
    pub case_map: HashMap<CaseKey, usize>,
    pub default_case: Option<Arc<Descriptor>>,
    /// The default case was synthesized (a Void placeholder).
    pub implicit_default: bool,
    /// Enum/bool options in declaration order.
    pub options: Vec<(String, Value)>,
    pub value_map: HashMap<CaseKey, usize>,
    pub decoder: Option<StreamRef>,
    pub encoder: Option<StreamRef>,
}

impl Descriptor {
    /// Bare descriptor of `field_type`; the sanitizer fills in the rest.
    pub(crate) fn new(name: &str, field_type: Arc<FieldType>) -> Self {
        let node_kind = field_type.layout.default_node_kind();
        Self {
            name: name.to_string(),
            field_type,
            endian: None,
            size: None,
            pointer: None,
            case: None,
            align: None,
            carry_off: true,
            default: None,
            node_kind,
            steptree: None,
            steptree_root: false,
            sub_struct: None,
            entries: Vec::new(),
            name_map: HashMap::new(),
            attr_offs: Vec::new(),
            cases: Vec::new(),
            case_map: HashMap::new(),
            default_case: None,
            implicit_default: false,
            options: Vec::new(),
            value_map: HashMap::new(),
            decoder: None,
            encoder: None,
        }
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.field_type.layout
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, index: usize) -> Option<&Arc<Descriptor>> {
        self.entries.get(index)
    }

    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.name_map.get(name).copied()
    }

    pub fn meta(&self, key: MetaKey) -> Option<&Meta> {
        match key {
            MetaKey::Size => self.size.as_ref(),
            MetaKey::Pointer => self.pointer.as_ref(),
            MetaKey::Case => self.case.as_ref(),
        }
    }

    /// Size known without looking at any node: literal SIZE, else the type's.
    pub fn literal_size(&self) -> Option<usize> {
        match &self.size {
            Some(Meta::Literal(v)) => v.as_usize(),
            Some(_) => None,
            None => self.field_type.fixed_size(),
        }
    }

    /// Effective byte order of this field's data.
    pub fn byte_order(&self) -> ByteOrder {
        self.field_type.endian.resolve(self.endian)
    }

    pub fn case_desc(&self, key: &CaseKey) -> Option<&Arc<Descriptor>> {
        self.case_map.get(key).map(|&i| &self.cases[i].1)
    }

    pub fn option_value(&self, name: &str) -> Option<&Value> {
        self.options.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn option_name(&self, value: &Value) -> Option<&str> {
        let key = CaseKey::from_value(value)?;
        self.value_map
            .get(&key)
            .map(|&i| self.options[i].0.as_str())
    }

    /// Encoder of a stream adapter, falling back to its decoder's codec.
    pub fn stream_encoder(&self) -> Option<&StreamRef> {
        self.encoder.as_ref().or(self.decoder.as_ref())
    }

    /// Equivalent spec: `sanitize(&d.to_spec())` reproduces `d`.
    ///
    /// Every derived value (inherited ENDIAN, struct offsets and SIZE, option
    /// values) is emitted explicitly.
    pub fn to_spec(&self) -> FieldSpec {
        let endian = match self.endian {
            Some(ByteOrder::Big) => ">",
            Some(ByteOrder::Little) => "<",
            None => "=",
        };
        let is_struct = matches!(self.layout(), Layout::Struct | Layout::BitStruct);
        let entries = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let mut spec = e.to_spec();
                if is_struct {
                    spec.offset = self.attr_offs.get(i).copied();
                }
                spec
            })
            .collect();
        let cases = match self.layout() {
            Layout::Switch | Layout::Union => Some(
                self.cases
                    .iter()
                    .map(|(k, d)| (k.clone(), d.to_spec()))
                    .collect(),
            ),
            _ => None,
        };
        let default_case = if self.implicit_default {
            None
        } else {
            self.default_case.as_ref().map(|d| Box::new(d.to_spec()))
        };
        FieldSpec {
            name: Some(self.name.clone()),
            type_name: Some(self.field_type.name.to_string()),
            size: self.size.clone(),
            sub_struct: self.sub_struct.as_ref().map(|d| Box::new(d.to_spec())),
            case: self.case.clone(),
            cases,
            default_case,
            options: self
                .options
                .iter()
                .map(|(name, value)| EnumOption {
                    name: name.clone(),
                    value: Some(value.clone()),
                })
                .collect(),
            decoder: self.decoder.as_ref().map(|s| s.name.to_string()),
            encoder: self.encoder.as_ref().map(|s| s.name.to_string()),
            align: self.align,
            include: None,
            default: self.default.clone(),
            block_cls: (self.node_kind != self.layout().default_node_kind())
                .then(|| self.node_kind.name().to_string()),
            endian: Some(endian.to_string()),
            offset: None,
            pointer: self.pointer.clone(),
            carry_off: (!self.carry_off).then_some(false),
            steptree: self.steptree.as_ref().map(|d| Box::new(d.to_spec())),
            steptree_root: self.steptree_root.then_some(true),
            entries,
        }
    }
}
