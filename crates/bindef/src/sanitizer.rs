// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Descriptor Sanitizer
//!
//! Turns a [`FieldSpec`] tree into an immutable [`Descriptor`] tree. The walk
//! never stops at the first defect: every problem found is recorded with its
//! dotted location and reported together as [`Error::Schema`].
//!
//! Per field, innermost first:
//! 1. merge INCLUDE (absent keys only)
//! 2. resolve TYPE and NAME
//! 3. ENDIAN (explicit or inherited), ALIGN, BLOCK_CLS
//! 4. companions required by the layout
//! 5. children, NAME_MAP, Struct ATTR_OFFS and SIZE
//! 6. CASE_MAP, VALUE_MAP, union SIZE

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::ALIGN_MAX;
use crate::descriptor::{Descriptor, Slot, StreamRef};
use crate::error::{Error, Result, SchemaError, SchemaErrorKind};
use crate::field_type::{self, ByteOrder, FieldFlags, FieldType, Layout};
use crate::hooks;
use crate::node::NodeKind;
use crate::spec::{FieldSpec, Meta};
use crate::value::{CaseKey, Value};

/// Sanitize `spec` into a shareable descriptor.
pub fn sanitize(spec: &FieldSpec) -> Result<Arc<Descriptor>> {
    let mut sanitizer = Sanitizer::default();
    let root = merge_includes(spec);
    let scope = Scope {
        path: String::new(),
        endian: None,
        parent: None,
        index: 0,
        size_fallback: None,
        in_union: false,
    };
    let desc = sanitizer.field(&root, &scope);
    match desc {
        Some(desc) if sanitizer.errors.is_empty() => {
            log::debug!(
                "[sanitize] '{}' ok ({} entries)",
                desc.name,
                desc.entry_count()
            );
            Ok(desc)
        }
        _ => {
            log::debug!("[sanitize] {} error(s)", sanitizer.errors.len());
            Err(Error::Schema(sanitizer.errors))
        }
    }
}

/// Fold the INCLUDE chain into `spec`; explicit keys win.
fn merge_includes(spec: &FieldSpec) -> FieldSpec {
    let mut spec = spec.clone();
    while let Some(mut base) = spec.include.take() {
        let next = base.include.take();
        spec.fill_from(&base);
        spec.include = next;
    }
    spec
}

/// Whether `value` encodes under `desc` (range and charset checks).
fn fits(desc: &Descriptor, value: &Value) -> bool {
    let ft = &desc.field_type;
    match (ft.layout, desc.literal_size()) {
        (Layout::Bits, Some(bits)) => u32::try_from(bits)
            .is_ok_and(|bits| ft.codec.encode_bits(ft, value, bits).is_ok()),
        (Layout::Bits, None) => ft.codec.accepts(value),
        (_, Some(size)) if ft.is(FieldFlags::IS_VAR_SIZE) => ft
            .codec
            .encode_sized(ft, value, ByteOrder::Little, size)
            .is_ok(),
        _ => ft.codec.encode(ft, value, ByteOrder::Little).is_ok(),
    }
}

fn parse_endian(text: &str) -> Option<Option<ByteOrder>> {
    match text {
        "<" | "little" => Some(Some(ByteOrder::Little)),
        ">" | "big" => Some(Some(ByteOrder::Big)),
        "=" | "native" => Some(None),
        _ => None,
    }
}

/// Where a field sits; inherited options flow through here.
struct Scope<'a> {
    path: String,
    endian: Option<ByteOrder>,
    parent: Option<Layout>,
    index: usize,
    /// Switch SIZE handed to cases that declare none.
    size_fallback: Option<&'a Meta>,
    in_union: bool,
}

impl Scope<'_> {
    fn child(&self, name: &str, parent: Layout, index: usize, endian: Option<ByteOrder>) -> Scope<'static> {
        Scope {
            path: join(&self.path, name),
            endian,
            parent: Some(parent),
            index,
            size_fallback: None,
            in_union: self.in_union,
        }
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

#[derive(Default)]
struct Sanitizer {
    errors: Vec<SchemaError>,
}

impl Sanitizer {
    fn error(&mut self, path: &str, kind: SchemaErrorKind) {
        log::trace!("[sanitize] {}: {}", path, kind);
        self.errors.push(SchemaError {
            path: path.to_string(),
            kind,
        });
    }

    /// Sanitize one (already include-merged) spec. `None` when the field is
    /// too broken to describe; the reason has been recorded.
    fn field(&mut self, spec: &FieldSpec, scope: &Scope<'_>) -> Option<Arc<Descriptor>> {
        let is_pad = spec.type_name.as_deref() == Some("Pad");
        let name = match (&spec.name, is_pad) {
            (Some(n), _) => n.clone(),
            (None, true) => format!("pad_{}", scope.index),
            (None, false) => {
                let here = join(&scope.path, &format!("[{}]", scope.index));
                self.error(&here, SchemaErrorKind::MissingName);
                format!("[{}]", scope.index)
            }
        };
        let path = join(&scope.path, &name);

        let Some(type_name) = spec.type_name.as_deref() else {
            self.error(&path, SchemaErrorKind::MissingType);
            return None;
        };
        let Some(field_type) = field_type::lookup(type_name) else {
            self.error(&path, SchemaErrorKind::UnknownType(type_name.to_string()));
            return None;
        };
        let layout = field_type.layout;
        let mut desc = Descriptor::new(&name, Arc::clone(&field_type));

        desc.endian = match spec.endian.as_deref() {
            Some(text) => parse_endian(text).unwrap_or_else(|| {
                self.error(&path, SchemaErrorKind::InvalidEndian(text.to_string()));
                scope.endian
            }),
            None => scope.endian,
        };

        if let Some(align) = spec.align {
            if align.is_power_of_two() {
                desc.align = Some(align);
            } else {
                self.error(&path, SchemaErrorKind::InvalidAlign(align));
            }
        }

        if let Some(cls) = spec.block_cls.as_deref() {
            match NodeKind::from_name(cls) {
                Some(kind) if layout.accepts(kind) => desc.node_kind = kind,
                _ => self.error(&path, SchemaErrorKind::IncompatibleNodeKind(cls.to_string())),
            }
        }

        let in_struct = matches!(scope.parent, Some(Layout::Struct | Layout::BitStruct));
        if spec.offset.is_some() && !in_struct {
            self.error(&path, SchemaErrorKind::MisplacedOffset);
        }
        if layout == Layout::Bits && scope.parent != Some(Layout::BitStruct) {
            self.error(&path, SchemaErrorKind::MisplacedBitField);
        }
        if scope.in_union && spec.pointer.is_some() {
            self.error(&path, SchemaErrorKind::IllegalInUnion("POINTER"));
        }
        if scope.in_union && spec.steptree.is_some() {
            self.error(&path, SchemaErrorKind::IllegalInUnion("STEPTREE"));
        }

        desc.size = spec.size.clone();
        if desc.size.is_none() && matches!(layout, Layout::Data | Layout::Pad) {
            desc.size = scope.size_fallback.cloned();
        }
        desc.pointer = spec.pointer.clone();
        desc.case = spec.case.clone();
        desc.carry_off = spec.carry_off.unwrap_or(true);
        desc.steptree_root = spec.steptree_root.unwrap_or(false);

        self.companions(spec, &field_type, &mut desc, &path);
        self.default_value(spec, &field_type, &mut desc, &path);
        self.options(spec, &field_type, &mut desc, &path);

        // children
        match layout {
            Layout::Container => self.container(spec, &mut desc, &path, scope.in_union),
            Layout::Struct => self.structure(spec, &mut desc, &path, scope.in_union),
            Layout::BitStruct => self.bit_structure(spec, &mut desc, &path, scope.in_union),
            Layout::Array | Layout::WhileArray | Layout::StreamAdapter => {
                if let Some(sub) = &spec.sub_struct {
                    let sub = merge_includes(sub);
                    let child_scope = Scope {
                        path: path.clone(),
                        endian: desc.endian,
                        parent: Some(layout),
                        index: 0,
                        size_fallback: None,
                        in_union: scope.in_union,
                    };
                    desc.sub_struct = self.field(&sub, &child_scope);
                    if layout == Layout::StreamAdapter {
                        if let Some(inner) = &desc.sub_struct {
                            desc.name_map.insert(inner.name.clone(), Slot::Inner);
                        }
                    }
                }
            }
            Layout::Switch | Layout::Union => self.cases(spec, scope, &mut desc, &path),
            _ => {}
        }

        if let Some(st) = &spec.steptree {
            if !layout.is_block() {
                self.error(&path, SchemaErrorKind::MisplacedSteptree);
            } else {
                let st = merge_includes(st);
                let child_scope = scope.child(&name, layout, desc.entries.len(), desc.endian);
                if let Some(st_desc) = self.field(&st, &child_scope) {
                    if desc.name_map.contains_key(&st_desc.name) {
                        self.error(&path, SchemaErrorKind::DuplicateName(st_desc.name.clone()));
                    }
                    desc.name_map.insert(st_desc.name.clone(), Slot::Steptree);
                    desc.steptree = Some(st_desc);
                }
            }
        }

        Some(Arc::new(desc))
    }

    /// Keys a layout cannot work without.
    fn companions(&mut self, spec: &FieldSpec, ft: &FieldType, desc: &mut Descriptor, path: &str) {
        let layout = ft.layout;
        match layout {
            Layout::Array | Layout::WhileArray | Layout::StreamAdapter if spec.sub_struct.is_none() => {
                self.error(path, SchemaErrorKind::MissingSubStruct);
            }
            _ => {}
        }
        match layout {
            Layout::Array if desc.size.is_none() => self.error(path, SchemaErrorKind::MissingSize),
            Layout::WhileArray | Layout::Switch | Layout::Union if desc.case.is_none() => {
                self.error(path, SchemaErrorKind::MissingCase);
            }
            Layout::Data | Layout::Bits if ft.is(FieldFlags::IS_VAR_SIZE) && desc.size.is_none() => {
                self.error(path, SchemaErrorKind::MissingSize);
            }
            Layout::Pad if desc.literal_size().is_none() => {
                self.error(path, SchemaErrorKind::NotFixedSize);
            }
            _ => {}
        }
        if matches!(layout, Layout::Switch | Layout::Union) && spec.cases.is_none() {
            self.error(path, SchemaErrorKind::MissingCases);
        }
        if layout == Layout::StreamAdapter {
            match spec.decoder.as_deref() {
                None => self.error(path, SchemaErrorKind::MissingDecoder),
                Some(name) => desc.decoder = self.stream(name, path),
            }
            if let Some(name) = spec.encoder.as_deref() {
                desc.encoder = self.stream(name, path);
            }
        }
        if let Some(Meta::Literal(v)) = &desc.size {
            if v.as_usize().is_none() {
                self.error(path, SchemaErrorKind::MalformedValue(format!("SIZE {}", v)));
            }
        }
    }

    fn stream(&mut self, name: &str, path: &str) -> Option<StreamRef> {
        match hooks::stream_codec(name) {
            Some(codec) => Some(StreamRef {
                name: name.into(),
                codec,
            }),
            None => {
                self.error(path, SchemaErrorKind::UnknownCodec(name.to_string()));
                None
            }
        }
    }

    fn default_value(&mut self, spec: &FieldSpec, ft: &FieldType, desc: &mut Descriptor, path: &str) {
        let Some(value) = &spec.default else {
            return;
        };
        if !matches!(ft.layout, Layout::Data | Layout::CString | Layout::Bits) {
            self.error(
                path,
                SchemaErrorKind::MalformedValue("DEFAULT only applies to data fields".into()),
            );
            return;
        }
        match ft.coerce(value.clone()).filter(|v| fits(desc, v)) {
            Some(v) => desc.default = Some(v),
            None => self.error(
                path,
                SchemaErrorKind::MalformedValue(format!("DEFAULT {} for {}", value, ft.name)),
            ),
        }
    }

    /// Enum/bool options and VALUE_MAP.
    fn options(&mut self, spec: &FieldSpec, ft: &FieldType, desc: &mut Descriptor, path: &str) {
        let is_bool = ft.is(FieldFlags::IS_BOOL);
        if !(is_bool || ft.is(FieldFlags::IS_ENUM)) {
            return;
        }
        let mut names = HashSet::new();
        let mut next: i64 = 0;
        for (i, opt) in spec.options.iter().enumerate() {
            let opt_path = join(path, &opt.name);
            if !names.insert(opt.name.clone()) {
                self.error(path, SchemaErrorKind::DuplicateName(opt.name.clone()));
                continue;
            }
            let value = if is_bool {
                let value = match &opt.value {
                    Some(v) => v.as_u64().filter(|&v| v > 0),
                    None if i < 64 => Some(1u64 << i),
                    None => None,
                };
                let Some(value) = value else {
                    self.error(
                        &opt_path,
                        SchemaErrorKind::MalformedValue("bool VALUE must be a positive mask".into()),
                    );
                    continue;
                };
                Value::UInt(value)
            } else {
                let value = match &opt.value {
                    Some(v) => v.as_i64(),
                    None => Some(next),
                };
                let Some(value) = value else {
                    self.error(
                        &opt_path,
                        SchemaErrorKind::MalformedValue("enum VALUE must be an integer".into()),
                    );
                    continue;
                };
                next = value.wrapping_add(1);
                match ft.coerce(Value::SInt(value)).filter(|v| fits(desc, v)) {
                    Some(v) => v,
                    None => {
                        self.error(
                            &opt_path,
                            SchemaErrorKind::MalformedValue(format!("{} does not fit {}", value, ft.name)),
                        );
                        continue;
                    }
                }
            };
            let index = desc.options.len();
            if let Some(key) = CaseKey::from_value(&value) {
                desc.value_map.entry(key).or_insert(index);
            }
            desc.options.push((opt.name.clone(), value));
        }
    }

    fn container(&mut self, spec: &FieldSpec, desc: &mut Descriptor, path: &str, in_union: bool) {
        for (i, child) in spec.entries.iter().enumerate() {
            let child = merge_includes(child);
            let scope = Scope {
                path: path.to_string(),
                endian: desc.endian,
                parent: Some(Layout::Container),
                index: i,
                size_fallback: None,
                in_union,
            };
            if let Some(child_desc) = self.field(&child, &scope) {
                self.push_entry(desc, child_desc, path);
            }
        }
    }

    fn push_entry(&mut self, desc: &mut Descriptor, child: Arc<Descriptor>, path: &str) {
        let index = desc.entries.len();
        if desc.name_map.insert(child.name.clone(), Slot::Index(index)).is_some() {
            self.error(path, SchemaErrorKind::DuplicateName(child.name.clone()));
        }
        desc.entries.push(child);
    }

    /// Struct entries: Pad removal, ATTR_OFFS and SIZE.
    fn structure(&mut self, spec: &FieldSpec, desc: &mut Descriptor, path: &str, in_union: bool) {
        let mut def_offset = 0usize;
        let mut largest_align = 1usize;
        for (i, child) in spec.entries.iter().enumerate() {
            let child = merge_includes(child);
            let scope = Scope {
                path: path.to_string(),
                endian: desc.endian,
                parent: Some(Layout::Struct),
                index: i,
                size_fallback: None,
                in_union,
            };
            let Some(child_desc) = self.field(&child, &scope) else {
                continue;
            };
            if child_desc.layout() == Layout::Pad {
                def_offset += child_desc.literal_size().unwrap_or(0);
                continue;
            }
            let Some(size) = child_desc.literal_size() else {
                self.error(&join(path, &child_desc.name), SchemaErrorKind::NotFixedSize);
                continue;
            };
            let align = child_desc.align.unwrap_or(1).min(ALIGN_MAX);
            largest_align = largest_align.max(align);
            let mut offset = child.offset.unwrap_or(def_offset);
            offset += (align - offset % align) % align;
            def_offset = offset + size;
            desc.attr_offs.push(offset);
            self.push_entry(desc, child_desc, path);
        }

        let needed = def_offset + (largest_align - def_offset % largest_align) % largest_align;
        match desc.literal_size() {
            Some(size) if size < def_offset => self.error(
                path,
                SchemaErrorKind::SizeTooSmall {
                    size,
                    needed: def_offset,
                },
            ),
            Some(_) => {}
            None if desc.size.is_some() => self.error(path, SchemaErrorKind::NotFixedSize),
            None => desc.size = Some(Meta::literal(needed)),
        }
    }

    /// BitStruct entries: bit offsets (LSB first) and the word size in bytes.
    fn bit_structure(&mut self, spec: &FieldSpec, desc: &mut Descriptor, path: &str, in_union: bool) {
        let mut def_offset = 0usize;
        let mut covered = 0usize;
        for (i, child) in spec.entries.iter().enumerate() {
            let child = merge_includes(child);
            let scope = Scope {
                path: path.to_string(),
                endian: desc.endian,
                parent: Some(Layout::BitStruct),
                index: i,
                size_fallback: None,
                in_union,
            };
            let Some(child_desc) = self.field(&child, &scope) else {
                continue;
            };
            let child_path = join(path, &child_desc.name);
            if child_desc.layout() == Layout::Pad {
                def_offset += child_desc.literal_size().unwrap_or(0);
                continue;
            }
            if child_desc.layout() != Layout::Bits {
                self.error(&child_path, SchemaErrorKind::NotBitField);
                continue;
            }
            let Some(bits) = child_desc.literal_size() else {
                self.error(&child_path, SchemaErrorKind::NotFixedSize);
                continue;
            };
            let offset = child.offset.unwrap_or(def_offset);
            def_offset = offset.saturating_add(bits);
            covered = covered.max(def_offset);
            desc.attr_offs.push(offset);
            self.push_entry(desc, child_desc, path);
        }

        let needed = covered.max(def_offset).div_ceil(8);
        match desc.literal_size() {
            Some(size) if size > 8 => self.error(path, SchemaErrorKind::BitStructTooWide(size)),
            Some(size) if size < needed => {
                self.error(path, SchemaErrorKind::SizeTooSmall { size, needed });
            }
            Some(_) => {}
            None if desc.size.is_some() => self.error(path, SchemaErrorKind::NotFixedSize),
            None if needed > 8 => self.error(path, SchemaErrorKind::BitStructTooWide(needed)),
            None => desc.size = Some(Meta::literal(needed)),
        }
    }

    /// Switch/Union CASES, CASE_MAP and DEFAULT.
    fn cases(&mut self, spec: &FieldSpec, scope: &Scope<'_>, desc: &mut Descriptor, path: &str) {
        let layout = desc.layout();
        let is_union = layout == Layout::Union;
        let endian = desc.endian;
        let size_fallback = if is_union { None } else { spec.size.as_ref() };
        let case_scope = |index: usize| Scope {
            path: path.to_string(),
            endian,
            parent: Some(layout),
            index,
            size_fallback,
            in_union: is_union || scope.in_union,
        };

        let mut built = Vec::new();
        let mut keys = HashMap::new();
        for (i, (key, case_spec)) in spec.cases.iter().flatten().enumerate() {
            let case_spec = merge_includes(case_spec);
            let Some(case_desc) = self.field(&case_spec, &case_scope(i)) else {
                continue;
            };
            if keys.insert(key.clone(), built.len()).is_some() {
                self.error(path, SchemaErrorKind::DuplicateCase(key.to_string()));
                continue;
            }
            built.push((key.clone(), case_desc));
        }

        let default_case = match &spec.default_case {
            Some(d) => {
                let d = merge_includes(d);
                self.field(&d, &case_scope(built.len()))
            }
            None => None,
        };

        if is_union {
            let mut largest = 0;
            let members: Vec<&Arc<Descriptor>> =
                built.iter().map(|(_, d)| d).chain(default_case.iter()).collect();
            for case_desc in members {
                match case_desc.literal_size() {
                    Some(size) => largest = largest.max(size),
                    None => self.error(&join(path, &case_desc.name), SchemaErrorKind::NotFixedSize),
                }
            }
            match desc.literal_size() {
                Some(size) if size < largest => self.error(
                    path,
                    SchemaErrorKind::SizeTooSmall {
                        size,
                        needed: largest,
                    },
                ),
                Some(_) => {}
                None if desc.size.is_some() => self.error(path, SchemaErrorKind::NotFixedSize),
                None => desc.size = Some(Meta::literal(largest)),
            }
            desc.default_case = default_case;
        } else {
            desc.default_case = match default_case {
                Some(d) => Some(d),
                None => {
                    desc.implicit_default = true;
                    field_type::lookup("Void").map(|void| Arc::new(Descriptor::new(&desc.name, void)))
                }
            };
        }
        desc.cases = built;
        desc.case_map = keys;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(err: &Error) -> Vec<SchemaErrorKind> {
        err.schema_errors().iter().map(|e| e.kind.clone()).collect()
    }

    #[test]
    fn test_pair_descriptor() {
        let spec = FieldSpec::container("pair")
            .entry(FieldSpec::field("len", "UInt8"))
            .entry(FieldSpec::field("payload", "StrRawAscii").size_path(".len"));
        let desc = sanitize(&spec).expect("valid");
        assert_eq!(desc.slot("len"), Some(Slot::Index(0)));
        assert_eq!(desc.slot("payload"), Some(Slot::Index(1)));
        assert_eq!(desc.entries[1].size, Some(Meta::path(".len")));
    }

    #[test]
    fn test_errors_are_collected() {
        let spec = FieldSpec::container("bad")
            .entry(FieldSpec::field("a", "UInt8"))
            .entry(FieldSpec::field("a", "UInt8"))
            .entry(FieldSpec::field("list", "Array"))
            .entry(FieldSpec::field("s", "StrAscii"))
            .entry(FieldSpec::field("e", "UInt8").endian("middle"))
            .entry(FieldSpec::field("t", "NoSuchType"))
            .entry(FieldSpec {
                type_name: Some("UInt8".into()),
                ..FieldSpec::default()
            });
        let err = sanitize(&spec).expect_err("invalid");
        let kinds = kinds(&err);
        assert!(kinds.contains(&SchemaErrorKind::DuplicateName("a".into())));
        assert!(kinds.contains(&SchemaErrorKind::MissingSubStruct));
        assert!(kinds.contains(&SchemaErrorKind::MissingSize));
        assert!(kinds.contains(&SchemaErrorKind::InvalidEndian("middle".into())));
        assert!(kinds.contains(&SchemaErrorKind::UnknownType("NoSuchType".into())));
        assert!(kinds.contains(&SchemaErrorKind::MissingName));
        assert!(err.schema_errors().iter().any(|e| e.path == "bad.e"));
    }

    #[test]
    fn test_switch_requires_cases_and_case() {
        let err = sanitize(&FieldSpec::field("sw", "Switch")).expect_err("invalid");
        let kinds = kinds(&err);
        assert!(kinds.contains(&SchemaErrorKind::MissingCase));
        assert!(kinds.contains(&SchemaErrorKind::MissingCases));
    }

    #[test]
    fn test_include_fills_absent_keys() {
        let base = FieldSpec::field("base", "UInt16").endian(">").default_value(3u16);
        let spec = FieldSpec::container("c").entry(FieldSpec {
            name: Some("x".into()),
            ..FieldSpec::default()
        }
        .include(base));
        let desc = sanitize(&spec).expect("valid");
        let x = &desc.entries[0];
        assert_eq!(x.name, "x");
        assert_eq!(&*x.field_type.name, "UInt16");
        assert_eq!(x.endian, Some(ByteOrder::Big));
        assert_eq!(x.default, Some(Value::UInt(3)));
    }

    #[test]
    fn test_endian_inherited_until_overridden() {
        let spec = FieldSpec::container("c")
            .endian(">")
            .entry(FieldSpec::field("a", "UInt16"))
            .entry(FieldSpec::field("b", "UInt16").endian("<"))
            .entry(FieldSpec::field("n", "UInt16").endian("="));
        let desc = sanitize(&spec).expect("valid");
        assert_eq!(desc.entries[0].endian, Some(ByteOrder::Big));
        assert_eq!(desc.entries[1].endian, Some(ByteOrder::Little));
        assert_eq!(desc.entries[2].endian, None);
    }

    #[test]
    fn test_struct_offsets_pads_and_size() {
        let spec = FieldSpec::structure("hdr")
            .entry(FieldSpec::field("tag", "UInt8"))
            .entry(FieldSpec::field("value", "UInt32").align(4))
            .entry(FieldSpec::pad(2))
            .entry(FieldSpec::field("flags", "UInt8"));
        let desc = sanitize(&spec).expect("valid");
        assert_eq!(desc.entry_count(), 3);
        assert_eq!(desc.attr_offs, vec![0, 4, 10]);
        // 11 rounded up to the largest alignment
        assert_eq!(desc.literal_size(), Some(12));
    }

    #[test]
    fn test_struct_rules() {
        let spec = FieldSpec::container("c")
            .entry(FieldSpec::field("misplaced", "UInt8").offset(2))
            .entry(
                FieldSpec::structure("s")
                    .entry(FieldSpec::field("len", "UInt8"))
                    .entry(FieldSpec::field("name", "StrRawAscii").size_path(".len")),
            )
            .entry(FieldSpec::field("odd", "UInt8").align(3))
            .entry(
                FieldSpec::structure("small")
                    .size(1)
                    .entry(FieldSpec::field("v", "UInt32")),
            );
        let kinds = kinds(&sanitize(&spec).expect_err("invalid"));
        assert!(kinds.contains(&SchemaErrorKind::MisplacedOffset));
        assert!(kinds.contains(&SchemaErrorKind::NotFixedSize));
        assert!(kinds.contains(&SchemaErrorKind::InvalidAlign(3)));
        assert!(kinds.contains(&SchemaErrorKind::SizeTooSmall { size: 1, needed: 4 }));
    }

    #[test]
    fn test_bit_struct_offsets_and_width() {
        let spec = FieldSpec::field("flags", "BitStruct")
            .entry(FieldSpec::field("ready", "Bit"))
            .entry(FieldSpec::field("mode", "UBitEnum").size(3).option("idle").option("busy"))
            .entry(FieldSpec::pad(4))
            .entry(FieldSpec::field("delta", "SBitInt").size(5));
        let desc = sanitize(&spec).expect("valid");
        assert_eq!(desc.attr_offs, vec![0, 1, 8]);
        // 13 bits round up to two bytes
        assert_eq!(desc.literal_size(), Some(2));
        assert_eq!(desc.entries[1].option_value("busy"), Some(&Value::UInt(1)));

        let placed = FieldSpec::field("w", "BitStruct")
            .size(4)
            .entry(FieldSpec::field("hi", "UBitInt").size(4).offset(28));
        assert_eq!(sanitize(&placed).expect("valid").attr_offs, vec![28]);
    }

    #[test]
    fn test_bit_struct_rules() {
        let spec = FieldSpec::container("c")
            .entry(FieldSpec::field("loose", "Bit"))
            .entry(FieldSpec::field("wide", "BitStruct").size(9).entry(FieldSpec::field("b", "Bit")))
            .entry(
                FieldSpec::field("small", "BitStruct")
                    .size(1)
                    .entry(FieldSpec::field("v", "UBitInt").size(12)),
            )
            .entry(FieldSpec::field("mixed", "BitStruct").entry(FieldSpec::field("n", "UInt8")))
            .entry(
                FieldSpec::field("sized", "BitStruct")
                    .entry(FieldSpec::field("v", "UBitInt")),
            )
            .entry(
                FieldSpec::field("range", "BitStruct")
                    .entry(FieldSpec::field("v", "SBitInt").size(3).default_value(4u8)),
            );
        let kinds = kinds(&sanitize(&spec).expect_err("invalid"));
        assert!(kinds.contains(&SchemaErrorKind::MisplacedBitField));
        assert!(kinds.contains(&SchemaErrorKind::BitStructTooWide(9)));
        assert!(kinds.contains(&SchemaErrorKind::SizeTooSmall { size: 1, needed: 2 }));
        assert!(kinds.contains(&SchemaErrorKind::NotBitField));
        assert!(kinds.contains(&SchemaErrorKind::MissingSize));
        assert!(kinds.iter().any(|k| matches!(k, SchemaErrorKind::MalformedValue(_))));
    }

    #[test]
    fn test_big_int_default_checked_against_size() {
        let ok = FieldSpec::field("n", "SIntBig").size(3).default_value(-70_000i32);
        assert_eq!(sanitize(&ok).expect("valid").default, Some(Value::SInt(-70_000)));
        let bad = FieldSpec::field("n", "UIntBig").size(2).default_value(70_000u32);
        assert!(sanitize(&bad).is_err());
    }

    #[test]
    fn test_enum_and_bool_values() {
        let spec = FieldSpec::container("c")
            .entry(
                FieldSpec::field("mode", "UEnum8")
                    .option("a")
                    .option_value("b", 5u8)
                    .option("c"),
            )
            .entry(FieldSpec::field("flags", "Bool8").option("x").option("y").option("z"));
        let desc = sanitize(&spec).expect("valid");
        let mode = &desc.entries[0];
        assert_eq!(mode.option_value("a"), Some(&Value::UInt(0)));
        assert_eq!(mode.option_value("c"), Some(&Value::UInt(6)));
        let flags = &desc.entries[1];
        assert_eq!(flags.option_value("z"), Some(&Value::UInt(4)));

        let bad = FieldSpec::field("flags", "Bool8").option_value("x", 0u8).option("x");
        let kinds = kinds(&sanitize(&bad).expect_err("invalid"));
        assert!(kinds.iter().any(|k| matches!(k, SchemaErrorKind::MalformedValue(_))));
        assert!(kinds.contains(&SchemaErrorKind::DuplicateName("x".into())));
    }

    #[test]
    fn test_switch_tables_and_size_copy() {
        let spec = FieldSpec::switch("body", Meta::path(".kind"))
            .size(4)
            .add_case(1, FieldSpec::field("num", "UInt32"))
            .add_case(2, FieldSpec::field("text", "StrRawAscii"))
            .add_case(2, FieldSpec::field("again", "UInt8"));
        let err = sanitize(&spec).expect_err("duplicate case");
        assert_eq!(kinds(&err), vec![SchemaErrorKind::DuplicateCase("2".into())]);

        let spec = FieldSpec::switch("body", Meta::path(".kind"))
            .size(4)
            .add_case(1, FieldSpec::field("num", "UInt32"))
            .add_case(2, FieldSpec::field("text", "StrRawAscii"));
        let desc = sanitize(&spec).expect("valid");
        let text = desc.case_desc(&CaseKey::Int(2)).expect("case 2");
        assert_eq!(text.literal_size(), Some(4));
        assert!(desc.implicit_default);
        assert_eq!(
            desc.default_case.as_ref().map(|d| d.layout()),
            Some(Layout::Void)
        );
    }

    #[test]
    fn test_union_size_and_restrictions() {
        let spec = FieldSpec::field("u", "Union")
            .case_path(".kind")
            .add_case(0, FieldSpec::field("word", "UInt32"))
            .add_case(1, FieldSpec::field("bytes", "BytesRaw").size(6));
        let desc = sanitize(&spec).expect("valid");
        assert_eq!(desc.literal_size(), Some(6));

        let bad = FieldSpec::field("u", "Union")
            .case_path(".kind")
            .add_case(0, FieldSpec::field("p", "UInt32").pointer(Meta::literal(4u8)));
        let kinds = kinds(&sanitize(&bad).expect_err("invalid"));
        assert!(kinds.contains(&SchemaErrorKind::IllegalInUnion("POINTER")));
    }

    #[test]
    fn test_stream_adapter_codec_checked() {
        let ok = FieldSpec::field("z", "StreamAdapter")
            .decoder("zlib")
            .sub_struct(FieldSpec::field("inner", "BytesRaw").size(4));
        let desc = sanitize(&ok).expect("valid");
        assert_eq!(desc.slot("inner"), Some(Slot::Inner));

        let bad = FieldSpec::field("z", "StreamAdapter")
            .decoder("lzma-from-mars")
            .sub_struct(FieldSpec::field("inner", "BytesRaw").size(4));
        let kinds = kinds(&sanitize(&bad).expect_err("invalid"));
        assert_eq!(kinds, vec![SchemaErrorKind::UnknownCodec("lzma-from-mars".into())]);
    }

    #[test]
    fn test_steptree_only_on_blocks() {
        let bad = FieldSpec::container("c").entry(
            FieldSpec::field("n", "UInt8").steptree(FieldSpec::field("tail", "UInt8")),
        );
        let kinds = kinds(&sanitize(&bad).expect_err("invalid"));
        assert_eq!(kinds, vec![SchemaErrorKind::MisplacedSteptree]);

        let ok = FieldSpec::container("c")
            .entry(FieldSpec::field("n", "UInt8"))
            .steptree(FieldSpec::field("tail", "UInt8"));
        let desc = sanitize(&ok).expect("valid");
        assert_eq!(desc.slot("tail"), Some(Slot::Steptree));
    }

    #[test]
    fn test_default_checked_against_type() {
        let bad = FieldSpec::field("n", "UInt8").default_value("text");
        assert!(sanitize(&bad).is_err());
        let out_of_range = FieldSpec::field("n", "UInt8").default_value(300u16);
        assert!(sanitize(&out_of_range).is_err());
        let ok = FieldSpec::field("n", "UInt8").default_value(7i32);
        assert_eq!(sanitize(&ok).expect("valid").default, Some(Value::UInt(7)));
    }
}
