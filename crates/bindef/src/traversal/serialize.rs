// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serialize direction: tree nodes into bytes.

use super::{eval_size, start_of};
use crate::buffer::{align_offset, ByteSink};
use crate::descriptor::{Descriptor, MetaKey};
use crate::error::{ResolutionError, Result, SerializeError};
use crate::field_type::{write_uint, FieldFlags, Layout};
use crate::value::Value;
use crate::hooks::MetaContext;
use crate::node::{NodeBody, NodeId, Tree};

pub(crate) struct Serializer<'a> {
    sink: &'a mut dyn ByteSink,
    root_offset: usize,
    /// Furthest byte written, relative to `root_offset`.
    high: usize,
    /// Measure mode: pointered nodes take no inline space.
    skip_pointered: bool,
}

impl<'a> Serializer<'a> {
    pub(crate) fn new(sink: &'a mut dyn ByteSink, root_offset: usize, skip_pointered: bool) -> Self {
        Self {
            sink,
            root_offset,
            high: 0,
            skip_pointered,
        }
    }

    pub(crate) fn high(&self) -> usize {
        self.high
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.sink.write_at(self.root_offset + offset, data)?;
        self.high = self.high.max(offset + data.len());
        Ok(())
    }

    /// Serialize the node `id` at `offset`. Returns the cursor after it.
    pub(crate) fn field(
        &mut self,
        tree: &Tree,
        id: NodeId,
        offset: usize,
        sched: Option<&mut Vec<NodeId>>,
        placed: bool,
    ) -> Result<usize> {
        let desc = tree.descriptor(id);
        if self.skip_pointered && !placed && desc.pointer.is_some() && tree.parent(id).is_some() {
            return Ok(offset);
        }
        let (start, jumped) = start_of(&MetaContext::detached(tree, id), offset, placed)?;
        let end = match desc.layout() {
            Layout::Data => self.data(tree, id, desc, start)?,
            Layout::CString => {
                let raw = encode(tree, id, desc, None)?;
                self.write(start, &raw)?;
                start + raw.len()
            }
            Layout::Pad => {
                let size = desc.literal_size().unwrap_or(0);
                self.write(start, &vec![0; size])?;
                start + size
            }
            Layout::Void => start,
            Layout::Container | Layout::Struct | Layout::Array | Layout::WhileArray => {
                self.block(tree, id, desc, start, sched)?
            }
            Layout::BitStruct => self.bit_struct(tree, id, desc, start)?,
            Layout::Bits => {
                return Err(SerializeError::Structure {
                    field: desc.name.clone(),
                    reason: "bit field outside a BitStruct".to_string(),
                }
                .into())
            }
            Layout::Switch => match tree.inner(id) {
                Some(active) => self.field(tree, active, start, sched, false)?,
                None => start,
            },
            Layout::Union => self.union(tree, id, desc, start)?,
            Layout::StreamAdapter => self.stream(tree, id, desc, start)?,
        };
        log::trace!("[serialize] '{}' {}..{}", desc.name, start, end);
        if jumped && !desc.carry_off {
            Ok(offset)
        } else {
            Ok(end)
        }
    }

    fn data(&mut self, tree: &Tree, id: NodeId, desc: &Descriptor, start: usize) -> Result<usize> {
        let size = eval_size(&MetaContext::detached(tree, id), MetaKey::Size)?;
        let mut raw = encode(tree, id, desc, size)?;
        if let Some(size) = size {
            fit(desc, &mut raw, size)?;
        }
        self.write(start, &raw)?;
        Ok(start + raw.len())
    }

    fn bit_struct(&mut self, tree: &Tree, id: NodeId, desc: &Descriptor, start: usize) -> Result<usize> {
        let size = desc.literal_size().unwrap_or(0);
        let mut word = 0u64;
        for (&child, &off) in tree.children(id).iter().zip(&desc.attr_offs) {
            let child_desc = tree.descriptor(child);
            let ft = &child_desc.field_type;
            let encode_err = |reason: String| SerializeError::Encode {
                field: child_desc.name.clone(),
                reason,
            };
            let count = u32::try_from(child_desc.literal_size().unwrap_or(0))
                .map_err(|e| encode_err(e.to_string()))?;
            let bits = ft
                .codec
                .encode_bits(ft, scalar(tree, child)?, count)
                .map_err(encode_err)?;
            if count > 0 {
                word |= bits.checked_shl(off as u32).unwrap_or(0);
            }
        }
        self.write(start, &write_uint(word, size, desc.byte_order()))?;
        Ok(start + size)
    }

    fn block(
        &mut self,
        tree: &Tree,
        id: NodeId,
        desc: &Descriptor,
        start: usize,
        sched: Option<&mut Vec<NodeId>>,
    ) -> Result<usize> {
        let is_root = desc.steptree_root || sched.is_none();
        let mut own = Vec::new();
        let mut cursor = start;
        {
            let active: &mut Vec<NodeId> = match sched {
                Some(outer) if !desc.steptree_root => outer,
                _ => &mut own,
            };
            if desc.steptree.is_some() {
                active.push(id);
            }
            if desc.layout() == Layout::Struct {
                let size = desc.literal_size().unwrap_or(0);
                self.write(start, &vec![0; size])?;
                for (&child, off) in tree.children(id).iter().zip(&desc.attr_offs) {
                    self.field(tree, child, start + off, Some(&mut *active), false)?;
                }
                cursor = start + size;
            } else {
                for &child in tree.children(id) {
                    let at = align_offset(cursor, tree.descriptor(child).align);
                    cursor = self.field(tree, child, at, Some(&mut *active), false)?;
                }
            }
        }
        if is_root {
            for parent in own {
                if let Some(st) = tree.steptree(parent) {
                    let at = align_offset(cursor, tree.descriptor(st).align);
                    cursor = self.field(tree, st, at, None, false)?;
                }
            }
        }
        Ok(cursor)
    }

    /// Active case written over the union's own bytes, padded to SIZE.
    fn union(&mut self, tree: &Tree, id: NodeId, desc: &Descriptor, start: usize) -> Result<usize> {
        let size = desc.literal_size().unwrap_or(0);
        let mut buf = match tree.node(id).body() {
            NodeBody::Union { raw, .. } => raw.clone(),
            _ => Vec::new(),
        };
        buf.resize(size, 0);
        if let Some(active) = tree.inner(id) {
            let used = {
                let mut nested = Serializer::new(&mut buf, 0, false);
                let end = nested.field(tree, active, 0, None, true)?;
                end.max(nested.high())
            };
            if used > size {
                return Err(SerializeError::Overflow {
                    field: desc.name.clone(),
                    size: used,
                    max: size,
                }
                .into());
            }
        }
        self.write(start, &buf)?;
        Ok(start + size)
    }

    fn stream(&mut self, tree: &Tree, id: NodeId, desc: &Descriptor, start: usize) -> Result<usize> {
        let Some(encoder) = desc.stream_encoder() else {
            return Err(SerializeError::Structure {
                field: desc.name.clone(),
                reason: "stream adapter without codec".to_string(),
            }
            .into());
        };
        let mut data = Vec::new();
        if let Some(inner) = tree.inner(id) {
            let mut nested = Serializer::new(&mut data, 0, false);
            nested.field(tree, inner, 0, None, true)?;
        }
        let packed = encoder.codec.encode(&data)?;
        self.write(start, &packed)?;
        Ok(start + packed.len())
    }
}

fn scalar(tree: &Tree, id: NodeId) -> Result<&Value> {
    match tree.node(id).body() {
        NodeBody::Scalar(value) => Ok(value),
        _ => Err(ResolutionError::NotScalar {
            name: tree.name(id).to_string(),
        }
        .into()),
    }
}

/// Leaf bytes of `id`; `size` is the SIZE in effect, if any.
fn encode(tree: &Tree, id: NodeId, desc: &Descriptor, size: Option<usize>) -> Result<Vec<u8>> {
    let value = scalar(tree, id)?;
    let ft = &desc.field_type;
    let order = desc.byte_order();
    match size {
        Some(size) => ft.codec.encode_sized(ft, value, order, size),
        None => ft.codec.encode(ft, value, order),
    }
    .map_err(|reason| {
        SerializeError::Encode {
            field: desc.name.clone(),
            reason,
        }
        .into()
    })
}

/// Bring `raw` to exactly `size` bytes: zero-padded when short.
///
/// A delimited string that only overflows by its delimiter loses the
/// delimiter; anything longer is an overflow.
fn fit(desc: &Descriptor, raw: &mut Vec<u8>, size: usize) -> Result<()> {
    if raw.len() > size {
        let ft = &desc.field_type;
        let delim = ft.delimiter();
        let only_delim = ft.is(FieldFlags::IS_DELIMITED)
            && raw.len() == size + delim.len()
            && raw.ends_with(&delim);
        if !only_delim {
            return Err(SerializeError::Overflow {
                field: desc.name.clone(),
                size: raw.len(),
                max: size,
            }
            .into());
        }
    }
    raw.resize(size, 0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::{Error, SerializeError};
    use crate::node::build;
    use crate::sanitizer::sanitize;
    use crate::spec::FieldSpec;
    use crate::traversal::{measure, serialize_to_vec};

    #[test]
    fn test_struct_writes_at_offsets() {
        let desc = sanitize(
            &FieldSpec::structure("hdr")
                .endian(">")
                .entry(FieldSpec::field("tag", "UInt8"))
                .entry(FieldSpec::field("value", "UInt16").offset(4))
                .entry(FieldSpec::field("flags", "UInt8")),
        )
        .expect("valid");
        let mut tree = build::build(&desc, None).expect("build");
        let root = tree.root();
        tree.set(root, "tag", 0xaau8).expect("tag");
        tree.set(root, "value", 0x0102u16).expect("value");
        tree.set(root, "flags", 0xffu8).expect("flags");
        let out = serialize_to_vec(&tree).expect("serialize");
        assert_eq!(out, vec![0xaa, 0, 0, 0, 0x01, 0x02, 0xff]);
        assert_eq!(measure(&tree, root).expect("measure"), 7);
    }

    #[test]
    fn test_fixed_size_padding_and_overflow() {
        let desc = sanitize(
            &FieldSpec::container("c")
                .entry(FieldSpec::field("name", "StrAscii").size(4))
                .entry(FieldSpec::field("end", "UInt8")),
        )
        .expect("valid");
        let mut tree = build::build(&desc, None).expect("build");
        let root = tree.root();
        tree.set(root, "name", "ab").expect("set");
        assert_eq!(serialize_to_vec(&tree).expect("pad"), b"ab\0\0\0".to_vec());

        // exactly SIZE characters: the delimiter is dropped
        tree.set(root, "name", "abcd").expect("set");
        assert_eq!(serialize_to_vec(&tree).expect("exact"), b"abcd\0".to_vec());

        tree.set(root, "name", "abcde").expect("set");
        let err = serialize_to_vec(&tree).expect_err("overflow");
        assert!(matches!(
            err,
            Error::Serialize(SerializeError::Overflow { size: 6, max: 4, .. })
        ));
    }

    #[test]
    fn test_encode_range_error() {
        let desc = sanitize(&FieldSpec::field("s", "StrRawAscii").size(3)).expect("valid");
        let mut tree = build::build(&desc, None).expect("build");
        tree.set_value(tree.root(), "caf\u{e9}").expect("set");
        let err = serialize_to_vec(&tree).expect_err("not ascii");
        assert!(matches!(err, Error::Serialize(SerializeError::Encode { .. })));
    }

    #[test]
    fn test_bit_struct_packs_word() {
        let desc = sanitize(
            &FieldSpec::field("w", "BBitStruct")
                .size(4)
                .entry(FieldSpec::field("on", "BitBool").size(2).option("a").option("b"))
                .entry(FieldSpec::field("level", "SBitInt").size(6))
                .entry(FieldSpec::field("top", "UBitInt").size(4).offset(28)),
        )
        .expect("valid");
        let mut tree = build::build(&desc, None).expect("build");
        let root = tree.root();
        tree.set(root, "on", 2u8).expect("on");
        tree.set(root, "level", -1i32).expect("level");
        tree.set(root, "top", 0xau8).expect("top");
        let out = serialize_to_vec(&tree).expect("serialize");
        assert_eq!(out, vec![0xa0, 0x00, 0x00, 0xfe]);
        assert_eq!(measure(&tree, root).expect("measure"), 4);

        tree.set(root, "level", 32u8).expect("held until written");
        let err = serialize_to_vec(&tree).expect_err("6-bit overflow");
        assert!(matches!(err, Error::Serialize(SerializeError::Encode { .. })));
    }

    #[test]
    fn test_big_int_uses_declared_width() {
        let desc = sanitize(
            &FieldSpec::container("c")
                .entry(FieldSpec::field("n", "BSIntBig").size(5))
                .entry(FieldSpec::field("len", "UInt8"))
                .entry(FieldSpec::field("m", "LUIntBig").size_path(".len")),
        )
        .expect("valid");
        let mut tree = build::build(&desc, None).expect("build");
        let root = tree.root();
        tree.set(root, "n", -2i32).expect("n");
        tree.set(root, "len", 3u8).expect("len");
        tree.set(root, "m", 0x01_0203u32).expect("m");
        let out = serialize_to_vec(&tree).expect("serialize");
        assert_eq!(out, vec![0xff, 0xff, 0xff, 0xff, 0xfe, 3, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_measure_skips_pointered() {
        let desc = sanitize(
            &FieldSpec::container("c")
                .entry(FieldSpec::field("off", "UInt8"))
                .entry(FieldSpec::field("far", "UInt32").pointer_path(".off").carry_off(false))
                .entry(FieldSpec::field("pad", "Pad").size(3)),
        )
        .expect("valid");
        let tree = build::build(&desc, None).expect("build");
        assert_eq!(measure(&tree, tree.root()).expect("measure"), 4);
    }
}
