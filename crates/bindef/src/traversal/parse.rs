// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parse direction: bytes into tree nodes.

use std::sync::Arc;

use super::{eval_case, eval_condition, eval_size, start_of};
use crate::buffer::{align_offset, ByteSource};
use crate::descriptor::{Descriptor, MetaKey};
use crate::error::{ParseError, ResolutionError, Result};
use crate::field_type::{read_uint, Layout};
use crate::hooks::MetaContext;
use crate::node::{Attach, NodeBody, NodeId, Tree};
use crate::value::{CaseKey, Value};

pub(crate) struct Parser<'a> {
    src: &'a dyn ByteSource,
    root_offset: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a dyn ByteSource, root_offset: usize) -> Self {
        Self { src, root_offset }
    }

    fn ctx<'t>(&self, tree: &'t Tree, node: NodeId, offset: usize) -> MetaContext<'t>
    where
        'a: 't,
    {
        MetaContext {
            tree,
            node,
            source: Some(self.src),
            offset: Some(offset),
            root_offset: self.root_offset,
            index: None,
        }
    }

    /// Parse one field at `offset` and link it at `at`.
    ///
    /// `placed` marks a node whose start the caller fixed (union cases,
    /// stream payload roots); its POINTER is not followed.
    pub(crate) fn field(
        &self,
        tree: &mut Tree,
        desc: &Arc<Descriptor>,
        at: Attach,
        offset: usize,
        sched: Option<&mut Vec<NodeId>>,
        placed: bool,
    ) -> Result<(NodeId, usize)> {
        let id = tree.alloc(Arc::clone(desc), at);
        let (start, jumped) = start_of(&self.ctx(tree, id, offset), offset, placed)?;
        let end = match desc.layout() {
            Layout::Data => self.data(tree, id, desc, start)?,
            Layout::CString => self.cstring(tree, id, desc, start)?,
            Layout::Pad => {
                let size = desc.literal_size().unwrap_or(0);
                self.require(start, size)?;
                start + size
            }
            Layout::Void => start,
            Layout::Container | Layout::Struct | Layout::Array | Layout::WhileArray => {
                self.block(tree, id, desc, start, sched)?
            }
            Layout::BitStruct => self.bit_struct(tree, id, desc, start)?,
            Layout::Bits => {
                return Err(ParseError::Malformed {
                    field: desc.name.clone(),
                    offset: start,
                    reason: "bit field outside a BitStruct".into(),
                }
                .into())
            }
            Layout::Switch => self.switch(tree, id, desc, start, sched)?,
            Layout::Union => self.union(tree, id, desc, start)?,
            Layout::StreamAdapter => self.stream(tree, id, desc, start)?,
        };
        log::trace!("[parse] '{}' {}..{}", desc.name, start, end);
        if jumped && !desc.carry_off {
            Ok((id, offset))
        } else {
            Ok((id, end))
        }
    }

    /// Absolute source offset of `start`.
    fn abs(&self, start: usize) -> Result<usize> {
        self.root_offset.checked_add(start).ok_or_else(|| {
            ParseError::Exhausted {
                offset: start,
                need: 0,
                have: 0,
            }
            .into()
        })
    }

    /// Fail unless `size` bytes are available at `start`.
    fn require(&self, start: usize, size: usize) -> Result<()> {
        let abs = self.abs(start)?;
        if abs.checked_add(size).map_or(true, |end| end > self.src.len()) {
            return Err(ParseError::Exhausted {
                offset: start,
                need: size,
                have: self.src.len().saturating_sub(abs),
            }
            .into());
        }
        Ok(())
    }

    fn decode(&self, desc: &Descriptor, raw: &[u8], start: usize) -> Result<Value> {
        let ft = &desc.field_type;
        ft.codec.decode(ft, raw, desc.byte_order()).map_err(|reason| {
            ParseError::Malformed {
                field: desc.name.clone(),
                offset: start,
                reason,
            }
            .into()
        })
    }

    fn data(&self, tree: &mut Tree, id: NodeId, desc: &Descriptor, start: usize) -> Result<usize> {
        let size = match eval_size(&self.ctx(tree, id, start), MetaKey::Size)? {
            Some(size) => size,
            None => desc.field_type.fixed_size().unwrap_or(0),
        };
        self.require(start, size)?;
        let raw = self.src.read_vec(self.root_offset + start, size)?;
        let value = self.decode(desc, &raw, start)?;
        tree.node_mut(id).body = NodeBody::Scalar(value);
        Ok(start + size)
    }

    fn cstring(&self, tree: &mut Tree, id: NodeId, desc: &Descriptor, start: usize) -> Result<usize> {
        let delim = desc.field_type.delimiter();
        let abs = self.abs(start)?;
        let stop = self
            .src
            .find(abs, &delim, delim.len())?
            .ok_or_else(|| ParseError::Unterminated {
                field: desc.name.clone(),
                offset: start,
            })?;
        let raw = self.src.read_vec(abs, stop - abs)?;
        let value = self.decode(desc, &raw, start)?;
        tree.node_mut(id).body = NodeBody::Scalar(value);
        Ok(stop - self.root_offset + delim.len())
    }

    /// One integer word split into bit fields, least significant bit first.
    fn bit_struct(&self, tree: &mut Tree, id: NodeId, desc: &Descriptor, start: usize) -> Result<usize> {
        let size = desc.literal_size().unwrap_or(0);
        self.require(start, size)?;
        let raw = self.src.read_vec(self.root_offset + start, size)?;
        let word = read_uint(&raw, desc.byte_order());
        for (entry, &off) in desc.entries.iter().zip(&desc.attr_offs) {
            let ft = &entry.field_type;
            let bits = if off >= 64 { 0 } else { word >> off };
            let value = u32::try_from(entry.literal_size().unwrap_or(0))
                .map_err(|e| e.to_string())
                .and_then(|count| ft.codec.decode_bits(ft, bits, count))
                .map_err(|reason| ParseError::Malformed {
                    field: entry.name.clone(),
                    offset: start,
                    reason,
                })?;
            let child = tree.alloc(Arc::clone(entry), Attach::Child(id));
            tree.node_mut(child).body = NodeBody::Scalar(value);
        }
        Ok(start + size)
    }

    /// Containers, structs and both array kinds, plus steptree scheduling.
    fn block(
        &self,
        tree: &mut Tree,
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
            match desc.layout() {
                Layout::Struct => {
                    let size = desc.literal_size().unwrap_or(0);
                    self.require(start, size)?;
                    for (entry, off) in desc.entries.iter().zip(&desc.attr_offs) {
                        let at = Attach::Child(id);
                        self.field(tree, entry, at, start + off, Some(&mut *active), false)?;
                    }
                    cursor = start + size;
                }
                Layout::Container => {
                    for entry in &desc.entries {
                        let at = align_offset(cursor, entry.align);
                        cursor = self
                            .field(tree, entry, Attach::Child(id), at, Some(&mut *active), false)?
                            .1;
                    }
                }
                Layout::Array => {
                    let count = eval_size(&self.ctx(tree, id, start), MetaKey::Size)?.unwrap_or(0);
                    if let Some(sub) = &desc.sub_struct {
                        for _ in 0..count {
                            let at = align_offset(cursor, sub.align);
                            cursor = self
                                .field(tree, sub, Attach::Child(id), at, Some(&mut *active), false)?
                                .1;
                        }
                    }
                }
                _ => {
                    let Some(sub) = &desc.sub_struct else {
                        return Ok(cursor);
                    };
                    loop {
                        let more = {
                            let mut ctx = self.ctx(tree, id, cursor);
                            ctx.index = Some(tree.len(id));
                            eval_condition(&ctx)?
                        };
                        if !more {
                            break;
                        }
                        let at = align_offset(cursor, sub.align);
                        let next = self
                            .field(tree, sub, Attach::Child(id), at, Some(&mut *active), false)?
                            .1;
                        if next == cursor {
                            log::warn!(
                                "[parse] '{}' element {} consumed no bytes, stopping",
                                desc.name,
                                tree.len(id) - 1
                            );
                            break;
                        }
                        cursor = next;
                    }
                }
            }
        }
        if is_root {
            for parent in own {
                let Some(st) = tree.descriptor(parent).steptree.clone() else {
                    continue;
                };
                let at = align_offset(cursor, st.align);
                cursor = self.field(tree, &st, Attach::Steptree(parent), at, None, false)?.1;
            }
        }
        Ok(cursor)
    }

    fn switch(
        &self,
        tree: &mut Tree,
        id: NodeId,
        desc: &Descriptor,
        start: usize,
        sched: Option<&mut Vec<NodeId>>,
    ) -> Result<usize> {
        let key = eval_case(&self.ctx(tree, id, start))?;
        let (case_desc, key) = select_case(desc, key);
        if let NodeBody::Switch { case, .. } = &mut tree.node_mut(id).body {
            *case = key;
        }
        match case_desc {
            Some(d) => Ok(self.field(tree, &d, Attach::Inner(id), start, sched, false)?.1),
            None => Ok(start),
        }
    }

    fn union(&self, tree: &mut Tree, id: NodeId, desc: &Descriptor, start: usize) -> Result<usize> {
        let size = desc.literal_size().unwrap_or(0);
        self.require(start, size)?;
        let raw = self.src.read_vec(self.root_offset + start, size)?;
        if let NodeBody::Union { raw: bytes, .. } = &mut tree.node_mut(id).body {
            *bytes = raw;
        }
        let key = eval_case(&self.ctx(tree, id, start))?;
        let (case_desc, key) = select_case(desc, key);
        activate_union(tree, id, case_desc, key)?;
        Ok(start + size)
    }

    fn stream(&self, tree: &mut Tree, id: NodeId, desc: &Descriptor, start: usize) -> Result<usize> {
        let Some(decoder) = &desc.decoder else {
            return Ok(start);
        };
        let (data, consumed) = decoder.codec.decode(self.src, self.abs(start)?)?;
        log::trace!(
            "[parse] '{}' {} stream: {} -> {} bytes",
            desc.name,
            decoder.name,
            consumed,
            data.len()
        );
        if let Some(sub) = &desc.sub_struct {
            Parser::new(&data, 0).field(tree, sub, Attach::Inner(id), 0, None, true)?;
        }
        Ok(start + consumed)
    }
}

/// Case descriptor for `key`, falling back to DEFAULT. The returned key is
/// `None` when the default was taken.
fn select_case(desc: &Descriptor, key: Option<CaseKey>) -> (Option<Arc<Descriptor>>, Option<CaseKey>) {
    if let Some(d) = key.as_ref().and_then(|k| desc.case_desc(k)) {
        return (Some(Arc::clone(d)), key);
    }
    let shown = key.map_or_else(|| "none".to_string(), |k| k.to_string());
    if desc.implicit_default || desc.default_case.is_none() {
        log::warn!("[switch] '{}' has no case {}, leaving a placeholder", desc.name, shown);
    } else {
        log::debug!("[switch] '{}' case {} -> default", desc.name, shown);
    }
    (desc.default_case.clone(), None)
}

/// Re-read a union's bytes through `case_desc` and make it the active case.
pub(crate) fn activate_union(
    tree: &mut Tree,
    id: NodeId,
    case_desc: Option<Arc<Descriptor>>,
    key: Option<CaseKey>,
) -> Result<Option<NodeId>> {
    let raw = match &mut tree.node_mut(id).body {
        NodeBody::Union { raw, case, active } => {
            *case = key;
            *active = None;
            raw.clone()
        }
        other => {
            return Err(ResolutionError::TypeMismatch {
                expected: "union",
                found: other.kind().name().to_string(),
            }
            .into())
        }
    };
    match case_desc {
        Some(d) => {
            let (child, _) = Parser::new(&raw, 0).field(tree, &d, Attach::Inner(id), 0, None, true)?;
            Ok(Some(child))
        }
        None => Ok(None),
    }
}
