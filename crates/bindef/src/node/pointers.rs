// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Out-of-line placement of pointered nodes.
//!
//! Inline data is laid out first. Every node whose descriptor carries a
//! POINTER is then placed after it in encounter order, breadth by breadth:
//! pointered nodes found inside already placed data follow the batch that
//! contained them.

use std::mem;
use std::sync::Arc;

use super::access::{as_size, eval_meta};
use super::{NodeBody, NodeId, NodeKind, Tree};
use crate::buffer::align_offset;
use crate::descriptor::MetaKey;
use crate::error::Result;
use crate::field_type::Layout;
use crate::hooks::MetaContext;
use crate::spec::Meta;
use crate::traversal;

impl Tree {
    /// Walk the inline layout of `id` from `offset`, queueing pointered
    /// descendants. Returns the end of the inline data.
    ///
    /// With `root` set, `id` itself is laid out even if it has a POINTER.
    pub fn collect_pointers(
        &self,
        id: NodeId,
        offset: usize,
        queue: &mut Vec<NodeId>,
        root: bool,
    ) -> Result<usize> {
        let desc = self.descriptor(id);
        if !root && desc.pointer.is_some() && self.parent(id).is_some() {
            queue.push(id);
            return Ok(offset);
        }
        let mut offset = align_offset(offset, desc.align);
        let ordered = matches!(self.kind(id), NodeKind::Container | NodeKind::Array)
            && !matches!(desc.layout(), Layout::Struct | Layout::BitStruct);
        if ordered {
            for &child in self.children(id) {
                offset = self.collect_pointers(child, offset, queue, false)?;
            }
            if let Some(st) = self.steptree(id) {
                offset = self.collect_pointers(st, offset, queue, false)?;
            }
            return Ok(offset);
        }
        offset += traversal::extent(self, id)?;
        self.queue_nested(id, queue);
        Ok(offset)
    }

    /// Queue pointered nodes below a node measured as one block.
    fn queue_nested(&self, id: NodeId, queue: &mut Vec<NodeId>) {
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        if let NodeBody::Switch { active: Some(a), .. } = &self.node(id).body {
            stack.push(*a);
        }
        if let Some(st) = self.steptree(id) {
            stack.insert(0, st);
        }
        while let Some(n) = stack.pop() {
            if self.descriptor(n).pointer.is_some() {
                queue.push(n);
                continue;
            }
            match &self.node(n).body {
                // union bytes and stream payloads are opaque here
                NodeBody::Union { .. } | NodeBody::Wrapper(_) => continue,
                NodeBody::Switch { active: Some(a), .. } => stack.push(*a),
                _ => {}
            }
            if let Some(st) = self.steptree(n) {
                stack.push(st);
            }
            stack.extend(self.children(n).iter().rev());
        }
    }

    /// Assign POINTER values to every pointered node, placing them after the
    /// inline data that starts at `offset`. Returns the end of all data.
    ///
    /// POINTERs given as a NodePath are written through that path; literal
    /// and computed ones are kept and only advance the layout.
    pub fn set_pointers(&mut self, offset: usize) -> Result<usize> {
        let mut queue = Vec::new();
        let mut offset = self.collect_pointers(self.root(), offset, &mut queue, true)?;
        let mut placed = 0usize;
        while !queue.is_empty() {
            for id in mem::take(&mut queue) {
                let desc = Arc::clone(self.descriptor(id));
                let start = match &desc.pointer {
                    Some(Meta::Path(_)) => {
                        let start = align_offset(offset, desc.align);
                        self.set_meta(id, MetaKey::Pointer, start)?;
                        start
                    }
                    Some(meta) => as_size(&eval_meta(meta, &MetaContext::detached(self, id))?)?,
                    None => offset,
                };
                log::trace!("[pointers] '{}' at {}", desc.name, start);
                offset = self.collect_pointers(id, start, &mut queue, true)?;
                placed += 1;
            }
        }
        log::debug!("[pointers] placed {} node(s), end {}", placed, offset);
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use crate::node::build;
    use crate::sanitizer::sanitize;
    use crate::spec::FieldSpec;
    use crate::value::Value;

    #[test]
    fn test_pointered_field_follows_inline_data() {
        let desc = sanitize(
            &FieldSpec::container("file")
                .entry(FieldSpec::field("name_off", "UInt32"))
                .entry(FieldSpec::field("count", "UInt16"))
                .entry(
                    FieldSpec::field("name", "CStrAscii")
                        .pointer_path(".name_off")
                        .carry_off(false),
                )
                .entry(FieldSpec::field("tail", "UInt8")),
        )
        .expect("valid");
        let mut tree = build::build(&desc, None).expect("build");
        let root = tree.root();
        tree.set(root, "name", "hi").expect("set");
        let end = tree.set_pointers(0).expect("pointers");
        // inline: 4 + 2 + 1, then "hi\0"
        assert_eq!(tree.get(root, "name_off").expect("off"), Value::UInt(7));
        assert_eq!(end, 10);
    }

    #[test]
    fn test_literal_pointer_is_kept() {
        let desc = sanitize(
            &FieldSpec::container("c")
                .entry(FieldSpec::field("a", "UInt8"))
                .entry(
                    FieldSpec::field("b", "UInt32")
                        .pointer(crate::spec::Meta::literal(16u8))
                        .carry_off(false),
                ),
        )
        .expect("valid");
        let mut tree = build::build(&desc, None).expect("build");
        assert_eq!(tree.set_pointers(0).expect("pointers"), 20);
    }
}
