// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Traversal Engine
//!
//! One recursive walk, instantiated twice: [`parse`] turns bytes into a
//! [`Tree`], [`serialize`] turns a tree back into bytes. Both directions
//! dispatch on the descriptor's [`Layout`](crate::field_type::Layout) and
//! share the same rules:
//!
//! 1. A node with a parent and a POINTER starts at `root_offset + pointer`;
//!    everything else starts at the cursor its parent aligned for it.
//! 2. The returned cursor is the end of the node, or the incoming cursor
//!    when a POINTER jump has CARRY_OFF false.
//! 3. A container, array or struct that is STEPTREE_ROOT, or that finds no
//!    active schedule, opens its own; nodes with a STEPTREE enqueue
//!    themselves and their steptrees follow the root's ordinary children.
//!
//! ```text
//! pair = [len: UInt8, payload: StrRawAscii(SIZE=.len)]
//!
//!  offset  0    1    2    3    4    5
//!         +----+----+----+----+----+----+
//!         | 05 | 61 | 62 | 63 | 64 | 65 |
//!         +----+----+----+----+----+----+
//!          len  payload = "abcde"
//! ```
//!
//! Errors abort the walk; a failed parse never returns a tree.

mod parse;
mod serialize;

pub(crate) use parse::activate_union;

use std::sync::Arc;

use crate::buffer::{ByteSink, ByteSource};
use crate::descriptor::{Descriptor, MetaKey};
use crate::error::{ResolutionError, Result};
use crate::hooks::MetaContext;
use crate::node::{access, Attach, NodeId, Tree};
use crate::value::CaseKey;

use parse::Parser;
use serialize::Serializer;

/// Parse `src` from offset 0.
pub fn parse(desc: &Arc<Descriptor>, src: &dyn ByteSource) -> Result<Tree> {
    parse_at(desc, src, 0)
}

/// Parse with every offset (including POINTERs) relative to `root_offset`.
pub fn parse_at(desc: &Arc<Descriptor>, src: &dyn ByteSource, root_offset: usize) -> Result<Tree> {
    let mut tree = Tree::new();
    let parser = Parser::new(src, root_offset);
    let (_, end) = parser.field(&mut tree, desc, Attach::Root, 0, None, false)?;
    log::debug!(
        "[parse] '{}' {} bytes at {}, {} nodes",
        desc.name,
        end,
        root_offset,
        tree.node_count()
    );
    Ok(tree)
}

/// Serialize `tree` into `sink` from offset 0.
///
/// Returns the number of bytes written past the root offset, including
/// out-of-line POINTER data.
pub fn serialize(tree: &Tree, sink: &mut dyn ByteSink) -> Result<usize> {
    serialize_at(tree, sink, 0)
}

pub fn serialize_at(tree: &Tree, sink: &mut dyn ByteSink, root_offset: usize) -> Result<usize> {
    let mut ser = Serializer::new(sink, root_offset, false);
    let end = ser.field(tree, tree.root(), 0, None, false)?;
    let written = end.max(ser.high());
    log::debug!(
        "[serialize] '{}' {} bytes at {}",
        tree.name(tree.root()),
        written,
        root_offset
    );
    Ok(written)
}

pub fn serialize_to_vec(tree: &Tree) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    serialize(tree, &mut out)?;
    Ok(out)
}

/// Inline byte length of the subtree at `id`.
///
/// The node's own POINTER and pointered descendants are not counted, nor are
/// steptrees, which land in the enclosing block's trailing area. A
/// STEPTREE_ROOT node (`id` included) keeps its steptrees inline.
pub fn measure(tree: &Tree, id: NodeId) -> Result<usize> {
    let mut sink = Discard;
    let mut ser = Serializer::new(&mut sink, 0, true);
    let mut outer = Vec::new();
    ser.field(tree, id, 0, Some(&mut outer), true)
}

/// Like [`measure`], but `id` emits the steptrees it schedules, the way a
/// top-level serialize would.
pub(crate) fn extent(tree: &Tree, id: NodeId) -> Result<usize> {
    let mut sink = Discard;
    let mut ser = Serializer::new(&mut sink, 0, true);
    ser.field(tree, id, 0, None, true)
}

struct Discard;

impl ByteSink for Discard {
    fn write_at(&mut self, _offset: usize, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Meta entry of the node being processed, evaluated as a size or count.
fn eval_size(ctx: &MetaContext<'_>, key: MetaKey) -> Result<Option<usize>> {
    match ctx.tree.descriptor(ctx.node).meta(key) {
        Some(meta) => access::as_size(&access::eval_meta(meta, ctx)?).map(Some),
        None => Ok(None),
    }
}

/// CASE of the node being processed as a lookup key.
fn eval_case(ctx: &MetaContext<'_>) -> Result<Option<CaseKey>> {
    match &ctx.tree.descriptor(ctx.node).case {
        Some(meta) => Ok(CaseKey::from_value(&access::eval_meta(meta, ctx)?)),
        None => Ok(None),
    }
}

/// WhileArray condition.
fn eval_condition(ctx: &MetaContext<'_>) -> Result<bool> {
    match &ctx.tree.descriptor(ctx.node).case {
        Some(meta) => {
            let value = access::eval_meta(meta, ctx)?;
            value.as_bool().ok_or_else(|| {
                ResolutionError::TypeMismatch {
                    expected: "bool",
                    found: value.kind_name().to_string(),
                }
                .into()
            })
        }
        None => Ok(false),
    }
}

/// Start of a node and whether it was reached through its POINTER.
fn start_of(ctx: &MetaContext<'_>, offset: usize, placed: bool) -> Result<(usize, bool)> {
    let pointered = !placed && ctx.tree.parent(ctx.node).is_some();
    match pointered.then(|| eval_size(ctx, MetaKey::Pointer)).transpose()?.flatten() {
        Some(start) => Ok((start, true)),
        None => Ok((offset, false)),
    }
}
