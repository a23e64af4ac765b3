// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Attribute access on tree nodes.
//!
//! Names resolve through the descriptor's NAME_MAP to a [`Slot`]; integers
//! address ordered children directly. Switch, union and wrapper nodes are
//! transparent: a key they do not own is looked up on their active child.

use std::sync::Arc;

use super::{build, NodeBody, NodeId, NodeKind, Tree};
use crate::descriptor::{Descriptor, MetaKey, Slot};
use crate::error::{ResolutionError, Result};
use crate::hooks::MetaContext;
use crate::nodepath;
use crate::spec::Meta;
use crate::traversal;
use crate::value::{CaseKey, Value};

/// Attribute key: an alias name or an ordered position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for Key<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Evaluate a meta entry in `ctx`.
pub(crate) fn eval_meta(meta: &Meta, ctx: &MetaContext<'_>) -> Result<Value> {
    match meta {
        Meta::Literal(v) => Ok(v.clone()),
        Meta::Path(path) => nodepath::resolve(ctx.tree, ctx.node, path),
        Meta::Computed { func, .. } => func(ctx),
    }
}

/// Meta value as a byte length or element count.
pub(crate) fn as_size(value: &Value) -> Result<usize> {
    value.as_usize().ok_or_else(|| {
        ResolutionError::TypeMismatch {
            expected: "unsigned size",
            found: value.kind_name().to_string(),
        }
        .into()
    })
}

fn not_scalar(tree: &Tree, id: NodeId) -> ResolutionError {
    ResolutionError::NotScalar {
        name: tree.name(id).to_string(),
    }
}

impl Tree {
    /// Resolve one attribute of `id`.
    pub fn child<'k>(&self, id: NodeId, key: impl Into<Key<'k>>) -> Result<NodeId> {
        let key = key.into();
        let node = self.node(id);
        if let Key::Name(name) = key {
            if let Some(slot) = node.desc.slot(name) {
                return match slot {
                    Slot::Index(i) => self.indexed(id, i),
                    Slot::Steptree => node.steptree.ok_or_else(|| {
                        ResolutionError::NoSuchAttribute {
                            name: name.to_string(),
                        }
                        .into()
                    }),
                    Slot::Inner => self.inner(id).ok_or_else(|| {
                        ResolutionError::NoSuchAttribute {
                            name: name.to_string(),
                        }
                        .into()
                    }),
                };
            }
        }
        match (&node.body, key) {
            (NodeBody::Container(_) | NodeBody::Array(_), Key::Index(i)) => self.indexed(id, i),
            (NodeBody::Switch { .. } | NodeBody::Union { .. } | NodeBody::Wrapper(_), _) => {
                match self.inner(id) {
                    Some(active) if key == Key::Name(self.name(active)) => Ok(active),
                    Some(active) => self.child(active, key),
                    None => Err(missing(key)),
                }
            }
            _ => Err(missing(key)),
        }
    }

    fn indexed(&self, id: NodeId, index: usize) -> Result<NodeId> {
        let children = self.children(id);
        children.get(index).copied().ok_or_else(|| {
            ResolutionError::IndexOutOfRange {
                index,
                len: children.len(),
            }
            .into()
        })
    }

    /// Node holding the value of `id`: follows active cases and wrappers.
    pub fn scalar_node(&self, id: NodeId) -> Result<NodeId> {
        let mut at = id;
        loop {
            match &self.node(at).body {
                NodeBody::Scalar(_) => return Ok(at),
                NodeBody::Switch { .. } | NodeBody::Union { .. } | NodeBody::Wrapper(_) => {
                    at = self.inner(at).ok_or_else(|| not_scalar(self, id))?;
                }
                _ => return Err(not_scalar(self, id).into()),
            }
        }
    }

    pub fn value(&self, id: NodeId) -> Result<&Value> {
        match &self.node(self.scalar_node(id)?).body {
            NodeBody::Scalar(v) => Ok(v),
            _ => Err(not_scalar(self, id).into()),
        }
    }

    pub fn get<'k>(&self, id: NodeId, key: impl Into<Key<'k>>) -> Result<Value> {
        self.value(self.child(id, key)?).cloned()
    }

    pub fn set<'k>(&mut self, id: NodeId, key: impl Into<Key<'k>>, value: impl Into<Value>) -> Result<()> {
        let target = self.child(id, key)?;
        self.set_value(target, value)
    }

    /// Store `value` in the scalar behind `id`, coerced to its field type.
    pub fn set_value(&mut self, id: NodeId, value: impl Into<Value>) -> Result<()> {
        let target = self.scalar_node(id)?;
        let ft = Arc::clone(&self.node(target).desc.field_type);
        let value = value.into();
        let found = value.kind_name();
        let coerced = ft.coerce(value).ok_or_else(|| ResolutionError::TypeMismatch {
            expected: ft.codec.default_value(&ft).kind_name(),
            found: found.to_string(),
        })?;
        self.node_mut(target).body = NodeBody::Scalar(coerced);
        Ok(())
    }

    /// Evaluate a descriptor meta entry for `id`; `None` when undeclared.
    pub fn get_meta(&self, id: NodeId, key: MetaKey) -> Result<Option<Value>> {
        match self.descriptor(id).meta(key) {
            Some(meta) => eval_meta(meta, &MetaContext::detached(self, id)).map(Some),
            None => Ok(None),
        }
    }

    /// Store `value` where the meta entry of `id` points.
    ///
    /// Only NodePath metas are writable. Assigning the value a literal
    /// already has is accepted.
    pub fn set_meta(&mut self, id: NodeId, key: MetaKey, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let desc = Arc::clone(self.descriptor(id));
        match desc.meta(key) {
            Some(Meta::Path(path)) => nodepath::assign(self, id, path, value),
            Some(Meta::Literal(lit))
                if *lit == value || lit.as_u64().is_some_and(|n| value.as_u64() == Some(n)) =>
            {
                Ok(())
            }
            _ => Err(ResolutionError::NotAssignable { key: key.name() }.into()),
        }
    }

    /// Serialized size of `id`: an element count for arrays, bytes otherwise.
    pub fn get_size(&self, id: NodeId) -> Result<usize> {
        let node = self.node(id);
        match &node.body {
            NodeBody::Array(children) => return Ok(children.len()),
            NodeBody::Switch { active, .. } => {
                return active.map_or(Ok(0), |a| self.get_size(a));
            }
            NodeBody::Placeholder => return Ok(node.desc.literal_size().unwrap_or(0)),
            _ => {}
        }
        if let Some(size) = self.get_meta(id, MetaKey::Size)? {
            return as_size(&size);
        }
        match &node.body {
            NodeBody::Scalar(v) => Ok(node.desc.field_type.codec.size_of(&node.desc.field_type, v)),
            _ => traversal::measure(self, id),
        }
    }

    /// Update the SIZE target of `id` to `size`, or to its computed size.
    ///
    /// Nodes without a SIZE entry have nothing to update.
    pub fn set_size(&mut self, id: NodeId, size: Option<usize>) -> Result<()> {
        if self.descriptor(id).size.is_none() {
            return Ok(());
        }
        let size = match size {
            Some(size) => size,
            None => match &self.node(id).body {
                NodeBody::Array(children) => children.len(),
                NodeBody::Scalar(v) => {
                    let ft = &self.node(id).desc.field_type;
                    ft.codec.size_of(ft, v)
                }
                _ => traversal::measure(self, id)?,
            },
        };
        self.set_meta(id, MetaKey::Size, size)
    }

    /// Append a default element to an array node.
    pub fn append(&mut self, id: NodeId) -> Result<NodeId> {
        let elem = match (&self.node(id).body, &self.node(id).desc.sub_struct) {
            (NodeBody::Array(_), Some(sub)) => Arc::clone(sub),
            _ => return Err(self.wrong_kind(id, "array")),
        };
        build::build_node(self, &elem, super::Attach::Child(id))
    }

    /// Drop array elements past `len`.
    pub fn truncate(&mut self, id: NodeId, len: usize) -> Result<()> {
        if let NodeBody::Array(children) = &mut self.node_mut(id).body {
            children.truncate(len);
            return Ok(());
        }
        Err(self.wrong_kind(id, "array"))
    }

    fn wrong_kind(&self, id: NodeId, expected: &'static str) -> crate::Error {
        ResolutionError::TypeMismatch {
            expected,
            found: self.kind(id).name().to_string(),
        }
        .into()
    }

    /// Active case of a switch or union; `None` for the default case.
    pub fn case(&self, id: NodeId) -> Option<&CaseKey> {
        match &self.node(id).body {
            NodeBody::Switch { case, .. } | NodeBody::Union { case, .. } => case.as_ref(),
            _ => None,
        }
    }

    /// Replace the active case of a switch, or reinterpret a union's bytes.
    ///
    /// An unknown key selects the default case. The CASE source is not
    /// updated.
    pub fn set_active(&mut self, id: NodeId, key: impl Into<CaseKey>) -> Result<Option<NodeId>> {
        let key = key.into();
        let desc = Arc::clone(self.descriptor(id));
        let (case_desc, matched) = match desc.case_desc(&key) {
            Some(d) => (Some(Arc::clone(d)), true),
            None => (desc.default_case.clone(), false),
        };
        match self.kind(id) {
            NodeKind::Switch => {
                if let NodeBody::Switch { case, active } = &mut self.node_mut(id).body {
                    *case = matched.then_some(key);
                    *active = None;
                }
                case_desc
                    .map(|d| build::build_node(self, &d, super::Attach::Inner(id)))
                    .transpose()
            }
            NodeKind::Union => traversal::activate_union(self, id, case_desc, matched.then_some(key)),
            _ => Err(self.wrong_kind(id, "switch or union")),
        }
    }

    /// Option name of an enum value, if it has one.
    pub fn enum_name(&self, id: NodeId) -> Result<Option<&str>> {
        let target = self.scalar_node(id)?;
        let value = self.value(target)?;
        Ok(self.descriptor(target).option_name(value))
    }

    pub fn set_enum(&mut self, id: NodeId, name: &str) -> Result<()> {
        let target = self.scalar_node(id)?;
        let value = self
            .descriptor(target)
            .option_value(name)
            .cloned()
            .ok_or_else(|| ResolutionError::NoSuchAttribute {
                name: name.to_string(),
            })?;
        self.set_value(target, value)
    }

    /// Whether every bit of the named bool option is set.
    pub fn flag(&self, id: NodeId, name: &str) -> Result<bool> {
        let target = self.scalar_node(id)?;
        let mask = self.flag_mask(target, name)?;
        let bits = self.value(target)?.as_u64().unwrap_or(0);
        Ok(bits & mask == mask)
    }

    pub fn set_flag(&mut self, id: NodeId, name: &str, on: bool) -> Result<()> {
        let target = self.scalar_node(id)?;
        let mask = self.flag_mask(target, name)?;
        let bits = self.value(target)?.as_u64().unwrap_or(0);
        let bits = if on { bits | mask } else { bits & !mask };
        self.set_value(target, bits)
    }

    fn flag_mask(&self, target: NodeId, name: &str) -> Result<u64> {
        self.descriptor(target)
            .option_value(name)
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                ResolutionError::NoSuchAttribute {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Private copy of the descriptor of `id`.
    ///
    /// Clones the descriptor on first use; other nodes keep the shared one.
    pub fn descriptor_mut(&mut self, id: NodeId) -> &mut Descriptor {
        Arc::make_mut(&mut self.node_mut(id).desc)
    }

    /// Structural value equality of two trees from their roots.
    ///
    /// Union raw bytes are not compared, only the active case view.
    pub fn values_eq(&self, other: &Tree) -> bool {
        self.subtree_eq(self.root(), other, other.root())
    }

    fn subtree_eq(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        let (na, nb) = (self.node(a), other.node(b));
        if na.desc.name != nb.desc.name || na.body.kind() != nb.body.kind() {
            return false;
        }
        let pair_eq = |x: Option<NodeId>, y: Option<NodeId>| match (x, y) {
            (Some(x), Some(y)) => self.subtree_eq(x, other, y),
            (None, None) => true,
            _ => false,
        };
        let body_eq = match (&na.body, &nb.body) {
            (NodeBody::Scalar(x), NodeBody::Scalar(y)) => x == y,
            (NodeBody::Container(x), NodeBody::Container(y)) | (NodeBody::Array(x), NodeBody::Array(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(&x, &y)| self.subtree_eq(x, other, y))
            }
            (NodeBody::Placeholder, NodeBody::Placeholder) => true,
            _ => self.case(a) == other.case(b) && pair_eq(self.inner(a), other.inner(b)),
        };
        body_eq && pair_eq(na.steptree, nb.steptree)
    }
}

fn missing(key: Key<'_>) -> crate::Error {
    match key {
        Key::Name(name) => ResolutionError::NoSuchAttribute {
            name: name.to_string(),
        }
        .into(),
        Key::Index(index) => ResolutionError::IndexOutOfRange { index, len: 0 }.into(),
    }
}
