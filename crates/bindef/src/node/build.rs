// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tree construction from a descriptor.

use std::sync::Arc;

use super::access::{as_size, eval_meta};
use super::{Attach, NodeBody, NodeId, Tree};
use crate::buffer::ByteSource;
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::field_type::Layout;
use crate::hooks::MetaContext;
use crate::traversal;
use crate::value::CaseKey;

/// Instantiate `desc`: parsed from `source` when given, defaults otherwise.
///
/// Default trees take every scalar's DEFAULT (or its type's zero value).
/// Arrays get as many elements as their SIZE resolves to at that point,
/// WhileArrays none, and switches the case their CASE selects.
pub fn build(desc: &Arc<Descriptor>, source: Option<&dyn ByteSource>) -> Result<Tree> {
    match source {
        Some(src) => traversal::parse(desc, src),
        None => {
            let mut tree = Tree::new();
            build_node(&mut tree, desc, Attach::Root)?;
            log::debug!(
                "[build] '{}' default tree ({} nodes)",
                desc.name,
                tree.node_count()
            );
            Ok(tree)
        }
    }
}

/// Allocate `desc` at `at` and fill in its default subtree.
pub(crate) fn build_node(tree: &mut Tree, desc: &Arc<Descriptor>, at: Attach) -> Result<NodeId> {
    let id = tree.alloc(Arc::clone(desc), at);
    match desc.layout() {
        Layout::Container | Layout::Struct | Layout::BitStruct => {
            for entry in &desc.entries {
                build_node(tree, entry, Attach::Child(id))?;
            }
        }
        Layout::Array => {
            // a count pointing at a not yet meaningful field starts empty
            let count = desc
                .size
                .as_ref()
                .and_then(|m| eval_meta(m, &MetaContext::detached(tree, id)).ok())
                .and_then(|v| as_size(&v).ok())
                .unwrap_or(0);
            if let Some(sub) = &desc.sub_struct {
                for _ in 0..count {
                    build_node(tree, sub, Attach::Child(id))?;
                }
            }
        }
        Layout::Switch | Layout::Union => {
            let key = desc
                .case
                .as_ref()
                .and_then(|m| eval_meta(m, &MetaContext::detached(tree, id)).ok())
                .and_then(|v| CaseKey::from_value(&v));
            let (case_desc, key) = match key.as_ref().and_then(|k| desc.case_desc(k)) {
                Some(d) => (Some(Arc::clone(d)), key),
                None => (desc.default_case.clone(), None),
            };
            if let Some(d) = case_desc {
                build_node(tree, &d, Attach::Inner(id))?;
            }
            if let NodeBody::Switch { case, .. } | NodeBody::Union { case, .. } =
                &mut tree.node_mut(id).body
            {
                *case = key;
            }
        }
        Layout::StreamAdapter => {
            if let Some(sub) = &desc.sub_struct {
                build_node(tree, sub, Attach::Inner(id))?;
            }
        }
        _ => {}
    }
    if let Some(st) = &desc.steptree {
        build_node(tree, st, Attach::Steptree(id))?;
    }
    Ok(id)
}
