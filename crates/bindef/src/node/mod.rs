// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node Tree
//!
//! Parsed data lives in an arena: a [`Tree`] owns every node and hands out
//! [`NodeId`]s. Each node keeps an `Arc` to its [`Descriptor`], a plain-id
//! parent link and a [`NodeBody`]. Nodes are never freed individually;
//! replacing a switch case or truncating an array only detaches the old
//! subtree, which stays allocated until the tree drops.
//!
//! ```text
//! Tree
//!  +- nodes[0]  root   Container [1, 2]  steptree: None
//!  +- nodes[1]  len    Scalar(5)
//!  +- nodes[2]  body   Switch { case: 1, active: 3 }
//!  +- nodes[3]  text   Scalar("abcde")
//! ```

pub(crate) mod access;
pub(crate) mod build;
mod pointers;

pub use access::Key;
pub use build::build;

use std::fmt;
use std::sync::Arc;

use crate::descriptor::Descriptor;
use crate::value::{CaseKey, Value};

/// Handle of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runtime node variant (BLOCK_CLS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Scalar,
    /// Delegates to exactly one wrapped node (stream adapters).
    Wrapper,
    Container,
    Array,
    Switch,
    Union,
    /// Zero-size stand-in (unresolved switch case, Pad, Void).
    Placeholder,
}

impl NodeKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Scalar" => Some(Self::Scalar),
            "Wrapper" => Some(Self::Wrapper),
            "Container" => Some(Self::Container),
            "Array" => Some(Self::Array),
            "Switch" => Some(Self::Switch),
            "Union" => Some(Self::Union),
            "Placeholder" => Some(Self::Placeholder),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "Scalar",
            Self::Wrapper => "Wrapper",
            Self::Container => "Container",
            Self::Array => "Array",
            Self::Switch => "Switch",
            Self::Union => "Union",
            Self::Placeholder => "Placeholder",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeBody {
    Scalar(Value),
    Wrapper(Option<NodeId>),
    Container(Vec<NodeId>),
    Array(Vec<NodeId>),
    /// `case` is `None` when the default case is active.
    Switch {
        case: Option<CaseKey>,
        active: Option<NodeId>,
    },
    /// `raw` holds the union bytes; `active` is the case view over them.
    Union {
        raw: Vec<u8>,
        case: Option<CaseKey>,
        active: Option<NodeId>,
    },
    Placeholder,
}

impl NodeBody {
    fn empty(desc: &Descriptor) -> Self {
        match desc.node_kind {
            NodeKind::Scalar => Self::Scalar(
                desc.default
                    .clone()
                    .unwrap_or_else(|| desc.field_type.codec.default_value(&desc.field_type)),
            ),
            NodeKind::Wrapper => Self::Wrapper(None),
            NodeKind::Container => Self::Container(Vec::new()),
            NodeKind::Array => Self::Array(Vec::new()),
            NodeKind::Switch => Self::Switch {
                case: None,
                active: None,
            },
            NodeKind::Union => Self::Union {
                raw: vec![0; desc.literal_size().unwrap_or(0)],
                case: None,
                active: None,
            },
            NodeKind::Placeholder => Self::Placeholder,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Scalar(_) => NodeKind::Scalar,
            Self::Wrapper(_) => NodeKind::Wrapper,
            Self::Container(_) => NodeKind::Container,
            Self::Array(_) => NodeKind::Array,
            Self::Switch { .. } => NodeKind::Switch,
            Self::Union { .. } => NodeKind::Union,
            Self::Placeholder => NodeKind::Placeholder,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeData {
    pub(crate) desc: Arc<Descriptor>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) body: NodeBody,
    pub(crate) steptree: Option<NodeId>,
}

impl NodeData {
    pub fn descriptor(&self) -> &Arc<Descriptor> {
        &self.desc
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    pub fn steptree(&self) -> Option<NodeId> {
        self.steptree
    }
}

/// Where a freshly allocated node is linked.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Attach {
    Root,
    /// Appended to the parent's ordered children.
    Child(NodeId),
    Steptree(NodeId),
    /// Wrapped node, or active switch/union case.
    Inner(NodeId),
}

/// Arena owning every node of one parsed or built structure.
///
/// The root is always the first node allocated.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<NodeData>,
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Total allocated nodes, including detached ones.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node data of `id`.
    ///
    /// # Panics
    ///
    /// If `id` was not issued by this tree.
    #[inline]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    #[inline]
    pub fn descriptor(&self, id: NodeId) -> &Arc<Descriptor> {
        &self.node(id).desc
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).body.kind()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.node(id).desc.name
    }

    /// Ordered children of a container or array; empty for other kinds.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).body {
            NodeBody::Container(c) | NodeBody::Array(c) => c,
            _ => &[],
        }
    }

    pub fn len(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn is_empty(&self, id: NodeId) -> bool {
        self.children(id).is_empty()
    }

    pub fn steptree(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).steptree
    }

    /// Active case of a switch/union, or the wrapped node of a wrapper.
    pub fn inner(&self, id: NodeId) -> Option<NodeId> {
        match &self.node(id).body {
            NodeBody::Wrapper(inner) => *inner,
            NodeBody::Switch { active, .. } | NodeBody::Union { active, .. } => *active,
            _ => None,
        }
    }

    /// Allocate a node for `desc` and link it at `at`.
    pub(crate) fn alloc(&mut self, desc: Arc<Descriptor>, at: Attach) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = match at {
            Attach::Root => None,
            Attach::Child(p) | Attach::Steptree(p) | Attach::Inner(p) => Some(p),
        };
        self.nodes.push(NodeData {
            body: NodeBody::empty(&desc),
            desc,
            parent,
            steptree: None,
        });
        match at {
            Attach::Root => {}
            Attach::Child(p) => {
                if let NodeBody::Container(c) | NodeBody::Array(c) = &mut self.node_mut(p).body {
                    c.push(id);
                }
            }
            Attach::Steptree(p) => self.node_mut(p).steptree = Some(id),
            Attach::Inner(p) => match &mut self.node_mut(p).body {
                NodeBody::Wrapper(inner) => *inner = Some(id),
                NodeBody::Switch { active, .. } | NodeBody::Union { active, .. } => {
                    *active = Some(id)
                }
                _ => {}
            },
        }
        id
    }

    /// Depth-first ids of the live subtree under `id` (steptree last).
    pub fn walk(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            if let Some(st) = self.steptree(n) {
                stack.push(st);
            }
            if let Some(inner) = self.inner(n) {
                stack.push(inner);
            }
            stack.extend(self.children(n).iter().rev());
        }
        out
    }
}
