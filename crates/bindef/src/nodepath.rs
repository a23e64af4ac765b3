// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! NodePath Resolver
//!
//! A NodePath is a plain string of segments joined by
//! [`PATH_DELIMITER`](crate::config::PATH_DELIMITER):
//!
//! - a path whose first segment is a name starts at the tree root
//! - every empty segment steps to the parent
//! - a name segment resolves like [`Tree::child`]; an all-digit segment is a
//!   position
//!
//! So from `payload` inside `pair`, `.len` is the sibling `len` and `..x` is
//! `x` on the grandparent. Parent steps pass over switch and union nodes:
//! a case resolves its paths as if it sat directly in the switch's parent.

use crate::config::PATH_DELIMITER;
use crate::error::{ResolutionError, Result};
use crate::node::{Key, NodeId, NodeKind, Tree};
use crate::value::Value;

/// How [`assign_with`] combines the new value with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

fn parent_step(tree: &Tree, node: NodeId, path: &str) -> Result<NodeId> {
    let above = || ResolutionError::AboveRoot {
        path: path.to_string(),
    };
    let mut at = tree.parent(node).ok_or_else(above)?;
    while matches!(tree.kind(at), NodeKind::Switch | NodeKind::Union) {
        at = tree.parent(at).ok_or_else(above)?;
    }
    Ok(at)
}

/// Node addressed by `path`, starting from `from`.
pub fn locate(tree: &Tree, from: NodeId, path: &str) -> Result<NodeId> {
    let absolute = path
        .split(PATH_DELIMITER)
        .next()
        .is_some_and(|first| !first.is_empty());
    let mut node = if absolute { tree.root() } else { from };
    for segment in path.split(PATH_DELIMITER) {
        node = if segment.is_empty() {
            parent_step(tree, node, path)?
        } else {
            let key = match segment.parse::<usize>() {
                Ok(index) => Key::Index(index),
                Err(_) => Key::Name(segment),
            };
            tree.child(node, key)?
        };
    }
    Ok(node)
}

pub fn resolve(tree: &Tree, from: NodeId, path: &str) -> Result<Value> {
    let node = locate(tree, from, path)?;
    tree.value(node).cloned()
}

pub fn assign(tree: &mut Tree, from: NodeId, path: &str, value: impl Into<Value>) -> Result<()> {
    assign_with(tree, from, path, value, PathOp::Set)
}

/// Combine `value` into the scalar at `path` with `op`.
///
/// Arithmetic works on integers and floats; an integer result that drops
/// below zero becomes signed, and the target's type decides whether it fits.
pub fn assign_with(
    tree: &mut Tree,
    from: NodeId,
    path: &str,
    value: impl Into<Value>,
    op: PathOp,
) -> Result<()> {
    let node = locate(tree, from, path)?;
    let value = value.into();
    let value = match op {
        PathOp::Set => value,
        _ => combine(tree.value(node)?, &value, op)?,
    };
    log::trace!("[nodepath] {} {:?} {}", path, op, value);
    tree.set_value(node, value)
}

fn combine(current: &Value, operand: &Value, op: PathOp) -> Result<Value> {
    let mismatch = |v: &Value| ResolutionError::TypeMismatch {
        expected: "number",
        found: v.kind_name().to_string(),
    };
    let int = |v: &Value| match v {
        Value::UInt(n) => Some(i128::from(*n)),
        Value::SInt(n) => Some(i128::from(*n)),
        Value::Bool(b) => Some(i128::from(*b)),
        _ => None,
    };
    if let (Some(a), Some(b)) = (int(current), int(operand)) {
        let result = match op {
            PathOp::Add => a.checked_add(b),
            PathOp::Sub => a.checked_sub(b),
            PathOp::Mul => a.checked_mul(b),
            PathOp::Div => a.checked_div(b),
            PathOp::Set => Some(b),
        };
        let result = result.ok_or_else(|| ResolutionError::TypeMismatch {
            expected: "nonzero divisor",
            found: operand.to_string(),
        })?;
        return match (u64::try_from(result), i64::try_from(result)) {
            (Ok(u), _) => Ok(Value::UInt(u)),
            (_, Ok(s)) => Ok(Value::SInt(s)),
            _ => Err(mismatch(operand).into()),
        };
    }
    let a = current.as_f64().ok_or_else(|| mismatch(current))?;
    let b = operand.as_f64().ok_or_else(|| mismatch(operand))?;
    Ok(Value::Float(match op {
        PathOp::Add => a + b,
        PathOp::Sub => a - b,
        PathOp::Mul => a * b,
        PathOp::Div => a / b,
        PathOp::Set => b,
    }))
}
