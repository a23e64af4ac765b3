// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # bindef - declarative binary structures
//!
//! Describe a binary format once as a tree of [`FieldSpec`]s; the same
//! description drives both a parser (bytes to [`Tree`]) and a serializer
//! ([`Tree`] to bytes), so the two directions always agree.
//!
//! ## Quick Start
//!
//! ```rust
//! use bindef::{sanitize, traversal, FieldSpec, Result, Value};
//!
//! fn main() -> Result<()> {
//!     let desc = sanitize(
//!         &FieldSpec::container("pair")
//!             .entry(FieldSpec::field("len", "UInt8"))
//!             .entry(FieldSpec::field("payload", "StrRawAscii").size_path(".len")),
//!     )?;
//!
//!     let tree = traversal::parse(&desc, &[5u8, b'a', b'b', b'c', b'd', b'e'])?;
//!     assert_eq!(tree.get(tree.root(), "payload")?, Value::Str("abcde".into()));
//!
//!     assert_eq!(traversal::serialize_to_vec(&tree)?, b"\x05abcde");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |  FieldSpec (builders, YAML)  ->  sanitize()  ->  Arc<Descriptor>    |
//! +---------------------------------------------------------------------+
//! |                         Traversal Engine                            |
//! |   parse / serialize | POINTER + ALIGN | steptree scheduling         |
//! +---------------------------------------------------------------------+
//! |   Node Tree (arena)          |   NodePath resolver                  |
//! +---------------------------------------------------------------------+
//! |   Field-Type Registry + codecs   |   ByteSource / ByteSink          |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FieldSpec`] | Unvalidated, author-supplied field description |
//! | [`Descriptor`] | Sanitized, immutable, shareable description |
//! | [`Tree`] | Parsed or default-built data, addressed by [`NodeId`] |
//! | [`FieldType`] | Registered field type with its codec |
//! | [`Library`] | Descriptors registered under a definition id |
//!
//! ## Modules Overview
//!
//! - [`spec`] - declarative surface (start here)
//! - [`sanitizer`] - validation into descriptors
//! - [`traversal`] - parse and serialize
//! - [`node`] - the tree and its accessors
//! - [`nodepath`] - relative path resolution
//! - [`field_type`] - type registry and codecs
//! - [`file`] - file-targeted parse and atomic write

/// Random-access byte sources and sinks.
pub mod buffer;
/// Engine constants and the endianness switch.
pub mod config;
/// Sanitized descriptors.
pub mod descriptor;
pub mod error;
/// Field-type registry and built-in codecs.
pub mod field_type;
pub mod file;
/// Named meta functions and stream codecs.
pub mod hooks;
pub mod library;
/// Node tree.
pub mod node;
pub mod nodepath;
pub mod sanitizer;
pub mod spec;
pub mod traversal;
pub mod value;

pub use config::{force_endian, EndianGuard, EndianMode};
pub use descriptor::{Descriptor, MetaKey};
pub use error::{Error, Result};
pub use field_type::{ByteOrder, FieldType, Layout};
pub use library::Library;
pub use node::{Key, NodeId, NodeKind, Tree};
pub use nodepath::PathOp;
pub use sanitizer::sanitize;
pub use spec::{FieldSpec, Meta};
pub use value::{CaseKey, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_end_to_end() {
        let desc = sanitize(
            &FieldSpec::container("pair")
                .entry(FieldSpec::field("len", "UInt8"))
                .entry(FieldSpec::field("payload", "StrRawAscii").size_path(".len")),
        )
        .expect("valid");
        let tree = traversal::parse(&desc, &[5u8, b'a', b'b', b'c', b'd', b'e']).expect("parse");
        assert_eq!(tree.get(tree.root(), "len").expect("len"), Value::UInt(5));
        let out = traversal::serialize_to_vec(&tree).expect("serialize");
        assert_eq!(out, b"\x05abcde".to_vec());
    }
}
