// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Named extension points: computed meta functions and stream codecs.
//!
//! Specs built in code can pass closures directly through
//! [`Meta::computed`](crate::Meta::computed). Specs loaded from documents only
//! carry names, which are resolved here at load time. A StreamAdapter's
//! DECODER/ENCODER always names a registered [`StreamCodec`].
//!
//! Built-ins:
//! - meta `bytes_remaining`: true while the source has unread bytes
//!   (typical WhileArray CASE)
//! - stream codecs `zlib` and `identity`

use std::io::{Read, Write};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::buffer::ByteSource;
use crate::error::{ParseError, Result, SerializeError};
use crate::node::{NodeId, Tree};
use crate::nodepath;
use crate::spec::Meta;
use crate::value::Value;

/// Signature of a computed SIZE, POINTER or CASE.
pub type MetaFn = Arc<dyn Fn(&MetaContext<'_>) -> Result<Value> + Send + Sync>;

/// Everything a computed meta function may inspect.
///
/// `source` and `offset` are only set while parsing; `offset` is the cursor
/// relative to `root_offset`. WhileArray CASE functions receive the number of
/// elements read so far in `index`.
pub struct MetaContext<'a> {
    pub tree: &'a Tree,
    pub node: NodeId,
    pub source: Option<&'a dyn ByteSource>,
    pub offset: Option<usize>,
    pub root_offset: usize,
    pub index: Option<usize>,
}

impl<'a> MetaContext<'a> {
    pub(crate) fn detached(tree: &'a Tree, node: NodeId) -> Self {
        Self {
            tree,
            node,
            source: None,
            offset: None,
            root_offset: 0,
            index: None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.tree.parent(self.node)
    }

    /// Resolve a NodePath relative to the context node.
    pub fn resolve(&self, path: &str) -> Result<Value> {
        nodepath::resolve(self.tree, self.node, path)
    }

    /// Look at `len` bytes at the cursor without consuming them.
    ///
    /// Returns `None` outside of a parse.
    pub fn peek(&self, len: usize) -> Result<Option<Vec<u8>>> {
        match (self.source, self.offset) {
            (Some(src), Some(off)) => {
                Ok(Some(src.read_vec(self.root_offset.saturating_add(off), len)?))
            }
            _ => Ok(None),
        }
    }

    /// Unread bytes after the cursor, or `None` outside of a parse.
    pub fn remaining(&self) -> Option<usize> {
        match (self.source, self.offset) {
            (Some(src), Some(off)) => {
                Some(src.len().saturating_sub(self.root_offset.saturating_add(off)))
            }
            _ => None,
        }
    }
}

/// Decoder/encoder pair behind a StreamAdapter.
pub trait StreamCodec: Send + Sync {
    /// Decode the stream starting at absolute `offset`.
    ///
    /// Returns the decoded bytes and the number of source bytes consumed.
    fn decode(&self, src: &dyn ByteSource, offset: usize) -> Result<(Vec<u8>, usize)>;

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// zlib (RFC 1950) stream. The compressed length is discovered while inflating.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibCodec;

impl StreamCodec for ZlibCodec {
    fn decode(&self, src: &dyn ByteSource, offset: usize) -> Result<(Vec<u8>, usize)> {
        let rest = src.read_vec(offset, src.len().saturating_sub(offset))?;
        let mut decoder = ZlibDecoder::new(rest.as_slice());
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| ParseError::Malformed {
                field: "zlib".to_string(),
                offset,
                reason: e.to_string(),
            })?;
        let consumed = decoder.total_in() as usize;
        log::trace!(
            "[parse] zlib stream at {}: {} -> {} bytes",
            offset,
            consumed,
            out.len()
        );
        Ok((out, consumed))
    }

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let encode_err = |e: std::io::Error| SerializeError::Encode {
            field: "zlib".to_string(),
            reason: e.to_string(),
        };
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).map_err(encode_err)?;
        encoder.finish().map_err(|e| encode_err(e).into())
    }
}

/// Passes the remainder of the source through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl StreamCodec for IdentityCodec {
    fn decode(&self, src: &dyn ByteSource, offset: usize) -> Result<(Vec<u8>, usize)> {
        let len = src.len().saturating_sub(offset);
        Ok((src.read_vec(offset, len)?, len))
    }

    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

fn bytes_remaining(ctx: &MetaContext<'_>) -> Result<Value> {
    Ok(Value::Bool(ctx.remaining().unwrap_or(0) > 0))
}

struct Hooks {
    meta: DashMap<String, MetaFn>,
    streams: DashMap<String, Arc<dyn StreamCodec>>,
}

static HOOKS: OnceLock<Hooks> = OnceLock::new();

fn hooks() -> &'static Hooks {
    HOOKS.get_or_init(|| {
        let hooks = Hooks {
            meta: DashMap::new(),
            streams: DashMap::new(),
        };
        hooks
            .meta
            .insert("bytes_remaining".to_string(), Arc::new(bytes_remaining) as MetaFn);
        hooks
            .streams
            .insert("zlib".to_string(), Arc::new(ZlibCodec) as Arc<dyn StreamCodec>);
        hooks
            .streams
            .insert("identity".to_string(), Arc::new(IdentityCodec) as Arc<dyn StreamCodec>);
        hooks
    })
}

/// Register a computed meta function under `name`, replacing any previous one.
pub fn register_meta_fn<F>(name: &str, func: F)
where
    F: Fn(&MetaContext<'_>) -> Result<Value> + Send + Sync + 'static,
{
    hooks().meta.insert(name.to_string(), Arc::new(func));
    log::debug!("[registry] meta function '{}'", name);
}

/// Computed meta bound to the function registered as `name`.
pub fn meta_fn(name: &str) -> Option<Meta> {
    hooks().meta.get(name).map(|f| Meta::Computed {
        name: name.into(),
        func: Arc::clone(f.value()),
    })
}

pub fn register_stream_codec(name: &str, codec: Arc<dyn StreamCodec>) {
    hooks().streams.insert(name.to_string(), codec);
    log::debug!("[registry] stream codec '{}'", name);
}

pub fn stream_codec(name: &str) -> Option<Arc<dyn StreamCodec>> {
    hooks().streams.get(name).map(|c| Arc::clone(c.value()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zlib_reports_consumed_length() {
        let codec = stream_codec("zlib").expect("builtin zlib");
        let mut packed = codec.encode(b"hello hello hello").expect("encode");
        let packed_len = packed.len();
        packed.extend_from_slice(b"TRAILER");
        let (plain, consumed) = codec.decode(&packed, 0).expect("decode");
        assert_eq!(plain, b"hello hello hello");
        assert_eq!(consumed, packed_len);
    }

    #[test]
    fn test_zlib_rejects_garbage() {
        let err = ZlibCodec.decode(&vec![1u8, 2, 3, 4], 0).expect_err("garbage");
        assert!(matches!(err, crate::Error::Parse(ParseError::Malformed { .. })));
    }

    #[test]
    fn test_identity_consumes_rest() {
        let data = vec![1u8, 2, 3, 4];
        let (out, consumed) = IdentityCodec.decode(&data, 1).expect("decode");
        assert_eq!(out, vec![2, 3, 4]);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_named_meta_lookup() {
        register_meta_fn("always_seven", |_| Ok(Value::UInt(7)));
        let meta = meta_fn("always_seven").expect("registered");
        assert!(matches!(meta, Meta::Computed { ref name, .. } if &**name == "always_seven"));
        assert!(meta_fn("missing_fn").is_none());
        assert!(meta_fn("bytes_remaining").is_some());
    }
}
