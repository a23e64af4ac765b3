// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! File-targeted parse and serialize.
//!
//! Serialization never writes the target in place. The tree goes to a
//! temporary file next to it, which optionally gets reparsed and compared,
//! and is then persisted over the target in one rename. The previous
//! content can be kept as `<path>.backup`.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::buffer::{ByteSource, FileSource, SeekSink};
use crate::config::{BACKUP_EXTENSION, TEMP_EXTENSION};
use crate::descriptor::Descriptor;
use crate::error::{Error, Result, SerializeError};
use crate::node::Tree;
use crate::traversal;

/// How [`serialize_to_path`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Copy the existing target to `<path>.backup` before replacing it.
    pub backup: bool,
    /// Lay out pointered nodes (see [`Tree::set_pointers`]) before writing.
    pub calc_pointers: bool,
    /// Reparse the written bytes and compare them with the tree.
    pub integrity_test: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            backup: false,
            calc_pointers: false,
            integrity_test: true,
        }
    }
}

/// Parse the file at `path` with `desc`. The file is closed on return.
pub fn parse_path(desc: &Arc<Descriptor>, path: impl AsRef<Path>) -> Result<Tree> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io_at(path, e))?;
    let src = FileSource::new(file).map_err(|e| match e {
        Error::Io(io) => Error::io_at(path, io.source),
        other => other,
    })?;
    log::debug!("[file] parsing {} ({} bytes)", path.display(), src.len());
    traversal::parse(desc, &src)
}

/// `<path>.backup`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(BACKUP_EXTENSION);
    PathBuf::from(name)
}

/// Serialize `tree` to `path`. Returns the number of bytes written.
///
/// With `calc_pointers` set, pointers are laid out on a copy of the tree;
/// `tree` itself is left untouched.
pub fn serialize_to_path(tree: &Tree, path: impl AsRef<Path>, opts: WriteOptions) -> Result<usize> {
    let path = path.as_ref();
    let laid_out;
    let tree = if opts.calc_pointers {
        let mut copy = tree.clone();
        copy.set_pointers(0)?;
        laid_out = copy;
        &laid_out
    } else {
        tree
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let prefix = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(TEMP_EXTENSION)
        .tempfile_in(dir)
        .map_err(|e| Error::io_at(dir, e))?;

    let written = {
        let mut sink = SeekSink::new(temp.as_file_mut());
        traversal::serialize(tree, &mut sink)?
    };
    temp.as_file().sync_all().map_err(|e| Error::io_at(temp.path(), e))?;

    if opts.integrity_test {
        let reopened = temp.reopen().map_err(|e| Error::io_at(temp.path(), e))?;
        let src = FileSource::new(reopened)?;
        let reparsed = traversal::parse(tree.descriptor(tree.root()), &src)?;
        if !tree.values_eq(&reparsed) {
            log::warn!("[file] integrity test failed for {}", path.display());
            return Err(SerializeError::Structure {
                field: tree.name(tree.root()).to_string(),
                reason: "written data does not reparse to the same values".to_string(),
            }
            .into());
        }
    }

    if opts.backup && path.exists() {
        let backup = backup_path(path);
        fs::copy(path, &backup).map_err(|e| Error::io_at(&backup, e))?;
        log::debug!("[file] backup {}", backup.display());
    }

    temp.persist(path).map_err(|e| Error::io_at(path, e.error))?;
    log::debug!("[file] wrote {} bytes to {}", written, path.display());
    Ok(written)
}
