// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the engine.
//!
//! Sanitize-time defects are collected into a single [`Error::Schema`] so one
//! pass reports everything wrong with a spec. Every other error aborts the
//! operation that raised it.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// A single defect found while sanitizing a spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Dotted location of the offending spec node (e.g. `pair.payload`).
    pub path: String,
    pub kind: SchemaErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaErrorKind {
    MissingType,
    MissingName,
    UnknownType(String),
    DuplicateName(String),
    DuplicateCase(String),
    MissingSubStruct,
    MissingCases,
    MissingCase,
    MissingSize,
    MissingDecoder,
    UnknownCodec(String),
    InvalidEndian(String),
    InvalidAlign(usize),
    MalformedValue(String),
    MisplacedOffset,
    /// STEPTREE on a field that cannot own ordered children.
    MisplacedSteptree,
    NotFixedSize,
    /// Explicit SIZE smaller than the layout it has to hold.
    SizeTooSmall { size: usize, needed: usize },
    /// BLOCK_CLS names a node variant the field type cannot produce.
    IncompatibleNodeKind(String),
    /// STEPTREE or POINTER inside a union case.
    IllegalInUnion(&'static str),
    /// Bit field placed outside a BitStruct.
    MisplacedBitField,
    /// BitStruct entry that is neither a bit field nor a Pad.
    NotBitField,
    /// BitStruct wider than one 64-bit word.
    BitStructTooWide(usize),
}

impl fmt::Display for SchemaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingType => write!(f, "missing TYPE"),
            Self::MissingName => write!(f, "missing NAME"),
            Self::UnknownType(t) => write!(f, "unknown field type '{}'", t),
            Self::DuplicateName(n) => write!(f, "duplicate NAME '{}'", n),
            Self::DuplicateCase(c) => write!(f, "duplicate case key {}", c),
            Self::MissingSubStruct => write!(f, "missing SUB_STRUCT"),
            Self::MissingCases => write!(f, "missing CASES"),
            Self::MissingCase => write!(f, "missing CASE"),
            Self::MissingSize => write!(f, "variable-size field is missing SIZE"),
            Self::MissingDecoder => write!(f, "missing DECODER"),
            Self::UnknownCodec(c) => write!(f, "unknown stream codec '{}'", c),
            Self::InvalidEndian(e) => write!(f, "invalid ENDIAN '{}'", e),
            Self::InvalidAlign(a) => write!(f, "ALIGN {} is not a power of two", a),
            Self::MalformedValue(msg) => write!(f, "malformed value: {}", msg),
            Self::MisplacedOffset => write!(f, "OFFSET is only valid inside a Struct or BitStruct"),
            Self::MisplacedSteptree => write!(f, "STEPTREE needs a container or array type"),
            Self::NotFixedSize => write!(f, "field must have a fixed size here"),
            Self::SizeTooSmall { size, needed } => {
                write!(f, "SIZE {} is smaller than the {} bytes required", size, needed)
            }
            Self::IncompatibleNodeKind(k) => write!(f, "BLOCK_CLS '{}' not valid for this type", k),
            Self::IllegalInUnion(key) => write!(f, "union cases cannot declare {}", key),
            Self::MisplacedBitField => write!(f, "bit fields only exist inside a BitStruct"),
            Self::NotBitField => write!(f, "BitStruct entries must be bit fields or pads"),
            Self::BitStructTooWide(size) => write!(f, "BitStruct of {} bytes exceeds 8", size),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

/// NodePath or attribute lookup failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// A parent step was attempted at the tree root.
    AboveRoot { path: String },
    NoSuchAttribute { name: String },
    IndexOutOfRange { index: usize, len: usize },
    /// The target exists but holds no scalar value.
    NotScalar { name: String },
    /// The meta value is computed and cannot be written back.
    NotAssignable { key: &'static str },
    TypeMismatch { expected: &'static str, found: String },
    /// No definition registered under this id.
    UnknownDefinition { id: String },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AboveRoot { path } => write!(f, "path '{}' walks above the tree root", path),
            Self::NoSuchAttribute { name } => write!(f, "no attribute named '{}'", name),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {} out of range (len {})", index, len)
            }
            Self::NotScalar { name } => write!(f, "'{}' does not hold a scalar value", name),
            Self::NotAssignable { key } => write!(f, "{} is computed and cannot be assigned", key),
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            Self::UnknownDefinition { id } => write!(f, "no definition registered as '{}'", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The byte source ended before `need` bytes could be read at `offset`.
    Exhausted { offset: usize, need: usize, have: usize },
    Malformed { field: String, offset: usize, reason: String },
    /// A null-terminated field ran off the end of the source.
    Unterminated { field: String, offset: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { offset, need, have } => write!(
                f,
                "source exhausted: need {} bytes at offset {}, have {}",
                need, offset, have
            ),
            Self::Malformed { field, offset, reason } => {
                write!(f, "malformed '{}' at offset {}: {}", field, offset, reason)
            }
            Self::Unterminated { field, offset } => {
                write!(f, "'{}' at offset {} has no terminator", field, offset)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    /// The encoded value is larger than its declared SIZE.
    Overflow { field: String, size: usize, max: usize },
    Encode { field: String, reason: String },
    /// A switch/union/wrapper whose content does not match its descriptor.
    Structure { field: String, reason: String },
}

impl fmt::Display for SerializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow { field, size, max } => write!(
                f,
                "'{}' encodes to {} bytes but its SIZE is {}",
                field, size, max
            ),
            Self::Encode { field, reason } => write!(f, "cannot encode '{}': {}", field, reason),
            Self::Structure { field, reason } => write!(f, "bad structure at '{}': {}", field, reason),
        }
    }
}

/// Source/sink access failure.
#[derive(Debug)]
pub struct IoError {
    pub path: Option<PathBuf>,
    pub source: io::Error,
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "I/O error on {}: {}", p.display(), self.source),
            None => write!(f, "I/O error: {}", self.source),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    Schema(Vec<SchemaError>),
    Resolution(ResolutionError),
    Parse(ParseError),
    Serialize(SerializeError),
    Io(IoError),
}

impl Error {
    pub(crate) fn io_at(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io(IoError {
            path: Some(path.into()),
            source,
        })
    }

    /// Schema defects, if this is a sanitize failure.
    pub fn schema_errors(&self) -> &[SchemaError] {
        match self {
            Self::Schema(errs) => errs,
            _ => &[],
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(errs) => {
                write!(f, "{} schema error(s)", errs.len())?;
                for e in errs {
                    write!(f, "\n  {}", e)?;
                }
                Ok(())
            }
            Self::Resolution(e) => write!(f, "resolution error: {}", e),
            Self::Parse(e) => write!(f, "parse error: {}", e),
            Self::Serialize(e) => write!(f, "serialize error: {}", e),
            Self::Io(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(&e.source),
            _ => None,
        }
    }
}

impl From<ResolutionError> for Error {
    fn from(e: ResolutionError) -> Self {
        Self::Resolution(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<SerializeError> for Error {
    fn from(e: SerializeError) -> Self {
        Self::Serialize(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(IoError {
            path: None,
            source: e,
        })
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display_lists_all() {
        let err = Error::Schema(vec![
            SchemaError {
                path: "pair".into(),
                kind: SchemaErrorKind::MissingType,
            },
            SchemaError {
                path: "pair.payload".into(),
                kind: SchemaErrorKind::DuplicateName("len".into()),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("2 schema error(s)"));
        assert!(msg.contains("pair: missing TYPE"));
        assert!(msg.contains("pair.payload: duplicate NAME 'len'"));
        assert_eq!(err.schema_errors().len(), 2);
    }

    #[test]
    fn test_parse_error_display() {
        let err: Error = ParseError::Exhausted {
            offset: 4,
            need: 2,
            have: 1,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "parse error: source exhausted: need 2 bytes at offset 4, have 1"
        );
        assert!(err.schema_errors().is_empty());
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error as _;
        let err = Error::io_at("/tmp/x.bin", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.to_string().contains("/tmp/x.bin"));
        assert!(err.source().is_some());
    }
}
