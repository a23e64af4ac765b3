// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Random-access byte sources and sinks.
//!
//! The traversal engine never streams: every read and write names an absolute
//! offset. Slices and vectors are sources; vectors grow as sinks. Files are
//! wrapped by [`FileSource`] and [`SeekSink`].

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Error, ParseError, Result};

/// Chunk size used when scanning a source for a delimiter.
const SCAN_CHUNK: usize = 4096;

/// Advance `offset` to the next multiple of `align` (`None`/0/1 is a no-op).
#[inline]
pub fn align_offset(offset: usize, align: Option<usize>) -> usize {
    match align {
        Some(a) if a > 1 => offset.saturating_add((a - offset % a) % a),
        _ => offset,
    }
}

/// Random-access read side.
pub trait ByteSource {
    fn len(&self) -> usize;

    /// Fill `buf` from `offset`. Reading past the end is [`ParseError::Exhausted`].
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `len` bytes at `offset` into a new buffer.
    ///
    /// The range is checked before allocating, so a length taken from the
    /// input itself cannot exhaust memory.
    fn read_vec(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let total = self.len();
        if offset.checked_add(len).map_or(true, |end| end > total) {
            return Err(exhausted(offset, len, total.saturating_sub(offset)));
        }
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Offset of the first `delim` at or after `start`, stepping by `unit`.
    fn find(&self, start: usize, delim: &[u8], unit: usize) -> Result<Option<usize>> {
        let unit = unit.max(1);
        let total = self.len();
        let mut pos = start;
        while pos + delim.len() <= total {
            let span = (SCAN_CHUNK - SCAN_CHUNK % unit).min(total - pos);
            let chunk = self.read_vec(pos, span)?;
            let mut i = 0;
            while i + delim.len() <= chunk.len() {
                if &chunk[i..i + delim.len()] == delim {
                    return Ok(Some(pos + i));
                }
                i += unit;
            }
            if span < unit {
                break;
            }
            pos += i;
        }
        Ok(None)
    }
}

fn exhausted(offset: usize, need: usize, have: usize) -> Error {
    ParseError::Exhausted { offset, need, have }.into()
}

impl ByteSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let end = offset.checked_add(buf.len());
        match end.and_then(|end| self.get(offset..end)) {
            Some(src) => {
                buf.copy_from_slice(src);
                Ok(())
            }
            None => Err(exhausted(
                offset,
                buf.len(),
                <[u8]>::len(self).saturating_sub(offset),
            )),
        }
    }
}

impl ByteSource for &[u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(offset, buf)
    }
}

impl<const N: usize> ByteSource for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.as_slice().read_at(offset, buf)
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.as_slice().read_at(offset, buf)
    }
}

/// Read-only file source. The handle is released when the value drops.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: usize,
}

impl FileSource {
    pub fn new(file: File) -> Result<Self> {
        let len = file.metadata()?.len();
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file too large"))?;
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> usize {
        self.len
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        if offset.saturating_add(buf.len()) > self.len {
            return Err(exhausted(offset, buf.len(), self.len.saturating_sub(offset)));
        }
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset as u64))?;
        match Read::read_exact(&mut file, buf) {
            Ok(()) => Ok(()),
            // file shrank underneath us
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(exhausted(offset, buf.len(), 0))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Random-access write side.
pub trait ByteSink {
    /// Write `data` at `offset`. Gaps before `offset` are zero-filled.
    fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()>;
}

impl ByteSink for Vec<u8> {
    fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset + data.len();
        if self.len() < end {
            self.resize(end, 0);
        }
        self[offset..end].copy_from_slice(data);
        Ok(())
    }
}

/// Sink over any seekable writer (files, cursors).
#[derive(Debug)]
pub struct SeekSink<W> {
    inner: W,
}

impl<W: Write + Seek> SeekSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

impl<W: Write + Seek> ByteSink for SeekSink<W> {
    fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset as u64))?;
        self.inner.write_all(data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_offset_law() {
        for n in [1usize, 2, 4, 8, 16] {
            for offset in 0..40 {
                let aligned = align_offset(offset, Some(n));
                assert_eq!(aligned % n, 0);
                assert!(aligned >= offset && aligned - offset < n);
            }
        }
        assert_eq!(align_offset(7, None), 7);
        assert_eq!(align_offset(usize::MAX - 1, Some(8)), usize::MAX);
    }

    #[test]
    fn test_read_vec_checks_range_before_allocating() {
        let data = vec![1u8, 2, 3];
        let err = data.read_vec(1, usize::MAX / 2).expect_err("huge length");
        assert!(matches!(
            err,
            Error::Parse(ParseError::Exhausted { offset: 1, have: 2, .. })
        ));
        assert!(data.read_vec(usize::MAX, 2).is_err());
        assert_eq!(data.read_vec(3, 0).expect("empty tail"), Vec::<u8>::new());
    }

    #[test]
    fn test_slice_read_past_end() {
        let data = [1u8, 2, 3];
        let mut buf = [0u8; 2];
        data[..].read_at(1, &mut buf).expect("in range");
        assert_eq!(buf, [2, 3]);
        let err = data[..].read_at(2, &mut buf).expect_err("past end");
        assert!(matches!(
            err,
            Error::Parse(ParseError::Exhausted { offset: 2, need: 2, have: 1 })
        ));
    }

    #[test]
    fn test_find_respects_unit() {
        let data = vec![b'a', 0, 0, b'b', 0, 0];
        // unit 2: the pair at 1..3 is misaligned, the one at 4..6 is not
        assert_eq!(data.find(0, &[0, 0], 2).expect("scan"), Some(4));
        assert_eq!(data.find(0, &[0], 1).expect("scan"), Some(1));
        assert_eq!(data.find(0, &[9], 1).expect("scan"), None);
    }

    #[test]
    fn test_find_across_chunks() {
        let mut data = vec![b'x'; SCAN_CHUNK * 2 + 3];
        let last = data.len() - 1;
        data[last] = 0;
        assert_eq!(data.find(0, &[0], 1).expect("scan"), Some(last));
    }

    #[test]
    fn test_vec_sink_fills_gaps() {
        let mut out = Vec::new();
        out.write_at(3, &[9, 9]).expect("write");
        out.write_at(0, &[1]).expect("write");
        assert_eq!(out, vec![1, 0, 0, 9, 9]);
    }

    #[test]
    fn test_file_source_and_seek_sink() {
        let tmp = tempfile::tempfile().expect("tempfile");
        let mut sink = SeekSink::new(tmp);
        sink.write_at(2, b"cd").expect("write");
        sink.write_at(0, b"ab").expect("write");
        let file = sink.into_inner();
        let src = FileSource::new(file).expect("source");
        assert_eq!(src.len(), 4);
        assert_eq!(src.read_vec(0, 4).expect("read"), b"abcd");
        assert!(src.read_vec(3, 2).is_err());
    }
}
