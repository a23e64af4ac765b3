// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine constants and the process-wide endianness mode.
//!
//! The endianness mode is the only mutable global in the crate. Change it
//! during single-threaded setup, before descriptors are shared across threads:
//! a parse running concurrently with [`force_endian`] may observe either mode.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::field_type::ByteOrder;

// =======================================================================
// Constants
// =======================================================================

/// Largest alignment honoured inside a Struct.
pub const ALIGN_MAX: usize = 8;

/// Separator between NodePath segments.
pub const PATH_DELIMITER: char = '.';

/// Byte order of ambiguous field types when nothing else decides it.
pub const DEFAULT_BYTE_ORDER: ByteOrder = ByteOrder::Little;

/// Suffix appended to the previous file content when a backup is requested.
pub const BACKUP_EXTENSION: &str = "backup";

/// Suffix of the temporary file written before the atomic replace.
pub const TEMP_EXTENSION: &str = ".temp";

// =======================================================================
// Endianness mode
// =======================================================================

/// Which variant an ambiguous ("native") field type resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndianMode {
    /// Defer to the descriptor's ENDIAN, then [`DEFAULT_BYTE_ORDER`].
    #[default]
    Native,
    Big,
    Little,
}

impl EndianMode {
    const fn to_raw(self) -> u8 {
        match self {
            Self::Native => 0,
            Self::Big => 1,
            Self::Little => 2,
        }
    }

    const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Big,
            2 => Self::Little,
            _ => Self::Native,
        }
    }

    pub(crate) fn forced_order(self) -> Option<ByteOrder> {
        match self {
            Self::Native => None,
            Self::Big => Some(ByteOrder::Big),
            Self::Little => Some(ByteOrder::Little),
        }
    }
}

static ENDIAN_MODE: AtomicU8 = AtomicU8::new(0);

/// Select the byte order every ambiguous field type resolves to.
///
/// Fixed-endian types (`BUInt16`, `LUInt32`, ...) and descriptors carrying
/// their own ENDIAN are unaffected.
pub fn force_endian(mode: EndianMode) {
    let prev = EndianMode::from_raw(ENDIAN_MODE.swap(mode.to_raw(), Ordering::SeqCst));
    if prev != mode {
        log::warn!("[registry] endianness mode {:?} -> {:?}", prev, mode);
    }
}

pub fn endian_mode() -> EndianMode {
    EndianMode::from_raw(ENDIAN_MODE.load(Ordering::SeqCst))
}

/// Restores the previous endianness mode when dropped.
///
/// Useful in tests and setup code that only needs a mode temporarily.
#[must_use = "the previous mode is restored as soon as the guard drops"]
pub struct EndianGuard {
    prev: EndianMode,
}

impl EndianGuard {
    pub fn force(mode: EndianMode) -> Self {
        let prev = endian_mode();
        force_endian(mode);
        Self { prev }
    }
}

impl Drop for EndianGuard {
    fn drop(&mut self) {
        force_endian(self.prev);
    }
}
