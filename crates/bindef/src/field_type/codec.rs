// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Leaf codecs: decode, encode and size calculation.
//!
//! Codecs report failures as plain reasons; the traversal engine attaches the
//! field name and offset when turning them into [`crate::Error`]s.

use super::{ByteOrder, FieldType};
use crate::value::Value;

/// Decode/encode/size operations of a field type.
pub trait FieldCodec: Send + Sync {
    /// Turn exactly the bytes occupied by a field into a value.
    fn decode(&self, ft: &FieldType, raw: &[u8], order: ByteOrder) -> Result<Value, String>;

    /// Bytes for `value`. Must be exactly [`FieldCodec::size_of`] long.
    fn encode(&self, ft: &FieldType, value: &Value, order: ByteOrder) -> Result<Vec<u8>, String>;

    /// Serialized length of `value` when nothing else fixes the size.
    fn size_of(&self, ft: &FieldType, value: &Value) -> usize;

    fn default_value(&self, ft: &FieldType) -> Value;

    /// Whether `value` can be stored in a node of this type.
    fn accepts(&self, _value: &Value) -> bool {
        true
    }

    /// Bytes for `value` when SIZE fixes the width at `size`.
    ///
    /// Only codecs whose encoding depends on the width override this; the
    /// engine pads or rejects whatever the rest return.
    fn encode_sized(
        &self,
        ft: &FieldType,
        value: &Value,
        order: ByteOrder,
        _size: usize,
    ) -> Result<Vec<u8>, String> {
        self.encode(ft, value, order)
    }

    /// Value of a `count`-bit field of a BitStruct. `bits` is shifted down.
    fn decode_bits(&self, ft: &FieldType, _bits: u64, _count: u32) -> Result<Value, String> {
        Err(format!("{} is not bit based", ft.name))
    }

    fn encode_bits(&self, ft: &FieldType, _value: &Value, _count: u32) -> Result<u64, String> {
        Err(format!("{} is not bit based", ft.name))
    }
}

// =======================================================================
// Integers
// =======================================================================

pub(crate) fn read_uint(raw: &[u8], order: ByteOrder) -> u64 {
    match order {
        ByteOrder::Big => raw.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
        ByteOrder::Little => raw.iter().rev().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
    }
}

/// `width` bytes of `v`; high bytes past 8 are zero.
pub(crate) fn write_uint(v: u64, width: usize, order: ByteOrder) -> Vec<u8> {
    let mut out = v.to_le_bytes().to_vec();
    out.resize(width, 0);
    if order == ByteOrder::Big {
        out.reverse();
    }
    out
}

/// Signed-number representation of an integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntSign {
    Unsigned,
    TwosComplement,
    OnesComplement,
}

impl IntSign {
    /// Inclusive value range of a `bits`-wide integer.
    pub fn range(self, bits: u32) -> (i128, i128) {
        let bits = bits.min(96);
        if bits == 0 {
            return (0, 0);
        }
        let half = 1i128 << (bits - 1);
        match self {
            Self::Unsigned => (0, (half << 1) - 1),
            Self::TwosComplement => (-half, half - 1),
            Self::OnesComplement => (-(half - 1), half - 1),
        }
    }

    fn zero(self) -> Value {
        match self {
            Self::Unsigned => Value::UInt(0),
            _ => Value::SInt(0),
        }
    }
}

fn int_of(value: &Value) -> Result<i128, String> {
    match value {
        Value::UInt(v) => Ok(i128::from(*v)),
        Value::SInt(v) => Ok(i128::from(*v)),
        Value::Bool(b) => Ok(i128::from(*b)),
        other => Err(format!("expected an integer, found {}", other.kind_name())),
    }
}

fn in_range(wide: i128, sign: IntSign, bits: u32) -> Result<(), String> {
    let (min, max) = sign.range(bits);
    if wide < min || wide > max {
        return Err(format!("{} does not fit in {} bits", wide, bits));
    }
    Ok(())
}

fn bit_mask(count: u32) -> u64 {
    if count >= 64 {
        u64::MAX
    } else {
        (1u64 << count) - 1
    }
}

/// Unsigned or two's-complement integer of `ft.size` bytes (1 to 8).
#[derive(Debug, Clone, Copy)]
pub struct IntCodec {
    pub signed: bool,
}

impl IntCodec {
    fn sign(self) -> IntSign {
        if self.signed {
            IntSign::TwosComplement
        } else {
            IntSign::Unsigned
        }
    }
}

impl FieldCodec for IntCodec {
    fn decode(&self, ft: &FieldType, raw: &[u8], order: ByteOrder) -> Result<Value, String> {
        if raw.len() != ft.size || ft.size == 0 || ft.size > 8 {
            return Err(format!("expected {} bytes, got {}", ft.size, raw.len()));
        }
        let v = read_uint(raw, order);
        if !self.signed {
            return Ok(Value::UInt(v));
        }
        let shift = 64 - (ft.size as u32 * 8);
        Ok(Value::SInt(((v << shift) as i64) >> shift))
    }

    fn encode(&self, ft: &FieldType, value: &Value, order: ByteOrder) -> Result<Vec<u8>, String> {
        if ft.size == 0 || ft.size > 8 {
            return Err(format!("unsupported integer width {}", ft.size));
        }
        let wide = int_of(value)?;
        let bits = ft.size as u32 * 8;
        let (min, max) = self.sign().range(bits);
        if wide < min || wide > max {
            return Err(format!("{} does not fit in {} bytes", wide, ft.size));
        }
        Ok(write_uint(wide as u64, ft.size, order))
    }

    fn size_of(&self, ft: &FieldType, _value: &Value) -> usize {
        ft.size
    }

    fn default_value(&self, _ft: &FieldType) -> Value {
        self.sign().zero()
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::UInt(_) | Value::SInt(_) | Value::Bool(_))
    }
}

/// Integer packed into a BitStruct word; its width is the field's SIZE in bits.
#[derive(Debug, Clone, Copy)]
pub struct BitIntCodec {
    pub sign: IntSign,
}

impl FieldCodec for BitIntCodec {
    fn decode(&self, ft: &FieldType, _raw: &[u8], _order: ByteOrder) -> Result<Value, String> {
        Err(format!("{} only exists inside a BitStruct", ft.name))
    }

    fn encode(&self, ft: &FieldType, _value: &Value, _order: ByteOrder) -> Result<Vec<u8>, String> {
        Err(format!("{} only exists inside a BitStruct", ft.name))
    }

    fn decode_bits(&self, _ft: &FieldType, bits: u64, count: u32) -> Result<Value, String> {
        if count > 64 {
            return Err(format!("{} bits exceed a 64-bit word", count));
        }
        let bits = bits & bit_mask(count);
        let negative = count > 0 && (bits >> (count - 1)) & 1 == 1;
        let value = match self.sign {
            IntSign::Unsigned => return Ok(Value::UInt(bits)),
            _ if !negative => i128::from(bits),
            IntSign::TwosComplement => i128::from(bits) - (1i128 << count),
            IntSign::OnesComplement => i128::from(bits) - (1i128 << count) + 1,
        };
        i64::try_from(value)
            .map(Value::SInt)
            .map_err(|_| format!("{} does not fit in 64 bits", value))
    }

    fn encode_bits(&self, _ft: &FieldType, value: &Value, count: u32) -> Result<u64, String> {
        if count > 64 {
            return Err(format!("{} bits exceed a 64-bit word", count));
        }
        let wide = int_of(value)?;
        in_range(wide, self.sign, count)?;
        let raw = match self.sign {
            _ if wide >= 0 => wide,
            IntSign::OnesComplement => wide + (1i128 << count) - 1,
            _ => wide + (1i128 << count),
        };
        Ok(raw as u64)
    }

    fn size_of(&self, ft: &FieldType, _value: &Value) -> usize {
        ft.size
    }

    fn default_value(&self, _ft: &FieldType) -> Value {
        self.sign.zero()
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::UInt(_) | Value::SInt(_) | Value::Bool(_))
    }
}

/// Integer of any byte width. Values are held in 64 bits, so wider fields
/// must sign- or zero-extend.
#[derive(Debug, Clone, Copy)]
pub struct BigIntCodec {
    pub sign: IntSign,
}

impl FieldCodec for BigIntCodec {
    fn decode(&self, _ft: &FieldType, raw: &[u8], order: ByteOrder) -> Result<Value, String> {
        if raw.is_empty() {
            return Ok(self.sign.zero());
        }
        let mut le = raw.to_vec();
        if order == ByteOrder::Big {
            le.reverse();
        }
        let negative = self.sign != IntSign::Unsigned && le[le.len() - 1] & 0x80 != 0;
        let ext = if negative { 0xff } else { 0x00 };
        le.resize(le.len().max(8), ext);
        if le[8..].iter().any(|&b| b != ext) {
            return Err(format!("{}-byte value does not fit in 64 bits", raw.len()));
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&le[..8]);
        let low = u64::from_le_bytes(word);
        if self.sign == IntSign::Unsigned {
            return Ok(Value::UInt(low));
        }
        let v = low as i64;
        if (v < 0) != negative {
            return Err(format!("{}-byte value does not fit in 64 bits", raw.len()));
        }
        match self.sign {
            IntSign::OnesComplement if negative => Ok(Value::SInt(v + 1)),
            _ => Ok(Value::SInt(v)),
        }
    }

    fn encode(&self, ft: &FieldType, value: &Value, order: ByteOrder) -> Result<Vec<u8>, String> {
        self.encode_sized(ft, value, order, self.size_of(ft, value))
    }

    fn encode_sized(
        &self,
        _ft: &FieldType,
        value: &Value,
        order: ByteOrder,
        size: usize,
    ) -> Result<Vec<u8>, String> {
        let wide = int_of(value)?;
        let bits = u32::try_from(size.saturating_mul(8)).unwrap_or(u32::MAX);
        in_range(wide, self.sign, bits)?;
        let wide = match self.sign {
            IntSign::OnesComplement if wide < 0 => wide - 1,
            _ => wide,
        };
        let ext = if wide < 0 { 0xff } else { 0x00 };
        let mut out = wide.to_le_bytes().to_vec();
        out.resize(size, ext);
        if order == ByteOrder::Big {
            out.reverse();
        }
        Ok(out)
    }

    /// Fewest bytes that hold `value`, at least one.
    fn size_of(&self, _ft: &FieldType, value: &Value) -> usize {
        let Ok(wide) = int_of(value) else {
            return 0;
        };
        (1..16)
            .find(|n| {
                let (min, max) = self.sign.range(n * 8);
                (min..=max).contains(&wide)
            })
            .map_or(16, |n| n as usize)
    }

    fn default_value(&self, _ft: &FieldType) -> Value {
        self.sign.zero()
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::UInt(_) | Value::SInt(_) | Value::Bool(_))
    }
}

// =======================================================================
// Floats
// =======================================================================

/// IEEE-754 single (`size == 4`) or double (`size == 8`).
#[derive(Debug, Clone, Copy)]
pub struct FloatCodec;

impl FieldCodec for FloatCodec {
    fn decode(&self, ft: &FieldType, raw: &[u8], order: ByteOrder) -> Result<Value, String> {
        let bits = read_uint(raw, order);
        match (ft.size, raw.len()) {
            (4, 4) => Ok(Value::Float(f64::from(f32::from_bits(bits as u32)))),
            (8, 8) => Ok(Value::Float(f64::from_bits(bits))),
            _ => Err(format!("expected {} bytes, got {}", ft.size, raw.len())),
        }
    }

    fn encode(&self, ft: &FieldType, value: &Value, order: ByteOrder) -> Result<Vec<u8>, String> {
        let v = value
            .as_f64()
            .ok_or_else(|| format!("expected a float, found {}", value.kind_name()))?;
        match ft.size {
            4 => {
                let single = v as f32;
                if v.is_finite() && single.is_infinite() {
                    return Err(format!("{} overflows a 32-bit float", v));
                }
                Ok(write_uint(u64::from(single.to_bits()), 4, order))
            }
            8 => Ok(write_uint(v.to_bits(), 8, order)),
            n => Err(format!("unsupported float width {}", n)),
        }
    }

    fn size_of(&self, ft: &FieldType, _value: &Value) -> usize {
        ft.size
    }

    fn default_value(&self, _ft: &FieldType) -> Value {
        Value::Float(0.0)
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Float(_) | Value::UInt(_) | Value::SInt(_))
    }
}

// =======================================================================
// Text
// =======================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Ascii,
    Latin1,
    Utf8,
    Utf16,
    Utf32,
}

impl TextEncoding {
    /// Bytes per code unit.
    pub const fn unit(self) -> usize {
        match self {
            Self::Ascii | Self::Latin1 | Self::Utf8 => 1,
            Self::Utf16 => 2,
            Self::Utf32 => 4,
        }
    }

    pub fn decode(self, raw: &[u8], order: ByteOrder) -> Result<String, String> {
        match self {
            Self::Ascii => {
                if let Some(pos) = raw.iter().position(|b| !b.is_ascii()) {
                    return Err(format!("non-ASCII byte 0x{:02x} at {}", raw[pos], pos));
                }
                Ok(raw.iter().map(|b| char::from(*b)).collect())
            }
            Self::Latin1 => Ok(raw.iter().map(|b| char::from(*b)).collect()),
            Self::Utf8 => String::from_utf8(raw.to_vec()).map_err(|e| e.to_string()),
            Self::Utf16 => {
                if raw.len() % 2 != 0 {
                    return Err(format!("odd UTF-16 length {}", raw.len()));
                }
                let units = raw.chunks_exact(2).map(|c| read_uint(c, order) as u16);
                char::decode_utf16(units)
                    .collect::<Result<String, _>>()
                    .map_err(|e| e.to_string())
            }
            Self::Utf32 => {
                if raw.len() % 4 != 0 {
                    return Err(format!("UTF-32 length {} not a multiple of 4", raw.len()));
                }
                raw.chunks_exact(4)
                    .map(|c| {
                        let cp = read_uint(c, order) as u32;
                        char::from_u32(cp).ok_or_else(|| format!("invalid code point 0x{:x}", cp))
                    })
                    .collect()
            }
        }
    }

    pub fn encode(self, text: &str, order: ByteOrder) -> Result<Vec<u8>, String> {
        match self {
            Self::Ascii => {
                if let Some(c) = text.chars().find(|c| !c.is_ascii()) {
                    return Err(format!("'{}' is not ASCII", c));
                }
                Ok(text.as_bytes().to_vec())
            }
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| format!("'{}' is not Latin-1", c)))
                .collect(),
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Utf16 => Ok(text
                .encode_utf16()
                .flat_map(|u| write_uint(u64::from(u), 2, order))
                .collect()),
            Self::Utf32 => Ok(text
                .chars()
                .flat_map(|c| write_uint(u64::from(u32::from(c)), 4, order))
                .collect()),
        }
    }

    /// Encoded length without producing the bytes.
    pub fn encoded_len(self, text: &str) -> usize {
        match self {
            Self::Ascii | Self::Latin1 => text.chars().count(),
            Self::Utf8 => text.len(),
            Self::Utf16 => text.encode_utf16().count() * 2,
            Self::Utf32 => text.chars().count() * 4,
        }
    }
}

/// How a text type treats its delimiter character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    /// Stored with a trailing delimiter; decoding stops at the first one.
    Delimited,
    /// Stored without delimiter; decoding still stops at the first one.
    NonTerminated,
    /// Stored and decoded verbatim.
    Raw,
}

#[derive(Debug, Clone, Copy)]
pub struct TextCodec {
    pub mode: TextMode,
}

impl TextCodec {
    fn encoding(ft: &FieldType) -> TextEncoding {
        ft.text.unwrap_or(TextEncoding::Ascii)
    }
}

impl FieldCodec for TextCodec {
    fn decode(&self, ft: &FieldType, raw: &[u8], order: ByteOrder) -> Result<Value, String> {
        let mut text = Self::encoding(ft).decode(raw, order)?;
        if self.mode != TextMode::Raw {
            if let Some(end) = text.find('\0') {
                text.truncate(end);
            }
        }
        Ok(Value::Str(text))
    }

    fn encode(&self, ft: &FieldType, value: &Value, order: ByteOrder) -> Result<Vec<u8>, String> {
        let text = value
            .as_str()
            .ok_or_else(|| format!("expected a string, found {}", value.kind_name()))?;
        let enc = Self::encoding(ft);
        let mut out = enc.encode(text, order)?;
        if self.mode == TextMode::Delimited && !text.ends_with('\0') {
            out.extend(std::iter::repeat_n(0u8, enc.unit()));
        }
        Ok(out)
    }

    fn size_of(&self, ft: &FieldType, value: &Value) -> usize {
        let Some(text) = value.as_str() else {
            return 0;
        };
        let enc = Self::encoding(ft);
        let delim = if self.mode == TextMode::Delimited && !text.ends_with('\0') {
            enc.unit()
        } else {
            0
        };
        enc.encoded_len(text) + delim
    }

    fn default_value(&self, _ft: &FieldType) -> Value {
        Value::Str(String::new())
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Str(_))
    }
}

/// Bytes shown as a lowercase hex string (`StrHex`).
#[derive(Debug, Clone, Copy)]
pub struct HexCodec;

impl FieldCodec for HexCodec {
    fn decode(&self, _ft: &FieldType, raw: &[u8], _order: ByteOrder) -> Result<Value, String> {
        Ok(Value::Str(raw.iter().map(|b| format!("{:02x}", b)).collect()))
    }

    fn encode(&self, _ft: &FieldType, value: &Value, _order: ByteOrder) -> Result<Vec<u8>, String> {
        let text = value
            .as_str()
            .ok_or_else(|| format!("expected a hex string, found {}", value.kind_name()))?;
        // odd-length strings get a leading zero nibble
        let padded = if text.len() % 2 == 1 {
            format!("0{}", text)
        } else {
            text.to_string()
        };
        (0..padded.len())
            .step_by(2)
            .map(|i| {
                padded
                    .get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| format!("'{}' is not a hex string", text))
            })
            .collect()
    }

    fn size_of(&self, _ft: &FieldType, value: &Value) -> usize {
        value.as_str().map_or(0, |s| s.len().div_ceil(2))
    }

    fn default_value(&self, _ft: &FieldType) -> Value {
        Value::Str(String::new())
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Str(_))
    }
}

// =======================================================================
// Bytes and blocks
// =======================================================================

#[derive(Debug, Clone, Copy)]
pub struct BytesCodec;

impl FieldCodec for BytesCodec {
    fn decode(&self, _ft: &FieldType, raw: &[u8], _order: ByteOrder) -> Result<Value, String> {
        Ok(Value::Bytes(raw.to_vec()))
    }

    fn encode(&self, _ft: &FieldType, value: &Value, _order: ByteOrder) -> Result<Vec<u8>, String> {
        value
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| format!("expected bytes, found {}", value.kind_name()))
    }

    fn size_of(&self, _ft: &FieldType, value: &Value) -> usize {
        value.as_bytes().map_or(0, <[u8]>::len)
    }

    fn default_value(&self, _ft: &FieldType) -> Value {
        Value::Bytes(Vec::new())
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Bytes(_))
    }
}

/// Codec of layout-only types; they never hold a leaf value.
#[derive(Debug, Clone, Copy)]
pub struct NoCodec;

impl FieldCodec for NoCodec {
    fn decode(&self, ft: &FieldType, _raw: &[u8], _order: ByteOrder) -> Result<Value, String> {
        Err(format!("{} has no leaf value", ft.name))
    }

    fn encode(&self, ft: &FieldType, _value: &Value, _order: ByteOrder) -> Result<Vec<u8>, String> {
        Err(format!("{} has no leaf value", ft.name))
    }

    fn size_of(&self, _ft: &FieldType, _value: &Value) -> usize {
        0
    }

    fn default_value(&self, _ft: &FieldType) -> Value {
        Value::Null
    }

    fn accepts(&self, value: &Value) -> bool {
        value.is_null()
    }
}
