// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scalar values held by tree nodes.

use std::fmt;

/// A decoded scalar.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    UInt(u64),
    SInt(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::UInt(_) => "uint",
            Self::SInt(_) => "sint",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            Self::UInt(v) => Some(*v != 0),
            Self::SInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Integer view, accepting either signedness when the value fits.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::SInt(v) => u64::try_from(*v).ok(),
            Self::Bool(v) => Some(u64::from(*v)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::SInt(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            Self::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_u64().and_then(|v| usize::try_from(v).ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::UInt(v) => Some(*v as f64),
            Self::SInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Str(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::SInt(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

macro_rules! impl_from_uint {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::UInt(v as u64)
            }
        })*
    };
}

macro_rules! impl_from_sint {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::SInt(v as i64)
            }
        })*
    };
}

impl_from_uint!(u8, u16, u32, u64, usize);
impl_from_sint!(i8, i16, i32, i64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

/// Hashable key of a switch/union CASE_MAP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaseKey {
    Int(i64),
    Str(String),
}

impl CaseKey {
    /// Key for a resolved CASE value. Floats and byte strings never match.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(Self::Str(s.clone())),
            Value::Bool(b) => Some(Self::Int(i64::from(*b))),
            other => other.as_i64().map(Self::Int),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(v) => Value::SInt(*v),
            Self::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl fmt::Display for CaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for CaseKey {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for CaseKey {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for CaseKey {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_views_cross_signedness() {
        assert_eq!(Value::SInt(5).as_u64(), Some(5));
        assert_eq!(Value::SInt(-1).as_u64(), None);
        assert_eq!(Value::UInt(u64::MAX).as_i64(), None);
        assert_eq!(Value::from(7u8).as_usize(), Some(7));
    }

    #[test]
    fn test_case_key_from_value() {
        assert_eq!(CaseKey::from_value(&Value::UInt(3)), Some(CaseKey::Int(3)));
        assert_eq!(CaseKey::from_value(&"png".into()), Some(CaseKey::Str("png".into())));
        assert_eq!(CaseKey::from_value(&Value::Float(1.5)), None);
    }
}
