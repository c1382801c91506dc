// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Scalar types of IR values and buffer elements.

use std::fmt;
use std::str::FromStr;

/// Scalar type of an expression or buffer element.
///
/// Written as `bool`, `i8`..`i64`, `u8`..`u64`, `f32`, `f64` in text form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum ScalarType {
    Bool,
    Int(u8),
    UInt(u8),
    Float(u8),
}

impl ScalarType {
    pub const BOOL: ScalarType = ScalarType::Bool;
    pub const I8: ScalarType = ScalarType::Int(8);
    pub const I16: ScalarType = ScalarType::Int(16);
    pub const I32: ScalarType = ScalarType::Int(32);
    pub const I64: ScalarType = ScalarType::Int(64);
    pub const U8: ScalarType = ScalarType::UInt(8);
    pub const U16: ScalarType = ScalarType::UInt(16);
    pub const U32: ScalarType = ScalarType::UInt(32);
    pub const U64: ScalarType = ScalarType::UInt(64);
    pub const F32: ScalarType = ScalarType::Float(32);
    pub const F64: ScalarType = ScalarType::Float(64);

    /// Width in bits. `Bool` is stored as a byte.
    pub fn bits(self) -> u8 {
        match self {
            ScalarType::Bool => 8,
            ScalarType::Int(b) | ScalarType::UInt(b) | ScalarType::Float(b) => b,
        }
    }

    pub fn bytes(self) -> u32 {
        u32::from(self.bits()) / 8
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::Float(_))
    }

    pub fn is_int(self) -> bool {
        matches!(self, ScalarType::Int(_) | ScalarType::UInt(_))
    }

    pub fn is_signed(self) -> bool {
        matches!(self, ScalarType::Int(_))
    }

    pub fn is_bool(self) -> bool {
        matches!(self, ScalarType::Bool)
    }

    fn is_valid(self) -> bool {
        match self {
            ScalarType::Bool => true,
            ScalarType::Int(b) | ScalarType::UInt(b) => matches!(b, 8 | 16 | 32 | 64),
            ScalarType::Float(b) => matches!(b, 32 | 64),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Bool => write!(f, "bool"),
            ScalarType::Int(b) => write!(f, "i{}", b),
            ScalarType::UInt(b) => write!(f, "u{}", b),
            ScalarType::Float(b) => write!(f, "f{}", b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParseError(pub String);

impl fmt::Display for TypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid scalar type '{}'", self.0)
    }
}

impl std::error::Error for TypeParseError {}

impl FromStr for ScalarType {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "bool" {
            return Ok(ScalarType::Bool);
        }
        let err = || TypeParseError(s.to_string());
        let ctor: fn(u8) -> ScalarType = match s.get(..1) {
            Some("i") => ScalarType::Int,
            Some("u") => ScalarType::UInt,
            Some("f") => ScalarType::Float,
            _ => return Err(err()),
        };
        let digits = &s[1..];
        let bits: u8 = digits.parse().map_err(|_| err())?;
        let ty = ctor(bits);
        if ty.is_valid() { Ok(ty) } else { Err(err()) }
    }
}

impl TryFrom<String> for ScalarType {
    type Error = TypeParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ScalarType> for String {
    fn from(ty: ScalarType) -> String {
        ty.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_spelling() {
        for ty in [
            ScalarType::BOOL, ScalarType::I8, ScalarType::I16, ScalarType::I32, ScalarType::I64,
            ScalarType::U8, ScalarType::U16, ScalarType::U32, ScalarType::U64,
            ScalarType::F32, ScalarType::F64,
        ] {
            assert_eq!(ty.to_string().parse::<ScalarType>(), Ok(ty));
        }
    }

    #[test]
    fn rejects_odd_widths() {
        assert!("i7".parse::<ScalarType>().is_err());
        assert!("f16".parse::<ScalarType>().is_err());
        assert!("x32".parse::<ScalarType>().is_err());
        assert!("".parse::<ScalarType>().is_err());
    }

    #[test]
    fn sizes() {
        assert_eq!(ScalarType::BOOL.bytes(), 1);
        assert_eq!(ScalarType::F32.bytes(), 4);
        assert_eq!(ScalarType::U64.bytes(), 8);
    }
}
