//! Typed constant values.
//!
//! [`ConstValue`] is the payload of constant nodes. Besides carrying the value it implements the
//! bit-level conversions the frame rules need when folding constant inputs: widening to the
//! stack kind, bit reinterpretation between same-width integer and floating point kinds, zero
//! extension and narrowing.
//!
//! Equality and hashing are defined on the bit pattern, so `-0.0` and `0.0` are distinct and a
//! NaN constant equals itself. This is what value numbering needs.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use crate::ir::Kind;

/// A compile-time constant.
#[derive(Debug, Clone, Copy)]
pub enum ConstValue {
    /// Boolean constant.
    Bool(bool),
    /// 8-bit signed integer.
    I8(i8),
    /// 16-bit signed integer.
    I16(i16),
    /// 16-bit unsigned character.
    Char(u16),
    /// 32-bit signed integer.
    I32(i32),
    /// 32-bit float.
    F32(f32),
    /// 64-bit signed integer.
    I64(i64),
    /// 64-bit float.
    F64(f64),
    /// The null reference.
    Null,
}

impl ConstValue {
    /// Returns the declared kind of this constant.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Bool(_) => Kind::Boolean,
            Self::I8(_) => Kind::Byte,
            Self::I16(_) => Kind::Short,
            Self::Char(_) => Kind::Char,
            Self::I32(_) => Kind::Int,
            Self::F32(_) => Kind::Float,
            Self::I64(_) => Kind::Long,
            Self::F64(_) => Kind::Double,
            Self::Null => Kind::Object,
        }
    }

    /// Returns the kind of this constant once pushed on the value stack.
    #[must_use]
    pub const fn stack_kind(&self) -> Kind {
        self.kind().stack_kind()
    }

    /// Returns the zero value for `kind`, `None` for `Void` and `Illegal`.
    #[must_use]
    pub const fn default_for(kind: Kind) -> Option<Self> {
        match kind {
            Kind::Boolean => Some(Self::Bool(false)),
            Kind::Byte => Some(Self::I8(0)),
            Kind::Short => Some(Self::I16(0)),
            Kind::Char => Some(Self::Char(0)),
            Kind::Int => Some(Self::I32(0)),
            Kind::Float => Some(Self::F32(0.0)),
            Kind::Long => Some(Self::I64(0)),
            Kind::Double => Some(Self::F64(0.0)),
            Kind::Object => Some(Self::Null),
            Kind::Void | Kind::Illegal => None,
        }
    }

    /// Returns the raw bit pattern, zero-extended to 64 bits.
    #[must_use]
    pub fn raw_bits(&self) -> u64 {
        match *self {
            Self::Bool(v) => u64::from(v),
            Self::I8(v) => u64::from(v as u8),
            Self::I16(v) => u64::from(v as u16),
            Self::Char(v) => u64::from(v),
            Self::I32(v) => u64::from(v as u32),
            Self::F32(v) => u64::from(v.to_bits()),
            Self::I64(v) => v as u64,
            Self::F64(v) => v.to_bits(),
            Self::Null => 0,
        }
    }

    /// Widens sub-int constants to `I32` the way the value stack does.
    ///
    /// Signed kinds are sign-extended, `Char` and `Bool` are zero-extended.
    #[must_use]
    pub fn to_stack(self) -> Self {
        match self {
            Self::Bool(v) => Self::I32(i32::from(v)),
            Self::I8(v) => Self::I32(i32::from(v)),
            Self::I16(v) => Self::I32(i32::from(v)),
            Self::Char(v) => Self::I32(i32::from(v)),
            other => other,
        }
    }

    /// Reinterprets the bits of this constant as the same-width `target` stack kind.
    ///
    /// Returns `None` when the widths differ or either side is not a primitive.
    #[must_use]
    pub fn reinterpret(self, target: Kind) -> Option<Self> {
        let value = self.to_stack();
        match (value, target.stack_kind()) {
            (Self::F32(v), Kind::Int) => Some(Self::I32(v.to_bits() as i32)),
            (Self::I32(v), Kind::Float) => Some(Self::F32(f32::from_bits(v as u32))),
            (Self::F64(v), Kind::Long) => Some(Self::I64(v.to_bits() as i64)),
            (Self::I64(v), Kind::Double) => Some(Self::F64(f64::from_bits(v as u64))),
            (v, k) if v.kind() == k && k.is_primitive() => Some(v),
            _ => None,
        }
    }

    /// Zero-extends an integer constant to `result_bits` (32 or 64).
    #[must_use]
    pub fn zero_extend(self, result_bits: u32) -> Option<Self> {
        match (self.to_stack(), result_bits) {
            (Self::I32(v), 64) => Some(Self::I64(i64::from(v as u32))),
            (Self::I32(v), 32) => Some(Self::I32(v)),
            (Self::I64(v), 64) => Some(Self::I64(v)),
            _ => None,
        }
    }

    /// Truncates an integer constant to `result_bits` (32 or 64).
    #[must_use]
    pub fn narrow(self, result_bits: u32) -> Option<Self> {
        match (self.to_stack(), result_bits) {
            (Self::I64(v), 32) => Some(Self::I32(v as i32)),
            (Self::I64(v), 64) => Some(Self::I64(v)),
            (Self::I32(v), 32) => Some(Self::I32(v)),
            _ => None,
        }
    }

    /// Returns `true` for the null reference.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl PartialEq for ConstValue {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.raw_bits() == other.raw_bits()
    }
}

impl Eq for ConstValue {}

impl Hash for ConstValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        self.raw_bits().hash(state);
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}b"),
            Self::I16(v) => write!(f, "{v}s"),
            Self::Char(v) => write!(f, "{v}c"),
            Self::I32(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}f"),
            Self::I64(v) => write!(f, "{v}L"),
            Self::F64(v) => write!(f, "{v}d"),
            Self::Null => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_reinterpret_then_zero_extend() {
        let value = ConstValue::F32(-1.5);
        let bits = value.reinterpret(Kind::Int).unwrap();
        assert_eq!(bits, ConstValue::I32((-1.5f32).to_bits() as i32));

        let wide = bits.zero_extend(64).unwrap();
        assert_eq!(wide, ConstValue::I64(i64::from((-1.5f32).to_bits())));
        // Zero extension never sets the upper half, even for a negative bit pattern
        if let ConstValue::I64(v) = wide {
            assert_eq!((v as u64) >> 32, 0);
        }
    }

    #[test]
    fn test_byte_widens_with_sign_then_zero_extends() {
        let wide = ConstValue::I8(-1).zero_extend(64).unwrap();
        assert_eq!(wide, ConstValue::I64(0xFFFF_FFFF));
    }

    #[test]
    fn test_char_widens_without_sign() {
        assert_eq!(ConstValue::Char(0xFFFF).to_stack(), ConstValue::I32(0xFFFF));
    }

    #[test]
    fn test_narrow_round_trips_int() {
        let wide = ConstValue::I32(-7).zero_extend(64).unwrap();
        assert_eq!(wide.narrow(32), Some(ConstValue::I32(-7)));
    }

    #[test]
    fn test_reinterpret_width_mismatch() {
        assert!(ConstValue::F32(1.0).reinterpret(Kind::Long).is_none());
        assert!(ConstValue::Null.reinterpret(Kind::Long).is_none());
    }

    #[test]
    fn test_bitwise_equality() {
        assert_ne!(ConstValue::F64(0.0), ConstValue::F64(-0.0));
        assert_eq!(ConstValue::F64(f64::NAN), ConstValue::F64(f64::NAN));
        assert_ne!(ConstValue::I32(1), ConstValue::I64(1));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ConstValue::default_for(Kind::Long), Some(ConstValue::I64(0)));
        assert_eq!(ConstValue::default_for(Kind::Object), Some(ConstValue::Null));
        assert_eq!(ConstValue::default_for(Kind::Void), None);
    }
}
