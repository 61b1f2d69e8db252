//! Value kinds for IR nodes and virtual entries.
//!
//! [`Kind`] is the closed enumeration of value representations the optimizer distinguishes.
//! Each kind knows its stack kind (the representation it is widened to when it flows as a
//! value), its bit width, and its same-width integer counterpart for bit reinterpretation.
//!
//! # Stack Kinds
//!
//! | Kind | Stack kind | Bits |
//! |------|------------|------|
//! | `Boolean`, `Byte`, `Short`, `Char`, `Int` | `Int` | 8/8/16/16/32 |
//! | `Float` | `Float` | 32 |
//! | `Long` | `Long` | 64 |
//! | `Double` | `Double` | 64 |
//! | `Object` | `Object` | - |
//!
//! `Long` is the canonical wide kind: every primitive stored through a static OSR access ends up
//! as a `Long`.

use strum::{Display, EnumCount, EnumIter};

/// Representation kind of an IR value or a virtual entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "lowercase")]
pub enum Kind {
    /// 1-bit truth value stored in a byte.
    Boolean,
    /// Signed 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Short,
    /// Unsigned 16-bit character.
    Char,
    /// Signed 32-bit integer.
    Int,
    /// IEEE-754 single precision.
    Float,
    /// Signed 64-bit integer.
    Long,
    /// IEEE-754 double precision.
    Double,
    /// Object reference.
    Object,
    /// No value.
    Void,
    /// Unusable slot contents.
    Illegal,
}

impl Kind {
    /// The canonical wide primitive kind.
    pub const WIDE: Kind = Kind::Long;

    /// Returns `true` for the numeric and boolean kinds.
    #[must_use]
    pub const fn is_primitive(self) -> bool {
        !matches!(self, Kind::Object | Kind::Void | Kind::Illegal)
    }

    /// Returns `true` for `Float` and `Double`.
    #[must_use]
    pub const fn is_numeric_float(self) -> bool {
        matches!(self, Kind::Float | Kind::Double)
    }

    /// Returns `true` for the integer kinds, including `Boolean` and `Char`.
    #[must_use]
    pub const fn is_numeric_integer(self) -> bool {
        matches!(
            self,
            Kind::Boolean | Kind::Byte | Kind::Short | Kind::Char | Kind::Int | Kind::Long
        )
    }

    /// Returns the kind this kind is widened to on the value stack.
    #[must_use]
    pub const fn stack_kind(self) -> Kind {
        match self {
            Kind::Boolean | Kind::Byte | Kind::Short | Kind::Char | Kind::Int => Kind::Int,
            other => other,
        }
    }

    /// Returns the width of the kind in bits, `0` for kinds without a fixed width.
    #[must_use]
    pub const fn bit_count(self) -> u32 {
        match self {
            Kind::Boolean | Kind::Byte => 8,
            Kind::Short | Kind::Char => 16,
            Kind::Int | Kind::Float => 32,
            Kind::Long | Kind::Double => 64,
            Kind::Object | Kind::Void | Kind::Illegal => 0,
        }
    }

    /// Returns the integer kind with the same width as a floating point kind.
    ///
    /// `Float` maps to `Int` and `Double` to `Long`; every other kind yields `None`.
    #[must_use]
    pub const fn reinterpreted_integer(self) -> Option<Kind> {
        match self {
            Kind::Float => Some(Kind::Int),
            Kind::Double => Some(Kind::Long),
            _ => None,
        }
    }

    /// Returns the stack kind produced by an integer value of `bits` width.
    #[must_use]
    pub const fn integer_for_bits(bits: u32) -> Kind {
        if bits > 32 {
            Kind::Long
        } else {
            Kind::Int
        }
    }
}
