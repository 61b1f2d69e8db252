//! Frame descriptors and frame slot references.
//!
//! A virtual frame is backed by up to four array allocations:
//!
//! ```text
//! NewFrame
//! ├── tags        byte[]    one tag per slot (which kind the slot currently holds)
//! ├── objects     Object[]  reference payloads
//! ├── primitives  long[]    primitive payloads, always stored as 64-bit values
//! └── auxiliary   Object[]  optional, untagged auxiliary slots
//! ```
//!
//! [`FrameAccess`] names one slot of such a frame together with the access mode used to reach
//! it. The accessor nodes of [`NodeKind`](crate::ir::NodeKind) embed a `FrameAccess`.

use std::fmt;

use bitflags::bitflags;
use strum::{Display, EnumCount, EnumIter};

use crate::ir::{ConstValue, Kind, NodeId};

/// Modifier OR'd into a tag when the slot was written through a static access.
pub const STATIC_TAG_MODIFIER: u8 = 0x08;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Flags carried by a frame slot access
    pub struct AccessFlags: u8 {
        /// The slot is accessed statically: no tag check, raw storage
        const STATIC = 0x01;
        /// The write also updates the slot's tag
        const SET_TAG = 0x02;
    }
}

impl AccessFlags {
    /// Plain tagged access.
    pub const NON_STATIC: Self = Self::empty();
    /// Static write that updates the tag with its static variant.
    pub const STATIC_AND_SET_TAG: Self = Self::STATIC.union(Self::SET_TAG);
}

/// Which part of the frame an access targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AccessType {
    /// Tagged local slot backed by the tag, object and primitive stores.
    Local,
    /// Untagged auxiliary slot backed only by the auxiliary object store.
    Auxiliary,
}

/// Slot tag values stored in the tag store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[repr(u8)]
pub enum FrameTag {
    /// Slot holds a reference.
    Object = 0,
    /// Slot holds a `long`.
    Long = 1,
    /// Slot holds an `int`.
    Int = 2,
    /// Slot holds a `double`.
    Double = 3,
    /// Slot holds a `float`.
    Float = 4,
    /// Slot holds a `boolean`.
    Boolean = 5,
    /// Slot holds a `byte`.
    Byte = 6,
    /// Slot was cleared.
    Illegal = 7,
}

impl FrameTag {
    /// Returns the tag that describes values of `kind`.
    #[must_use]
    pub const fn for_kind(kind: Kind) -> Self {
        match kind {
            Kind::Object => Self::Object,
            Kind::Long => Self::Long,
            Kind::Int | Kind::Short | Kind::Char => Self::Int,
            Kind::Double => Self::Double,
            Kind::Float => Self::Float,
            Kind::Boolean => Self::Boolean,
            Kind::Byte => Self::Byte,
            Kind::Void | Kind::Illegal => Self::Illegal,
        }
    }

    /// Returns the value kind a slot with this tag holds.
    #[must_use]
    pub const fn kind(self) -> Kind {
        match self {
            Self::Object => Kind::Object,
            Self::Long => Kind::Long,
            Self::Int => Kind::Int,
            Self::Double => Kind::Double,
            Self::Float => Kind::Float,
            Self::Boolean => Kind::Boolean,
            Self::Byte => Kind::Byte,
            Self::Illegal => Kind::Illegal,
        }
    }

    /// Tag constant written by a non-static access.
    #[must_use]
    pub const fn plain_constant(self) -> ConstValue {
        ConstValue::I8(self as u8 as i8)
    }

    /// Tag constant written by a static access.
    #[must_use]
    pub const fn static_constant(self) -> ConstValue {
        ConstValue::I8((self as u8 | STATIC_TAG_MODIFIER) as i8)
    }

    /// Returns `true` if `value` is the plain or static tag constant for this tag.
    #[must_use]
    pub fn matches(self, value: &ConstValue) -> bool {
        match value {
            ConstValue::I8(raw) => (*raw as u8 & !STATIC_TAG_MODIFIER) == self as u8,
            _ => false,
        }
    }
}

/// The backing stores of a frame allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameLayout {
    /// Tag store (`byte[]`).
    pub tags: NodeId,
    /// Object payload store (`Object[]`).
    pub objects: NodeId,
    /// Primitive payload store (`long[]`).
    pub primitives: NodeId,
    /// Auxiliary object store, if the frame has auxiliary slots.
    pub auxiliary: Option<NodeId>,
    /// The frame is the target of a bytecode on-stack-replacement transfer.
    pub osr_transfer_target: bool,
}

impl FrameLayout {
    /// Returns the tag store used by `access`, `None` for auxiliary accesses.
    #[must_use]
    pub const fn tag_array(&self, access: AccessType) -> Option<NodeId> {
        match access {
            AccessType::Local => Some(self.tags),
            AccessType::Auxiliary => None,
        }
    }

    /// Returns the object store used by `access`.
    #[must_use]
    pub const fn object_array(&self, access: AccessType) -> Option<NodeId> {
        match access {
            AccessType::Local => Some(self.objects),
            AccessType::Auxiliary => self.auxiliary,
        }
    }

    /// Returns the primitive store used by `access`, `None` for auxiliary accesses.
    #[must_use]
    pub const fn primitive_array(&self, access: AccessType) -> Option<NodeId> {
        match access {
            AccessType::Local => Some(self.primitives),
            AccessType::Auxiliary => None,
        }
    }

    /// Returns every backing store of this frame.
    pub fn arrays(&self) -> impl Iterator<Item = NodeId> {
        [Some(self.tags), Some(self.objects), Some(self.primitives), self.auxiliary]
            .into_iter()
            .flatten()
    }
}

/// Reference to a single frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameAccess {
    /// The `NewFrame` node owning the slot.
    pub frame: NodeId,
    /// Slot index.
    pub slot: usize,
    /// Tag the access expects or writes.
    pub tag: FrameTag,
    /// Which stores the access goes through.
    pub access: AccessType,
}

impl FrameAccess {
    /// Creates a slot reference.
    #[must_use]
    pub const fn new(frame: NodeId, slot: usize, tag: FrameTag, access: AccessType) -> Self {
        Self {
            frame,
            slot,
            tag,
            access,
        }
    }
}

impl fmt::Display for FrameAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {} {}",
            self.frame, self.slot, self.access, self.tag
        )
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_static_tag_differs_from_plain() {
        for tag in FrameTag::iter() {
            assert_ne!(tag.plain_constant(), tag.static_constant());
            assert!(tag.matches(&tag.plain_constant()));
            assert!(tag.matches(&tag.static_constant()));
        }
    }

    #[test]
    fn test_tag_for_kind_round_trip() {
        for tag in FrameTag::iter() {
            assert_eq!(FrameTag::for_kind(tag.kind()), tag);
        }
    }

    #[test]
    fn test_auxiliary_has_no_tags() {
        let layout = FrameLayout {
            tags: NodeId::new(0),
            objects: NodeId::new(1),
            primitives: NodeId::new(2),
            auxiliary: Some(NodeId::new(3)),
            osr_transfer_target: false,
        };
        assert_eq!(layout.tag_array(AccessType::Auxiliary), None);
        assert_eq!(layout.primitive_array(AccessType::Auxiliary), None);
        assert_eq!(layout.object_array(AccessType::Auxiliary), Some(NodeId::new(3)));
        assert_eq!(layout.object_array(AccessType::Local), Some(NodeId::new(1)));
        assert_eq!(layout.arrays().count(), 4);
    }

    #[test]
    fn test_flags() {
        assert!(AccessFlags::STATIC_AND_SET_TAG.contains(AccessFlags::STATIC));
        assert!(AccessFlags::STATIC_AND_SET_TAG.contains(AccessFlags::SET_TAG));
        assert!(AccessFlags::NON_STATIC.is_empty());
    }
}
