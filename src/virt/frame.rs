//! Virtualization rules for frame slot accessors.
//!
//! Each accessor node gets a `virtualize` method that either folds the access into the virtual
//! model of the frame ([`Rewrite::Subsumed`]) or gives up at this point
//! ([`Rewrite::Bailout`]). A rule resolves every alias it needs and checks every bound before
//! its first store, so a bailout never follows a partial update.
//!
//! # Store Selection
//!
//! | Access | Value | Stores touched |
//! |--------|-------|----------------|
//! | `Auxiliary` | object | auxiliary object store |
//! | `Local` | object | tag store, object store, primitive store (cleared) |
//! | `Local` | primitive | tag store, primitive store |
//!
//! Local primitive payloads are always stored with kind `Long`. Static accesses to an OSR
//! transfer-target frame additionally widen the value itself to 64 bits (see
//! [`osr`](crate::virt::osr)).

use log::trace;

use crate::{
    ir::{
        AccessFlags, AccessType, ConstValue, DeoptReason, FrameClear, FrameGet, FrameLayout,
        FrameSet, FrameTag, Kind,
    },
    virt::{
        osr,
        state::{Alias, VirtualId},
        tool::VirtualizerTool,
        Rewrite,
    },
    Result,
};

/// Triggers the bailout and reports it.
fn bailout(tool: &mut dyn VirtualizerTool, reason: DeoptReason) -> Result<Rewrite> {
    trace!("{}: bailout ({:?})", tool.current(), reason);
    tool.insert_deoptimization(reason)?;
    Ok(Rewrite::Bailout)
}

/// Resolved tag and data store of a local access.
struct LocalStores {
    tags: VirtualId,
    data: VirtualId,
}

/// Resolves the tag store and one data store of a local access.
///
/// Returns `Ok(None)` if either is not virtual or `slot` is out of range.
fn resolve_local(
    tool: &dyn VirtualizerTool,
    layout: &FrameLayout,
    access: impl std::fmt::Display,
    slot: usize,
    object: bool,
) -> Result<Option<LocalStores>> {
    let data_array = if object {
        layout.objects
    } else {
        layout.primitives
    };

    let (Alias::Virtual(tags), Alias::Virtual(data)) =
        (tool.alias(layout.tags), tool.alias(data_array))
    else {
        return Ok(None);
    };

    let tag_count = tool.entry_count(tags);
    let data_count = tool.entry_count(data);
    if tag_count != data_count {
        return Err(invariant_error!(
            tool.current(),
            access,
            "tag store has {} entries, data store has {}",
            tag_count,
            data_count
        ));
    }

    if slot >= tag_count {
        return Ok(None);
    }

    Ok(Some(LocalStores { tags, data }))
}

impl FrameSet {
    /// Folds this slot write into the virtual frame.
    ///
    /// On success the write is deleted from the graph. If a needed store is not virtual, the
    /// slot is out of range, or the data store refuses the value, a deoptimization is inserted
    /// and the write stays in place unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvariantViolation`] if an auxiliary slot is written with a
    /// non-object value, if the tag and data stores disagree on their entry count, or if the
    /// tag store refuses a tag constant.
    pub fn virtualize(&self, tool: &mut dyn VirtualizerTool) -> Result<Rewrite> {
        let value_kind = tool.stack_kind(self.value);
        let Some(layout) = tool.frame_layout(self.access.frame) else {
            return bailout(tool, DeoptReason::FrameNotVirtual);
        };

        match self.access.access {
            AccessType::Auxiliary => self.virtualize_auxiliary(&layout, value_kind, tool),
            AccessType::Local => self.virtualize_local(&layout, value_kind, tool),
        }
    }

    fn virtualize_auxiliary(
        &self,
        layout: &FrameLayout,
        value_kind: Kind,
        tool: &mut dyn VirtualizerTool,
    ) -> Result<Rewrite> {
        if value_kind != Kind::Object {
            return Err(invariant_error!(
                tool.current(),
                self.access,
                "auxiliary slot written with a {} value",
                value_kind
            ));
        }

        let Some(array) = layout.object_array(AccessType::Auxiliary) else {
            return bailout(tool, DeoptReason::FrameNotVirtual);
        };

        if let Alias::Virtual(store) = tool.alias(array) {
            if self.access.slot < tool.entry_count(store)
                && tool.set_virtual_entry(store, self.access.slot, self.value, Kind::Object)
            {
                tool.delete()?;
                return Ok(Rewrite::Subsumed);
            }
        }

        bailout(tool, DeoptReason::FrameNotVirtual)
    }

    fn virtualize_local(
        &self,
        layout: &FrameLayout,
        value_kind: Kind,
        tool: &mut dyn VirtualizerTool,
    ) -> Result<Rewrite> {
        let slot = self.access.slot;
        let object = value_kind == Kind::Object;

        let Some(stores) = resolve_local(tool, layout, self.access, slot, object)? else {
            return bailout(tool, DeoptReason::FrameNotVirtual);
        };
        let companion = if object {
            match tool.alias(layout.primitives) {
                Alias::Virtual(primitives) if slot < tool.entry_count(primitives) => {
                    Some(primitives)
                }
                _ => None,
            }
        } else {
            None
        };

        let is_static = self.flags.contains(AccessFlags::STATIC);
        let value = if is_static && tool.is_osr_transfer_target(self.access.frame) {
            osr::widen(self.value, tool)
        } else {
            self.value
        };

        let stored_kind = if object { Kind::Object } else { Kind::WIDE };
        if !tool.set_virtual_entry(stores.data, slot, value, stored_kind) {
            return bailout(tool, DeoptReason::EntryRefused);
        }

        if self.flags.contains(AccessFlags::SET_TAG) {
            let tag = if is_static {
                self.access.tag.static_constant()
            } else {
                self.access.tag.plain_constant()
            };
            let tag = tool.constant(tag);
            if !tool.set_virtual_entry(stores.tags, slot, tag, Kind::Byte) {
                return Err(invariant_error!(
                    tool.current(),
                    self.access,
                    "tag store refused a tag constant"
                ));
            }
        }

        if let Some(primitives) = companion {
            let zero = tool.constant(ConstValue::I64(0));
            if !tool.set_virtual_entry(primitives, slot, zero, Kind::WIDE) {
                trace!(
                    "{}: primitive store refused clearing {}",
                    tool.current(),
                    self.access
                );
            }
        }

        tool.delete()?;
        Ok(Rewrite::Subsumed)
    }
}

impl FrameGet {
    /// Replaces this slot read with the value the virtual frame holds.
    ///
    /// An entry that was never written reads as the default value of the access kind.
    /// Non-static reads bail out unless the slot's tag matches the access tag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvariantViolation`] if an auxiliary slot is read as a primitive
    /// or if the tag and data stores disagree on their entry count.
    pub fn virtualize(&self, tool: &mut dyn VirtualizerTool) -> Result<Rewrite> {
        let Some(layout) = tool.frame_layout(self.access.frame) else {
            return bailout(tool, DeoptReason::FrameNotVirtual);
        };
        let slot = self.access.slot;
        let object = self.kind.stack_kind() == Kind::Object;

        if self.access.access == AccessType::Auxiliary {
            if !object {
                return Err(invariant_error!(
                    tool.current(),
                    self.access,
                    "auxiliary slot read as {}",
                    self.kind
                ));
            }

            let Some(Alias::Virtual(store)) = layout.auxiliary.map(|array| tool.alias(array))
            else {
                return bailout(tool, DeoptReason::FrameNotVirtual);
            };
            let Some(entry) = tool.entry(store, slot) else {
                return bailout(tool, DeoptReason::FrameNotVirtual);
            };

            let value = match entry.value {
                Some(value) => value,
                None => tool.constant(ConstValue::Null),
            };
            tool.replace_with(value)?;
            return Ok(Rewrite::Subsumed);
        }

        let Some(stores) = resolve_local(tool, &layout, self.access, slot, object)? else {
            return bailout(tool, DeoptReason::FrameNotVirtual);
        };

        let is_static = self.flags.contains(AccessFlags::STATIC);
        if !is_static && !self.tag_matches(stores.tags, tool) {
            return bailout(tool, DeoptReason::FrameSlotTypeMismatch);
        }

        let Some(entry) = tool.entry(stores.data, slot) else {
            return bailout(tool, DeoptReason::FrameNotVirtual);
        };

        let value = match entry.value {
            None => match ConstValue::default_for(self.kind) {
                Some(default) => tool.constant(default),
                None => return bailout(tool, DeoptReason::FrameSlotTypeMismatch),
            },
            Some(value) => {
                let stored = tool.stack_kind(value);
                let osr = is_static && tool.is_osr_transfer_target(self.access.frame);
                if stored == self.kind.stack_kind() {
                    value
                } else if osr && stored == Kind::WIDE && self.kind.is_primitive() {
                    osr::narrow(value, self.kind, tool)
                } else {
                    return bailout(tool, DeoptReason::FrameSlotTypeMismatch);
                }
            }
        };

        tool.replace_with(value)?;
        Ok(Rewrite::Subsumed)
    }

    /// Returns `true` if the tag entry of the slot is a constant naming the access tag.
    ///
    /// A slot whose tag was never written holds the `Object` tag.
    fn tag_matches(&self, tags: VirtualId, tool: &dyn VirtualizerTool) -> bool {
        let Some(entry) = tool.entry(tags, self.access.slot) else {
            return false;
        };
        let tag = match entry.value {
            None => FrameTag::Object.plain_constant(),
            Some(node) => match tool.constant_value(node) {
                Some(value) => value,
                None => return false,
            },
        };
        self.access.tag.matches(&tag)
    }
}

impl FrameClear {
    /// Invalidates the slot in the virtual frame.
    ///
    /// The tag becomes `Illegal`, the object entry `null` and the primitive entry `0`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvariantViolation`] for auxiliary accesses, which have no tag to
    /// invalidate, or if the stores disagree on their entry count.
    pub fn virtualize(&self, tool: &mut dyn VirtualizerTool) -> Result<Rewrite> {
        if self.access.access == AccessType::Auxiliary {
            return Err(invariant_error!(
                tool.current(),
                self.access,
                "auxiliary slots cannot be cleared"
            ));
        }
        let Some(layout) = tool.frame_layout(self.access.frame) else {
            return bailout(tool, DeoptReason::FrameNotVirtual);
        };
        let slot = self.access.slot;

        let Some(objects) = resolve_local(tool, &layout, self.access, slot, true)? else {
            return bailout(tool, DeoptReason::FrameNotVirtual);
        };
        let Some(primitives) = resolve_local(tool, &layout, self.access, slot, false)? else {
            return bailout(tool, DeoptReason::FrameNotVirtual);
        };

        let illegal = tool.constant(FrameTag::Illegal.plain_constant());
        let null = tool.constant(ConstValue::Null);
        let zero = tool.constant(ConstValue::I64(0));
        let written = tool.set_virtual_entry(objects.tags, slot, illegal, Kind::Byte)
            && tool.set_virtual_entry(objects.data, slot, null, Kind::Object)
            && tool.set_virtual_entry(primitives.data, slot, zero, Kind::WIDE);
        if !written {
            return Err(invariant_error!(
                tool.current(),
                self.access,
                "virtual store refused a clear"
            ));
        }

        tool.delete()?;
        Ok(Rewrite::Subsumed)
    }
}
