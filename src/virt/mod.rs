//! Escape-analysis virtualization of frames.
//!
//! This module holds the rewrite rules that replace frame allocations by compiler-tracked
//! entries, and the model those rules operate on.
//!
//! # Key Components
//!
//! - [`VirtualState`] - Virtual objects and alias resolution
//! - [`VirtualizerTool`] / [`GraphVirtualizer`] - Services the rules consume
//! - [`FrameSet::virtualize`](crate::ir::FrameSet::virtualize) - Slot write rule
//! - [`FrameGet::virtualize`](crate::ir::FrameGet::virtualize) and
//!   [`FrameClear::virtualize`](crate::ir::FrameClear::virtualize) - Slot read and clear rules
//! - [`osr`] - 64-bit normalization for static OSR accesses
//! - [`anchor`] - Value anchor simplification
//!
//! # Example
//!
//! ```rust
//! use framevirt::ir::{AccessFlags, AccessType, FrameTag, GraphBuilder, Kind, NodeKind};
//! use framevirt::virt::{GraphVirtualizer, Rewrite, VirtualState};
//!
//! let mut b = GraphBuilder::new("example");
//! let frame = b.new_frame(4);
//! let seven = b.const_i32(7);
//! let set = b.frame_set(frame, 2, FrameTag::Int, seven, AccessType::Local, AccessFlags::SET_TAG);
//! let mut graph = b.finish();
//!
//! let mut state = VirtualState::new();
//! let layout = *graph.frame_layout(frame).unwrap();
//! state.add_virtual(layout.tags, Kind::Byte, 4);
//! state.add_virtual(layout.primitives, Kind::Long, 4);
//!
//! let Some(NodeKind::FrameSet(write)) = graph.node(set).cloned() else { unreachable!() };
//! let mut tool = GraphVirtualizer::new(&mut graph, &mut state);
//! tool.set_current(set);
//! assert_eq!(write.virtualize(&mut tool)?, Rewrite::Subsumed);
//! # Ok::<(), framevirt::Error>(())
//! ```

pub mod anchor;
mod frame;
pub mod osr;
mod state;
mod tool;

pub use anchor::{AnchorSimplification, AnchorState};
pub use state::{Alias, VirtualEntry, VirtualId, VirtualObject, VirtualState};
pub use tool::{GraphVirtualizer, VirtualizerTool};

/// Outcome of a virtualization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rewrite {
    /// The access was folded into the virtual model and its node removed.
    Subsumed,
    /// Virtualization was abandoned here and a deoptimization inserted; the node stays.
    Bailout,
}
