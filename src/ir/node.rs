//! IR node identifiers and node kinds.
//!
//! The IR is a sea-of-nodes style graph: every node is a [`NodeKind`] stored in a
//! [`Graph`](crate::ir::Graph) arena and addressed by a [`NodeId`]. Value inputs are plain
//! `NodeId` fields of the kind; the graph derives use/def edges from
//! [`NodeKind::inputs`].
//!
//! Nodes are either *fixed* (they occupy a position in the graph's control sequence and may have
//! side effects) or *floating* (pure values, placed by their inputs).
//!
//! | Category | Kinds |
//! |----------|-------|
//! | Floating values | `Constant`, `Parameter`, `Pi`, `Reinterpret`, `ZeroExtend`, `Narrow` |
//! | Allocations | `NewArray`, `NewFrame` |
//! | Frame accessors | `FrameSet`, `FrameGet`, `FrameClear` |
//! | Structural | `ValueAnchor` |
//! | Effects | `CommitAllocation`, `Deoptimize`, `Escape`, `Return` |

use std::fmt;

use crate::ir::{AccessFlags, ConstValue, FrameAccess, FrameLayout, Kind};

/// A strongly-typed identifier for nodes within an IR graph.
///
/// `NodeId` wraps the node's arena index. IDs are assigned sequentially starting from 0 and are
/// never reused, so a removed node's ID stays dead.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    ///
    /// Normal usage obtains IDs from [`Graph::add`](crate::ir::Graph::add); this constructor
    /// exists for tests and for tables indexed by node.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index value of this node identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    #[inline]
    fn from(node: NodeId) -> Self {
        node.0
    }
}

/// Why a deoptimization was inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeoptReason {
    /// A frame store needed for a slot access is not virtual, or the slot is out of range.
    FrameNotVirtual,
    /// The tag of a slot does not match the kind the read speculated on.
    FrameSlotTypeMismatch,
    /// A virtual entry refused the store.
    EntryRefused,
}

/// Write of a value into a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSet {
    /// Slot being written.
    pub access: FrameAccess,
    /// Value written.
    pub value: NodeId,
    /// Access flags.
    pub flags: AccessFlags,
}

/// Read of a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameGet {
    /// Slot being read.
    pub access: FrameAccess,
    /// Kind the read produces.
    pub kind: Kind,
    /// Access flags.
    pub flags: AccessFlags,
}

/// Invalidation of a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameClear {
    /// Slot being cleared.
    pub access: FrameAccess,
}

/// The operation performed by a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Constant value.
    Constant(ConstValue),
    /// Incoming argument of the compilation unit.
    Parameter {
        /// Argument position.
        index: u32,
        /// Declared kind.
        kind: Kind,
    },
    /// Fixed-length array allocation.
    NewArray {
        /// Element kind.
        element: Kind,
        /// Number of elements.
        length: usize,
    },
    /// Frame allocation, described by its backing stores.
    NewFrame(FrameLayout),
    /// Frame slot write.
    FrameSet(FrameSet),
    /// Frame slot read.
    FrameGet(FrameGet),
    /// Frame slot clear.
    FrameClear(FrameClear),
    /// Zero-sized marker pinning its dependents below this point.
    ValueAnchor,
    /// A value pinned below an anchor.
    Pi {
        /// The pinned value.
        value: NodeId,
        /// The anchor or guard it depends on.
        anchor: NodeId,
    },
    /// Same-width bit reinterpretation.
    Reinterpret {
        /// Target kind.
        to: Kind,
        /// Input value.
        value: NodeId,
    },
    /// Integer zero extension.
    ZeroExtend {
        /// Input value.
        value: NodeId,
        /// Width of the result in bits.
        result_bits: u32,
    },
    /// Integer truncation.
    Narrow {
        /// Input value.
        value: NodeId,
        /// Width of the result in bits.
        result_bits: u32,
    },
    /// Materialization of a formerly virtual allocation with its current contents.
    CommitAllocation {
        /// The allocation being materialized.
        object: NodeId,
        /// Entry values; `None` keeps the default value.
        entries: Vec<Option<NodeId>>,
    },
    /// Transfer to the interpreter.
    Deoptimize {
        /// Why the compiled code gives up here.
        reason: DeoptReason,
    },
    /// Opaque consumer of a value (a call argument, a field store to the heap, ...).
    Escape {
        /// The escaping value.
        value: NodeId,
    },
    /// Return from the compilation unit.
    Return {
        /// Returned value, if any.
        value: Option<NodeId>,
    },
}

impl NodeKind {
    /// Returns the value inputs of this node, in declaration order.
    #[must_use]
    pub fn inputs(&self) -> Vec<NodeId> {
        match self {
            Self::Constant(_)
            | Self::Parameter { .. }
            | Self::NewArray { .. }
            | Self::ValueAnchor
            | Self::Deoptimize { .. } => Vec::new(),
            Self::NewFrame(layout) => layout.arrays().collect(),
            Self::FrameSet(set) => vec![set.access.frame, set.value],
            Self::FrameGet(get) => vec![get.access.frame],
            Self::FrameClear(clear) => vec![clear.access.frame],
            Self::Pi { value, anchor } => vec![*value, *anchor],
            Self::Reinterpret { value, .. }
            | Self::ZeroExtend { value, .. }
            | Self::Narrow { value, .. }
            | Self::Escape { value } => vec![*value],
            Self::CommitAllocation { object, entries } => std::iter::once(*object)
                .chain(entries.iter().flatten().copied())
                .collect(),
            Self::Return { value } => value.iter().copied().collect(),
        }
    }

    /// Replaces every input edge equal to `old` with `new`, returning how many were replaced.
    pub fn replace_input(&mut self, old: NodeId, new: NodeId) -> usize {
        let mut replaced = 0;
        let mut swap = |slot: &mut NodeId| {
            if *slot == old {
                *slot = new;
                replaced += 1;
            }
        };

        match self {
            Self::Constant(_)
            | Self::Parameter { .. }
            | Self::NewArray { .. }
            | Self::ValueAnchor
            | Self::Deoptimize { .. } => {}
            Self::NewFrame(layout) => {
                swap(&mut layout.tags);
                swap(&mut layout.objects);
                swap(&mut layout.primitives);
                if let Some(aux) = layout.auxiliary.as_mut() {
                    swap(aux);
                }
            }
            Self::FrameSet(set) => {
                swap(&mut set.access.frame);
                swap(&mut set.value);
            }
            Self::FrameGet(get) => swap(&mut get.access.frame),
            Self::FrameClear(clear) => swap(&mut clear.access.frame),
            Self::Pi { value, anchor } => {
                swap(value);
                swap(anchor);
            }
            Self::Reinterpret { value, .. }
            | Self::ZeroExtend { value, .. }
            | Self::Narrow { value, .. }
            | Self::Escape { value } => swap(value),
            Self::CommitAllocation { object, entries } => {
                swap(object);
                for entry in entries.iter_mut().flatten() {
                    swap(entry);
                }
            }
            Self::Return { value } => {
                if let Some(value) = value.as_mut() {
                    swap(value);
                }
            }
        }

        replaced
    }

    /// Returns `true` if the node occupies a position in the control sequence.
    #[must_use]
    pub const fn is_fixed(&self) -> bool {
        !matches!(
            self,
            Self::Constant(_)
                | Self::Parameter { .. }
                | Self::Pi { .. }
                | Self::Reinterpret { .. }
                | Self::ZeroExtend { .. }
                | Self::Narrow { .. }
        )
    }

    /// Returns `true` if two structurally equal instances of this node must stay distinct.
    ///
    /// Value numbering only merges nodes without identity. Anchors, allocations and every
    /// effectful node have identity; anchors in particular mark a position, so merging two of
    /// them would move one anchor point.
    #[must_use]
    pub const fn has_identity(&self) -> bool {
        self.is_fixed()
    }

    /// Returns `true` if the node may be deleted once nothing uses it.
    #[must_use]
    pub const fn is_removable_when_unused(&self) -> bool {
        matches!(
            self,
            Self::Constant(_)
                | Self::Pi { .. }
                | Self::Reinterpret { .. }
                | Self::ZeroExtend { .. }
                | Self::Narrow { .. }
                | Self::NewArray { .. }
                | Self::NewFrame(_)
        )
    }

    /// Returns `true` for the frame slot accessors.
    #[must_use]
    pub const fn is_frame_access(&self) -> bool {
        matches!(
            self,
            Self::FrameSet(_) | Self::FrameGet(_) | Self::FrameClear(_)
        )
    }

    /// Returns the short mnemonic used in dumps.
    #[must_use]
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Constant(_) => "const",
            Self::Parameter { .. } => "param",
            Self::NewArray { .. } => "newarray",
            Self::NewFrame(_) => "newframe",
            Self::FrameSet(_) => "frame.set",
            Self::FrameGet(_) => "frame.get",
            Self::FrameClear(_) => "frame.clear",
            Self::ValueAnchor => "anchor",
            Self::Pi { .. } => "pi",
            Self::Reinterpret { .. } => "reinterpret",
            Self::ZeroExtend { .. } => "zext",
            Self::Narrow { .. } => "narrow",
            Self::CommitAllocation { .. } => "commit",
            Self::Deoptimize { .. } => "deopt",
            Self::Escape { .. } => "escape",
            Self::Return { .. } => "return",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "const {value}"),
            Self::Parameter { index, kind } => write!(f, "param {index}: {kind}"),
            Self::NewArray { element, length } => write!(f, "newarray {element}[{length}]"),
            Self::FrameSet(set) => write!(f, "frame.set {} = {}", set.access, set.value),
            Self::FrameGet(get) => write!(f, "frame.get {}: {}", get.access, get.kind),
            Self::FrameClear(clear) => write!(f, "frame.clear {}", clear.access),
            Self::Deoptimize { reason } => write!(f, "deopt {reason:?}"),
            other => {
                f.write_str(other.mnemonic())?;
                for (i, input) in other.inputs().iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{input}")?;
                }
                Ok(())
            }
        }
    }
}
