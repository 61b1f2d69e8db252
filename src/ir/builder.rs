//! Builder for programmatic graph construction.
//!
//! Fixed nodes are appended in the order the builder methods are called, so the call sequence
//! reads like the program:
//!
//! ```rust
//! use framevirt::ir::{AccessFlags, AccessType, FrameTag, GraphBuilder};
//!
//! let (graph, frame) = GraphBuilder::new("example").build_with(|b| {
//!     let frame = b.new_frame(4);
//!     let seven = b.const_i32(7);
//!     b.frame_set(frame, 2, FrameTag::Int, seven, AccessType::Local, AccessFlags::SET_TAG);
//!     b.ret(None);
//!     frame
//! });
//! assert!(graph.frame_layout(frame).is_some());
//! ```

use crate::ir::{
    AccessFlags, AccessType, ConstValue, FrameAccess, FrameClear, FrameGet, FrameLayout,
    FrameSet, FrameTag, Graph, Kind, NodeId, NodeKind,
};

/// Shape of a frame allocation created by [`GraphBuilder::frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    /// Number of tagged local slots.
    pub locals: usize,
    /// Number of auxiliary slots, `0` for none.
    pub auxiliary: usize,
    /// The frame is an OSR transfer target.
    pub osr_transfer_target: bool,
}

impl FrameShape {
    /// A frame with `locals` tagged slots, no auxiliary slots, not an OSR target.
    #[must_use]
    pub const fn locals(locals: usize) -> Self {
        Self {
            locals,
            auxiliary: 0,
            osr_transfer_target: false,
        }
    }

    /// Adds `count` auxiliary slots.
    #[must_use]
    pub const fn with_auxiliary(mut self, count: usize) -> Self {
        self.auxiliary = count;
        self
    }

    /// Marks the frame as an OSR transfer target.
    #[must_use]
    pub const fn osr(mut self) -> Self {
        self.osr_transfer_target = true;
        self
    }
}

/// Fluent constructor for [`Graph`]s.
#[derive(Debug)]
pub struct GraphBuilder {
    graph: Graph,
    next_param: u32,
}

impl GraphBuilder {
    /// Creates a builder for a unit named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: Graph::new(name),
            next_param: 0,
        }
    }

    /// Runs `f` against the builder and returns the graph along with `f`'s result.
    pub fn build_with<R, F>(mut self, f: F) -> (Graph, R)
    where
        F: FnOnce(&mut Self) -> R,
    {
        let result = f(&mut self);
        (self.graph, result)
    }

    /// Consumes the builder and returns the graph.
    #[must_use]
    pub fn finish(self) -> Graph {
        self.graph
    }

    /// Returns the graph under construction.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Adds an arbitrary node.
    pub fn node(&mut self, kind: NodeKind) -> NodeId {
        self.graph.add(kind)
    }

    /// Adds a constant.
    pub fn constant(&mut self, value: ConstValue) -> NodeId {
        self.graph.constant(value)
    }

    /// Adds an `int` constant.
    pub fn const_i32(&mut self, value: i32) -> NodeId {
        self.constant(ConstValue::I32(value))
    }

    /// Adds a `long` constant.
    pub fn const_i64(&mut self, value: i64) -> NodeId {
        self.constant(ConstValue::I64(value))
    }

    /// Adds a `float` constant.
    pub fn const_f32(&mut self, value: f32) -> NodeId {
        self.constant(ConstValue::F32(value))
    }

    /// Adds a `double` constant.
    pub fn const_f64(&mut self, value: f64) -> NodeId {
        self.constant(ConstValue::F64(value))
    }

    /// Adds the null constant.
    pub fn null(&mut self) -> NodeId {
        self.constant(ConstValue::Null)
    }

    /// Adds the next parameter with the given kind.
    pub fn param(&mut self, kind: Kind) -> NodeId {
        let index = self.next_param;
        self.next_param += 1;
        self.graph.add(NodeKind::Parameter { index, kind })
    }

    /// Adds a fixed-length array allocation.
    pub fn new_array(&mut self, element: Kind, length: usize) -> NodeId {
        self.graph.add(NodeKind::NewArray { element, length })
    }

    /// Adds a frame with `locals` tagged slots and no auxiliary slots.
    pub fn new_frame(&mut self, locals: usize) -> NodeId {
        self.frame(FrameShape::locals(locals))
    }

    /// Adds a frame allocation together with its backing stores.
    pub fn frame(&mut self, shape: FrameShape) -> NodeId {
        let tags = self.new_array(Kind::Byte, shape.locals);
        let objects = self.new_array(Kind::Object, shape.locals);
        let primitives = self.new_array(Kind::Long, shape.locals);
        let auxiliary =
            (shape.auxiliary > 0).then(|| self.new_array(Kind::Object, shape.auxiliary));

        self.graph.add(NodeKind::NewFrame(FrameLayout {
            tags,
            objects,
            primitives,
            auxiliary,
            osr_transfer_target: shape.osr_transfer_target,
        }))
    }

    /// Adds a frame slot write.
    pub fn frame_set(
        &mut self,
        frame: NodeId,
        slot: usize,
        tag: FrameTag,
        value: NodeId,
        access: AccessType,
        flags: AccessFlags,
    ) -> NodeId {
        self.graph.add(NodeKind::FrameSet(FrameSet {
            access: FrameAccess::new(frame, slot, tag, access),
            value,
            flags,
        }))
    }

    /// Adds a frame slot read producing `kind`.
    pub fn frame_get(
        &mut self,
        frame: NodeId,
        slot: usize,
        kind: Kind,
        access: AccessType,
        flags: AccessFlags,
    ) -> NodeId {
        self.graph.add(NodeKind::FrameGet(FrameGet {
            access: FrameAccess::new(frame, slot, FrameTag::for_kind(kind), access),
            kind,
            flags,
        }))
    }

    /// Adds a frame slot clear.
    pub fn frame_clear(&mut self, frame: NodeId, slot: usize) -> NodeId {
        self.graph.add(NodeKind::FrameClear(FrameClear {
            access: FrameAccess::new(frame, slot, FrameTag::Illegal, AccessType::Local),
        }))
    }

    /// Adds a value anchor.
    pub fn anchor(&mut self) -> NodeId {
        self.graph.add(NodeKind::ValueAnchor)
    }

    /// Pins `value` below `anchor`.
    pub fn pi(&mut self, value: NodeId, anchor: NodeId) -> NodeId {
        self.graph.add(NodeKind::Pi { value, anchor })
    }

    /// Adds an opaque use of `value`.
    pub fn escape(&mut self, value: NodeId) -> NodeId {
        self.graph.add(NodeKind::Escape { value })
    }

    /// Adds a return.
    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        self.graph.add(NodeKind::Return { value })
    }
}
