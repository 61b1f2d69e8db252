//! The interface the rewrite rules use to observe and mutate the graph.
//!
//! Rewrite rules never touch a [`Graph`] directly. They go through a [`VirtualizerTool`], which
//! bundles alias resolution, virtual entry access, node creation and the bailout trigger. The
//! rules are written against the trait so they can be driven by any pass; [`GraphVirtualizer`]
//! is the implementation used by [`PartialEscapePass`](crate::compiler::PartialEscapePass).
//!
//! # Rewrite Protocol
//!
//! The pass points the tool at one fixed node with [`GraphVirtualizer::set_current`] and hands it
//! to that node's rule. The rule then:
//!
//! 1. Resolves every alias it needs (read-only phase)
//! 2. Validates preconditions
//! 3. Writes virtual entries, then either deletes/replaces the current node or calls
//!    [`VirtualizerTool::insert_deoptimization`]

use crate::{
    ir::{ConstValue, DeoptReason, FrameLayout, Graph, Kind, NodeId, NodeKind},
    virt::state::{Alias, VirtualEntry, VirtualId, VirtualState},
    Result,
};

/// Services consumed by the virtualization rewrite rules.
pub trait VirtualizerTool {
    /// The node currently being rewritten.
    fn current(&self) -> NodeId;

    /// Resolves `value` to a virtual object or a materialized value.
    fn alias(&self, value: NodeId) -> Alias;

    /// Returns the number of entries of a virtual object, `0` if unknown.
    fn entry_count(&self, object: VirtualId) -> usize;

    /// Returns an entry of a virtual object.
    fn entry(&self, object: VirtualId, index: usize) -> Option<VirtualEntry>;

    /// Writes an entry of a virtual object. Returns `false` if the store was refused.
    fn set_virtual_entry(&mut self, object: VirtualId, index: usize, value: NodeId, kind: Kind)
        -> bool;

    /// Returns the stack kind of the value produced by `value`.
    fn stack_kind(&self, value: NodeId) -> Kind;

    /// Returns `true` if `frame` is the target of an OSR transfer.
    fn is_osr_transfer_target(&self, frame: NodeId) -> bool;

    /// Returns the backing stores of `frame`, `None` if it is not a frame allocation.
    fn frame_layout(&self, frame: NodeId) -> Option<FrameLayout>;

    /// Returns the constant carried by `node`, if it is a constant.
    fn constant_value(&self, node: NodeId) -> Option<ConstValue>;

    /// Adds a floating node, folding it to a constant where possible.
    fn add_node(&mut self, kind: NodeKind) -> NodeId;

    /// Adds a constant.
    fn constant(&mut self, value: ConstValue) -> NodeId;

    /// Returns `true` if `node` has any usages.
    fn has_usages(&self, node: NodeId) -> bool;

    /// Deletes the current node.
    ///
    /// # Errors
    ///
    /// Returns an error if the current node still has usages.
    fn delete(&mut self) -> Result<()>;

    /// Redirects all usages of the current node to `value`, then deletes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the current node cannot be removed.
    fn replace_with(&mut self, value: NodeId) -> Result<()>;

    /// Gives up virtualization at the current node.
    ///
    /// Every still-virtual object is materialized and a deoptimization is placed before the
    /// current node. The current node stays in the graph unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph cannot be updated.
    fn insert_deoptimization(&mut self, reason: DeoptReason) -> Result<()>;
}

/// [`VirtualizerTool`] over a [`Graph`] and a [`VirtualState`].
///
/// Besides forwarding to the graph and state, the tool records what happened to the current node
/// so that the pass can report it: whether it was deleted, which deoptimization was inserted and
/// which allocations were materialized.
#[derive(Debug)]
pub struct GraphVirtualizer<'a> {
    graph: &'a mut Graph,
    state: &'a mut VirtualState,
    current: NodeId,
    deleted: bool,
    deoptimized: Option<DeoptReason>,
    materialized: Vec<NodeId>,
}

impl<'a> GraphVirtualizer<'a> {
    /// Creates a tool over `graph` and `state`.
    pub fn new(graph: &'a mut Graph, state: &'a mut VirtualState) -> Self {
        Self {
            graph,
            state,
            current: NodeId::new(0),
            deleted: false,
            deoptimized: None,
            materialized: Vec::new(),
        }
    }

    /// Points the tool at the next node to rewrite and clears the per-node records.
    pub fn set_current(&mut self, node: NodeId) {
        self.current = node;
        self.deleted = false;
        self.deoptimized = None;
    }

    /// Returns the graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// Returns the virtual state.
    #[must_use]
    pub fn state(&self) -> &VirtualState {
        self.state
    }

    /// Returns `true` if the current node was deleted or replaced.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Returns the deoptimization inserted at the current node, if any.
    #[must_use]
    pub fn deoptimized(&self) -> Option<DeoptReason> {
        self.deoptimized
    }

    /// Returns and clears the allocations materialized since the last call.
    pub fn take_materialized(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.materialized)
    }

    /// Materializes a virtual object right before the current node.
    ///
    /// Virtual objects and frames stored in its entries are materialized first. Returns the
    /// `CommitAllocation` node, or `None` if the object was already materialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the current node is not part of the control sequence.
    pub fn materialize(&mut self, object: VirtualId) -> Result<Option<NodeId>> {
        let Some(allocation) = self.state.object(object).map(|o| o.allocation()) else {
            return Ok(None);
        };
        let Some(entries) = self.state.materialize(object) else {
            return Ok(None);
        };

        for value in entries.iter().flatten() {
            self.materialize_value(*value)?;
        }

        let commit = self.graph.add_before(
            self.current,
            NodeKind::CommitAllocation {
                object: allocation,
                entries,
            },
        )?;
        self.materialized.push(allocation);
        Ok(Some(commit))
    }

    /// Materializes the object `value` resolves to, if it is virtual.
    ///
    /// Frame descriptors materialize all of their backing stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph cannot be updated.
    pub fn materialize_value(&mut self, value: NodeId) -> Result<usize> {
        if let Some(layout) = self.frame_layout(value) {
            let mut count = 0;
            for store in layout.arrays() {
                count += self.materialize_value(store)?;
            }
            return Ok(count);
        }

        match self.state.resolve(self.graph, value) {
            Alias::Virtual(object) => Ok(usize::from(self.materialize(object)?.is_some())),
            Alias::Materialized(_) => Ok(0),
        }
    }

    /// Materializes every still-virtual object.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph cannot be updated.
    pub fn materialize_all(&mut self) -> Result<usize> {
        let live: Vec<VirtualId> = self.state.live_objects().map(|o| o.id()).collect();
        let mut count = 0;
        for object in live {
            if self.materialize(object)?.is_some() {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl VirtualizerTool for GraphVirtualizer<'_> {
    fn current(&self) -> NodeId {
        self.current
    }

    fn alias(&self, value: NodeId) -> Alias {
        self.state.resolve(self.graph, value)
    }

    fn entry_count(&self, object: VirtualId) -> usize {
        self.state.object(object).map_or(0, |o| o.entry_count())
    }

    fn entry(&self, object: VirtualId, index: usize) -> Option<VirtualEntry> {
        self.state.object(object)?.entry(index).copied()
    }

    fn set_virtual_entry(
        &mut self,
        object: VirtualId,
        index: usize,
        value: NodeId,
        kind: Kind,
    ) -> bool {
        self.state.set_entry(object, index, value, kind)
    }

    fn stack_kind(&self, value: NodeId) -> Kind {
        self.graph.stack_kind(value)
    }

    fn is_osr_transfer_target(&self, frame: NodeId) -> bool {
        self.frame_layout(frame)
            .is_some_and(|layout| layout.osr_transfer_target)
    }

    fn frame_layout(&self, frame: NodeId) -> Option<FrameLayout> {
        match self.graph.node(frame)? {
            NodeKind::NewFrame(layout) => Some(*layout),
            NodeKind::Pi { value, .. } => self.frame_layout(*value),
            _ => None,
        }
    }

    fn constant_value(&self, node: NodeId) -> Option<ConstValue> {
        self.graph.constant_value(node)
    }

    fn add_node(&mut self, kind: NodeKind) -> NodeId {
        self.graph.add_canonical(kind)
    }

    fn constant(&mut self, value: ConstValue) -> NodeId {
        self.graph.constant(value)
    }

    fn has_usages(&self, node: NodeId) -> bool {
        self.graph.has_usages(node)
    }

    fn delete(&mut self) -> Result<()> {
        self.graph.remove(self.current)?;
        self.deleted = true;
        Ok(())
    }

    fn replace_with(&mut self, value: NodeId) -> Result<()> {
        self.graph.replace_at_usages(self.current, value);
        self.delete()
    }

    fn insert_deoptimization(&mut self, reason: DeoptReason) -> Result<()> {
        self.materialize_all()?;
        self.graph
            .add_before(self.current, NodeKind::Deoptimize { reason })?;
        self.deoptimized = Some(reason);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ir::GraphBuilder, test::virtualize_frame};

    #[test]
    fn test_materialize_inserts_commit_before_current() {
        let mut b = GraphBuilder::new("t");
        let array = b.new_array(Kind::Long, 2);
        let value = b.const_i64(3);
        let escape = b.escape(array);
        let mut graph = b.finish();

        let mut state = VirtualState::new();
        let object = state.add_virtual(array, Kind::Long, 2);
        state.set_entry(object, 1, value, Kind::Long);

        let mut tool = GraphVirtualizer::new(&mut graph, &mut state);
        tool.set_current(escape);
        let commit = tool.materialize(object).unwrap().unwrap();
        assert_eq!(tool.take_materialized(), vec![array]);
        assert!(tool.materialize(object).unwrap().is_none());

        let control = graph.control();
        let commit_pos = control.iter().position(|&n| n == commit).unwrap();
        let escape_pos = control.iter().position(|&n| n == escape).unwrap();
        assert_eq!(commit_pos + 1, escape_pos);
        assert_eq!(
            graph.node(commit),
            Some(&NodeKind::CommitAllocation {
                object: array,
                entries: vec![None, Some(value)],
            })
        );
    }

    #[test]
    fn test_materialize_nested_objects_first() {
        let mut b = GraphBuilder::new("t");
        let outer = b.new_array(Kind::Object, 1);
        let inner = b.new_array(Kind::Long, 1);
        let escape = b.escape(outer);
        let mut graph = b.finish();

        let mut state = VirtualState::new();
        let outer_id = state.add_virtual(outer, Kind::Object, 1);
        state.add_virtual(inner, Kind::Long, 1);
        state.set_entry(outer_id, 0, inner, Kind::Object);

        let mut tool = GraphVirtualizer::new(&mut graph, &mut state);
        tool.set_current(escape);
        tool.materialize(outer_id).unwrap();
        assert_eq!(tool.take_materialized(), vec![inner, outer]);
        assert_eq!(state.live_objects().count(), 0);
    }

    #[test]
    fn test_materialize_frame_stored_in_entry() {
        let mut b = GraphBuilder::new("t");
        let inner = b.new_frame(1);
        let outer = b.new_frame(1);
        let value = b.const_i64(42);
        let escape = b.escape(outer);
        let mut graph = b.finish();
        let inner_layout = *graph.frame_layout(inner).unwrap();
        let outer_layout = *graph.frame_layout(outer).unwrap();

        let mut state = VirtualState::new();
        virtualize_frame(&graph, &mut state, inner);
        virtualize_frame(&graph, &mut state, outer);
        let inner_primitives = state.object_for(inner_layout.primitives).unwrap().id();
        let outer_objects = state.object_for(outer_layout.objects).unwrap().id();
        assert!(state.set_entry(inner_primitives, 0, value, Kind::Long));
        assert!(state.set_entry(outer_objects, 0, inner, Kind::Object));

        let mut tool = GraphVirtualizer::new(&mut graph, &mut state);
        tool.set_current(escape);
        tool.materialize_value(outer).unwrap();

        let materialized = tool.take_materialized();
        assert_eq!(materialized.len(), 6);
        for array in inner_layout.arrays().chain(outer_layout.arrays()) {
            assert!(materialized.contains(&array), "{array} was not committed");
        }
        assert_eq!(state.live_objects().count(), 0);
        let committed = graph.find(|k| {
            matches!(k, NodeKind::CommitAllocation { object, entries }
                if *object == inner_layout.primitives && entries == &vec![Some(value)])
        });
        assert_eq!(committed.len(), 1);
    }

    #[test]
    fn test_deoptimization_keeps_current_node() {
        let mut b = GraphBuilder::new("t");
        let array = b.new_array(Kind::Object, 1);
        let escape = b.escape(array);
        let mut graph = b.finish();

        let mut state = VirtualState::new();
        state.add_virtual(array, Kind::Object, 1);

        let mut tool = GraphVirtualizer::new(&mut graph, &mut state);
        tool.set_current(escape);
        tool.insert_deoptimization(DeoptReason::FrameNotVirtual)
            .unwrap();
        assert_eq!(tool.deoptimized(), Some(DeoptReason::FrameNotVirtual));
        assert!(!tool.is_deleted());

        assert!(graph.is_alive(escape));
        let kinds: Vec<_> = graph
            .control()
            .iter()
            .filter_map(|&n| graph.node(n))
            .map(NodeKind::mnemonic)
            .collect();
        assert_eq!(kinds, vec!["newarray", "commit", "deopt", "escape"]);
    }

    #[test]
    fn test_frame_layout_through_pi() {
        let mut b = GraphBuilder::new("t");
        let frame = b.new_frame(2);
        let anchor = b.anchor();
        let pinned = b.pi(frame, anchor);
        let mut graph = b.finish();
        let mut state = VirtualState::new();

        let tool = GraphVirtualizer::new(&mut graph, &mut state);
        assert!(tool.frame_layout(pinned).is_some());
        assert!(tool.frame_layout(anchor).is_none());
        assert!(!tool.is_osr_transfer_target(pinned));
    }
}
