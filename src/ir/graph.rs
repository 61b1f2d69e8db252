//! Arena-backed IR graph.
//!
//! A [`Graph`] owns the nodes of one compilation unit. It maintains:
//!
//! - the node arena (removed nodes leave a tombstone, IDs are never reused)
//! - use lists, derived from [`NodeKind::inputs`] and kept in sync on every mutation
//! - the control sequence: the program order of fixed nodes
//!
//! A graph is mutated by exactly one pass at a time; the scheduler moves whole graphs between
//! worker threads, so the type needs no interior synchronization.

use std::fmt;

use crate::{
    ir::{ConstValue, FrameLayout, Kind, NodeId, NodeKind},
    Result,
};

/// The IR of a single compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Name of the compilation unit, used in diagnostics.
    name: String,
    /// Node arena, `None` marks a removed node.
    nodes: Vec<Option<NodeKind>>,
    /// Users of each node; a user appears once per input edge.
    usages: Vec<Vec<NodeId>>,
    /// Fixed nodes in program order.
    control: Vec<NodeId>,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the name of the compilation unit.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allocates a node and registers its input edges.
    fn allocate(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        for input in kind.inputs() {
            self.usages[input.index()].push(id);
        }
        self.nodes.push(Some(kind));
        self.usages.push(Vec::new());
        id
    }

    /// Adds a node. Fixed nodes are appended to the end of the control sequence.
    ///
    /// # Panics
    ///
    /// Panics if an input of `kind` does not name a node of this graph.
    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let fixed = kind.is_fixed();
        let id = self.allocate(kind);
        if fixed {
            self.control.push(id);
        }
        id
    }

    /// Adds a node, inserting it right before `position` if it is fixed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if `position` is not in the control sequence.
    pub fn add_before(&mut self, position: NodeId, kind: NodeKind) -> Result<NodeId> {
        let index = self.control_index(position)?;
        let fixed = kind.is_fixed();
        let id = self.allocate(kind);
        if fixed {
            self.control.insert(index, id);
        }
        Ok(id)
    }

    /// Adds a node, inserting it right after `position` if it is fixed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if `position` is not in the control sequence.
    pub fn add_after(&mut self, position: NodeId, kind: NodeKind) -> Result<NodeId> {
        let index = self.control_index(position)?;
        let fixed = kind.is_fixed();
        let id = self.allocate(kind);
        if fixed {
            self.control.insert(index + 1, id);
        }
        Ok(id)
    }

    /// Adds a node after folding it to a constant if all of its inputs are constants.
    pub fn add_canonical(&mut self, kind: NodeKind) -> NodeId {
        match self.fold_constant(&kind) {
            Some(value) => self.constant(value),
            None => self.add(kind),
        }
    }

    /// Adds a constant node.
    pub fn constant(&mut self, value: ConstValue) -> NodeId {
        self.add(NodeKind::Constant(value))
    }

    /// Evaluates a conversion node whose input is a constant.
    #[must_use]
    pub fn fold_constant(&self, kind: &NodeKind) -> Option<ConstValue> {
        match kind {
            NodeKind::Reinterpret { to, value } => self.constant_value(*value)?.reinterpret(*to),
            NodeKind::ZeroExtend { value, result_bits } => {
                self.constant_value(*value)?.zero_extend(*result_bits)
            }
            NodeKind::Narrow { value, result_bits } => {
                self.constant_value(*value)?.narrow(*result_bits)
            }
            _ => None,
        }
    }

    fn control_index(&self, position: NodeId) -> Result<usize> {
        self.control
            .iter()
            .position(|&n| n == position)
            .ok_or_else(|| graph_error!("{} is not part of the control sequence", position))
    }

    /// Returns the node with the given ID, `None` if it was removed or never existed.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    /// Returns `true` if the node exists and has not been removed.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Returns the users of a node, once per input edge.
    #[must_use]
    pub fn usages(&self, id: NodeId) -> &[NodeId] {
        self.usages.get(id.index()).map_or(&[], Vec::as_slice)
    }

    /// Returns `true` if any live node uses `id`.
    #[must_use]
    pub fn has_usages(&self, id: NodeId) -> bool {
        !self.usages(id).is_empty()
    }

    /// Returns the fixed nodes in program order.
    #[must_use]
    pub fn control(&self) -> &[NodeId] {
        &self.control
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Iterates over live nodes in ID order.
    pub fn live_nodes(&self) -> impl Iterator<Item = (NodeId, &NodeKind)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|kind| (NodeId::new(i), kind)))
    }

    /// Returns the IDs of live nodes for which `predicate` holds.
    pub fn find<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&NodeKind) -> bool,
    {
        self.live_nodes()
            .filter(|(_, kind)| predicate(kind))
            .map(|(id, _)| id)
            .collect()
    }

    /// Returns the constant carried by `id`, if it is a constant node.
    #[must_use]
    pub fn constant_value(&self, id: NodeId) -> Option<ConstValue> {
        match self.node(id) {
            Some(NodeKind::Constant(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the layout of a frame allocation node.
    #[must_use]
    pub fn frame_layout(&self, id: NodeId) -> Option<&FrameLayout> {
        match self.node(id) {
            Some(NodeKind::NewFrame(layout)) => Some(layout),
            _ => None,
        }
    }

    /// Returns the stack kind of the value produced by `id`.
    ///
    /// Nodes without a value report `Void`; removed nodes report `Illegal`.
    #[must_use]
    pub fn stack_kind(&self, id: NodeId) -> Kind {
        let Some(kind) = self.node(id) else {
            return Kind::Illegal;
        };

        match kind {
            NodeKind::Constant(value) => value.stack_kind(),
            NodeKind::Parameter { kind, .. } => kind.stack_kind(),
            NodeKind::NewArray { .. } | NodeKind::NewFrame(_) => Kind::Object,
            NodeKind::FrameGet(get) => get.kind.stack_kind(),
            NodeKind::Pi { value, .. } => self.stack_kind(*value),
            NodeKind::Reinterpret { to, .. } => to.stack_kind(),
            NodeKind::ZeroExtend { result_bits, .. } | NodeKind::Narrow { result_bits, .. } => {
                Kind::integer_for_bits(*result_bits)
            }
            NodeKind::FrameSet(_)
            | NodeKind::FrameClear(_)
            | NodeKind::ValueAnchor
            | NodeKind::CommitAllocation { .. }
            | NodeKind::Deoptimize { .. }
            | NodeKind::Escape { .. }
            | NodeKind::Return { .. } => Kind::Void,
        }
    }

    /// Redirects every usage of `old` to `new`.
    ///
    /// # Returns
    ///
    /// The number of input edges that were redirected.
    pub fn replace_at_usages(&mut self, old: NodeId, new: NodeId) -> usize {
        if old == new {
            return 0;
        }

        let mut users = std::mem::take(&mut self.usages[old.index()]);
        users.sort_unstable();
        users.dedup();

        let mut replaced = 0;
        for user in users {
            let Some(kind) = self.nodes[user.index()].as_mut() else {
                continue;
            };
            let edges = kind.replace_input(old, new);
            for _ in 0..edges {
                self.usages[new.index()].push(user);
            }
            replaced += edges;
        }

        replaced
    }

    /// Removes a node that has no remaining usages.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if the node is already removed or still used.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        if !self.is_alive(id) {
            return Err(graph_error!("{} has already been removed", id));
        }
        if self.has_usages(id) {
            return Err(graph_error!(
                "{} still has {} usages",
                id,
                self.usages(id).len()
            ));
        }

        let Some(kind) = self.nodes[id.index()].take() else {
            return Err(graph_error!("{} has already been removed", id));
        };
        for input in kind.inputs() {
            let users = &mut self.usages[input.index()];
            if let Some(pos) = users.iter().position(|&u| u == id) {
                users.swap_remove(pos);
            }
        }
        self.control.retain(|&n| n != id);
        Ok(())
    }

    /// Clones a node. A fixed clone is placed right after the original.
    ///
    /// Duplication is legal for every node, including nodes with identity such as anchors: it
    /// creates a second, distinct instance rather than merging anything.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if `id` is not a live node.
    pub fn duplicate(&mut self, id: NodeId) -> Result<NodeId> {
        let kind = self
            .node(id)
            .cloned()
            .ok_or_else(|| graph_error!("cannot duplicate removed node {}", id))?;
        if kind.is_fixed() {
            self.add_after(id, kind)
        } else {
            Ok(self.add(kind))
        }
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph {} {{", self.name)?;
        for (id, kind) in self.live_nodes().filter(|(_, k)| !k.is_fixed()) {
            writeln!(f, "  {id} = {kind}")?;
        }
        for &id in &self.control {
            if let Some(kind) = self.node(id) {
                writeln!(f, "  {id}: {kind}")?;
            }
        }
        write!(f, "}}")
    }
}
