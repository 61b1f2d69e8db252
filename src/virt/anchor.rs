//! Value anchors.
//!
//! A value anchor is a fixed node that produces no value. Other nodes (typically `Pi` nodes)
//! take it as an input to stay scheduled below its position. Anchors are identity nodes: two
//! anchors are never interchangeable, so value numbering must leave them alone, while
//! duplicating one is an ordinary graph clone.
//!
//! # Lifecycle
//!
//! ```text
//! Live ──last dependent removed──► Unreferenced ──canonicalizer / virtualization──► Removed
//! ```
//!
//! The canonicalizer only removes an anchor once every consumer of the graph reports that its
//! usages are fully visible. During partial analyses a new dependent may still be attached, and
//! removing the anchor early would unpin it.

use crate::{
    ir::{Graph, NodeId, NodeKind},
    virt::tool::VirtualizerTool,
    Result,
};

/// Outcome of [`simplify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorSimplification {
    /// The anchor must stay.
    Unchanged,
    /// The anchor can be deleted.
    Removable,
}

/// Where an anchor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorState {
    /// At least one node depends on the anchor.
    Live,
    /// No node depends on the anchor, it is still in the graph.
    Unreferenced,
    /// The anchor has been deleted.
    Removed,
}

fn is_anchor(graph: &Graph, node: NodeId) -> bool {
    matches!(graph.node(node), Some(NodeKind::ValueAnchor))
}

/// Decides whether `anchor` can be removed.
///
/// An anchor is removable iff `all_usages_available` holds and it has no usages. The function
/// only inspects the graph, so repeated calls return the same answer until the graph changes.
/// Nodes that are not live anchors are always `Unchanged`.
#[must_use]
pub fn simplify(graph: &Graph, anchor: NodeId, all_usages_available: bool) -> AnchorSimplification {
    if all_usages_available && is_anchor(graph, anchor) && !graph.has_usages(anchor) {
        AnchorSimplification::Removable
    } else {
        AnchorSimplification::Unchanged
    }
}

/// Returns the lifecycle state of `anchor`.
///
/// A node that is no longer in the graph is `Removed`.
#[must_use]
pub fn state(graph: &Graph, anchor: NodeId) -> AnchorState {
    if !is_anchor(graph, anchor) {
        AnchorState::Removed
    } else if graph.has_usages(anchor) {
        AnchorState::Live
    } else {
        AnchorState::Unreferenced
    }
}

/// Virtualization rule for the anchor at the tool's current node.
///
/// An anchor without dependents owns no state and is deleted. Returns `true` if it was.
///
/// # Errors
///
/// Returns an error if the graph refuses the deletion.
pub fn virtualize(tool: &mut dyn VirtualizerTool) -> Result<bool> {
    if tool.has_usages(tool.current()) {
        return Ok(false);
    }
    tool.delete()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{GraphBuilder, Kind},
        virt::{state::VirtualState, tool::GraphVirtualizer},
    };

    #[test]
    fn test_simplify_is_idempotent() {
        let mut b = GraphBuilder::new("t");
        let anchor = b.anchor();
        let graph = b.finish();

        let first = simplify(&graph, anchor, true);
        let snapshot = graph.to_string();
        let second = simplify(&graph, anchor, true);

        assert_eq!(first, AnchorSimplification::Removable);
        assert_eq!(second, AnchorSimplification::Removable);
        assert_eq!(graph.to_string(), snapshot);
    }

    #[test]
    fn test_simplify_requires_full_visibility() {
        let mut b = GraphBuilder::new("t");
        let anchor = b.anchor();
        let graph = b.finish();

        assert_eq!(
            simplify(&graph, anchor, false),
            AnchorSimplification::Unchanged
        );
    }

    #[test]
    fn test_lifecycle() {
        let mut b = GraphBuilder::new("t");
        let p = b.param(Kind::Object);
        let anchor = b.anchor();
        let pi = b.pi(p, anchor);
        let mut graph = b.finish();

        assert_eq!(state(&graph, anchor), AnchorState::Live);
        assert_eq!(
            simplify(&graph, anchor, true),
            AnchorSimplification::Unchanged
        );

        graph.remove(pi).unwrap();
        assert_eq!(state(&graph, anchor), AnchorState::Unreferenced);

        graph.remove(anchor).unwrap();
        assert_eq!(state(&graph, anchor), AnchorState::Removed);
        assert_eq!(
            simplify(&graph, anchor, true),
            AnchorSimplification::Unchanged
        );
    }

    #[test]
    fn test_virtualize_deletes_only_unreferenced() {
        let mut b = GraphBuilder::new("t");
        let p = b.param(Kind::Object);
        let pinned = b.anchor();
        b.pi(p, pinned);
        let free = b.anchor();
        let mut graph = b.finish();
        let mut state = VirtualState::new();

        let mut tool = GraphVirtualizer::new(&mut graph, &mut state);
        tool.set_current(pinned);
        assert!(!virtualize(&mut tool).unwrap());
        tool.set_current(free);
        assert!(virtualize(&mut tool).unwrap());

        assert!(graph.is_alive(pinned));
        assert!(!graph.is_alive(free));
    }

    #[test]
    fn test_duplicated_anchor_is_distinct() {
        let mut b = GraphBuilder::new("t");
        let anchor = b.anchor();
        let mut graph = b.finish();

        let copy = graph.duplicate(anchor).unwrap();
        assert_ne!(copy, anchor);
        assert_eq!(graph.control(), &[anchor, copy]);
        assert_eq!(state(&graph, copy), AnchorState::Unreferenced);
    }
}
