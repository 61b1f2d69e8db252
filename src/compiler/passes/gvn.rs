//! Global Value Numbering (GVN) pass.
//!
//! This pass merges floating nodes that compute the same value: a node whose kind (operation
//! and inputs) was already seen is replaced at all of its usages by the earlier node.
//!
//! # Example
//!
//! Before:
//! ```text
//! n1 = const 7
//! n2 = const 7          // Redundant
//! n3: return n2
//! ```
//!
//! After:
//! ```text
//! n1 = const 7
//! n3: return n1
//! ```
//!
//! # Identity Nodes
//!
//! Fixed nodes have identity (allocations, frame accessors, anchors, effects) and never take
//! part in numbering. Two structurally identical anchors pin different things and must both
//! survive.

use std::collections::HashMap;

use crate::{
    compiler::{pass::GraphPass, CompilerContext, EventKind, UnitId},
    ir::{Graph, NodeId, NodeKind},
    Result,
};

/// Global Value Numbering pass.
pub struct GlobalValueNumberingPass;

impl Default for GlobalValueNumberingPass {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalValueNumberingPass {
    /// Creates a new GVN pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns `true` if nodes of this kind may be merged with an equal node.
    fn is_numberable(kind: &NodeKind) -> bool {
        !kind.has_identity() && !matches!(kind, NodeKind::Parameter { .. })
    }
}

impl GraphPass for GlobalValueNumberingPass {
    fn name(&self) -> &'static str {
        "global-value-numbering"
    }

    fn description(&self) -> &'static str {
        "Merges floating nodes that compute the same value"
    }

    fn run_on_graph(&self, graph: &mut Graph, unit: UnitId, ctx: &CompilerContext) -> Result<bool> {
        let mut value_map: HashMap<NodeKind, NodeId> = HashMap::new();
        let mut changed = false;
        let ids: Vec<_> = graph.live_nodes().map(|(id, _)| id).collect();

        // IDs ascend in creation order, so inputs are numbered before their users
        for id in ids {
            let Some(kind) = graph.node(id).cloned() else {
                continue;
            };
            if !Self::is_numberable(&kind) {
                continue;
            }

            match value_map.get(&kind) {
                Some(&original) => {
                    let replaced = graph.replace_at_usages(id, original);
                    graph.remove(id)?;
                    ctx.events
                        .record(EventKind::ValueNumbered)
                        .at(unit, id)
                        .pass(self.name())
                        .message(format!("{id} => {original} ({replaced} uses)"));
                    changed = true;
                }
                None => {
                    value_map.insert(kind, id);
                }
            }
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{GraphBuilder, Kind},
        test::run_pass,
    };

    fn run(graph: &mut Graph) -> bool {
        run_pass(&GlobalValueNumberingPass::new(), graph).0
    }

    #[test]
    fn test_merges_equal_constants() {
        let mut b = GraphBuilder::new("t");
        let first = b.const_i32(7);
        let second = b.const_i32(7);
        let ret = b.ret(Some(second));
        let mut graph = b.finish();

        assert!(run(&mut graph));
        assert!(!graph.is_alive(second));
        assert_eq!(graph.node(ret), Some(&NodeKind::Return { value: Some(first) }));
    }

    #[test]
    fn test_merging_cascades_to_users() {
        let mut b = GraphBuilder::new("t");
        let a = b.const_i32(1);
        let c = b.const_i32(1);
        let za = b.node(NodeKind::ZeroExtend {
            value: a,
            result_bits: 64,
        });
        let zc = b.node(NodeKind::ZeroExtend {
            value: c,
            result_bits: 64,
        });
        b.escape(za);
        b.escape(zc);
        let mut graph = b.finish();

        assert!(run(&mut graph));
        assert!(!graph.is_alive(zc));
        assert_eq!(graph.usages(za).len(), 2);
    }

    #[test]
    fn test_anchors_are_never_merged() {
        let mut b = GraphBuilder::new("t");
        let p = b.param(Kind::Object);
        let first = b.anchor();
        let second = b.anchor();
        b.pi(p, first);
        b.pi(p, second);
        let mut graph = b.finish();

        assert!(!run(&mut graph));
        assert!(graph.is_alive(first));
        assert!(graph.is_alive(second));
        assert_eq!(graph.usages(first).len(), 1);
        assert_eq!(graph.usages(second).len(), 1);
    }

    #[test]
    fn test_float_constants_compare_bitwise() {
        let mut b = GraphBuilder::new("t");
        let pos = b.const_f64(0.0);
        let neg = b.const_f64(-0.0);
        b.escape(pos);
        b.escape(neg);
        let mut graph = b.finish();

        assert!(!run(&mut graph));
        assert!(graph.is_alive(neg));
    }
}
