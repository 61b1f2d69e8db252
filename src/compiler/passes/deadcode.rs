//! Dead code elimination pass.
//!
//! Removes nodes without usages whose only effect is producing a value: constants, pinned and
//! converted values, and allocations. Removing a node can leave its inputs unused, so the pass
//! iterates until nothing changes.

use crate::{
    compiler::{pass::GraphPass, CompilerContext, EventKind, UnitId},
    ir::Graph,
    Result,
};

/// Maximum iterations for the fixed-point algorithm to prevent infinite loops.
const MAX_ITERATIONS: usize = 100;

/// Dead code elimination pass.
pub struct DeadCodeEliminationPass;

impl Default for DeadCodeEliminationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadCodeEliminationPass {
    /// Creates a new DCE pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs one sweep and returns the number of removed nodes.
    fn run_iteration(graph: &mut Graph, unit: UnitId, ctx: &CompilerContext) -> Result<usize> {
        let dead: Vec<_> = graph
            .live_nodes()
            .filter(|(id, kind)| kind.is_removable_when_unused() && !graph.has_usages(*id))
            .map(|(id, _)| id)
            .collect();

        for &id in &dead {
            graph.remove(id)?;
            ctx.events
                .record(EventKind::NodeRemoved)
                .at(unit, id)
                .pass("dead-code-elimination");
        }

        Ok(dead.len())
    }
}

impl GraphPass for DeadCodeEliminationPass {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn description(&self) -> &'static str {
        "Removes unused values and allocations"
    }

    fn run_on_graph(&self, graph: &mut Graph, unit: UnitId, ctx: &CompilerContext) -> Result<bool> {
        let mut changed = false;
        for _ in 0..MAX_ITERATIONS {
            if Self::run_iteration(graph, unit, ctx)? == 0 {
                break;
            }
            changed = true;
        }
        Ok(changed)
    }
}
