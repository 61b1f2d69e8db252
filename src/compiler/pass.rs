//! The pass interface.

use crate::{
    compiler::context::{CompilerContext, UnitId},
    ir::Graph,
    Result,
};

/// A transformation over the graph of one compilation unit.
///
/// Passes are shared between worker threads, so they take `&self` while running and record
/// what they did in `ctx.events`.
pub trait GraphPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Should this pass run on a specific unit?
    fn should_run(&self, _unit: UnitId, _ctx: &CompilerContext) -> bool {
        true
    }

    /// Runs the pass on a single unit's graph.
    ///
    /// Returns `true` if the graph was changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph violates an invariant the pass relies on. The scheduler
    /// abandons the unit in that case.
    fn run_on_graph(&self, graph: &mut Graph, unit: UnitId, ctx: &CompilerContext)
        -> Result<bool>;

    /// Called once before the pass runs over all units.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    fn initialize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Called once after the pass ran over all units.
    ///
    /// # Errors
    ///
    /// Returns an error if finalization fails.
    fn finalize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }
}
