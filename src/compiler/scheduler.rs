//! Pass scheduler for orchestrating graph pass execution.
//!
//! The `PassScheduler` runs a two-phase pipeline: the virtualization phase runs to fixpoint
//! with normalization after each change, and the whole pipeline repeats until it is stable.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use rayon::prelude::*;

use crate::{
    compiler::{
        context::CompilerContext,
        events::EventKind,
        pass::GraphPass,
        passes::{
            CanonicalizerPass, DeadCodeEliminationPass, GlobalValueNumberingPass,
            PartialEscapePass,
        },
    },
    Result, VirtualizationConfig,
};

/// Orchestrates graph pass execution in a phased pipeline.
///
/// 1. **Virtualization**: escape analysis + normalize
/// 2. **Normalization**: canonicalization, value numbering, dead code elimination
///
/// Each phase runs to fixpoint before the next one. The entire pipeline is then repeated until
/// global fixpoint or max iterations.
///
/// Units are processed in parallel. A unit whose pass fails is abandoned (see
/// [`CompilerContext::abort`]); the pipeline carries on with the others.
#[allow(clippy::struct_field_names)]
pub struct PassScheduler {
    /// Maximum iterations for the entire pipeline.
    max_iterations: usize,
    /// Number of stable iterations before stopping.
    stable_iterations: usize,
    /// Maximum iterations for a single phase before moving on.
    max_phase_iterations: usize,
    /// Phase 1: Virtualization.
    pub virtualize: Vec<Box<dyn GraphPass>>,
    /// Normalization passes, run after each change and once per pipeline iteration.
    pub normalize: Vec<Box<dyn GraphPass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new(5, 2, 15)
    }
}

impl PassScheduler {
    /// Creates a new scheduler with the specified iteration limits and no passes.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Maximum iterations for the entire pipeline before stopping.
    /// * `stable_iterations` - Stop early if no changes for this many iterations.
    /// * `max_phase_iterations` - Maximum iterations for a single phase before moving on.
    #[must_use]
    pub fn new(
        max_iterations: usize,
        stable_iterations: usize,
        max_phase_iterations: usize,
    ) -> Self {
        Self {
            max_iterations,
            stable_iterations,
            max_phase_iterations,
            virtualize: Vec::new(),
            normalize: Vec::new(),
        }
    }

    /// Creates the standard pipeline for `config`.
    #[must_use]
    pub fn from_config(config: &VirtualizationConfig) -> Self {
        let mut scheduler = Self::new(
            config.max_iterations,
            config.stable_iterations,
            config.max_phase_iterations,
        );

        scheduler
            .virtualize
            .push(Box::new(PartialEscapePass::from_config(config)));
        scheduler
            .normalize
            .push(Box::new(CanonicalizerPass::from_config(config)));
        if config.enable_value_numbering {
            scheduler
                .normalize
                .push(Box::new(GlobalValueNumberingPass::new()));
        }
        scheduler
            .normalize
            .push(Box::new(DeadCodeEliminationPass::new()));
        scheduler
    }

    /// Runs normalization passes until no more changes occur.
    fn normalize_to_fixpoint(
        ctx: &CompilerContext,
        passes: &mut [Box<dyn GraphPass>],
        max_phase_iterations: usize,
    ) -> Result<bool> {
        let mut any_changed = false;

        for _ in 0..max_phase_iterations {
            if !Self::run_passes_once(ctx, passes)? {
                break;
            }
            any_changed = true;
        }

        Ok(any_changed)
    }

    /// Runs a phase to fixpoint: execute phase passes, then normalize until stable.
    fn phase_to_fixpoint(
        ctx: &CompilerContext,
        phase_passes: &mut [Box<dyn GraphPass>],
        normalize_passes: &mut [Box<dyn GraphPass>],
        max_phase_iterations: usize,
    ) -> Result<bool> {
        if phase_passes.is_empty() {
            return Ok(false);
        }

        let mut phase_changed = false;

        for _ in 0..max_phase_iterations {
            if !Self::run_passes_once(ctx, phase_passes)? {
                break;
            }

            phase_changed = true;

            // Normalization can expose new opportunities for the phase passes
            if !normalize_passes.is_empty() {
                Self::normalize_to_fixpoint(ctx, normalize_passes, max_phase_iterations)?;
            }
        }

        Ok(phase_changed)
    }

    /// Runs all passes once over all units.
    ///
    /// Returns `true` if any pass made changes. Units are processed in parallel; each worker
    /// takes the unit's graph out of the context, runs the pass without holding a lock, and
    /// puts it back.
    fn run_passes_once(ctx: &CompilerContext, passes: &mut [Box<dyn GraphPass>]) -> Result<bool> {
        let any_changed = AtomicBool::new(false);

        for pass in passes.iter_mut() {
            pass.initialize(ctx)?;
        }

        let units = ctx.units();

        for pass in passes.iter() {
            debug!("running {} on {} units", pass.name(), units.len());
            ctx.events
                .record(EventKind::PassStarted)
                .pass(pass.name())
                .message(pass.description());

            units.par_iter().for_each(|&unit| {
                if !pass.should_run(unit, ctx) {
                    return;
                }

                let Some(mut graph) = ctx.take_graph(unit) else {
                    return;
                };

                match pass.run_on_graph(&mut graph, unit, ctx) {
                    Ok(changed) => {
                        ctx.graphs.insert(unit, graph);
                        if changed {
                            any_changed.store(true, Ordering::Relaxed);
                            ctx.processed_units.insert(unit);
                        }
                    }
                    Err(error) => ctx.abort(unit, pass.name(), error),
                }
            });

            ctx.events.record(EventKind::PassCompleted).pass(pass.name());
        }

        for pass in passes.iter_mut() {
            pass.finalize(ctx)?;
        }

        Ok(any_changed.load(Ordering::Relaxed))
    }

    /// Runs the complete pipeline.
    ///
    /// # Returns
    ///
    /// The number of iterations completed. Events are accumulated in `ctx.events`, abandoned
    /// units in `ctx.failed_units`.
    ///
    /// # Errors
    ///
    /// Returns an error if a pass fails to initialize or finalize. Errors raised while
    /// processing a unit only abandon that unit.
    pub fn run_pipeline(&mut self, ctx: &CompilerContext) -> Result<usize> {
        let mut stable_count = 0;
        let mut iterations = 0;
        let max_phase = self.max_phase_iterations;

        for iteration in 0..self.max_iterations {
            iterations = iteration + 1;

            let mut iteration_changed =
                Self::phase_to_fixpoint(ctx, &mut self.virtualize, &mut self.normalize, max_phase)?;

            // Normalization runs at least once even if virtualization changed nothing
            if iteration == 0 && !iteration_changed && !self.normalize.is_empty() {
                iteration_changed =
                    Self::normalize_to_fixpoint(ctx, &mut self.normalize, max_phase)?;
            }

            if iteration_changed {
                stable_count = 0;
            } else {
                stable_count += 1;
                if stable_count >= self.stable_iterations {
                    break;
                }
            }
        }

        if !ctx.failed_units.is_empty() {
            warn!(
                "pipeline finished with {} abandoned units",
                ctx.failed_units.len()
            );
        }
        debug!("pipeline finished after {iterations} iterations: {}", ctx.events.summary());

        Ok(iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::UnitId,
        ir::{Graph, GraphBuilder},
    };

    struct TestPass {
        name: &'static str,
        changes_to_make: usize,
    }

    impl GraphPass for TestPass {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run_on_graph(
            &self,
            _graph: &mut Graph,
            unit: UnitId,
            ctx: &CompilerContext,
        ) -> Result<bool> {
            for _ in 0..self.changes_to_make {
                ctx.events.record(EventKind::NodeFolded).unit(unit);
            }
            Ok(self.changes_to_make > 0)
        }
    }

    struct FailingPass;

    impl GraphPass for FailingPass {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn should_run(&self, unit: UnitId, _ctx: &CompilerContext) -> bool {
            unit.index() == 0
        }

        fn run_on_graph(
            &self,
            _graph: &mut Graph,
            _unit: UnitId,
            _ctx: &CompilerContext,
        ) -> Result<bool> {
            Err(graph_error!("synthetic failure"))
        }
    }

    #[test]
    fn test_scheduler_iteration_limits() {
        let scheduler = PassScheduler::new(10, 3, 5);
        assert_eq!(scheduler.max_iterations, 10);
        assert_eq!(scheduler.stable_iterations, 3);
        assert_eq!(scheduler.max_phase_iterations, 5);
    }

    #[test]
    fn test_default_scheduler() {
        let scheduler = PassScheduler::default();
        assert_eq!(scheduler.max_iterations, 5);
        assert_eq!(scheduler.stable_iterations, 2);
        assert_eq!(scheduler.max_phase_iterations, 15);
    }

    #[test]
    fn test_from_config_pipeline() {
        let scheduler = PassScheduler::from_config(&VirtualizationConfig::default());
        let names: Vec<_> = scheduler.normalize.iter().map(|p| p.name()).collect();
        assert_eq!(scheduler.virtualize[0].name(), "virtualize");
        assert_eq!(
            names,
            vec!["canonicalize", "global-value-numbering", "dead-code-elimination"]
        );

        let config = VirtualizationConfig {
            enable_value_numbering: false,
            ..VirtualizationConfig::default()
        };
        assert_eq!(PassScheduler::from_config(&config).normalize.len(), 2);
    }

    #[test]
    fn test_stops_when_stable() {
        let ctx = CompilerContext::default();
        ctx.add_graph(Graph::new("a"));

        let mut scheduler = PassScheduler::new(10, 2, 5);
        scheduler.normalize.push(Box::new(TestPass {
            name: "noop",
            changes_to_make: 0,
        }));
        assert_eq!(scheduler.run_pipeline(&ctx).unwrap(), 2);
    }

    #[test]
    fn test_phase_bounded_by_max_phase_iterations() {
        let ctx = CompilerContext::default();
        ctx.add_graph(Graph::new("a"));

        let mut scheduler = PassScheduler::new(1, 1, 3);
        scheduler.virtualize.push(Box::new(TestPass {
            name: "always",
            changes_to_make: 1,
        }));
        scheduler.run_pipeline(&ctx).unwrap();
        assert_eq!(ctx.events.count_kind(EventKind::NodeFolded), 3);
    }

    #[test]
    fn test_failing_unit_is_abandoned() {
        let ctx = CompilerContext::default();
        let a = ctx.add_graph(GraphBuilder::new("a").finish());
        let b = ctx.add_graph(GraphBuilder::new("b").finish());

        let mut scheduler = PassScheduler::new(2, 1, 2);
        scheduler.virtualize.push(Box::new(FailingPass));
        scheduler.run_pipeline(&ctx).unwrap();

        assert!(ctx.is_failed(a));
        assert!(!ctx.is_failed(b));
        assert_eq!(ctx.units(), vec![b]);
        assert!(ctx.events.has(EventKind::UnitAborted));
    }
}
