//! Compiler context shared by all passes.
//!
//! The [`CompilerContext`] owns the graphs of every compilation unit in the pipeline together
//! with the event log and the bookkeeping the scheduler needs. All collections are thread-safe
//! so that units can be processed in parallel through a shared reference.

use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use dashmap::{DashMap, DashSet};

use crate::{
    compiler::events::{DerivedStats, EventKind, EventLog},
    ir::Graph,
    Error, VirtualizationConfig,
};

/// Identifier of a compilation unit within a [`CompilerContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(usize);

impl UnitId {
    /// Creates a `UnitId` from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit{}", self.0)
    }
}

/// State of one pipeline run.
pub struct CompilerContext {
    /// Graph of each live unit. A worker removes a graph while it runs a pass on it.
    pub graphs: DashMap<UnitId, Graph>,

    /// Accumulated events from all passes.
    pub events: EventLog,

    /// Units whose compilation was abandoned, with the error that caused it.
    pub failed_units: DashMap<UnitId, Error>,

    /// Units changed by at least one pass.
    pub processed_units: DashSet<UnitId>,

    /// Pipeline configuration.
    pub config: VirtualizationConfig,

    next_unit: AtomicUsize,

    start_time: Instant,
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new(VirtualizationConfig::default())
    }
}

impl CompilerContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new(config: VirtualizationConfig) -> Self {
        Self {
            graphs: DashMap::new(),
            events: EventLog::new(),
            failed_units: DashMap::new(),
            processed_units: DashSet::new(),
            config,
            next_unit: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Returns the elapsed time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Adds a unit to the pipeline and returns its ID.
    pub fn add_graph(&self, graph: Graph) -> UnitId {
        let unit = UnitId(self.next_unit.fetch_add(1, Ordering::Relaxed));
        self.graphs.insert(unit, graph);
        unit
    }

    /// Returns the IDs of all live units in ascending order.
    #[must_use]
    pub fn units(&self) -> Vec<UnitId> {
        let mut units: Vec<_> = self.graphs.iter().map(|entry| *entry.key()).collect();
        units.sort_unstable();
        units
    }

    /// Removes a unit's graph from the context.
    pub fn take_graph(&self, unit: UnitId) -> Option<Graph> {
        self.graphs.remove(&unit).map(|(_, graph)| graph)
    }

    /// Runs `f` against a unit's graph.
    pub fn with_graph<R>(&self, unit: UnitId, f: impl FnOnce(&Graph) -> R) -> Option<R> {
        self.graphs.get(&unit).map(|graph| f(graph.value()))
    }

    /// Returns `true` if the unit's compilation was abandoned.
    #[must_use]
    pub fn is_failed(&self, unit: UnitId) -> bool {
        self.failed_units.contains_key(&unit)
    }

    /// Abandons a unit.
    ///
    /// Its graph is dropped and `error` is recorded as the diagnostic. Other units are
    /// unaffected.
    pub fn abort(&self, unit: UnitId, pass: &str, error: Error) {
        log::error!("{unit}: {pass} failed, abandoning unit: {error}");
        self.graphs.remove(&unit);
        self.events
            .record(EventKind::UnitAborted)
            .unit(unit)
            .pass(pass)
            .message(error.to_string());
        self.events.error(format!("{unit}: {error}"));
        self.failed_units.insert(unit, error);
    }

    /// Computes statistics from the event log.
    #[must_use]
    pub fn stats(&self) -> DerivedStats {
        DerivedStats::from_log(&self.events).with_time(self.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::NodeId;

    #[test]
    fn test_units_are_numbered_in_order() {
        let ctx = CompilerContext::default();
        let a = ctx.add_graph(Graph::new("a"));
        let b = ctx.add_graph(Graph::new("b"));
        assert_eq!((a.index(), b.index()), (0, 1));
        assert_eq!(ctx.units(), vec![a, b]);
        assert_eq!(ctx.with_graph(b, |g| g.name().to_string()).as_deref(), Some("b"));
    }

    #[test]
    fn test_abort_drops_only_that_unit() {
        let ctx = CompilerContext::default();
        let a = ctx.add_graph(Graph::new("a"));
        let b = ctx.add_graph(Graph::new("b"));

        ctx.abort(a, "test", invariant_error!(NodeId::new(3), "n0[1]", "broken"));

        assert!(ctx.is_failed(a));
        assert!(!ctx.is_failed(b));
        assert_eq!(ctx.units(), vec![b]);
        assert_eq!(ctx.events.count_kind(EventKind::UnitAborted), 1);
        assert_eq!(ctx.stats().units_aborted, 1);
        assert_eq!(ctx.stats().errors, 1);
    }
}
