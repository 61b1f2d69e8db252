//! Event logging for the virtualization pipeline.
//!
//! Every rewrite a pass performs is recorded as an [`Event`]. The log can be inspected for
//! debugging or tests, summarized, or ignored entirely.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event
//! - [`EventLog`] - Append-only, thread-safe collection with query and summary helpers
//! - [`EventBuilder`] - Fluent API for creating events
//! - [`DerivedStats`] - Counters computed from a log
//!
//! # Example
//!
//! ```rust
//! use framevirt::compiler::{EventKind, EventLog, UnitId};
//! use framevirt::ir::NodeId;
//!
//! let log = EventLog::new();
//! log.record(EventKind::SlotWriteSubsumed)
//!     .at(UnitId::new(0), NodeId::new(7))
//!     .message("n3[2] Local Int");
//! log.error("unit1: malformed frame");
//!
//! assert_eq!(log.count_kind(EventKind::SlotWriteSubsumed), 1);
//! assert_eq!(log.summary(), "1 slot write subsumed");
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::Duration,
};

use crate::{compiler::context::UnitId, ir::NodeId};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A frame slot write was folded into the virtual frame.
    SlotWriteSubsumed,
    /// A frame slot read was replaced by the virtual entry.
    SlotReadSubsumed,
    /// A frame slot clear was folded into the virtual frame.
    SlotCleared,
    /// Virtualization gave up and a deoptimization was inserted.
    DeoptimizationInserted,
    /// An allocation became a virtual object.
    AllocationVirtualized,
    /// A virtual object was materialized.
    AllocationMaterialized,
    /// A value anchor was removed.
    AnchorRemoved,
    /// A node was folded to a constant.
    NodeFolded,
    /// A node was replaced by an equivalent one.
    ValueNumbered,
    /// A dead node was removed.
    NodeRemoved,

    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,
    /// Compilation of a unit was abandoned.
    UnitAborted,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Transformations
            Self::SlotWriteSubsumed => "slot write subsumed",
            Self::SlotReadSubsumed => "slot read subsumed",
            Self::SlotCleared => "slot cleared",
            Self::DeoptimizationInserted => "deoptimization inserted",
            Self::AllocationVirtualized => "allocation virtualized",
            Self::AllocationMaterialized => "allocation materialized",
            Self::AnchorRemoved => "anchor removed",
            Self::NodeFolded => "node folded",
            Self::ValueNumbered => "value numbered",
            Self::NodeRemoved => "node removed",
            // Engine
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::UnitAborted => "unit aborted",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a graph transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::SlotWriteSubsumed
                | Self::SlotReadSubsumed
                | Self::SlotCleared
                | Self::DeoptimizationInserted
                | Self::AllocationVirtualized
                | Self::AllocationMaterialized
                | Self::AnchorRemoved
                | Self::NodeFolded
                | Self::ValueNumbered
                | Self::NodeRemoved
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The compilation unit the event belongs to (if applicable).
    pub unit: Option<UnitId>,
    /// The node the event is about.
    pub location: Option<NodeId>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            unit: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.unit, self.location) {
            (Some(unit), Some(node)) => write!(f, "[{}] {unit}:{node} {}", self.kind, self.message),
            (Some(unit), None) => write!(f, "[{}] {unit} {}", self.kind, self.message),
            _ => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    unit: Option<UnitId>,
    location: Option<NodeId>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            unit: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the unit and node where the event occurred.
    pub fn at(mut self, unit: UnitId, node: NodeId) -> Self {
        self.unit = Some(unit);
        self.location = Some(node);
        self
    }

    /// Sets only the unit (for unit-level events without a node).
    pub fn unit(mut self, unit: UnitId) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            unit: self.unit.take(),
            location: self.location.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Collection of events from a pipeline run.
///
/// Statistics are derived from the events rather than tracked separately. Events can be appended
/// concurrently from multiple threads through shared references.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.iter().filter(|e| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for event in self {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of distinct units with transformation events.
    #[must_use]
    pub fn units_affected(&self) -> usize {
        self.iter()
            .filter(|e| e.kind.is_transformation())
            .filter_map(|e| e.unit)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of all transformations.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

/// Iterator wrapper for EventLog that yields &Event
pub struct EventLogIter<'a> {
    inner: boxcar::Iter<'a, Event>,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        EventLogIter {
            inner: self.events.iter(),
        }
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}

/// Statistics derived from an EventLog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedStats {
    /// Number of units that had any transformations.
    pub units_transformed: usize,
    /// Number of slot writes subsumed.
    pub writes_subsumed: usize,
    /// Number of slot reads subsumed.
    pub reads_subsumed: usize,
    /// Number of slot clears subsumed.
    pub clears_subsumed: usize,
    /// Number of deoptimizations inserted.
    pub deoptimizations: usize,
    /// Number of allocations virtualized.
    pub virtualized: usize,
    /// Number of allocations materialized.
    pub materialized: usize,
    /// Number of anchors removed.
    pub anchors_removed: usize,
    /// Number of nodes removed by cleanup passes.
    pub nodes_removed: usize,
    /// Number of aborted units.
    pub units_aborted: usize,
    /// Number of errors.
    pub errors: usize,
    /// Processing time.
    pub total_time: Duration,
}

impl DerivedStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            units_transformed: log.units_affected(),
            writes_subsumed: get(EventKind::SlotWriteSubsumed),
            reads_subsumed: get(EventKind::SlotReadSubsumed),
            clears_subsumed: get(EventKind::SlotCleared),
            deoptimizations: get(EventKind::DeoptimizationInserted),
            virtualized: get(EventKind::AllocationVirtualized),
            materialized: get(EventKind::AllocationMaterialized),
            anchors_removed: get(EventKind::AnchorRemoved),
            nodes_removed: get(EventKind::NodeRemoved),
            units_aborted: get(EventKind::UnitAborted),
            errors: get(EventKind::Error),
            total_time: Duration::ZERO,
        }
    }

    /// Sets the total processing time.
    #[must_use]
    pub fn with_time(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// Generates a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.units_transformed > 0 {
            parts.push(format!("{} units", self.units_transformed));
        }

        let accesses = self.writes_subsumed + self.reads_subsumed + self.clears_subsumed;
        if accesses > 0 {
            parts.push(format!("{accesses} frame accesses subsumed"));
        }
        if self.virtualized > 0 {
            parts.push(format!("{} allocations virtualized", self.virtualized));
        }
        if self.materialized > 0 {
            parts.push(format!("{} materialized", self.materialized));
        }
        if self.deoptimizations > 0 {
            parts.push(format!("{} deoptimizations", self.deoptimizations));
        }
        if self.anchors_removed > 0 {
            parts.push(format!("{} anchors removed", self.anchors_removed));
        }
        if self.nodes_removed > 0 {
            parts.push(format!("{} nodes removed", self.nodes_removed));
        }
        if self.units_aborted > 0 {
            parts.push(format!("{} units aborted", self.units_aborted));
        }

        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_records_on_drop() {
        let log = EventLog::new();
        log.record(EventKind::AnchorRemoved)
            .at(UnitId::new(1), NodeId::new(4))
            .pass("canonicalize");

        let event = log.iter().next().unwrap();
        assert_eq!(event.kind, EventKind::AnchorRemoved);
        assert_eq!(event.message, "anchor removed");
        assert_eq!(event.pass.as_deref(), Some("canonicalize"));
        assert_eq!(event.to_string(), "[anchor removed] unit1:n4 anchor removed");
    }

    #[test]
    fn test_summary_lists_transformations_only() {
        let log = EventLog::new();
        log.error("unit0: boom");
        assert_eq!(log.summary(), "1 events");

        log.record(EventKind::SlotWriteSubsumed).unit(UnitId::new(0));
        log.record(EventKind::SlotWriteSubsumed).unit(UnitId::new(1));
        log.record(EventKind::AnchorRemoved).unit(UnitId::new(1));
        assert_eq!(log.summary(), "1 anchor removed, 2 slot write subsumed");
        assert_eq!(log.units_affected(), 2);
    }

    #[test]
    fn test_concurrent_recording() {
        use rayon::prelude::*;

        let log = EventLog::new();
        (0..64usize).into_par_iter().for_each(|i| {
            log.record(EventKind::NodeRemoved)
                .at(UnitId::new(i % 4), NodeId::new(i));
        });
        assert_eq!(log.count_kind(EventKind::NodeRemoved), 64);
        assert_eq!(log.units_affected(), 4);
    }

    #[test]
    fn test_derived_stats() {
        let log = EventLog::new();
        log.record(EventKind::SlotWriteSubsumed);
        log.record(EventKind::SlotReadSubsumed);
        log.record(EventKind::DeoptimizationInserted);
        log.error("boom");

        let stats = DerivedStats::from_log(&log);
        assert_eq!(stats.writes_subsumed, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(
            stats.summary(),
            "2 frame accesses subsumed, 1 deoptimizations"
        );
    }
}
