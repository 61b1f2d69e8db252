//! Partial escape analysis over frame allocations.
//!
//! The pass turns fixed-length array allocations into virtual objects and then walks the fixed
//! nodes in program order, handing each one to its virtualization rule:
//!
//! | Node | Rule |
//! |------|------|
//! | `FrameSet` / `FrameGet` / `FrameClear` | [`crate::virt`] frame rules |
//! | `ValueAnchor` | [`anchor::virtualize`] |
//! | allocations, commits | skipped |
//! | `Deoptimize` | ends the walk |
//! | anything else | every virtual input escapes and is materialized |
//!
//! Allocations that are still virtual when the walk ends have lost all their accesses; dead code
//! elimination removes them.

use std::collections::HashSet;

use log::{debug, trace};

use crate::{
    compiler::{pass::GraphPass, CompilerContext, EventKind, UnitId},
    ir::{FrameAccess, Graph, NodeId, NodeKind},
    virt::{anchor, GraphVirtualizer, Rewrite, VirtualState},
    Result, VirtualizationConfig,
};

/// Escape analysis pass that virtualizes frames.
pub struct PartialEscapePass {
    max_entry_count: usize,
}

impl Default for PartialEscapePass {
    fn default() -> Self {
        Self::from_config(&VirtualizationConfig::default())
    }
}

impl PartialEscapePass {
    /// Creates a pass that virtualizes allocations of at most `max_entry_count` entries.
    #[must_use]
    pub fn new(max_entry_count: usize) -> Self {
        Self { max_entry_count }
    }

    /// Creates a pass from the candidate limits of `config`.
    #[must_use]
    pub fn from_config(config: &VirtualizationConfig) -> Self {
        Self::new(config.max_entry_count)
    }

    fn is_candidate_length(&self, length: usize) -> bool {
        self.max_entry_count > 0 && length <= self.max_entry_count
    }

    /// Registers every eligible allocation with `state`.
    ///
    /// Allocations that already had a commit are real memory and stay that way.
    fn select_candidates(&self, graph: &Graph, state: &mut VirtualState) -> Vec<NodeId> {
        let committed: HashSet<NodeId> = graph
            .live_nodes()
            .filter_map(|(_, kind)| match kind {
                NodeKind::CommitAllocation { object, .. } => Some(*object),
                _ => None,
            })
            .collect();

        let mut candidates = Vec::new();
        for (id, kind) in graph.live_nodes() {
            if let NodeKind::NewArray { element, length } = kind {
                if self.is_candidate_length(*length) && !committed.contains(&id) {
                    state.add_virtual(id, *element, *length);
                    candidates.push(id);
                }
            }
        }
        candidates
    }
}

/// Records the outcome of a frame accessor rule.
fn record_access(
    ctx: &CompilerContext,
    unit: UnitId,
    node: NodeId,
    access: FrameAccess,
    rewrite: Rewrite,
    subsumed: EventKind,
) {
    match rewrite {
        Rewrite::Subsumed => {
            debug!("{unit}: {node} {access} subsumed");
            ctx.events
                .record(subsumed)
                .at(unit, node)
                .pass("virtualize")
                .message(access.to_string());
        }
        Rewrite::Bailout => debug!("{unit}: {node} {access} bailed out"),
    }
}

impl GraphPass for PartialEscapePass {
    fn name(&self) -> &'static str {
        "virtualize"
    }

    fn description(&self) -> &'static str {
        "Replaces frame allocations by compiler-tracked entries"
    }

    fn run_on_graph(&self, graph: &mut Graph, unit: UnitId, ctx: &CompilerContext) -> Result<bool> {
        let mut state = VirtualState::new();
        let candidates = self.select_candidates(graph, &mut state);
        if candidates.is_empty() {
            return Ok(false);
        }
        trace!("{unit}: {} virtualization candidates", candidates.len());

        let order = graph.control().to_vec();
        let mut changed = false;
        let mut tool = GraphVirtualizer::new(graph, &mut state);

        for node in order {
            let Some(kind) = tool.graph().node(node).cloned() else {
                continue;
            };
            tool.set_current(node);
            trace!("{unit}: visiting {node} {kind}");

            match kind {
                NodeKind::FrameSet(set) => {
                    let rewrite = set.virtualize(&mut tool)?;
                    record_access(
                        ctx,
                        unit,
                        node,
                        set.access,
                        rewrite,
                        EventKind::SlotWriteSubsumed,
                    );
                }
                NodeKind::FrameGet(get) => {
                    let rewrite = get.virtualize(&mut tool)?;
                    record_access(
                        ctx,
                        unit,
                        node,
                        get.access,
                        rewrite,
                        EventKind::SlotReadSubsumed,
                    );
                }
                NodeKind::FrameClear(clear) => {
                    let rewrite = clear.virtualize(&mut tool)?;
                    record_access(ctx, unit, node, clear.access, rewrite, EventKind::SlotCleared);
                }
                NodeKind::ValueAnchor => {
                    if anchor::virtualize(&mut tool)? {
                        ctx.events
                            .record(EventKind::AnchorRemoved)
                            .at(unit, node)
                            .pass(self.name());
                    }
                }
                NodeKind::NewArray { .. }
                | NodeKind::NewFrame(_)
                | NodeKind::CommitAllocation { .. } => {}
                NodeKind::Deoptimize { .. } => break,
                other => {
                    for input in other.inputs() {
                        tool.materialize_value(input)?;
                    }
                }
            }

            changed |= tool.is_deleted();
            for allocation in tool.take_materialized() {
                changed = true;
                debug!("{unit}: {allocation} materialized before {node}");
                ctx.events
                    .record(EventKind::AllocationMaterialized)
                    .at(unit, allocation)
                    .pass(self.name());
            }
            if let Some(reason) = tool.deoptimized() {
                ctx.events
                    .record(EventKind::DeoptimizationInserted)
                    .at(unit, node)
                    .pass(self.name())
                    .message(format!("{reason:?}"));
                return Ok(true);
            }
        }

        for object in state.live_objects() {
            ctx.events
                .record(EventKind::AllocationVirtualized)
                .at(unit, object.allocation())
                .pass(self.name());
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AccessFlags, AccessType, FrameTag, GraphBuilder, Kind};

    fn run(graph: Graph) -> (Graph, CompilerContext, bool) {
        let ctx = CompilerContext::default();
        let unit = ctx.add_graph(graph);
        let mut graph = ctx.take_graph(unit).unwrap();
        let changed = PartialEscapePass::default()
            .run_on_graph(&mut graph, unit, &ctx)
            .unwrap();
        (graph, ctx, changed)
    }

    #[test]
    fn test_accesses_are_subsumed() {
        let mut b = GraphBuilder::new("t");
        let frame = b.new_frame(2);
        let v = b.const_i32(5);
        b.frame_set(frame, 0, FrameTag::Int, v, AccessType::Local, AccessFlags::SET_TAG);
        let get = b.frame_get(frame, 0, Kind::Int, AccessType::Local, AccessFlags::NON_STATIC);
        let ret = b.ret(Some(get));
        let (graph, ctx, changed) = run(b.finish());

        assert!(changed);
        assert_eq!(graph.node(ret), Some(&NodeKind::Return { value: Some(v) }));
        assert!(graph.find(NodeKind::is_frame_access).is_empty());
        assert_eq!(ctx.events.count_kind(EventKind::SlotWriteSubsumed), 1);
        assert_eq!(ctx.events.count_kind(EventKind::SlotReadSubsumed), 1);
        assert_eq!(ctx.events.count_kind(EventKind::AllocationVirtualized), 3);
    }

    #[test]
    fn test_escape_materializes_frame() {
        let mut b = GraphBuilder::new("t");
        let frame = b.new_frame(1);
        let v = b.const_i64(9);
        b.frame_set(frame, 0, FrameTag::Long, v, AccessType::Local, AccessFlags::SET_TAG);
        b.escape(frame);
        let (graph, ctx, changed) = run(b.finish());

        assert!(changed);
        assert_eq!(ctx.events.count_kind(EventKind::AllocationMaterialized), 3);
        let commits = graph.find(|k| matches!(k, NodeKind::CommitAllocation { .. }));
        assert_eq!(commits.len(), 3);
        assert!(!ctx.events.has(EventKind::DeoptimizationInserted));
    }

    #[test]
    fn test_bailout_stops_the_walk() {
        let mut b = GraphBuilder::new("t");
        let frame = b.new_frame(1);
        let v = b.const_i32(1);
        let bad = b.frame_set(frame, 4, FrameTag::Int, v, AccessType::Local, AccessFlags::SET_TAG);
        let later = b.frame_set(
            frame,
            0,
            FrameTag::Int,
            v,
            AccessType::Local,
            AccessFlags::SET_TAG,
        );
        let (graph, ctx, changed) = run(b.finish());

        assert!(changed);
        assert!(graph.is_alive(bad));
        assert!(graph.is_alive(later));
        assert_eq!(ctx.events.count_kind(EventKind::DeoptimizationInserted), 1);
        assert_eq!(ctx.events.count_kind(EventKind::SlotWriteSubsumed), 0);
    }

    #[test]
    fn test_escape_commits_frame_stored_in_frame() {
        let mut b = GraphBuilder::new("t");
        let inner = b.new_frame(1);
        let outer = b.new_frame(1);
        let v = b.const_i64(42);
        b.frame_set(inner, 0, FrameTag::Long, v, AccessType::Local, AccessFlags::SET_TAG);
        b.frame_set(outer, 0, FrameTag::Object, inner, AccessType::Local, AccessFlags::SET_TAG);
        b.escape(outer);
        let (graph, ctx, changed) = run(b.finish());
        let inner_layout = *graph.frame_layout(inner).unwrap();

        assert!(changed);
        assert!(graph.find(NodeKind::is_frame_access).is_empty());
        assert_eq!(ctx.events.count_kind(EventKind::AllocationMaterialized), 6);
        assert!(!ctx.events.has(EventKind::AllocationVirtualized));

        // The inner write survives as part of the inner frame's commit
        let commits = graph.find(|k| {
            matches!(k, NodeKind::CommitAllocation { object, entries }
                if *object == inner_layout.primitives && entries == &vec![Some(v)])
        });
        assert_eq!(commits.len(), 1);
    }

    #[test]
    fn test_committed_allocations_are_not_candidates() {
        let mut b = GraphBuilder::new("t");
        let frame = b.new_frame(1);
        b.escape(frame);
        let (mut graph, _, _) = run(b.finish());

        let ctx = CompilerContext::default();
        let changed = PartialEscapePass::default()
            .run_on_graph(&mut graph, UnitId::new(0), &ctx)
            .unwrap();
        assert!(!changed);
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn test_zero_limit_disables_virtualization() {
        let mut b = GraphBuilder::new("t");
        let frame = b.new_frame(1);
        let v = b.const_i32(1);
        let set = b.frame_set(frame, 0, FrameTag::Int, v, AccessType::Local, AccessFlags::SET_TAG);
        let mut graph = b.finish();

        let ctx = CompilerContext::default();
        let changed = PartialEscapePass::new(0)
            .run_on_graph(&mut graph, UnitId::new(0), &ctx)
            .unwrap();
        assert!(!changed);
        assert!(graph.is_alive(set));
    }
}
