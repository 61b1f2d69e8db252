//! Shared fixtures for unit tests.

use crate::{
    compiler::{CompilerContext, GraphPass, UnitId},
    ir::{Graph, NodeId, NodeKind},
    virt::VirtualState,
};

/// Registers every backing store of `frame` as a virtual object.
pub(crate) fn virtualize_frame(graph: &Graph, state: &mut VirtualState, frame: NodeId) {
    let layout = graph.frame_layout(frame).unwrap();
    for array in layout.arrays() {
        if let Some(NodeKind::NewArray { element, length }) = graph.node(array) {
            state.add_virtual(array, *element, *length);
        }
    }
}

/// Runs `pass` once on `graph` as unit 0 of a fresh context.
///
/// Returns whether the pass reported a change, and the context holding its events.
pub(crate) fn run_pass(pass: &dyn GraphPass, graph: &mut Graph) -> (bool, CompilerContext) {
    let ctx = CompilerContext::default();
    let changed = pass.run_on_graph(graph, UnitId::new(0), &ctx).unwrap();
    (changed, ctx)
}
