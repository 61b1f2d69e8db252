//! Canonicalization pass.
//!
//! Local simplifications that need no analysis:
//!
//! - conversion nodes (`Reinterpret`, `ZeroExtend`, `Narrow`) with a constant input fold to a
//!   constant
//! - value anchors without dependents are removed, but only when all usages are known to be
//!   visible (see [`anchor::simplify`])

use log::debug;

use crate::{
    compiler::{pass::GraphPass, CompilerContext, EventKind, UnitId},
    ir::{Graph, NodeKind},
    virt::{anchor, AnchorSimplification},
    Result, VirtualizationConfig,
};

/// Canonicalization pass.
pub struct CanonicalizerPass {
    all_usages_available: bool,
}

impl Default for CanonicalizerPass {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CanonicalizerPass {
    /// Creates a canonicalizer.
    ///
    /// With `all_usages_available == false` anchors are never removed.
    #[must_use]
    pub fn new(all_usages_available: bool) -> Self {
        Self {
            all_usages_available,
        }
    }

    /// Creates a canonicalizer from `config`.
    #[must_use]
    pub fn from_config(config: &VirtualizationConfig) -> Self {
        Self::new(config.all_usages_available)
    }
}

impl GraphPass for CanonicalizerPass {
    fn name(&self) -> &'static str {
        "canonicalize"
    }

    fn description(&self) -> &'static str {
        "Folds constant conversions and removes unreferenced anchors"
    }

    fn run_on_graph(&self, graph: &mut Graph, unit: UnitId, ctx: &CompilerContext) -> Result<bool> {
        let mut changed = false;
        let ids: Vec<_> = graph.live_nodes().map(|(id, _)| id).collect();

        for id in ids {
            let Some(kind) = graph.node(id).cloned() else {
                continue;
            };

            match kind {
                NodeKind::ValueAnchor => {
                    if anchor::simplify(graph, id, self.all_usages_available)
                        == AnchorSimplification::Removable
                    {
                        graph.remove(id)?;
                        debug!("{unit}: removed anchor {id}");
                        ctx.events
                            .record(EventKind::AnchorRemoved)
                            .at(unit, id)
                            .pass(self.name());
                        changed = true;
                    }
                }
                NodeKind::Reinterpret { .. }
                | NodeKind::ZeroExtend { .. }
                | NodeKind::Narrow { .. } => {
                    let Some(value) = graph.fold_constant(&kind) else {
                        continue;
                    };
                    let constant = graph.constant(value);
                    graph.replace_at_usages(id, constant);
                    graph.remove(id)?;
                    ctx.events
                        .record(EventKind::NodeFolded)
                        .at(unit, id)
                        .pass(self.name())
                        .message(format!("{kind} => {value}"));
                    changed = true;
                }
                _ => {}
            }
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{ConstValue, GraphBuilder, Kind, NodeId},
        test::run_pass,
    };

    #[test]
    fn test_removes_unreferenced_anchor() {
        let mut b = GraphBuilder::new("t");
        let p = b.param(Kind::Object);
        let pinned = b.anchor();
        b.pi(p, pinned);
        let free = b.anchor();
        let mut graph = b.finish();

        let (changed, ctx) = run_pass(&CanonicalizerPass::default(), &mut graph);
        assert!(changed);
        assert!(graph.is_alive(pinned));
        assert!(!graph.is_alive(free));
        assert_eq!(ctx.events.count_kind(EventKind::AnchorRemoved), 1);
    }

    #[test]
    fn test_partial_mode_keeps_anchors() {
        let mut b = GraphBuilder::new("t");
        let anchor = b.anchor();
        let mut graph = b.finish();

        let pass = CanonicalizerPass::from_config(&VirtualizationConfig::partial());
        let (changed, _) = run_pass(&pass, &mut graph);
        assert!(!changed);
        assert!(graph.is_alive(anchor));
    }

    #[test]
    fn test_folds_constant_conversions() {
        let mut b = GraphBuilder::new("t");
        let c = b.const_f64(2.0);
        let bits = b.node(NodeKind::Reinterpret {
            to: Kind::Long,
            value: c,
        });
        let ret = b.ret(Some(bits));
        let mut graph = b.finish();

        let (changed, _) = run_pass(&CanonicalizerPass::default(), &mut graph);
        assert!(changed);
        assert!(!graph.is_alive(bits));
        let Some(NodeKind::Return { value: Some(folded) }) = graph.node(ret) else {
            panic!("return lost its value");
        };
        assert_eq!(
            graph.constant_value(*folded),
            Some(ConstValue::I64(2.0f64.to_bits() as i64))
        );
    }

    #[test]
    fn test_non_constant_conversion_is_kept() {
        let mut b = GraphBuilder::new("t");
        let p = b.param(Kind::Int);
        let wide = b.node(NodeKind::ZeroExtend {
            value: p,
            result_bits: 64,
        });
        b.ret(Some(wide));
        let mut graph = b.finish();

        let (changed, _) = run_pass(&CanonicalizerPass::default(), &mut graph);
        assert!(!changed);
        assert!(graph.is_alive(wide));
        assert!(graph.is_alive(NodeId::new(0)));
    }
}
