//! Width normalization for static accesses to OSR transfer-target frames.
//!
//! An OSR transfer frame stores every primitive in a single untyped 64-bit slot. Values written
//! through a static access are therefore widened to `Long` on the way in, and reads narrow them
//! back to the access kind on the way out:
//!
//! | Kind | Write (widen) | Read (narrow) |
//! |------|---------------|---------------|
//! | `Long` | unchanged | unchanged |
//! | `Double` | reinterpret as `Long` | reinterpret as `Double` |
//! | `Float` | reinterpret as `Int`, zero-extend | narrow to 32 bits, reinterpret as `Float` |
//! | sub-`Long` integers | zero-extend | narrow to 32 bits |
//! | `Object` | unchanged | unchanged |
//!
//! Conversion nodes are added through [`VirtualizerTool::add_node`], so constant inputs fold to
//! constants.

use crate::{
    ir::{Kind, NodeId, NodeKind},
    virt::tool::VirtualizerTool,
};

/// Widens a primitive value to the canonical 64-bit representation.
///
/// Non-primitive values and values that are already `Long` are returned unchanged. For every
/// other primitive the result has stack kind `Long`, and for a `Float` input its bit pattern is
/// the zero-extended `Int` reinterpretation of the input.
pub fn widen(value: NodeId, tool: &mut dyn VirtualizerTool) -> NodeId {
    let mut kind = tool.stack_kind(value);
    if !kind.is_primitive() || kind == Kind::WIDE {
        return value;
    }

    let mut current = value;
    if let Some(integer) = kind.reinterpreted_integer() {
        current = tool.add_node(NodeKind::Reinterpret {
            to: integer,
            value: current,
        });
        kind = integer;
    }

    if kind.bit_count() < Kind::WIDE.bit_count() {
        current = tool.add_node(NodeKind::ZeroExtend {
            value: current,
            result_bits: Kind::WIDE.bit_count(),
        });
    }

    current
}

/// Narrows a 64-bit slot value back to the stack representation of `target`.
///
/// `value` must have stack kind `Long`; anything else is returned unchanged.
pub fn narrow(value: NodeId, target: Kind, tool: &mut dyn VirtualizerTool) -> NodeId {
    if tool.stack_kind(value) != Kind::WIDE {
        return value;
    }

    match target.stack_kind() {
        Kind::Double => tool.add_node(NodeKind::Reinterpret {
            to: Kind::Double,
            value,
        }),
        Kind::Int => tool.add_node(NodeKind::Narrow {
            value,
            result_bits: 32,
        }),
        Kind::Float => {
            let bits = tool.add_node(NodeKind::Narrow {
                value,
                result_bits: 32,
            });
            tool.add_node(NodeKind::Reinterpret {
                to: Kind::Float,
                value: bits,
            })
        }
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{ConstValue, Graph, GraphBuilder},
        virt::{state::VirtualState, tool::GraphVirtualizer},
    };

    fn with_tool<R>(graph: &mut Graph, f: impl FnOnce(&mut GraphVirtualizer<'_>) -> R) -> R {
        let mut state = VirtualState::new();
        let mut tool = GraphVirtualizer::new(graph, &mut state);
        f(&mut tool)
    }

    #[test]
    fn test_widen_float_constant_bit_pattern() {
        let mut b = GraphBuilder::new("t");
        let value = b.const_f32(-1.5);
        let mut graph = b.finish();

        let wide = with_tool(&mut graph, |tool| widen(value, tool));
        let expected = i64::from((-1.5f32).to_bits());
        assert_eq!(graph.constant_value(wide), Some(ConstValue::I64(expected)));
        assert!(expected > 0, "zero extension must not sign-extend");
    }

    #[test]
    fn test_widen_sub_int_constants() {
        let mut b = GraphBuilder::new("t");
        let byte = b.constant(ConstValue::I8(-1));
        let short = b.constant(ConstValue::I16(-2));
        let ch = b.constant(ConstValue::Char(0xffff));
        let int = b.const_i32(7);
        let mut graph = b.finish();

        let results = with_tool(&mut graph, |tool| {
            [byte, short, ch, int].map(|v| widen(v, tool))
        });
        let values: Vec<_> = results.iter().map(|&n| graph.constant_value(n)).collect();
        assert_eq!(
            values,
            vec![
                Some(ConstValue::I64(0xffff_ffff)),
                Some(ConstValue::I64(0xffff_fffe)),
                Some(ConstValue::I64(0xffff)),
                Some(ConstValue::I64(7)),
            ]
        );
    }

    #[test]
    fn test_widen_leaves_long_and_object() {
        let mut b = GraphBuilder::new("t");
        let long = b.const_i64(-5);
        let object = b.null();
        let mut graph = b.finish();
        let before = graph.node_count();

        with_tool(&mut graph, |tool| {
            assert_eq!(widen(long, tool), long);
            assert_eq!(widen(object, tool), object);
        });
        assert_eq!(graph.node_count(), before);
    }

    #[test]
    fn test_widen_non_constant_builds_conversions() {
        let mut b = GraphBuilder::new("t");
        let p = b.param(Kind::Float);
        let mut graph = b.finish();

        let wide = with_tool(&mut graph, |tool| widen(p, tool));
        assert_eq!(graph.stack_kind(wide), Kind::Long);
        let Some(NodeKind::ZeroExtend { value, result_bits }) = graph.node(wide) else {
            panic!("expected zero extension, got {:?}", graph.node(wide));
        };
        assert_eq!(*result_bits, 64);
        assert_eq!(
            graph.node(*value),
            Some(&NodeKind::Reinterpret {
                to: Kind::Int,
                value: p
            })
        );
    }

    #[test]
    fn test_widen_double_is_single_reinterpret() {
        let mut b = GraphBuilder::new("t");
        let p = b.param(Kind::Double);
        let mut graph = b.finish();

        let wide = with_tool(&mut graph, |tool| widen(p, tool));
        assert_eq!(
            graph.node(wide),
            Some(&NodeKind::Reinterpret {
                to: Kind::Long,
                value: p
            })
        );
    }

    #[test]
    fn test_narrow_restores_widened_constants() {
        let mut b = GraphBuilder::new("t");
        let f = b.const_f32(3.25);
        let d = b.const_f64(-0.0);
        let i = b.const_i32(-9);
        let mut graph = b.finish();

        let (f2, d2, i2) = with_tool(&mut graph, |tool| {
            let f2 = widen(f, tool);
            let f2 = narrow(f2, Kind::Float, tool);
            let d2 = widen(d, tool);
            let d2 = narrow(d2, Kind::Double, tool);
            let i2 = widen(i, tool);
            let i2 = narrow(i2, Kind::Int, tool);
            (f2, d2, i2)
        });
        assert_eq!(graph.constant_value(f2), Some(ConstValue::F32(3.25)));
        assert_eq!(graph.constant_value(d2), Some(ConstValue::F64(-0.0)));
        assert_eq!(graph.constant_value(i2), Some(ConstValue::I32(-9)));
    }
}
