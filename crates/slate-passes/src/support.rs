//! Support-definition synthesis.
//!
//! Tensor matmul has no primitive on the targets we lower to, so every
//! distinct pair of operand tensor types gets one synthesized helper
//! function: nested bounded loops accumulating a dot product through
//! flat-indexed element reads. Helpers are registered by name and emitted
//! ahead of the primary declarations; a name is never generated twice.

use std::collections::HashMap;

use slate_ir::{BinaryOp, Graph, NodeId, NodeKind, TensorShape};

use crate::visit::postorder;

/// One synthesized helper: its registered name and detached function node.
#[derive(Clone, Debug)]
pub struct SupportDefinition {
    pub name: String,
    pub function: NodeId,
}

/// Ordered, name-deduplicated collection of synthesized helpers.
#[derive(Debug, Default)]
pub struct SupportDefinitions {
    defs: Vec<SupportDefinition>,
    index: HashMap<String, usize>,
}

impl SupportDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in first-use order.
    pub fn iter(&self) -> impl Iterator<Item = &SupportDefinition> {
        self.defs.iter()
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).map(|&i| self.defs[i].function)
    }

    fn insert(&mut self, name: String, function: NodeId) {
        self.index.insert(name.clone(), self.defs.len());
        self.defs.push(SupportDefinition { name, function });
    }
}

/// Scans the graph for expressions needing helpers and synthesizes them.
pub fn collect_support(graph: &mut Graph, root: NodeId) -> SupportDefinitions {
    let mut defs = SupportDefinitions::new();
    for node in postorder(graph, root) {
        let Some(name) = graph.support_fn_name(node) else {
            continue;
        };
        if defs.get(&name).is_some() {
            continue;
        }
        if let Some(function) = synth_matmul(graph, node, &name) {
            defs.insert(name, function);
        }
    }
    defs
}

/// Builds `fn <name>(a, b) -> out` computing `a @ b` with three nested
/// loops. Returns `None` when the binop's own type never resolved (shape
/// mismatch), since there is no output type to give the helper.
fn synth_matmul(graph: &mut Graph, binop: NodeId, name: &str) -> Option<NodeId> {
    let (left, right) = match &graph.nodes[binop].kind {
        NodeKind::Binary(b) => (b.left, b.right),
        _ => return None,
    };
    let out_ty = graph.nodes[binop].resolved_type?;
    let a_ty = graph.nodes[left].resolved_type?;
    let b_ty = graph.nodes[right].resolved_type?;
    let (element, a_shape) = tensor_parts(graph, a_ty)?;
    let (_, b_shape) = tensor_parts(graph, b_ty)?;
    let (_, out_shape) = tensor_parts(graph, out_ty)?;
    let (rows, inner) = (a_shape.0[0], a_shape.0[1]);
    let cols = b_shape.0[1];
    let float_sum = graph.is_floatish(element);

    let f = graph.detached_function(name);
    let param_a = graph.param(f, "a", Some(a_ty));
    let param_b = graph.param(f, "b", Some(b_ty));
    let result = graph.variable(f, "result", Some(out_ty), None);

    let rows_c = graph.constant(rows as i64);
    let loop_i = graph.loop_stmt(f, "i", rows_c);
    let counter_i = loop_counter(graph, loop_i);
    let cols_c = graph.constant(cols as i64);
    let loop_j = graph.loop_stmt(loop_i, "j", cols_c);
    let counter_j = loop_counter(graph, loop_j);

    let sum_init = if float_sum {
        graph.float_constant(0.0)
    } else {
        graph.constant(0)
    };
    let sum = graph.variable(loop_j, "sum", None, Some(sum_init));

    let inner_c = graph.constant(inner as i64);
    let loop_k = graph.loop_stmt(loop_j, "k", inner_c);
    let counter_k = loop_counter(graph, loop_k);

    // sum = sum + a[i*K + k] * b[k*C + j]
    let i_ref = bound_name(graph, "i", counter_i);
    let k_ref = bound_name(graph, "k", counter_k);
    let a_ref = bound_name(graph, "a", param_a);
    let a_idx = graph.flat_index(&a_shape, &[i_ref, k_ref]);
    let a_elem = graph.index(a_ref, vec![a_idx]);

    let k_ref2 = bound_name(graph, "k", counter_k);
    let j_ref = bound_name(graph, "j", counter_j);
    let b_ref = bound_name(graph, "b", param_b);
    let b_idx = graph.flat_index(&b_shape, &[k_ref2, j_ref]);
    let b_elem = graph.index(b_ref, vec![b_idx]);

    let prod = graph.binary(BinaryOp::Mul, a_elem, b_elem);
    let sum_ref = bound_name(graph, "sum", sum);
    let new_sum = graph.binary(BinaryOp::Add, sum_ref, prod);
    let sum_target = bound_name(graph, "sum", sum);
    graph.assign(loop_k, sum_target, new_sum);

    // result[i*C + j] = sum
    let i_ref2 = bound_name(graph, "i", counter_i);
    let j_ref2 = bound_name(graph, "j", counter_j);
    let result_ref = bound_name(graph, "result", result);
    let out_idx = graph.flat_index(&out_shape, &[i_ref2, j_ref2]);
    let out_elem = graph.index(result_ref, vec![out_idx]);
    let sum_value = bound_name(graph, "sum", sum);
    graph.assign(loop_j, out_elem, sum_value);

    let result_value = bound_name(graph, "result", result);
    graph.ret(f, Some(result_value));
    graph.set_return_type(f, out_ty);
    Some(f)
}

/// A `Name` node pre-bound to its declaration, skipping name resolution for
/// synthesized bodies that live outside any module scope.
fn bound_name(graph: &mut Graph, name: &str, decl: NodeId) -> NodeId {
    let n = graph.name(name);
    graph.nodes[n].resolved_node = Some(decl);
    n
}

fn loop_counter(graph: &Graph, loop_stmt: NodeId) -> NodeId {
    match &graph.nodes[loop_stmt].kind {
        NodeKind::Loop(l) => l.counter,
        other => panic!("loop_counter: {:?} is not a loop", other.tag()),
    }
}

fn tensor_parts(graph: &Graph, ty: NodeId) -> Option<(NodeId, TensorShape)> {
    match &graph.nodes[ty].kind {
        NodeKind::Tensor(t) => Some((t.element, t.shape.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NameResolution, Pass, TypeResolution};
    use slate_ir::{dump_function, Diagnostics};

    fn resolved_matmul_module(graph: &mut Graph) -> NodeId {
        let m = graph.module("m");
        let f = graph.define(m, "kernel");
        let float = graph.float_type();
        let ta = graph.tensor(float, &[3, 5]);
        let tb = graph.tensor(float, &[5, 7]);
        graph.param(f, "a", Some(ta));
        graph.param(f, "b", Some(tb));
        let a = graph.name("a");
        let b = graph.name("b");
        let mm = graph.binary(BinaryOp::MatMul, a, b);
        graph.ret(f, Some(mm));

        let mut diags = Diagnostics::new();
        for _ in 0..3 {
            let named = NameResolution.run(graph, m, &mut diags);
            let typed = TypeResolution.run(graph, m, &mut diags);
            if !named && !typed {
                break;
            }
        }
        m
    }

    #[test]
    fn matmul_synthesizes_named_helper() {
        let mut g = Graph::new();
        let m = resolved_matmul_module(&mut g);
        let defs = collect_support(&mut g, m);
        assert_eq!(defs.len(), 1);
        let def = defs.iter().next().unwrap();
        assert_eq!(def.name, "mul_float3x5f_float5x7f");
        assert!(defs.get("mul_float3x5f_float5x7f").is_some());
    }

    #[test]
    fn helper_body_is_a_triple_loop() {
        let mut g = Graph::new();
        let m = resolved_matmul_module(&mut g);
        let defs = collect_support(&mut g, m);
        let func = defs.get("mul_float3x5f_float5x7f").unwrap();

        let mut dump = String::new();
        dump_function(&mut dump, &g, func);
        assert!(dump.contains("fn mul_float3x5f_float5x7f(a: float3x5f, b: float5x7f)"));
        assert!(dump.contains("loop i in 0..3"));
        assert!(dump.contains("loop j in 0..7"));
        assert!(dump.contains("loop k in 0..5"));
        assert!(dump.contains("var sum = 0.0"));
        assert!(dump.contains("sum = sum + a[i * 5 + k] * b[k * 7 + j]"));
        assert!(dump.contains("result[i * 7 + j] = sum"));
        assert!(dump.contains("return result"));
    }

    #[test]
    fn repeated_matmuls_share_one_helper() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "kernel");
        let float = g.float_type();
        let ta = g.tensor(float, &[3, 5]);
        let tb = g.tensor(float, &[5, 7]);
        let tc = g.tensor(float, &[3, 5]);
        g.param(f, "a", Some(ta));
        g.param(f, "b", Some(tb));
        g.param(f, "c", Some(tc));
        let a = g.name("a");
        let b = g.name("b");
        let first = g.binary(BinaryOp::MatMul, a, b);
        g.variable(f, "x", None, Some(first));
        let c = g.name("c");
        let b2 = g.name("b");
        let second = g.binary(BinaryOp::MatMul, c, b2);
        g.ret(f, Some(second));

        let mut diags = Diagnostics::new();
        for _ in 0..3 {
            let named = NameResolution.run(&mut g, m, &mut diags);
            let typed = TypeResolution.run(&mut g, m, &mut diags);
            if !named && !typed {
                break;
            }
        }
        let defs = collect_support(&mut g, m);
        assert_eq!(defs.len(), 1);
    }

    #[test]
    fn int_tensors_accumulate_into_int_sum() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "kernel");
        let int = g.int_type();
        let ta = g.tensor(int, &[2, 2]);
        let tb = g.tensor(int, &[2, 2]);
        g.param(f, "a", Some(ta));
        g.param(f, "b", Some(tb));
        let a = g.name("a");
        let b = g.name("b");
        let mm = g.binary(BinaryOp::MatMul, a, b);
        g.ret(f, Some(mm));

        let mut diags = Diagnostics::new();
        for _ in 0..3 {
            let named = NameResolution.run(&mut g, m, &mut diags);
            let typed = TypeResolution.run(&mut g, m, &mut diags);
            if !named && !typed {
                break;
            }
        }
        let defs = collect_support(&mut g, m);
        let func = defs.get("mul_int2x2i_int2x2i").unwrap();
        let mut dump = String::new();
        dump_function(&mut dump, &g, func);
        assert!(dump.contains("var sum = 0"));
        assert!(!dump.contains("var sum = 0.0"));
    }
}
