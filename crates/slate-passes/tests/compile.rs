//! End-to-end driver tests: build a module through the graph builder, run
//! the compiler, inspect caches, diagnostics, helpers, and entry points.

use slate_ir::{BinaryOp, Graph, NodeId, NodeKind, Stage};
use slate_passes::{Compiler, Options};

fn compile(graph: &mut Graph, root: NodeId) -> slate_passes::Compilation {
    let _ = env_logger::builder().is_test(true).try_init();
    Compiler::default().compile(graph, root)
}

fn return_type(graph: &Graph, func: NodeId) -> Option<NodeId> {
    match &graph.nodes[func].kind {
        NodeKind::Function(f) => f.return_type,
        _ => None,
    }
}

#[test]
fn infers_int_for_constant_return() {
    let mut g = Graph::new();
    let m = g.module("m");
    let f = g.define(m, "f");
    let c = g.constant(42);
    g.ret(f, Some(c));

    let compilation = compile(&mut g, m);
    assert!(!compilation.has_errors());
    assert_eq!(return_type(&g, f), Some(g.int_type()));
    assert_eq!(g.type_name(g.nodes[f].resolved_type.unwrap()), "fn() -> int");
}

#[test]
fn infers_void_for_no_return() {
    let mut g = Graph::new();
    let m = g.module("m");
    let f = g.define(m, "f");
    let zero = g.constant(0);
    g.variable(f, "x", None, Some(zero));

    let compilation = compile(&mut g, m);
    assert!(!compilation.has_errors());
    assert_eq!(return_type(&g, f), Some(g.void_type()));
}

#[test]
fn propagates_types_through_calls() {
    let mut g = Graph::new();
    let m = g.module("m");
    let double = g.define(m, "double");
    let int = g.int_type();
    g.param(double, "x", Some(int));
    let two = g.constant(2);
    let x = g.name("x");
    let body = g.binary(BinaryOp::Mul, two, x);
    g.ret(double, Some(body));

    let f = g.define(m, "f");
    let callee = g.name("double");
    let arg = g.constant(21);
    let call = g.call(callee, vec![arg]);
    g.ret(f, Some(call));

    let compilation = compile(&mut g, m);
    assert!(!compilation.has_errors());
    assert_eq!(return_type(&g, f), Some(int));
}

#[test]
fn unknown_name_survives_to_the_final_diagnostics() {
    let mut g = Graph::new();
    let m = g.module("m");
    let f = g.define(m, "f");
    let ghost = g.name("ghost");
    g.ret(f, Some(ghost));

    let compilation = compile(&mut g, m);
    assert!(compilation.has_errors());
    assert!(compilation
        .diagnostics
        .messages
        .iter()
        .any(|d| d.message.contains("'ghost' not found")));
}

#[test]
fn matmul_kernel_end_to_end() {
    let mut g = Graph::new();
    let m = g.module("m");
    let kernel = g.define(m, "kernel");
    let float = g.float_type();
    let ta = g.tensor(float, &[3, 5]);
    let tb = g.tensor(float, &[5, 7]);
    g.param(kernel, "a", Some(ta));
    g.param(kernel, "b", Some(tb));
    let a = g.name("a");
    let b = g.name("b");
    let mm = g.binary(BinaryOp::MatMul, a, b);
    g.ret(kernel, Some(mm));

    let compilation = Compiler::new(Options {
        auto_entry_points: true,
        ..Options::default()
    })
    .compile(&mut g, m);

    assert!(!compilation.has_errors());
    let out = g.nodes[mm].resolved_type.unwrap();
    assert_eq!(g.type_name(out), "float3x7f");

    // One helper, registered under both operand type names.
    assert_eq!(compilation.support_definitions.len(), 1);
    let helper = compilation
        .support_definitions
        .get("mul_float3x5f_float5x7f")
        .unwrap();
    // The synthesized body came out fully typed.
    assert!(g.nodes[helper].resolved_type.is_some());
    assert_eq!(g.support_fn_name(mm).as_deref(), Some("mul_float3x5f_float5x7f"));

    // The kernel itself got wrapped for dispatch.
    assert_eq!(compilation.entry_points.len(), 1);
    assert_eq!(compilation.entry_points[0].function, kernel);
    assert_eq!(compilation.entry_points[0].stage, Stage::Compute);
    assert!(compilation.entry_points[0].wrapper.is_some());
}

#[test]
fn matmul_shape_mismatch_reports_and_leaves_unresolved() {
    let mut g = Graph::new();
    let m = g.module("m");
    let kernel = g.define(m, "kernel");
    let float = g.float_type();
    let ta = g.tensor(float, &[3, 5]);
    let tb = g.tensor(float, &[6, 7]);
    g.param(kernel, "a", Some(ta));
    g.param(kernel, "b", Some(tb));
    let a = g.name("a");
    let b = g.name("b");
    let mm = g.binary(BinaryOp::MatMul, a, b);
    g.ret(kernel, Some(mm));

    let compilation = compile(&mut g, m);
    assert!(compilation.has_errors());
    assert!(compilation
        .diagnostics
        .messages
        .iter()
        .any(|d| d.message.contains("matrices can't be multiplied: 3x5 x 6x7")));
    assert_eq!(g.nodes[mm].resolved_type, None);
    assert!(compilation.support_definitions.is_empty());
}

#[test]
fn self_referential_type_is_reported_not_looped() {
    let mut g = Graph::new();
    let m = g.module("m");
    let void = g.void_type();
    let alias = g.alias("Weird", void);
    if let NodeKind::Alias(a) = &mut g.nodes[alias].kind {
        a.target = alias;
    }
    g.register_type(m, alias);

    let compilation = compile(&mut g, m);
    assert!(compilation.has_errors());
    assert!(compilation
        .diagnostics
        .messages
        .iter()
        .any(|d| d.message.contains("'Weird' could not be resolved")));
    assert_eq!(g.nodes[alias].resolved_type, None);
}

#[test]
fn tagged_stage_wins_over_auto_wrapping() {
    let mut g = Graph::new();
    let m = g.module("m");
    let f = g.define(m, "render");
    g.set_stage(f, Stage::Vertex);
    g.ret(f, None);
    let last = g.define(m, "helper");
    g.ret(last, None);

    let compilation = Compiler::new(Options {
        auto_entry_points: true,
        ..Options::default()
    })
    .compile(&mut g, m);

    assert_eq!(compilation.entry_points.len(), 1);
    assert_eq!(compilation.entry_points[0].function, f);
    assert!(compilation.entry_points[0].wrapper.is_none());
}

#[test]
fn unresolved_entry_candidate_is_a_warning_only() {
    let mut g = Graph::new();
    let m = g.module("m");
    let f = g.define(m, "kernel");
    let ghost = g.name("ghost");
    g.ret(f, Some(ghost));

    let compilation = Compiler::new(Options {
        auto_entry_points: true,
        ..Options::default()
    })
    .compile(&mut g, m);

    assert!(compilation.entry_points.is_empty());
    assert!(compilation
        .diagnostics
        .messages
        .iter()
        .any(|d| d.message.contains("cannot synthesize an entry point")));
}

#[test]
fn folding_shrinks_loop_bodies_before_resolution() {
    // A flat index with constant coordinates collapses to one constant
    // before any pass runs; the compiler then has nothing left to resolve
    // but that constant.
    let mut g = Graph::new();
    let m = g.module("m");
    let f = g.define(m, "f");
    let float = g.float_type();
    let t = g.tensor(float, &[3, 5, 7, 11]);
    g.param(f, "data", Some(t));
    let shape = slate_ir::TensorShape(vec![3, 5, 7, 11]);
    let indices: Vec<NodeId> = [1, 2, 3, 4].iter().map(|&i| g.constant(i)).collect();
    let flat = g.flat_index(&shape, &indices);
    assert_eq!(g.literal(flat), Some(slate_ir::Literal::Int(576)));
    let data = g.name("data");
    let elem = g.index(data, vec![flat]);
    g.ret(f, Some(elem));

    let compilation = compile(&mut g, m);
    assert!(!compilation.has_errors());
    assert_eq!(return_type(&g, f), Some(float));
}
