//! Return-type inference for functions declared without one.
//!
//! A function with no reachable `return`, or only value-less ones, is
//! `void` right away. Otherwise the distinct resolved types of the returned
//! values decide: none resolved yet defers to a later iteration, exactly
//! one is adopted, and more than one is a diagnostic with the first adopted
//! as a best effort.

use slate_ir::{Diagnostics, Graph, NodeId, NodeKind};

use crate::Pass;

#[derive(Debug, Default)]
pub struct ReturnTypeInference;

impl Pass for ReturnTypeInference {
    fn name(&self) -> &str {
        "return-type-inference"
    }

    fn run(&self, graph: &mut Graph, root: NodeId, diags: &mut Diagnostics) -> bool {
        let functions = match &graph.nodes[root].kind {
            NodeKind::Module(m) => m.functions.clone(),
            _ => return false,
        };
        let mut changed = false;
        for func in functions {
            changed |= infer_function(graph, func, diags);
        }
        changed
    }
}

fn infer_function(graph: &mut Graph, func: NodeId, diags: &mut Diagnostics) -> bool {
    let f = match &graph.nodes[func].kind {
        NodeKind::Function(f) => f.clone(),
        _ => return false,
    };
    // A declared return type is authoritative; inference never touches it
    // and never second-guesses its return statements.
    if f.return_type.is_some() && !f.inferred_return {
        return false;
    }

    let mut returns = Vec::new();
    collect_returns(graph, &f.statements, &mut returns);
    let valued: Vec<NodeId> = returns.iter().filter_map(|&r| r).collect();
    if valued.is_empty() {
        if f.return_type.is_some() {
            return false;
        }
        let void = graph.void_type();
        adopt_return(graph, func, void);
        return true;
    }

    // Distinct by printable name, not node identity: structurally equal
    // tensor types live in separate nodes.
    let mut distinct: Vec<(String, NodeId)> = Vec::new();
    let mut unresolved = false;
    for value in valued {
        match graph.nodes[value].resolved_type {
            Some(ty) => {
                let name = graph.type_name(ty);
                if !distinct.iter().any(|(n, _)| *n == name) {
                    distinct.push((name, ty));
                }
            }
            None => unresolved = true,
        }
    }

    // The conflict is re-reported every iteration so it survives the
    // driver's per-iteration clear.
    if distinct.len() > 1 {
        diags.error(
            Some(func),
            format!(
                "function '{}' returns conflicting types: {} and {}",
                f.name, distinct[0].0, distinct[1].0
            ),
        );
    }

    if f.return_type.is_some() {
        return false;
    }
    match distinct.len() {
        0 => false,
        1 if unresolved => false,
        // Best effort on a conflict: the first return's type wins.
        _ => {
            adopt_return(graph, func, distinct[0].1);
            true
        }
    }
}

fn adopt_return(graph: &mut Graph, func: NodeId, ty: NodeId) {
    if let NodeKind::Function(f) = &mut graph.nodes[func].kind {
        f.return_type = Some(ty);
        f.inferred_return = true;
    }
}

fn collect_returns(graph: &Graph, statements: &[NodeId], out: &mut Vec<Option<NodeId>>) {
    for &stmt in statements {
        match &graph.nodes[stmt].kind {
            NodeKind::Return(r) => out.push(r.value),
            NodeKind::Loop(l) => collect_returns(graph, &l.statements, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NameResolution, TypeResolution};

    fn resolve(graph: &mut Graph, root: NodeId) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for _ in 0..4 {
            diags.clear();
            let mut changed = false;
            changed |= NameResolution.run(graph, root, &mut diags);
            changed |= TypeResolution.run(graph, root, &mut diags);
            changed |= ReturnTypeInference.run(graph, root, &mut diags);
            if !changed {
                break;
            }
        }
        diags
    }

    fn return_type(graph: &Graph, func: NodeId) -> Option<NodeId> {
        match &graph.nodes[func].kind {
            NodeKind::Function(f) => f.return_type,
            _ => None,
        }
    }

    #[test]
    fn no_return_means_void() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "f");
        let zero = g.constant(0);
        g.variable(f, "x", None, Some(zero));

        resolve(&mut g, m);
        assert_eq!(return_type(&g, f), Some(g.void_type()));
    }

    #[test]
    fn bare_return_means_void() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "f");
        g.ret(f, None);

        resolve(&mut g, m);
        assert_eq!(return_type(&g, f), Some(g.void_type()));
    }

    #[test]
    fn constant_return_infers_int() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "f");
        let c = g.constant(42);
        g.ret(f, Some(c));

        resolve(&mut g, m);
        assert_eq!(return_type(&g, f), Some(g.int_type()));
    }

    #[test]
    fn return_inside_loop_counts() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "f");
        let ten = g.constant(10);
        let l = g.loop_stmt(f, "i", ten);
        let fc = g.float_constant(1.0);
        g.ret(l, Some(fc));

        resolve(&mut g, m);
        assert_eq!(return_type(&g, f), Some(g.float_type()));
    }

    #[test]
    fn conflicting_returns_are_a_diagnostic() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "f");
        let c = g.constant(1);
        g.ret(f, Some(c));
        let fc = g.float_constant(2.0);
        g.ret(f, Some(fc));

        let diags = resolve(&mut g, m);
        assert!(diags.has_errors());
        assert!(diags
            .messages
            .iter()
            .any(|d| d.message.contains("conflicting types")));
        // Best effort: the first return's type wins.
        assert_eq!(return_type(&g, f), Some(g.int_type()));
    }

    #[test]
    fn declared_return_type_is_untouched() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "f");
        let float = g.float_type();
        g.set_return_type(f, float);
        let c = g.constant(1);
        g.ret(f, Some(c));

        resolve(&mut g, m);
        assert_eq!(return_type(&g, f), Some(float));
    }

    #[test]
    fn declared_return_type_silences_conflicts() {
        // Inference is scoped to undeclared functions; mixed returns under
        // a declared type are not this pass's business.
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "f");
        let float = g.float_type();
        g.set_return_type(f, float);
        let c = g.constant(1);
        g.ret(f, Some(c));
        let fc = g.float_constant(2.0);
        g.ret(f, Some(fc));

        let diags = resolve(&mut g, m);
        assert!(!diags
            .messages
            .iter()
            .any(|d| d.message.contains("conflicting types")));
        assert_eq!(return_type(&g, f), Some(float));
    }
}
