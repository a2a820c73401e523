//! Entry-point collection and synthesis.
//!
//! Functions tagged with an execution [`Stage`] are entry points as-is.
//! When a module declares none and the caller opted in, the last declared
//! function is promoted: a zero-argument compute `main` wrapper is
//! synthesized that forwards a call to it.

use slate_ir::{Diagnostics, Graph, NodeId, NodeKind, Stage};

/// An entry point: the kernel function, its stage, and the synthesized
/// wrapper when the stage tag itself was synthesized.
#[derive(Clone, Debug)]
pub struct EntryPoint {
    pub function: NodeId,
    pub stage: Stage,
    pub wrapper: Option<NodeId>,
}

pub(crate) fn collect_entry_points(
    graph: &mut Graph,
    root: NodeId,
    auto_entry_points: bool,
    diags: &mut Diagnostics,
) -> Vec<EntryPoint> {
    let functions = match &graph.nodes[root].kind {
        NodeKind::Module(m) => m.functions.clone(),
        _ => return Vec::new(),
    };

    let mut entry_points = Vec::new();
    for &func in &functions {
        if let NodeKind::Function(f) = &graph.nodes[func].kind {
            if let Some(stage) = f.stage {
                entry_points.push(EntryPoint {
                    function: func,
                    stage,
                    wrapper: None,
                });
            }
        }
    }
    if !entry_points.is_empty() || !auto_entry_points {
        return entry_points;
    }

    let Some(&candidate) = functions.last() else {
        return entry_points;
    };
    if graph.nodes[candidate].resolved_type.is_none() {
        let name = match &graph.nodes[candidate].kind {
            NodeKind::Function(f) => f.name.clone(),
            _ => return entry_points,
        };
        diags.warning(
            Some(candidate),
            format!("cannot synthesize an entry point for unresolved function '{name}'"),
        );
        return entry_points;
    }

    let name = match &graph.nodes[candidate].kind {
        NodeKind::Function(f) => f.name.clone(),
        _ => return entry_points,
    };
    let wrapper = graph.detached_function("main");
    graph.set_stage(wrapper, Stage::Compute);
    let void = graph.void_type();
    graph.set_return_type(wrapper, void);
    let callee = graph.name(name);
    graph.nodes[callee].resolved_node = Some(candidate);
    let call = graph.call(callee, vec![]);
    graph.expr_stmt(wrapper, call);

    entry_points.push(EntryPoint {
        function: candidate,
        stage: Stage::Compute,
        wrapper: Some(wrapper),
    });
    entry_points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NameResolution, Pass, ReturnTypeInference, TypeResolution};

    fn resolve(graph: &mut Graph, root: NodeId) {
        let mut diags = Diagnostics::new();
        for _ in 0..4 {
            let mut changed = false;
            changed |= NameResolution.run(graph, root, &mut diags);
            changed |= TypeResolution.run(graph, root, &mut diags);
            changed |= ReturnTypeInference.run(graph, root, &mut diags);
            if !changed {
                break;
            }
        }
    }

    #[test]
    fn tagged_functions_are_entry_points() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "render");
        g.set_stage(f, Stage::Fragment);
        g.ret(f, None);
        resolve(&mut g, m);

        let mut diags = Diagnostics::new();
        let eps = collect_entry_points(&mut g, m, false, &mut diags);
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].function, f);
        assert_eq!(eps[0].stage, Stage::Fragment);
        assert!(eps[0].wrapper.is_none());
    }

    #[test]
    fn last_function_gets_wrapped_when_opted_in() {
        let mut g = Graph::new();
        let m = g.module("m");
        let first = g.define(m, "first");
        g.ret(first, None);
        let last = g.define(m, "kernel");
        let c = g.constant(7);
        g.ret(last, Some(c));
        resolve(&mut g, m);

        let mut diags = Diagnostics::new();
        let eps = collect_entry_points(&mut g, m, true, &mut diags);
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].function, last);
        assert_eq!(eps[0].stage, Stage::Compute);
        let wrapper = eps[0].wrapper.unwrap();
        match &g.nodes[wrapper].kind {
            NodeKind::Function(w) => {
                assert_eq!(w.name, "main");
                assert_eq!(w.stage, Some(Stage::Compute));
                assert_eq!(w.statements.len(), 1);
            }
            other => panic!("expected Function, got {other:?}"),
        }
    }

    #[test]
    fn no_wrap_without_opt_in() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "kernel");
        g.ret(f, None);
        resolve(&mut g, m);

        let mut diags = Diagnostics::new();
        let eps = collect_entry_points(&mut g, m, false, &mut diags);
        assert!(eps.is_empty());
    }

    #[test]
    fn unresolved_candidate_is_a_warning() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "kernel");
        let ghost = g.name("ghost");
        g.ret(f, Some(ghost));
        resolve(&mut g, m);

        let mut diags = Diagnostics::new();
        let eps = collect_entry_points(&mut g, m, true, &mut diags);
        assert!(eps.is_empty());
        assert!(!diags.has_errors());
        assert_eq!(diags.messages.len(), 1);
    }
}
