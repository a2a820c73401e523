//! Name resolution: binds `Name` expressions to the declarations they
//! reference.
//!
//! The walk carries a scope chain as a plain vector of `(name, decl)`
//! pairs. Module, function, and loop boundaries clone the chain and push
//! their own bindings, so shadowing falls out of a reverse lookup. A hit is
//! cached in `resolved_node` and never recomputed; a miss is a diagnostic,
//! not a failure.

use std::collections::HashSet;

use slate_ir::{Diagnostics, Graph, NodeId, NodeKind};

use crate::Pass;

#[derive(Debug, Default)]
pub struct NameResolution;

type Scope = Vec<(String, NodeId)>;

impl Pass for NameResolution {
    fn name(&self) -> &str {
        "name-resolution"
    }

    fn run(&self, graph: &mut Graph, root: NodeId, diags: &mut Diagnostics) -> bool {
        let mut resolver = Resolver {
            changed: false,
            visited: HashSet::new(),
        };
        resolver.visit(graph, root, &Scope::new(), diags);
        resolver.changed
    }
}

struct Resolver {
    changed: bool,
    visited: HashSet<NodeId>,
}

impl Resolver {
    fn visit(&mut self, graph: &mut Graph, node: NodeId, scope: &Scope, diags: &mut Diagnostics) {
        if !self.visited.insert(node) {
            return;
        }
        match graph.nodes[node].kind.clone() {
            NodeKind::Module(m) => {
                let mut inner = scope.clone();
                bind_all(graph, &mut inner, &m.types);
                bind_all(graph, &mut inner, &m.variables);
                bind_all(graph, &mut inner, &m.functions);
                for &child in m.types.iter().chain(&m.variables).chain(&m.functions) {
                    self.visit(graph, child, &inner, diags);
                }
            }
            NodeKind::Function(f) => {
                let mut inner = scope.clone();
                bind_all(graph, &mut inner, &f.parameters);
                bind_all(graph, &mut inner, &f.variables);
                for &child in f
                    .parameters
                    .iter()
                    .chain(&f.variables)
                    .chain(&f.statements)
                {
                    self.visit(graph, child, &inner, diags);
                }
            }
            NodeKind::Loop(l) => {
                // The iteration count is evaluated outside the loop body.
                self.visit(graph, l.count, scope, diags);
                let mut inner = scope.clone();
                bind_all(graph, &mut inner, &[l.counter]);
                bind_all(graph, &mut inner, &l.variables);
                for &child in l.variables.iter().chain(&l.statements) {
                    self.visit(graph, child, &inner, diags);
                }
            }
            NodeKind::Name(n) => {
                if graph.nodes[node].resolved_node.is_none() {
                    match lookup(scope, &n.name) {
                        Some(decl) => {
                            graph.nodes[node].resolved_node = Some(decl);
                            self.changed = true;
                        }
                        None => diags.error(Some(node), format!("name '{}' not found", n.name)),
                    }
                }
            }
            _ => {
                for (_, child) in graph.nodes[node].edges() {
                    self.visit(graph, child, scope, diags);
                }
            }
        }
    }
}

fn lookup(scope: &Scope, name: &str) -> Option<NodeId> {
    scope
        .iter()
        .rev()
        .find(|(bound, _)| bound == name)
        .map(|&(_, decl)| decl)
}

fn bind_all(graph: &Graph, scope: &mut Scope, decls: &[NodeId]) {
    for &decl in decls {
        if let Some(name) = decl_name(graph, decl) {
            scope.push((name, decl));
        }
    }
}

fn decl_name(graph: &Graph, decl: NodeId) -> Option<String> {
    match &graph.nodes[decl].kind {
        NodeKind::Function(f) => Some(f.name.clone()),
        NodeKind::Parameter(p) => Some(p.name.clone()),
        NodeKind::Variable(v) => Some(v.name.clone()),
        NodeKind::Struct(s) => Some(s.name.clone()),
        NodeKind::Alias(a) => Some(a.name.clone()),
        _ => None,
    }
}
