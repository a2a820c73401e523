//! Graph traversal helpers.

use std::collections::HashSet;

use slate_ir::{Graph, NodeId};

/// Depth-first post-order over a node's edge list.
///
/// Every reachable node appears exactly once, children before parents. The
/// visited set doubles as a cycle guard: self-referential types terminate
/// instead of recursing forever.
pub fn postorder(graph: &Graph, root: NodeId) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    walk(graph, root, &mut visited, &mut order);
    order
}

fn walk(graph: &Graph, node: NodeId, visited: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
    if !visited.insert(node) {
        return;
    }
    for (_, child) in graph.nodes[node].edges() {
        walk(graph, child, visited, order);
    }
    order.push(node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use slate_ir::BinaryOp;

    #[test]
    fn children_come_before_parents() {
        let mut g = Graph::new();
        let m = g.module("m");
        let f = g.define(m, "f");
        let a = g.constant(1);
        let b = g.name("x");
        let sum = g.binary(BinaryOp::Add, a, b);
        g.ret(f, Some(sum));

        let order = postorder(&g, m);
        let pos = |id| order.iter().position(|&n| n == id).unwrap();
        assert!(pos(a) < pos(sum));
        assert!(pos(b) < pos(sum));
        assert!(pos(sum) < pos(f));
        assert_eq!(order.last(), Some(&m));
    }

    #[test]
    fn self_referential_alias_terminates() {
        let mut g = Graph::new();
        let m = g.module("m");
        let placeholder = g.void_type();
        let alias = g.alias("Weird", placeholder);
        // Point the alias at itself after construction.
        if let slate_ir::NodeKind::Alias(a) = &mut g.nodes[alias].kind {
            a.target = alias;
        }
        g.register_type(m, alias);
        let order = postorder(&g, m);
        assert_eq!(order.iter().filter(|&&n| n == alias).count(), 1);
    }
}
