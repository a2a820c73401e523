//! Type resolution: fills `resolved_type` on every node it can.
//!
//! One run is a single post-order sweep. A node resolves only from
//! already-resolved children; anything else is "needs more information" and
//! is retried on the next driver iteration. Rule violations on fully
//! resolved operands are diagnostics, never panics.

use slate_ir::{
    BinaryExpr, BinaryOp, Diagnostics, Graph, Literal, NodeId, NodeKind, TensorShape,
};

use crate::visit::postorder;
use crate::Pass;

#[derive(Debug, Default)]
pub struct TypeResolution;

impl Pass for TypeResolution {
    fn name(&self) -> &str {
        "type-resolution"
    }

    fn run(&self, graph: &mut Graph, root: NodeId, diags: &mut Diagnostics) -> bool {
        let mut changed = false;
        for node in postorder(graph, root) {
            if graph.nodes[node].resolved_type.is_some() {
                continue;
            }
            if let Some(ty) = resolve_one(graph, node, diags) {
                graph.nodes[node].resolved_type = Some(ty);
                changed = true;
            }
        }
        changed
    }
}

fn resolve_one(graph: &mut Graph, node: NodeId, diags: &mut Diagnostics) -> Option<NodeId> {
    match graph.nodes[node].kind.clone() {
        // Leaf types are their own fixed point. Built-ins come pre-resolved;
        // this covers type nodes created after Graph::new().
        NodeKind::Void | NodeKind::Scalar(_) | NodeKind::Vector(_) | NodeKind::ModuleType => {
            Some(node)
        }
        NodeKind::Tensor(t) => graph.nodes[t.element].resolved_type.map(|_| node),
        NodeKind::Array(a) => graph.nodes[a.element].resolved_type.map(|_| node),
        NodeKind::Struct(s) => {
            let all_resolved = s
                .fields
                .iter()
                .all(|&f| graph.nodes[f].resolved_type.is_some());
            all_resolved.then_some(node)
        }
        // A self-referential alias chain never resolves; the driver reports
        // it after the iteration cap.
        NodeKind::Alias(a) => {
            if a.target == node {
                None
            } else {
                graph.nodes[a.target].resolved_type
            }
        }
        NodeKind::Pointer(p) => {
            let element = graph.nodes[p.element].resolved_type?;
            if element == p.element {
                Some(node)
            } else {
                let ptr = graph.pointer(element, p.space, p.access);
                graph.nodes[ptr].resolved_type = Some(ptr);
                Some(ptr)
            }
        }
        NodeKind::FunctionType(ft) => {
            let all_resolved = ft
                .parameters
                .iter()
                .chain([&ft.return_type])
                .all(|&t| graph.nodes[t].resolved_type.is_some());
            all_resolved.then_some(node)
        }
        NodeKind::Field(f) => graph.nodes[f.ty].resolved_type,
        NodeKind::Parameter(p) => {
            let ty = p.ty?;
            graph.nodes[ty].resolved_type
        }
        NodeKind::Variable(v) => match v.init {
            Some(init) => graph.nodes[init].resolved_type,
            None => {
                let ty = v.ty?;
                graph.nodes[ty].resolved_type
            }
        },
        NodeKind::Function(f) => {
            let ret = graph.nodes[f.return_type?].resolved_type?;
            let mut params = Vec::with_capacity(f.parameters.len());
            for &p in &f.parameters {
                params.push(graph.nodes[p].resolved_type?);
            }
            let ft = graph.function_type(params, ret);
            graph.nodes[ft].resolved_type = Some(ft);
            Some(ft)
        }
        NodeKind::Name(_) => {
            let decl = graph.nodes[node].resolved_node?;
            graph.nodes[decl].resolved_type
        }
        NodeKind::Constant(c) => Some(match c.value {
            Literal::Int(_) => graph.int_type(),
            Literal::Float(_) => graph.float_type(),
        }),
        NodeKind::Binary(b) => resolve_binary(graph, node, &b, diags),
        NodeKind::Call(c) => {
            let callee_ty = graph.nodes[c.callee].resolved_type?;
            match &graph.nodes[callee_ty].kind {
                NodeKind::FunctionType(ft) => Some(ft.return_type),
                _ => {
                    diags.error(
                        Some(node),
                        format!("'{}' is not callable", graph.type_name(callee_ty)),
                    );
                    None
                }
            }
        }
        NodeKind::Index(i) => {
            let base_ty = graph.nodes[i.base].resolved_type?;
            match &graph.nodes[base_ty].kind {
                NodeKind::Vector(v) => Some(v.element),
                NodeKind::Array(a) => Some(a.element),
                NodeKind::Tensor(t) => Some(t.element),
                _ => {
                    diags.error(
                        Some(node),
                        format!("type '{}' is not indexable", graph.type_name(base_ty)),
                    );
                    None
                }
            }
        }
        NodeKind::Return(r) => match r.value {
            Some(v) => graph.nodes[v].resolved_type,
            None => Some(graph.void_type()),
        },
        NodeKind::Loop(_) | NodeKind::Assign(_) | NodeKind::ExprStmt(_) => {
            Some(graph.void_type())
        }
        NodeKind::Module(_) => Some(graph.module_type()),
    }
}

fn resolve_binary(
    graph: &mut Graph,
    node: NodeId,
    b: &BinaryExpr,
    diags: &mut Diagnostics,
) -> Option<NodeId> {
    let lt = graph.nodes[b.left].resolved_type?;
    let rt = graph.nodes[b.right].resolved_type?;

    if b.op == BinaryOp::MatMul {
        return resolve_matmul(graph, node, lt, rt, diags);
    }

    if !graph.is_algebraic(lt) || !graph.is_algebraic(rt) {
        diags.error(
            Some(node),
            format!(
                "operator '{}' is not defined for '{}' and '{}'",
                b.op.token(),
                graph.type_name(lt),
                graph.type_name(rt)
            ),
        );
        return None;
    }

    // Arithmetic on a mixed int/float pair adopts the floating side; every
    // other operator takes the left operand's type.
    if b.op.is_arithmetic() && graph.is_floatish(rt) && !graph.is_floatish(lt) {
        Some(rt)
    } else {
        Some(lt)
    }
}

fn resolve_matmul(
    graph: &mut Graph,
    node: NodeId,
    lt: NodeId,
    rt: NodeId,
    diags: &mut Diagnostics,
) -> Option<NodeId> {
    let ((element, lshape), (_, rshape)) =
        match (tensor_parts(graph, lt), tensor_parts(graph, rt)) {
            (Some(l), Some(r)) => (l, r),
            _ => {
                diags.error(
                    Some(node),
                    format!(
                        "operator '@' requires tensor operands, got '{}' and '{}'",
                        graph.type_name(lt),
                        graph.type_name(rt)
                    ),
                );
                return None;
            }
        };
    match lshape.matmul(&rshape) {
        Ok(shape) => {
            let out = graph.tensor(element, &shape.0);
            graph.nodes[out].resolved_type = Some(out);
            Some(out)
        }
        Err(e) => {
            diags.error(Some(node), e.to_string());
            None
        }
    }
}

fn tensor_parts(graph: &Graph, ty: NodeId) -> Option<(NodeId, TensorShape)> {
    match &graph.nodes[ty].kind {
        NodeKind::Tensor(t) => Some((t.element, t.shape.clone())),
        _ => None,
    }
}
