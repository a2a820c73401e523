//! Display implementations and text dump for debugging.

use std::fmt;

use crate::diag::{Diagnostic, Severity};
use crate::graph::Graph;
use crate::node::{BinaryOp, Literal, NodeId, NodeKind, Stage, Tag};
use crate::types::{AccessMode, AddressSpace};

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compute => write!(f, "compute"),
            Self::Vertex => write!(f, "vertex"),
            Self::Fragment => write!(f, "fragment"),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => write!(f, "function"),
            Self::Private => write!(f, "private"),
            Self::Workgroup => write!(f, "workgroup"),
            Self::Uniform => write!(f, "uniform"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::ReadWrite => write!(f, "read_write"),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(n) => write!(f, "{}: {} (at {n:?})", self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Renders an expression node as source-like text.
///
/// Parenthesizes by operator precedence, so the output re-parses to the same
/// tree shape.
pub fn format_expr(graph: &Graph, expr: NodeId) -> String {
    match &graph.nodes[expr].kind {
        NodeKind::Name(n) => n.name.clone(),
        NodeKind::Constant(c) => c.value.to_string(),
        NodeKind::Binary(b) => {
            let prec = b.op.precedence();
            let left = format_operand(graph, b.left, prec, false);
            let right = format_operand(graph, b.right, prec, b.op.is_left_assoc());
            format!("{left} {} {right}", b.op)
        }
        NodeKind::Call(c) => {
            let args: Vec<String> = c.args.iter().map(|&a| format_expr(graph, a)).collect();
            format!("{}({})", format_expr(graph, c.callee), args.join(", "))
        }
        NodeKind::Index(i) => {
            let indices: Vec<String> = i.indices.iter().map(|&x| format_expr(graph, x)).collect();
            format!("{}[{}]", format_expr(graph, i.base), indices.join(", "))
        }
        NodeKind::Variable(v) => v.name.clone(),
        NodeKind::Parameter(p) => p.name.clone(),
        NodeKind::Function(f) => f.name.clone(),
        _ if graph.nodes[expr].is_type() => graph.type_name(expr),
        kind => format!("<{}>", kind.tag()),
    }
}

fn format_operand(graph: &Graph, operand: NodeId, parent_prec: u8, is_right: bool) -> String {
    let text = format_expr(graph, operand);
    if let NodeKind::Binary(b) = &graph.nodes[operand].kind {
        let prec = b.op.precedence();
        if prec < parent_prec || (prec == parent_prec && is_right) {
            return format!("({text})");
        }
    }
    text
}

fn format_stmt(out: &mut String, graph: &Graph, stmt: NodeId, indent: usize) {
    let pad = "  ".repeat(indent);
    match &graph.nodes[stmt].kind {
        NodeKind::Return(r) => match r.value {
            Some(v) => out.push_str(&format!("{pad}return {}\n", format_expr(graph, v))),
            None => out.push_str(&format!("{pad}return\n")),
        },
        NodeKind::Assign(a) => out.push_str(&format!(
            "{pad}{} = {}\n",
            format_expr(graph, a.target),
            format_expr(graph, a.value)
        )),
        NodeKind::ExprStmt(e) => {
            out.push_str(&format!("{pad}{}\n", format_expr(graph, e.expr)));
        }
        NodeKind::Loop(l) => {
            let counter = format_expr(graph, l.counter);
            let count = format_expr(graph, l.count);
            out.push_str(&format!("{pad}loop {counter} in 0..{count} {{\n"));
            for &v in &l.variables {
                dump_variable(out, graph, v, indent + 1);
            }
            for &s in &l.statements {
                format_stmt(out, graph, s, indent + 1);
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        other => out.push_str(&format!("{pad}<{}>\n", other.tag())),
    }
}

fn dump_variable(out: &mut String, graph: &Graph, var: NodeId, indent: usize) {
    let pad = "  ".repeat(indent);
    if let NodeKind::Variable(v) = &graph.nodes[var].kind {
        let ty = match v.ty.or(graph.nodes[var].resolved_type) {
            Some(t) => format!(": {}", graph.type_name(t)),
            None => String::new(),
        };
        let init = match v.init {
            Some(i) => format!(" = {}", format_expr(graph, i)),
            None => String::new(),
        };
        out.push_str(&format!("{pad}var {}{ty}{init}\n", v.name));
    }
}

/// Produces a human-readable text dump of a module graph for debugging.
pub fn dump_graph(graph: &Graph, root: NodeId) -> String {
    let mut out = String::new();
    let module = match &graph.nodes[root].kind {
        NodeKind::Module(m) => m,
        other => {
            return format!("<{} is not a module>\n", other.tag());
        }
    };

    if let Some(name) = &module.name {
        out.push_str(&format!("Module {name}:\n"));
    } else {
        out.push_str("Module:\n");
    }

    if !module.types.is_empty() {
        out.push_str("Types:\n");
        for &ty in &module.types {
            out.push_str(&format!("  {ty:?} {}\n", graph.type_name(ty)));
        }
    }

    if !module.variables.is_empty() {
        out.push_str("Variables:\n");
        for &v in &module.variables {
            dump_variable(&mut out, graph, v, 1);
        }
    }

    for &func in &module.functions {
        dump_function(&mut out, graph, func);
    }

    out
}

/// Appends a function's signature, locals, and body to the dump.
pub fn dump_function(out: &mut String, graph: &Graph, func: NodeId) {
    let f = match &graph.nodes[func].kind {
        NodeKind::Function(f) => f,
        other => {
            out.push_str(&format!("<{} is not a function>\n", other.tag()));
            return;
        }
    };

    let params: Vec<String> = f
        .parameters
        .iter()
        .map(|&p| match &graph.nodes[p].kind {
            NodeKind::Parameter(param) => match param.ty {
                Some(ty) => format!("{}: {}", param.name, graph.type_name(ty)),
                None => param.name.clone(),
            },
            _ => "_".to_string(),
        })
        .collect();
    let ret = match f.return_type.or(graph.nodes[func]
        .resolved_type
        .and_then(|t| match &graph.nodes[t].kind {
            NodeKind::FunctionType(ft) => Some(ft.return_type),
            _ => None,
        })) {
        Some(ty) => format!(" -> {}", graph.type_name(ty)),
        None => String::new(),
    };
    let stage = match f.stage {
        Some(s) => format!("@{s} "),
        None => String::new(),
    };
    out.push_str(&format!("{stage}fn {}({}){ret} {{\n", f.name, params.join(", ")));

    for &v in &f.variables {
        dump_variable(out, graph, v, 1);
    }
    for &s in &f.statements {
        format_stmt(out, graph, s, 1);
    }
    out.push_str("}\n");
}
