//! Nodes — every AST entity (declarations, statements, expressions, types)
//! is a tagged [`Node`] stored in the graph arena.
//!
//! The tag set is closed: visitors match on [`NodeKind`] exhaustively, and an
//! unhandled variant is a compile-time error rather than a runtime fallback.

use crate::arena::Handle;
use crate::types::{
    AliasType, ArrayType, FunctionTypeNode, PointerType, ScalarType, StructType, TensorType,
    VectorType,
};

/// A handle to a node in the graph arena.
pub type NodeId = Handle<Node>;

/// A node in the AST/type graph.
///
/// The kind never changes after construction. The two caches are filled by
/// the resolution passes: `resolved_type` on every node, `resolved_node` on
/// name-like nodes only.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    /// Handle to the type node this node resolved to, once known.
    pub resolved_type: Option<NodeId>,
    /// For `Name` nodes: the declaration the name binds to.
    pub resolved_node: Option<NodeId>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            resolved_type: None,
            resolved_node: None,
        }
    }

    /// The tag identifying this node's concrete variant.
    pub fn tag(&self) -> Tag {
        self.kind.tag()
    }

    /// The ordered `(relation, child)` edge list of this node.
    ///
    /// This is the generic traversal surface: emitters and the traversal
    /// helpers walk children through it without matching on the variant.
    pub fn edges(&self) -> Vec<(Rel, NodeId)> {
        let mut out = Vec::new();
        match &self.kind {
            NodeKind::Module(m) => {
                push_all(&mut out, Rel::Types, &m.types);
                push_all(&mut out, Rel::Variables, &m.variables);
                push_all(&mut out, Rel::Functions, &m.functions);
            }
            NodeKind::Function(f) => {
                push_all(&mut out, Rel::Parameters, &f.parameters);
                if let Some(rt) = f.return_type {
                    out.push((Rel::ReturnType, rt));
                }
                push_all(&mut out, Rel::Variables, &f.variables);
                push_all(&mut out, Rel::Statements, &f.statements);
            }
            NodeKind::Parameter(p) => {
                if let Some(ty) = p.ty {
                    out.push((Rel::DeclaredType, ty));
                }
            }
            NodeKind::Variable(v) => {
                if let Some(ty) = v.ty {
                    out.push((Rel::DeclaredType, ty));
                }
                if let Some(init) = v.init {
                    out.push((Rel::Init, init));
                }
            }
            NodeKind::Field(f) => out.push((Rel::DeclaredType, f.ty)),
            NodeKind::Scalar(_) | NodeKind::Void | NodeKind::ModuleType => {}
            NodeKind::Vector(v) => out.push((Rel::Element, v.element)),
            NodeKind::Array(a) => out.push((Rel::Element, a.element)),
            NodeKind::Struct(s) => push_all(&mut out, Rel::Fields, &s.fields),
            NodeKind::Tensor(t) => out.push((Rel::Element, t.element)),
            NodeKind::Pointer(p) => out.push((Rel::Element, p.element)),
            NodeKind::FunctionType(f) => {
                push_all(&mut out, Rel::Parameters, &f.parameters);
                out.push((Rel::ReturnType, f.return_type));
            }
            NodeKind::Alias(a) => out.push((Rel::Aliased, a.target)),
            NodeKind::Name(_) | NodeKind::Constant(_) => {}
            NodeKind::Binary(b) => {
                out.push((Rel::Left, b.left));
                out.push((Rel::Right, b.right));
            }
            NodeKind::Call(c) => {
                out.push((Rel::Callee, c.callee));
                push_all(&mut out, Rel::Args, &c.args);
            }
            NodeKind::Index(i) => {
                out.push((Rel::Base, i.base));
                push_all(&mut out, Rel::Indices, &i.indices);
            }
            NodeKind::Return(r) => {
                if let Some(v) = r.value {
                    out.push((Rel::Value, v));
                }
            }
            NodeKind::Loop(l) => {
                out.push((Rel::Counter, l.counter));
                out.push((Rel::Count, l.count));
                push_all(&mut out, Rel::Variables, &l.variables);
                push_all(&mut out, Rel::Statements, &l.statements);
            }
            NodeKind::Assign(a) => {
                out.push((Rel::Target, a.target));
                out.push((Rel::Value, a.value));
            }
            NodeKind::ExprStmt(e) => out.push((Rel::Expr, e.expr)),
        }
        out
    }

    /// Returns `true` if this node is a type node.
    pub fn is_type(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Scalar(_)
                | NodeKind::Vector(_)
                | NodeKind::Array(_)
                | NodeKind::Struct(_)
                | NodeKind::Tensor(_)
                | NodeKind::Pointer(_)
                | NodeKind::FunctionType(_)
                | NodeKind::ModuleType
                | NodeKind::Alias(_)
                | NodeKind::Void
        )
    }
}

fn push_all(out: &mut Vec<(Rel, NodeId)>, rel: Rel, children: &[NodeId]) {
    for &c in children {
        out.push((rel, c));
    }
}

/// The closed set of node tags.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Tag {
    Module,
    Function,
    Parameter,
    Variable,
    Field,
    Scalar,
    Vector,
    Array,
    Struct,
    Tensor,
    Pointer,
    FunctionType,
    ModuleType,
    Alias,
    Void,
    Name,
    Constant,
    Binary,
    Call,
    Index,
    Return,
    Loop,
    Assign,
    ExprStmt,
}

/// Relation labels on the edge list.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Rel {
    Types,
    Variables,
    Functions,
    Parameters,
    Statements,
    Fields,
    ReturnType,
    DeclaredType,
    Init,
    Element,
    Aliased,
    Left,
    Right,
    Callee,
    Args,
    Base,
    Indices,
    Value,
    Counter,
    Count,
    Target,
    Expr,
}

/// The concrete variant of a node.
#[derive(Clone, Debug)]
pub enum NodeKind {
    // Declarations
    Module(ModuleNode),
    Function(FunctionNode),
    Parameter(ParameterNode),
    Variable(VariableNode),
    Field(FieldNode),
    // Types
    Scalar(ScalarType),
    Vector(VectorType),
    Array(ArrayType),
    Struct(StructType),
    Tensor(TensorType),
    Pointer(PointerType),
    FunctionType(FunctionTypeNode),
    ModuleType,
    Alias(AliasType),
    Void,
    // Expressions
    Name(NameExpr),
    Constant(ConstantExpr),
    Binary(BinaryExpr),
    Call(CallExpr),
    Index(IndexExpr),
    // Statements
    Return(ReturnStmt),
    Loop(LoopStmt),
    Assign(AssignStmt),
    ExprStmt(ExprStmt),
}

impl NodeKind {
    /// The tag identifying this variant.
    pub fn tag(&self) -> Tag {
        match self {
            Self::Module(_) => Tag::Module,
            Self::Function(_) => Tag::Function,
            Self::Parameter(_) => Tag::Parameter,
            Self::Variable(_) => Tag::Variable,
            Self::Field(_) => Tag::Field,
            Self::Scalar(_) => Tag::Scalar,
            Self::Vector(_) => Tag::Vector,
            Self::Array(_) => Tag::Array,
            Self::Struct(_) => Tag::Struct,
            Self::Tensor(_) => Tag::Tensor,
            Self::Pointer(_) => Tag::Pointer,
            Self::FunctionType(_) => Tag::FunctionType,
            Self::ModuleType => Tag::ModuleType,
            Self::Alias(_) => Tag::Alias,
            Self::Void => Tag::Void,
            Self::Name(_) => Tag::Name,
            Self::Constant(_) => Tag::Constant,
            Self::Binary(_) => Tag::Binary,
            Self::Call(_) => Tag::Call,
            Self::Index(_) => Tag::Index,
            Self::Return(_) => Tag::Return,
            Self::Loop(_) => Tag::Loop,
            Self::Assign(_) => Tag::Assign,
            Self::ExprStmt(_) => Tag::ExprStmt,
        }
    }
}

/// Per-instance capability flags gating what a block may own.
///
/// Violating a capability is a construction-time panic, not a diagnostic.
#[derive(Clone, Copy, Debug)]
pub struct BlockCaps {
    pub types: bool,
    pub functions: bool,
    pub variables: bool,
    pub statements: bool,
}

impl BlockCaps {
    pub const MODULE: Self = Self {
        types: true,
        functions: true,
        variables: true,
        statements: false,
    };
    pub const FUNCTION: Self = Self {
        types: false,
        functions: false,
        variables: true,
        statements: true,
    };
    pub const LOOP: Self = Self {
        types: false,
        functions: false,
        variables: true,
        statements: true,
    };
}

/// Execution stage of an entry-point function.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Stage {
    Compute,
    Vertex,
    Fragment,
}

/// A module: the root block owning types, variables, and functions.
#[derive(Clone, Debug)]
pub struct ModuleNode {
    pub name: Option<String>,
    pub caps: BlockCaps,
    pub types: Vec<NodeId>,
    pub variables: Vec<NodeId>,
    pub functions: Vec<NodeId>,
}

/// A function declaration.
///
/// `return_type` may be absent at construction and set later by return-type
/// inference.
#[derive(Clone, Debug)]
pub struct FunctionNode {
    pub name: String,
    pub caps: BlockCaps,
    pub parameters: Vec<NodeId>,
    pub variables: Vec<NodeId>,
    pub statements: Vec<NodeId>,
    pub return_type: Option<NodeId>,
    /// Set when `return_type` was inferred from return statements rather
    /// than declared through the builder.
    pub inferred_return: bool,
    pub stage: Option<Stage>,
}

#[derive(Clone, Debug)]
pub struct ParameterNode {
    pub name: String,
    pub ty: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub struct VariableNode {
    pub name: String,
    pub ty: Option<NodeId>,
    pub init: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub struct FieldNode {
    pub name: String,
    pub ty: NodeId,
}

/// A bare name reference, bound by name resolution.
#[derive(Clone, Debug)]
pub struct NameExpr {
    pub name: String,
}

/// A literal constant value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
}

impl Literal {
    pub fn is_zero(self) -> bool {
        match self {
            Self::Int(v) => v == 0,
            Self::Float(v) => v == 0.0,
        }
    }

    pub fn is_one(self) -> bool {
        match self {
            Self::Int(v) => v == 1,
            Self::Float(v) => v == 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConstantExpr {
    pub value: Literal,
}

#[derive(Clone, Debug)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: NodeId,
    pub right: NodeId,
}

#[derive(Clone, Debug)]
pub struct CallExpr {
    pub callee: NodeId,
    pub args: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct IndexExpr {
    pub base: NodeId,
    pub indices: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct ReturnStmt {
    pub value: Option<NodeId>,
}

/// A bounded counting loop: `for counter in 0..count { ... }`.
#[derive(Clone, Debug)]
pub struct LoopStmt {
    pub caps: BlockCaps,
    /// The counter variable node, bound in the loop body's scope.
    pub counter: NodeId,
    /// The (expression) iteration count.
    pub count: NodeId,
    pub variables: Vec<NodeId>,
    pub statements: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub struct AssignStmt {
    pub target: NodeId,
    pub value: NodeId,
}

#[derive(Clone, Debug)]
pub struct ExprStmt {
    pub expr: NodeId,
}

/// A binary operator: symbolic name, surface token, precedence.
///
/// Precedence and associativity are carried for pretty-printers; the core
/// only uses the operator identity.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    MatMul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    BitAnd,
    BitOr,
}

impl BinaryOp {
    /// All operators, in surface-table order.
    pub const ALL: [BinaryOp; 19] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::MatMul,
        Self::Div,
        Self::Mod,
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Shl,
        Self::Shr,
        Self::BitAnd,
        Self::BitOr,
    ];

    /// Symbolic name ("add", "matmul", ...).
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::MatMul => "matmul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Shl => "shl",
            Self::Shr => "shr",
            Self::BitAnd => "band",
            Self::BitOr => "bor",
        }
    }

    /// Surface token ("+", "@", "<<", ...).
    pub fn token(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::MatMul => "@",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Xor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::BitAnd => "&",
            Self::BitOr => "|",
        }
    }

    /// Binding strength for pretty-printers (higher binds tighter).
    pub fn precedence(self) -> u8 {
        match self {
            Self::Mul | Self::MatMul | Self::Div | Self::Mod => 10,
            Self::Add | Self::Sub => 9,
            Self::Shl | Self::Shr => 8,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 7,
            Self::Eq | Self::Ne => 6,
            Self::BitAnd => 5,
            Self::Xor => 4,
            Self::BitOr => 3,
            Self::And => 2,
            Self::Or => 1,
        }
    }

    pub fn is_left_assoc(self) -> bool {
        true
    }

    /// True for operators whose operands must be numeric or tensor.
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.token() == token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_table_round_trips() {
        for op in BinaryOp::ALL {
            assert_eq!(BinaryOp::from_name(op.name()), Some(op));
            assert_eq!(BinaryOp::from_token(op.token()), Some(op));
        }
        assert_eq!(BinaryOp::from_token("**"), None);
        assert_eq!(BinaryOp::from_name("pow"), None);
    }

    #[test]
    fn matmul_token() {
        assert_eq!(BinaryOp::MatMul.token(), "@");
        assert_eq!(BinaryOp::from_name("matmul"), Some(BinaryOp::MatMul));
    }

    #[test]
    fn precedence_orders_mul_over_add() {
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() > BinaryOp::Shl.precedence());
    }

    #[test]
    fn literal_identities() {
        assert!(Literal::Int(0).is_zero());
        assert!(Literal::Float(0.0).is_zero());
        assert!(Literal::Int(1).is_one());
        assert!(!Literal::Float(2.0).is_one());
    }
}
