//! The attributed node graph and its builder.
//!
//! A [`Graph`] owns a single arena of [`Node`]s and hands out [`NodeId`]
//! handles. Callers construct kernels through the builder methods; the
//! resolution passes then fill the per-node caches in place. The whole graph
//! is scoped to one compilation and discarded after.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::node::{
    AssignStmt, BinaryExpr, BinaryOp, BlockCaps, CallExpr, ConstantExpr, ExprStmt, FieldNode,
    FunctionNode, IndexExpr, Literal, LoopStmt, ModuleNode, NameExpr, Node, NodeId, NodeKind,
    ParameterNode, ReturnStmt, Stage, VariableNode,
};
use crate::types::{
    AccessMode, AddressSpace, AliasType, ArrayType, FunctionTypeNode, PointerType, ScalarType,
    StructType, TensorShape, TensorType, VectorType, BUILTIN_SCALARS, BUILTIN_VECTOR_SCALARS,
};

/// The node graph: arena storage plus the built-in type table.
#[derive(Clone, Debug)]
pub struct Graph {
    pub nodes: Arena<Node>,
    builtins: HashMap<String, NodeId>,
    /// Bumped whenever a type's structure is mutated; layout caches check
    /// it to know when their memos are stale.
    pub(crate) types_generation: u64,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates a graph with the built-in scalar and vector types installed.
    pub fn new() -> Self {
        let mut g = Self {
            nodes: Arena::new(),
            builtins: HashMap::new(),
            types_generation: 0,
        };
        let void = g.add_resolved_type(NodeKind::Void);
        g.builtins.insert("void".into(), void);
        let module_ty = g.add_resolved_type(NodeKind::ModuleType);
        g.builtins.insert("module".into(), module_ty);

        for (name, kind, bits, suffix) in BUILTIN_SCALARS {
            let id = g.add_resolved_type(NodeKind::Scalar(ScalarType {
                name,
                kind,
                bits,
                suffix,
            }));
            g.builtins.insert(name.into(), id);
        }
        for scalar_name in BUILTIN_VECTOR_SCALARS {
            let element = g.builtins[scalar_name];
            let suffix = match &g.nodes[element].kind {
                NodeKind::Scalar(s) => s.suffix,
                _ => unreachable!(),
            };
            for size in 2..=4u32 {
                let name = format!("vec{size}{suffix}");
                let id = g.add_resolved_type(NodeKind::Vector(VectorType {
                    name: name.clone(),
                    size,
                    element,
                }));
                g.builtins.insert(name, id);
            }
        }
        g
    }

    /// Type nodes that are their own fixed point get the cache pre-filled.
    fn add_resolved_type(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.append(Node::new(kind));
        self.nodes[id].resolved_type = Some(id);
        id
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.append(Node::new(kind))
    }

    /// Looks up a built-in type by canonical name (`"float"`, `"vec3f"`, ...).
    pub fn builtin(&self, name: &str) -> Option<NodeId> {
        self.builtins.get(name).copied()
    }

    pub fn void_type(&self) -> NodeId {
        self.builtins["void"]
    }

    pub fn module_type(&self) -> NodeId {
        self.builtins["module"]
    }

    pub fn int_type(&self) -> NodeId {
        self.builtins["int"]
    }

    pub fn float_type(&self) -> NodeId {
        self.builtins["float"]
    }

    // -----------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------

    pub fn module(&mut self, name: impl Into<String>) -> NodeId {
        self.add(NodeKind::Module(ModuleNode {
            name: Some(name.into()),
            caps: BlockCaps::MODULE,
            types: Vec::new(),
            variables: Vec::new(),
            functions: Vec::new(),
        }))
    }

    /// Declares a function inside a module.
    ///
    /// # Panics
    ///
    /// Panics if `module` is not a module or its capabilities forbid
    /// function declarations.
    pub fn define(&mut self, module: NodeId, name: impl Into<String>) -> NodeId {
        let name = name.into();
        let func = self.add(NodeKind::Function(FunctionNode {
            name: name.clone(),
            caps: BlockCaps::FUNCTION,
            parameters: Vec::new(),
            variables: Vec::new(),
            statements: Vec::new(),
            return_type: None,
            inferred_return: false,
            stage: None,
        }));
        match &mut self.nodes[module].kind {
            NodeKind::Module(m) => {
                assert!(
                    m.caps.functions,
                    "define({name}): block cannot declare functions"
                );
                m.functions.push(func);
            }
            other => panic!("define({name}): {:?} is not a module", other),
        }
        func
    }

    /// Creates a function that is not attached to any module (used for
    /// synthesized support definitions).
    pub fn detached_function(&mut self, name: impl Into<String>) -> NodeId {
        self.add(NodeKind::Function(FunctionNode {
            name: name.into(),
            caps: BlockCaps::FUNCTION,
            parameters: Vec::new(),
            variables: Vec::new(),
            statements: Vec::new(),
            return_type: None,
            inferred_return: false,
            stage: None,
        }))
    }

    pub fn param(&mut self, func: NodeId, name: impl Into<String>, ty: Option<NodeId>) -> NodeId {
        let name = name.into();
        let p = self.add(NodeKind::Parameter(ParameterNode {
            name: name.clone(),
            ty,
        }));
        match &mut self.nodes[func].kind {
            NodeKind::Function(f) => f.parameters.push(p),
            other => panic!("param({name}): {:?} is not a function", other),
        }
        p
    }

    pub fn set_return_type(&mut self, func: NodeId, ty: NodeId) {
        match &mut self.nodes[func].kind {
            NodeKind::Function(f) => f.return_type = Some(ty),
            other => panic!("set_return_type: {:?} is not a function", other),
        }
    }

    pub fn set_stage(&mut self, func: NodeId, stage: Stage) {
        match &mut self.nodes[func].kind {
            NodeKind::Function(f) => f.stage = Some(stage),
            other => panic!("set_stage: {:?} is not a function", other),
        }
    }

    /// Declares a variable in a block (module, function, or loop body).
    ///
    /// # Panics
    ///
    /// Panics if the block's capabilities forbid variable declarations.
    pub fn variable(
        &mut self,
        block: NodeId,
        name: impl Into<String>,
        ty: Option<NodeId>,
        init: Option<NodeId>,
    ) -> NodeId {
        let name = name.into();
        let v = self.add(NodeKind::Variable(VariableNode {
            name: name.clone(),
            ty,
            init,
        }));
        match &mut self.nodes[block].kind {
            NodeKind::Module(m) => {
                assert!(
                    m.caps.variables,
                    "variable({name}): block cannot declare variables"
                );
                m.variables.push(v);
            }
            NodeKind::Function(f) => {
                assert!(
                    f.caps.variables,
                    "variable({name}): block cannot declare variables"
                );
                f.variables.push(v);
            }
            NodeKind::Loop(l) => {
                assert!(
                    l.caps.variables,
                    "variable({name}): block cannot declare variables"
                );
                l.variables.push(v);
            }
            other => panic!("variable({name}): {:?} is not a block", other),
        }
        v
    }

    // -----------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------

    /// Creates a struct type with no fields. Add fields with
    /// [`field`](Self::field).
    pub fn structure(&mut self, name: impl Into<String>) -> NodeId {
        self.add(NodeKind::Struct(StructType {
            name: name.into(),
            fields: Vec::new(),
        }))
    }

    /// Appends a field to a struct, invalidating memoized layouts.
    pub fn field(&mut self, strct: NodeId, name: impl Into<String>, ty: NodeId) -> NodeId {
        let name = name.into();
        let f = self.add(NodeKind::Field(FieldNode {
            name: name.clone(),
            ty,
        }));
        match &mut self.nodes[strct].kind {
            NodeKind::Struct(s) => s.fields.push(f),
            other => panic!("field({name}): {:?} is not a struct", other),
        }
        self.types_generation += 1;
        f
    }

    /// Registers a named type in a module's type list.
    ///
    /// # Panics
    ///
    /// Panics if the block's capabilities forbid type declarations.
    pub fn register_type(&mut self, module: NodeId, ty: NodeId) {
        match &mut self.nodes[module].kind {
            NodeKind::Module(m) => {
                assert!(m.caps.types, "register_type: block cannot declare types");
                m.types.push(ty);
            }
            other => panic!("register_type: {:?} is not a module", other),
        }
    }

    /// A fixed-size (`length: Some(n)`) or runtime-sized array type.
    pub fn array(&mut self, element: NodeId, length: Option<u32>) -> NodeId {
        self.add(NodeKind::Array(ArrayType { element, length }))
    }

    pub fn tensor(&mut self, element: NodeId, shape: &[u32]) -> NodeId {
        self.add(NodeKind::Tensor(TensorType {
            element,
            shape: TensorShape(shape.to_vec()),
        }))
    }

    pub fn alias(&mut self, name: impl Into<String>, target: NodeId) -> NodeId {
        self.add(NodeKind::Alias(AliasType {
            name: name.into(),
            target,
        }))
    }

    pub fn pointer(&mut self, element: NodeId, space: AddressSpace, access: AccessMode) -> NodeId {
        self.add(NodeKind::Pointer(PointerType {
            element,
            space,
            access,
        }))
    }

    pub fn function_type(&mut self, parameters: Vec<NodeId>, return_type: NodeId) -> NodeId {
        self.add(NodeKind::FunctionType(FunctionTypeNode {
            parameters,
            return_type,
        }))
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    pub fn name(&mut self, name: impl Into<String>) -> NodeId {
        self.add(NodeKind::Name(NameExpr { name: name.into() }))
    }

    pub fn constant(&mut self, value: i64) -> NodeId {
        self.constant_lit(Literal::Int(value))
    }

    pub fn float_constant(&mut self, value: f64) -> NodeId {
        self.constant_lit(Literal::Float(value))
    }

    pub fn constant_lit(&mut self, value: Literal) -> NodeId {
        self.add(NodeKind::Constant(ConstantExpr { value }))
    }

    /// The literal value of a node, if it is a constant.
    pub fn literal(&self, id: NodeId) -> Option<Literal> {
        match &self.nodes[id].kind {
            NodeKind::Constant(c) => Some(c.value),
            _ => None,
        }
    }

    /// Builds a binary expression, folding constants eagerly.
    ///
    /// Identities applied at construction: `x+0 == x`, `x*1 == x`,
    /// `x*0 == 0`, constant pairs evaluate, and chained constant adds or
    /// multiplies on the same side combine into one constant.
    pub fn binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        if let Some(folded) = self.fold_binary(op, left, right) {
            return folded;
        }
        self.add(NodeKind::Binary(BinaryExpr { op, left, right }))
    }

    fn fold_binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> Option<NodeId> {
        let ll = self.literal(left);
        let rl = self.literal(right);

        if let (Some(a), Some(b)) = (ll, rl) {
            if let Some(v) = eval_binary(op, a, b) {
                return Some(self.constant_lit(v));
            }
            return None;
        }

        match op {
            BinaryOp::Add => {
                if rl.is_some_and(Literal::is_zero) {
                    return Some(left);
                }
                if ll.is_some_and(Literal::is_zero) {
                    return Some(right);
                }
                self.fold_constant_chain(op, left, right, ll, rl)
            }
            BinaryOp::Sub => {
                if rl.is_some_and(Literal::is_zero) {
                    return Some(left);
                }
                None
            }
            BinaryOp::Mul => {
                if rl.is_some_and(Literal::is_one) {
                    return Some(left);
                }
                if ll.is_some_and(Literal::is_one) {
                    return Some(right);
                }
                // x*0 collapses to the zero constant operand itself.
                if rl.is_some_and(Literal::is_zero) {
                    return Some(right);
                }
                if ll.is_some_and(Literal::is_zero) {
                    return Some(left);
                }
                self.fold_constant_chain(op, left, right, ll, rl)
            }
            _ => None,
        }
    }

    /// `(x ⊕ c1) ⊕ c2 -> x ⊕ (c1 ⊕ c2)` for commutative ⊕ (add, mul).
    fn fold_constant_chain(
        &mut self,
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
        ll: Option<Literal>,
        rl: Option<Literal>,
    ) -> Option<NodeId> {
        let (chain, outer) = if let Some(c2) = rl {
            (left, c2)
        } else if let Some(c2) = ll {
            (right, c2)
        } else {
            return None;
        };
        let (inner_op, inner_left, inner_right) = match &self.nodes[chain].kind {
            NodeKind::Binary(b) => (b.op, b.left, b.right),
            _ => return None,
        };
        if inner_op != op {
            return None;
        }
        let (other, c1) = if let Some(c1) = self.literal(inner_right) {
            (inner_left, c1)
        } else if let Some(c1) = self.literal(inner_left) {
            (inner_right, c1)
        } else {
            return None;
        };
        let combined = eval_binary(op, c1, outer)?;
        let combined = self.constant_lit(combined);
        Some(self.binary(op, other, combined))
    }

    pub fn call(&mut self, callee: NodeId, args: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::Call(CallExpr { callee, args }))
    }

    pub fn index(&mut self, base: NodeId, indices: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::Index(IndexExpr { base, indices }))
    }

    /// Builds the row-major flat index expression `Σ indices[i]·strides[i]`
    /// for a tensor of the given shape.
    ///
    /// Constant indices fold; symbolic indices survive as expressions.
    ///
    /// # Panics
    ///
    /// Panics if the number of indices does not match the shape's rank.
    pub fn flat_index(&mut self, shape: &TensorShape, indices: &[NodeId]) -> NodeId {
        assert!(
            indices.len() == shape.rank(),
            "flat_index: expected {} indices, got {}",
            shape.rank(),
            indices.len()
        );
        let strides = shape.row_major_strides();
        let mut acc: Option<NodeId> = None;
        for (&idx, &stride) in indices.iter().zip(strides.iter()) {
            let stride = self.constant(stride as i64);
            let term = self.binary(BinaryOp::Mul, idx, stride);
            acc = Some(match acc {
                None => term,
                Some(a) => self.binary(BinaryOp::Add, a, term),
            });
        }
        acc.unwrap_or_else(|| self.constant(0))
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn push_stmt(&mut self, block: NodeId, stmt: NodeId) {
        match &mut self.nodes[block].kind {
            NodeKind::Function(f) => {
                assert!(f.caps.statements, "block cannot hold statements");
                f.statements.push(stmt);
            }
            NodeKind::Loop(l) => {
                assert!(l.caps.statements, "block cannot hold statements");
                l.statements.push(stmt);
            }
            NodeKind::Module(m) => {
                assert!(m.caps.statements, "block cannot hold statements");
            }
            other => panic!("push_stmt: {:?} is not a block", other),
        }
    }

    pub fn ret(&mut self, block: NodeId, value: Option<NodeId>) -> NodeId {
        let r = self.add(NodeKind::Return(ReturnStmt { value }));
        self.push_stmt(block, r);
        r
    }

    /// Appends a bounded counting loop to a block and returns the loop node.
    ///
    /// The counter variable is typed `int` and is visible only inside the
    /// loop body.
    pub fn loop_stmt(&mut self, block: NodeId, var: impl Into<String>, count: NodeId) -> NodeId {
        let int = self.int_type();
        let counter = self.add(NodeKind::Variable(VariableNode {
            name: var.into(),
            ty: Some(int),
            init: None,
        }));
        let l = self.add(NodeKind::Loop(LoopStmt {
            caps: BlockCaps::LOOP,
            counter,
            count,
            variables: Vec::new(),
            statements: Vec::new(),
        }));
        self.push_stmt(block, l);
        l
    }

    pub fn assign(&mut self, block: NodeId, target: NodeId, value: NodeId) -> NodeId {
        let a = self.add(NodeKind::Assign(AssignStmt { target, value }));
        self.push_stmt(block, a);
        a
    }

    pub fn expr_stmt(&mut self, block: NodeId, expr: NodeId) -> NodeId {
        let e = self.add(NodeKind::ExprStmt(ExprStmt { expr }));
        self.push_stmt(block, e);
        e
    }

    // -----------------------------------------------------------------
    // Emitter support
    // -----------------------------------------------------------------

    /// The support-library function name a binary expression lowers to, if
    /// any: tensor matmuls become calls to a synthesized helper named from
    /// both operand types.
    pub fn support_fn_name(&self, binop: NodeId) -> Option<String> {
        let b = match &self.nodes[binop].kind {
            NodeKind::Binary(b) => b,
            _ => return None,
        };
        if b.op != BinaryOp::MatMul {
            return None;
        }
        let lt = self.nodes[b.left].resolved_type?;
        let rt = self.nodes[b.right].resolved_type?;
        if !self.is_tensor(lt) || !self.is_tensor(rt) {
            return None;
        }
        Some(format!(
            "mul_{}_{}",
            self.type_name(lt),
            self.type_name(rt)
        ))
    }
}

fn eval_binary(op: BinaryOp, a: Literal, b: Literal) -> Option<Literal> {
    use Literal::{Float, Int};
    match (a, b) {
        (Int(x), Int(y)) => match op {
            BinaryOp::Add => Some(Int(x.wrapping_add(y))),
            BinaryOp::Sub => Some(Int(x.wrapping_sub(y))),
            BinaryOp::Mul => Some(Int(x.wrapping_mul(y))),
            BinaryOp::Div if y != 0 => Some(Int(x.wrapping_div(y))),
            BinaryOp::Mod if y != 0 => Some(Int(x.wrapping_rem(y))),
            BinaryOp::BitAnd => Some(Int(x & y)),
            BinaryOp::BitOr => Some(Int(x | y)),
            BinaryOp::Xor => Some(Int(x ^ y)),
            BinaryOp::Shl => Some(Int(x.wrapping_shl(y as u32))),
            BinaryOp::Shr => Some(Int(x.wrapping_shr(y as u32))),
            _ => None,
        },
        _ => {
            let x = as_f64(a);
            let y = as_f64(b);
            match op {
                BinaryOp::Add => Some(Float(x + y)),
                BinaryOp::Sub => Some(Float(x - y)),
                BinaryOp::Mul => Some(Float(x * y)),
                BinaryOp::Div => Some(Float(x / y)),
                BinaryOp::Mod => Some(Float(x % y)),
                _ => None,
            }
        }
    }
}

fn as_f64(lit: Literal) -> f64 {
    match lit {
        Literal::Int(v) => v as f64,
        Literal::Float(v) => v,
    }
}
