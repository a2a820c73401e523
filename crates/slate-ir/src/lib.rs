//! Slate intermediate representation.
//!
//! An arena-based attributed node graph for embedded numeric kernels.
//! Host code builds modules through the [`Graph`] builder API; the passes
//! crate resolves names and types in place and the layout engine assigns
//! buffer offsets for binding.

pub mod arena;
mod diag;
mod display;
mod error;
pub mod graph;
mod layout;
mod node;
mod types;

pub use arena::{Arena, Handle};
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use display::{dump_function, dump_graph, format_expr};
pub use error::{LayoutError, ShapeError};
pub use graph::Graph;
pub use layout::{ArrayLayout, FieldLayout, Layout, Layouter, StructLayout, TypeLayout};
pub use node::{
    AssignStmt, BinaryExpr, BinaryOp, BlockCaps, CallExpr, ConstantExpr, ExprStmt, FieldNode,
    FunctionNode, IndexExpr, Literal, LoopStmt, ModuleNode, NameExpr, Node, NodeId, NodeKind,
    ParameterNode, Rel, ReturnStmt, Stage, Tag, VariableNode,
};
pub use types::{
    AccessMode, AddressSpace, AliasType, ArrayType, FunctionTypeNode, PointerType, ScalarKind,
    ScalarType, StructType, TensorShape, TensorType, VectorType, BUILTIN_SCALARS,
    BUILTIN_VECTOR_SCALARS,
};
