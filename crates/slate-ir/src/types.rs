//! Type nodes, the built-in scalar/vector table, capability flags, and
//! tensor shape algebra.

use crate::error::ShapeError;
use crate::graph::Graph;
use crate::node::{NodeId, NodeKind};

/// The kind of a scalar type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ScalarKind {
    Sint,
    Uint,
    Float,
}

/// A built-in scalar type. Singletons: created once per graph.
#[derive(Clone, Debug)]
pub struct ScalarType {
    pub name: &'static str,
    pub kind: ScalarKind,
    /// Bit width (8, 16, 32, 64).
    pub bits: u32,
    /// One-character suffix used to name synthesized tensor/vector types.
    pub suffix: char,
}

/// A fixed-size vector of 2, 3, or 4 scalar elements.
#[derive(Clone, Debug)]
pub struct VectorType {
    pub name: String,
    pub size: u32,
    pub element: NodeId,
}

/// A fixed-size or runtime-sized array.
#[derive(Clone, Debug)]
pub struct ArrayType {
    pub element: NodeId,
    /// `None` means runtime-sized: the element count is determined by the
    /// enclosing buffer's byte size at layout time.
    pub length: Option<u32>,
}

/// A struct with ordered fields ([`crate::node::FieldNode`] children).
#[derive(Clone, Debug)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<NodeId>,
}

/// An n-dimensional fixed-shape numeric block, laid out as a flat
/// row-major array of `shape.element_count()` scalars.
#[derive(Clone, Debug)]
pub struct TensorType {
    pub element: NodeId,
    pub shape: TensorShape,
}

/// Memory address space of a pointer.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum AddressSpace {
    Function,
    Private,
    Workgroup,
    Uniform,
    Storage,
}

/// Access mode of a pointer.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

/// A pointer to an element type in an address space.
#[derive(Clone, Debug)]
pub struct PointerType {
    pub element: NodeId,
    pub space: AddressSpace,
    pub access: AccessMode,
}

/// The type of a function: parameter types plus return type.
#[derive(Clone, Debug)]
pub struct FunctionTypeNode {
    pub parameters: Vec<NodeId>,
    pub return_type: NodeId,
}

/// A named alias for another type.
#[derive(Clone, Debug)]
pub struct AliasType {
    pub name: String,
    pub target: NodeId,
}

/// The shape of a tensor: one extent per dimension.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TensorShape(pub Vec<u32>);

impl TensorShape {
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of scalar elements.
    pub fn element_count(&self) -> u64 {
        self.0.iter().map(|&d| d as u64).product()
    }

    /// Row-major strides: `stride[i] = product(shape[i+1..])`.
    pub fn row_major_strides(&self) -> Vec<u64> {
        let mut strides = vec![1u64; self.0.len()];
        for i in (0..self.0.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.0[i + 1] as u64;
        }
        strides
    }

    /// Shape of `self @ other` for rank-2 tensors.
    ///
    /// Inner dimensions must match: `(r, k) @ (k, c) -> (r, c)`.
    pub fn matmul(&self, other: &TensorShape) -> Result<TensorShape, ShapeError> {
        if self.rank() != 2 || other.rank() != 2 {
            return Err(ShapeError::NotRank2 {
                left: self.clone(),
                right: other.clone(),
            });
        }
        if self.0[1] != other.0[0] {
            return Err(ShapeError::InnerDimMismatch {
                left: self.clone(),
                right: other.clone(),
            });
        }
        Ok(TensorShape(vec![self.0[0], other.0[1]]))
    }
}

impl std::fmt::Display for TensorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dims: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", dims.join("x"))
    }
}

/// The fixed built-in scalar table: `(canonical name, kind, bits, suffix)`.
pub const BUILTIN_SCALARS: [(&str, ScalarKind, u32, char); 11] = [
    ("sbyte", ScalarKind::Sint, 8, 'b'),
    ("byte", ScalarKind::Uint, 8, 'B'),
    ("short", ScalarKind::Sint, 16, 's'),
    ("ushort", ScalarKind::Uint, 16, 'S'),
    ("int", ScalarKind::Sint, 32, 'i'),
    ("uint", ScalarKind::Uint, 32, 'u'),
    ("long", ScalarKind::Sint, 64, 'l'),
    ("ulong", ScalarKind::Uint, 64, 'L'),
    ("half", ScalarKind::Float, 16, 'h'),
    ("float", ScalarKind::Float, 32, 'f'),
    ("double", ScalarKind::Float, 64, 'd'),
];

/// Scalars that get built-in `vec{2,3,4}` types.
pub const BUILTIN_VECTOR_SCALARS: [&str; 3] = ["half", "float", "int"];

// Capability flags. Expression type-resolution rules use these queries
// instead of matching on the type variant directly.
impl Graph {
    pub fn is_scalar(&self, ty: NodeId) -> bool {
        matches!(self.nodes[ty].kind, NodeKind::Scalar(_))
    }

    pub fn is_vector(&self, ty: NodeId) -> bool {
        matches!(self.nodes[ty].kind, NodeKind::Vector(_))
    }

    pub fn is_array(&self, ty: NodeId) -> bool {
        matches!(self.nodes[ty].kind, NodeKind::Array(_))
    }

    pub fn is_struct(&self, ty: NodeId) -> bool {
        matches!(self.nodes[ty].kind, NodeKind::Struct(_))
    }

    pub fn is_tensor(&self, ty: NodeId) -> bool {
        matches!(self.nodes[ty].kind, NodeKind::Tensor(_))
    }

    pub fn is_pointer(&self, ty: NodeId) -> bool {
        matches!(self.nodes[ty].kind, NodeKind::Pointer(_))
    }

    pub fn is_void(&self, ty: NodeId) -> bool {
        matches!(self.nodes[ty].kind, NodeKind::Void)
    }

    /// Scalars, vectors, and tensors whose element kind is floating point.
    pub fn is_floatish(&self, ty: NodeId) -> bool {
        match &self.nodes[ty].kind {
            NodeKind::Scalar(s) => s.kind == ScalarKind::Float,
            NodeKind::Vector(v) => self.is_floatish(v.element),
            NodeKind::Tensor(t) => self.is_floatish(t.element),
            _ => false,
        }
    }

    /// Scalars, vectors, and tensors whose element kind is integral.
    pub fn is_intish(&self, ty: NodeId) -> bool {
        match &self.nodes[ty].kind {
            NodeKind::Scalar(s) => s.kind == ScalarKind::Sint || s.kind == ScalarKind::Uint,
            NodeKind::Vector(v) => self.is_intish(v.element),
            NodeKind::Tensor(t) => self.is_intish(t.element),
            _ => false,
        }
    }

    /// Types that participate in arithmetic: numeric scalars, vectors,
    /// and tensors.
    pub fn is_algebraic(&self, ty: NodeId) -> bool {
        self.is_floatish(ty) || self.is_intish(ty)
    }

    /// Types that support element indexing.
    pub fn is_indexable(&self, ty: NodeId) -> bool {
        matches!(
            self.nodes[ty].kind,
            NodeKind::Vector(_) | NodeKind::Array(_) | NodeKind::Tensor(_)
        )
    }

    /// The one-character suffix used in synthesized type names, if the
    /// type's element chain bottoms out in a scalar.
    pub fn type_suffix(&self, ty: NodeId) -> Option<char> {
        match &self.nodes[ty].kind {
            NodeKind::Scalar(s) => Some(s.suffix),
            NodeKind::Vector(v) => self.type_suffix(v.element),
            NodeKind::Tensor(t) => self.type_suffix(t.element),
            NodeKind::Array(a) => self.type_suffix(a.element),
            _ => None,
        }
    }

    /// A printable name for any type node.
    ///
    /// Tensor names encode element and shape, e.g. `float3x5x7x11f`.
    pub fn type_name(&self, ty: NodeId) -> String {
        match &self.nodes[ty].kind {
            NodeKind::Scalar(s) => s.name.to_string(),
            NodeKind::Vector(v) => v.name.clone(),
            NodeKind::Array(a) => match a.length {
                Some(n) => format!("array<{}, {}>", self.type_name(a.element), n),
                None => format!("array<{}>", self.type_name(a.element)),
            },
            NodeKind::Struct(s) => s.name.clone(),
            NodeKind::Tensor(t) => {
                let suffix = self.type_suffix(t.element).unwrap_or('?');
                format!("{}{}{}", self.type_name(t.element), t.shape, suffix)
            }
            NodeKind::Pointer(p) => format!("ptr<{}>", self.type_name(p.element)),
            NodeKind::FunctionType(f) => {
                let params: Vec<String> =
                    f.parameters.iter().map(|&p| self.type_name(p)).collect();
                format!("fn({}) -> {}", params.join(", "), self.type_name(f.return_type))
            }
            NodeKind::ModuleType => "module".to_string(),
            NodeKind::Alias(a) => a.name.clone(),
            NodeKind::Void => "void".to_string(),
            _ => "<not a type>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_strides_row_major() {
        let shape = TensorShape(vec![3, 5, 7, 11]);
        assert_eq!(shape.row_major_strides(), vec![385, 77, 11, 1]);
        assert_eq!(shape.element_count(), 1155);
    }

    #[test]
    fn matmul_shape_ok() {
        let a = TensorShape(vec![3, 5]);
        let b = TensorShape(vec![5, 7]);
        assert_eq!(a.matmul(&b).unwrap(), TensorShape(vec![3, 7]));
    }

    #[test]
    fn matmul_shape_mismatch() {
        let a = TensorShape(vec![3, 5]);
        let b = TensorShape(vec![6, 7]);
        assert!(matches!(
            a.matmul(&b),
            Err(ShapeError::InnerDimMismatch { .. })
        ));
    }

    #[test]
    fn matmul_requires_rank_2() {
        let a = TensorShape(vec![3, 5, 7]);
        let b = TensorShape(vec![5, 7]);
        assert!(matches!(a.matmul(&b), Err(ShapeError::NotRank2 { .. })));
    }

    #[test]
    fn builtin_table_is_fixed() {
        assert_eq!(BUILTIN_SCALARS.len(), 11);
        let (name, kind, bits, suffix) = BUILTIN_SCALARS[9];
        assert_eq!(name, "float");
        assert_eq!(kind, ScalarKind::Float);
        assert_eq!(bits, 32);
        assert_eq!(suffix, 'f');
    }

    #[test]
    fn capability_flags() {
        let mut g = Graph::new();
        let float = g.builtin("float").unwrap();
        let int = g.builtin("int").unwrap();
        let vec3f = g.builtin("vec3f").unwrap();
        assert!(g.is_scalar(float));
        assert!(g.is_floatish(float));
        assert!(!g.is_intish(float));
        assert!(g.is_intish(int));
        assert!(g.is_vector(vec3f));
        assert!(g.is_floatish(vec3f));
        assert!(g.is_indexable(vec3f));
        assert!(g.is_algebraic(int));

        let t = g.tensor(float, &[3, 5]);
        assert!(g.is_tensor(t));
        assert!(g.is_floatish(t));
        assert!(g.is_indexable(t));
        assert_eq!(g.type_name(t), "float3x5f");

        let v = g.builtin("void").unwrap();
        assert!(g.is_void(v));
        assert!(!g.is_algebraic(v));
    }

    #[test]
    fn tensor_name_uses_suffix() {
        let mut g = Graph::new();
        let float = g.builtin("float").unwrap();
        let t = g.tensor(float, &[3, 5, 7, 11]);
        assert_eq!(g.type_name(t), "float3x5x7x11f");
        let half = g.builtin("half").unwrap();
        let th = g.tensor(half, &[2, 2]);
        assert_eq!(g.type_name(th), "half2x2h");
    }
}
