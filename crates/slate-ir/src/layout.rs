//! Memory layout of types for GPU buffer binding.
//!
//! Alignment and size rules follow the std140-style scheme: scalars occupy
//! at least 4 bytes, vec3 aligns like vec4, array strides round element
//! sizes up to the element alignment, and struct sizes round up to the
//! struct alignment. Runtime-sized arrays take their element count from the
//! enclosing buffer's byte size.

use std::collections::HashMap;

use crate::error::LayoutError;
use crate::graph::Graph;
use crate::node::{NodeId, NodeKind};

/// Alignment and total size of a plainly-sized type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TypeLayout {
    pub align: u32,
    pub byte_size: u32,
}

/// Layout of an array or tensor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ArrayLayout {
    pub align: u32,
    /// `None` for runtime-sized arrays: the extent is the rest of the buffer.
    pub byte_size: Option<u32>,
    pub element_stride: u32,
    /// `None` only when a runtime-sized array is laid out without a buffer
    /// size to divide into.
    pub num_elements: Option<u32>,
}

/// Placement of one struct field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldLayout {
    pub name: String,
    pub offset: u32,
    pub align: u32,
    pub byte_size: u32,
    /// Element count for array-typed fields; set from the buffer size when
    /// the field is runtime-sized.
    pub num_elements: Option<u32>,
}

impl FieldLayout {
    /// `(offset, align, byte_size)` for compact assertions and dumps.
    pub fn triple(&self) -> (u32, u32, u32) {
        (self.offset, self.align, self.byte_size)
    }
}

/// Layout of a struct: field placements plus the rounded-up total.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StructLayout {
    pub align: u32,
    pub byte_size: u32,
    pub fields: Vec<FieldLayout>,
}

/// Computed layout of any sized type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Layout {
    Plain(TypeLayout),
    Array(ArrayLayout),
    Struct(StructLayout),
}

impl Layout {
    pub fn align(&self) -> u32 {
        match self {
            Self::Plain(l) => l.align,
            Self::Array(l) => l.align,
            Self::Struct(l) => l.align,
        }
    }

    /// Total byte size; `None` for runtime-sized arrays.
    pub fn byte_size(&self) -> Option<u32> {
        match self {
            Self::Plain(l) => Some(l.byte_size),
            Self::Array(l) => l.byte_size,
            Self::Struct(l) => Some(l.byte_size),
        }
    }
}

fn round_up(align: u32, offset: u32) -> u32 {
    offset.div_ceil(align) * align
}

/// Memoizing layout engine.
///
/// Layouts are cached per `(type, buffer size)` pair and the whole cache is
/// dropped when the graph's type generation moves, so mutating a struct
/// after a query cannot serve a stale answer.
#[derive(Debug, Default)]
pub struct Layouter {
    cache: HashMap<(NodeId, Option<u32>), Layout>,
    generation: u64,
}

impl Layouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the layout of `ty`.
    ///
    /// `buffer_size` is the byte size of the buffer the type is bound to;
    /// it is required whenever the type contains a runtime-sized array.
    pub fn layout(
        &mut self,
        graph: &Graph,
        ty: NodeId,
        buffer_size: Option<u32>,
    ) -> Result<Layout, LayoutError> {
        if graph.types_generation != self.generation {
            self.cache.clear();
            self.generation = graph.types_generation;
        }
        if let Some(hit) = self.cache.get(&(ty, buffer_size)) {
            return Ok(hit.clone());
        }
        let computed = self.compute(graph, ty, buffer_size)?;
        self.cache.insert((ty, buffer_size), computed.clone());
        Ok(computed)
    }

    fn compute(
        &mut self,
        graph: &Graph,
        ty: NodeId,
        buffer_size: Option<u32>,
    ) -> Result<Layout, LayoutError> {
        match &graph.nodes[ty].kind {
            NodeKind::Scalar(s) => {
                let size = round_up(4, s.bits / 8);
                Ok(Layout::Plain(TypeLayout {
                    align: size,
                    byte_size: size,
                }))
            }
            NodeKind::Vector(v) => {
                let elem = self.layout(graph, v.element, None)?;
                let s = elem
                    .byte_size()
                    .ok_or_else(|| LayoutError::Unsized(graph.type_name(v.element)))?;
                let (align, byte_size) = match v.size {
                    2 => (2 * s, 2 * s),
                    3 => (4 * s, 3 * s),
                    _ => (4 * s, 4 * s),
                };
                Ok(Layout::Plain(TypeLayout { align, byte_size }))
            }
            NodeKind::Array(a) => {
                let elem = self.layout(graph, a.element, None)?;
                let elem_size = elem
                    .byte_size()
                    .ok_or_else(|| LayoutError::Unsized(graph.type_name(a.element)))?;
                let align = elem.align();
                let stride = round_up(align, elem_size);
                match a.length {
                    Some(n) => Ok(Layout::Array(ArrayLayout {
                        align,
                        byte_size: Some(stride * n),
                        element_stride: stride,
                        num_elements: Some(n),
                    })),
                    None => {
                        let buffer = buffer_size.ok_or(LayoutError::MissingBufferSize)?;
                        Ok(Layout::Array(ArrayLayout {
                            align,
                            byte_size: None,
                            element_stride: stride,
                            num_elements: Some(buffer / stride),
                        }))
                    }
                }
            }
            NodeKind::Tensor(t) => {
                let elem = self.layout(graph, t.element, None)?;
                let s = elem
                    .byte_size()
                    .ok_or_else(|| LayoutError::Unsized(graph.type_name(t.element)))?;
                let count = t.shape.element_count() as u32;
                Ok(Layout::Array(ArrayLayout {
                    align: elem.align(),
                    byte_size: Some(s * count),
                    element_stride: s,
                    num_elements: Some(count),
                }))
            }
            NodeKind::Struct(s) => {
                let field_nodes = s.fields.clone();
                let last = field_nodes.len().wrapping_sub(1);
                let mut fields = Vec::with_capacity(field_nodes.len());
                let mut align = 1u32;
                let mut offset = 0u32;
                for (i, &fid) in field_nodes.iter().enumerate() {
                    let f = match &graph.nodes[fid].kind {
                        NodeKind::Field(f) => f.clone(),
                        other => panic!("struct field is {:?}, not a Field node", other),
                    };
                    let fl = self.layout(graph, f.ty, None);
                    let (f_align, f_size, f_count) = match fl {
                        Ok(l) => {
                            let size = l
                                .byte_size()
                                .ok_or_else(|| LayoutError::Unsized(graph.type_name(f.ty)))?;
                            let count = match &l {
                                Layout::Array(a) => a.num_elements,
                                _ => None,
                            };
                            (l.align(), size, count)
                        }
                        // A runtime-sized array is allowed in last position:
                        // it receives whatever is left of the buffer.
                        Err(LayoutError::MissingBufferSize) if i == last => {
                            let buffer = buffer_size.ok_or(LayoutError::MissingBufferSize)?;
                            let inner = self.layout(graph, f.ty, Some(buffer))?;
                            let stride = match &inner {
                                Layout::Array(a) => a.element_stride,
                                _ => return Err(LayoutError::Unsized(graph.type_name(f.ty))),
                            };
                            let start = round_up(inner.align(), offset);
                            let remaining = buffer.saturating_sub(start);
                            (inner.align(), remaining, Some(remaining / stride))
                        }
                        Err(LayoutError::MissingBufferSize) => {
                            return Err(LayoutError::RuntimeSizedNotLast(f.name.clone()))
                        }
                        Err(e) => return Err(e),
                    };
                    offset = round_up(f_align, offset);
                    fields.push(FieldLayout {
                        name: f.name.clone(),
                        offset,
                        align: f_align,
                        byte_size: f_size,
                        num_elements: f_count,
                    });
                    offset += f_size;
                    align = align.max(f_align);
                }
                Ok(Layout::Struct(StructLayout {
                    align,
                    byte_size: round_up(align, offset),
                    fields,
                }))
            }
            NodeKind::Pointer(_) => Ok(Layout::Plain(TypeLayout {
                align: 8,
                byte_size: 8,
            })),
            NodeKind::Alias(a) => self.layout(graph, a.target, buffer_size),
            _ => Err(LayoutError::Unsized(graph.type_name(ty))),
        }
    }
}
