//! Error types for graph construction and layout.

use crate::types::TensorShape;

/// Tensor shape algebra errors.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    /// Matrix multiply is defined on rank-2 tensors only.
    #[error("matrix multiply requires rank-2 tensors, got {left} and {right}")]
    NotRank2 { left: TensorShape, right: TensorShape },

    /// Inner dimensions do not agree.
    #[error("matrices can't be multiplied: {left} x {right}")]
    InnerDimMismatch { left: TensorShape, right: TensorShape },
}

/// Errors computing a type's memory layout.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// The type has no buffer representation (void, function, module).
    #[error("type '{0}' has no memory layout")]
    Unsized(String),

    /// A runtime-sized array was laid out without an enclosing buffer size.
    #[error("runtime-sized array requires an enclosing buffer byte size")]
    MissingBufferSize,

    /// A runtime-sized array may only appear as the last field of a struct.
    #[error("runtime-sized field '{0}' is not the last field of its struct")]
    RuntimeSizedNotLast(String),
}
