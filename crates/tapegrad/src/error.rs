//! Error types for tapegrad.

use crate::registry::PrimitiveId;
use crate::trace::TraceId;
use thiserror::Error;

/// Errors that can occur during tracing or differentiation.
#[derive(Debug, Error)]
pub enum AdError {
    /// A traced value flowed through a primitive with no gradient rule
    /// registered for that argument position. Raised during the backward
    /// pass, not at call time.
    #[error("no gradient rule registered for argument {argnum} of `{op}`")]
    UngradableOperation { op: PrimitiveId, argnum: usize },

    /// The differentiated function produced a non-scalar output.
    #[error("gradient target must be scalar-shaped, got shape {shape:?}")]
    NonScalarTarget { shape: Vec<usize> },

    /// A value boxed by a trace that is no longer active was used in an
    /// active computation. Indicates a bug in trace-stack management.
    #[error("value from closed trace {trace:?} used in an active computation")]
    TraceLeak { trace: TraceId },

    /// A primitive was applied without being registered first.
    #[error("primitive `{op}` is not registered")]
    UnknownPrimitive { op: PrimitiveId },

    /// Element-wise operation on incompatible shapes.
    #[error("shape mismatch: {lhs:?} vs {rhs:?}")]
    ShapeMismatch { lhs: Vec<usize>, rhs: Vec<usize> },

    /// Data length does not match the requested shape.
    #[error("length mismatch: shape requires {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Operation requires tensors of a specific rank.
    #[error("expected tensor of rank {expected}, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },
}
