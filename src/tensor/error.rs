//! Defines tensor errors.

use thiserror::Error;

/// An error type for all shape-checked operations on tensors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TensorError {
    /// Two shapes cannot be combined under the requested operation.
    #[error("incompatible shapes {0:?} and {1:?}")]
    IncompatibleShapes(Vec<usize>, Vec<usize>),

    /// An axis was addressed that the tensor does not have.
    #[error("axis {axis} is out of bounds for a tensor of rank {rank}")]
    AxisOutOfBounds {
        /// The requested axis.
        axis: usize,
        /// The tensor's rank.
        rank: usize,
    },

    /// An index along an axis was out of range.
    #[error("index {index} is out of bounds for axis {axis} of size {size}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The indexed axis.
        axis: usize,
        /// The size of the indexed axis.
        size: usize,
    },

    /// The number of elements does not match the shape.
    #[error("shape {shape:?} holds {expected} elements, but {actual} were given")]
    ElementCount {
        /// The requested shape.
        shape: Vec<usize>,
        /// The number of elements the shape holds.
        expected: usize,
        /// The number of elements given.
        actual: usize,
    },

    /// A shape contained a zero-sized axis.
    #[error("shape {0:?} has a zero-sized axis")]
    ZeroAxis(Vec<usize>),

    /// A matrix operation was applied to a tensor that is not a matrix.
    #[error("expected a matrix, but got a tensor of shape {0:?}")]
    NotAMatrix(Vec<usize>),

    /// A permutation does not cover each axis exactly once.
    #[error("invalid permutation {0:?} for a tensor of rank {1}")]
    InvalidPermutation(Vec<usize>, usize),
}
