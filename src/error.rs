//! Defines errors shared across the crate.

use thiserror::Error;

use crate::tensor::TensorError;

/// An error type for data iteration, estimators, and attacks.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// An underlying tensor operation failed.
    #[error(transparent)]
    Tensor(#[from] TensorError),

    /// A parameter was outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Inputs and targets disagree on the number of samples.
    #[error("inputs carry {inputs} samples, but targets carry {targets}")]
    MismatchedSamples {
        /// Number of samples on the input side.
        inputs: usize,
        /// Number of samples on the target side.
        targets: usize,
    },

    /// A data source yielded nothing.
    #[error("the data source is empty")]
    EmptySource,

    /// An estimator was given inputs of a shape it was not built for.
    #[error("estimator expects samples of shape {expected:?}, but got {actual:?}")]
    UnexpectedInputShape {
        /// The sample shape the estimator was built for.
        expected: Vec<usize>,
        /// The sample shape it was given.
        actual: Vec<usize>,
    },

    /// A targeted attack was run without target labels.
    #[error("a targeted attack requires target labels")]
    MissingTargets,

    /// An input without a frame axis was given to a frame-based attack.
    #[error("input of rank {rank} has no frame axis {frame_index}")]
    NoFrameAxis {
        /// The rank of the offending input.
        rank: usize,
        /// The configured frame axis.
        frame_index: usize,
    },
}
