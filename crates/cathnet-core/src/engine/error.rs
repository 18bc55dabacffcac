use thiserror::Error;

use super::checkpoint::CheckpointError;
use super::config::ConfigError;
use super::metrics::RunLogError;
use crate::core::geometry::neighbors::NeighborOverflow;
use crate::data::batch::BatchError;
use crate::data::error::DataError;

/// Failures while evaluating the model on a batch.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ComputeError {
    #[error("Neighbor list overflow: {0}")]
    NeighborOverflow(#[from] NeighborOverflow),

    #[error("Atomic number {z} is outside the embedding table of size {max_z}")]
    UnsupportedElement { z: u8, max_z: usize },

    #[error("Malformed batch: {0}")]
    ShapeMismatch(String),

    #[error("Loss became non-finite ({value}) at epoch {epoch}, step {step}")]
    NonFiniteLoss { epoch: usize, step: usize, value: f64 },
}

impl From<BatchError> for ComputeError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::NeighborOverflow { source, .. } => ComputeError::NeighborOverflow(source),
            BatchError::UnsupportedElement { z, max_z } => {
                ComputeError::UnsupportedElement { z, max_z }
            }
            BatchError::Empty => ComputeError::ShapeMismatch(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Dataset error: {source}")]
    Data {
        #[from]
        source: DataError,
    },

    #[error("Computation failed: {source}")]
    Compute {
        #[from]
        source: ComputeError,
    },

    #[error("Snapshot error: {source}")]
    Checkpoint {
        #[from]
        source: CheckpointError,
    },

    #[error("Run log error: {source}")]
    RunLog {
        #[from]
        source: RunLogError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl From<BatchError> for EngineError {
    fn from(err: BatchError) -> Self {
        EngineError::Compute {
            source: ComputeError::from(err),
        }
    }
}
