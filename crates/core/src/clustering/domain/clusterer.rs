use ndarray::ArrayView2;
use thiserror::Error;

use crate::shared::cluster_id::ClusterId;

#[derive(Error, Debug, PartialEq)]
pub enum ClusteringError {
    #[error("embedding {row} contains a non-finite value")]
    NonFinite { row: usize },
    #[error("invalid clustering parameters: {0}")]
    InvalidParameters(String),
    #[error("clusterer returned {actual} labels for {expected} embeddings")]
    LabelCount { expected: usize, actual: usize },
}

/// Domain interface for grouping embeddings by identity.
///
/// Takes an `n x D` matrix, one embedding per row, and returns one label
/// per row: `ClusterId::NOISE` or a non-negative cluster index.
pub trait Clusterer: Send {
    fn cluster(&self, embeddings: ArrayView2<'_, f64>) -> Result<Vec<ClusterId>, ClusteringError>;
}
