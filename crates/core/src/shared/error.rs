use thiserror::Error;

use crate::clustering::domain::clusterer::ClusteringError;

/// Errors surfaced to callers of the corpus store.
///
/// Per-image provider failures never appear here: they are collected in the
/// process outcome instead. Metric and projection failures degrade to
/// defaults and are never surfaced at all.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("clustering failed: {0}")]
    Clustering(#[from] ClusteringError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("a processing run is already in progress")]
    ProcessingInProgress,
    #[error("image storage failure: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}
