use ndarray::{Array2, ArrayView2};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("embedding matrix contains a non-finite value at row {row}")]
    NonFinite { row: usize },
    #[error("eigendecomposition did not converge for a {size}x{size} matrix")]
    Eigen { size: usize },
}

/// Maps `n x D` embeddings to `n x 2` plane coordinates.
///
/// Implementations fit on the whole input each call; there is no state
/// carried between calls.
pub trait Projector: Send + Sync {
    fn project(&self, points: ArrayView2<'_, f64>) -> Result<Array2<f64>, ProjectionError>;
}
