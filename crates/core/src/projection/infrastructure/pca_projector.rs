use nalgebra::{DMatrix, DVector, SymmetricEigen};
use ndarray::{Array2, ArrayView2, Axis};

use crate::projection::domain::projector::{ProjectionError, Projector};

const COMPONENTS: usize = 2;

/// Principal-component projection onto the two directions of largest
/// variance.
///
/// Decomposes whichever of the Gram matrix (`n x n`) or the covariance
/// matrix (`D x D`) is smaller; both give the same scores. Each component's
/// sign is fixed so its largest-magnitude loading is positive. Components
/// beyond the rank of the data come out as zeros.
pub struct PcaProjector;

impl Projector for PcaProjector {
    fn project(&self, points: ArrayView2<'_, f64>) -> Result<Array2<f64>, ProjectionError> {
        let (n, d) = points.dim();
        if let Some(row) = points
            .rows()
            .into_iter()
            .position(|r| r.iter().any(|v| !v.is_finite()))
        {
            return Err(ProjectionError::NonFinite { row });
        }
        if n == 0 {
            return Ok(Array2::zeros((0, COMPONENTS)));
        }

        let centered = centered(points)?;
        if n <= d {
            project_via_gram(&centered)
        } else {
            project_via_covariance(&centered)
        }
    }
}

fn centered(points: ArrayView2<'_, f64>) -> Result<DMatrix<f64>, ProjectionError> {
    let mean = points
        .mean_axis(Axis(0))
        .ok_or(ProjectionError::NonFinite { row: 0 })?;
    let (n, d) = points.dim();
    Ok(DMatrix::from_fn(n, d, |i, j| points[[i, j]] - mean[j]))
}

fn decompose(matrix: DMatrix<f64>) -> Result<SymmetricEigen<f64, nalgebra::Dyn>, ProjectionError> {
    let size = matrix.nrows();
    SymmetricEigen::try_new(matrix, f64::EPSILON, 0).ok_or(ProjectionError::Eigen { size })
}

/// Eigenpair indices by descending eigenvalue.
fn top_components(eigenvalues: &DVector<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));
    order.truncate(COMPONENTS);
    order
}

/// -1.0 when the largest-magnitude entry of `loading` is negative.
fn sign_of(loading: &DVector<f64>) -> f64 {
    let largest = loading
        .iter()
        .copied()
        .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best });
    if largest < 0.0 {
        -1.0
    } else {
        1.0
    }
}

fn project_via_covariance(centered: &DMatrix<f64>) -> Result<Array2<f64>, ProjectionError> {
    let n = centered.nrows();
    let eig = decompose(centered.transpose() * centered)?;
    let mut out = Array2::zeros((n, COMPONENTS));
    for (k, idx) in top_components(&eig.eigenvalues).into_iter().enumerate() {
        if eig.eigenvalues[idx] <= 0.0 {
            continue;
        }
        let loading: DVector<f64> = eig.eigenvectors.column(idx).into_owned();
        let scores = centered * &loading * sign_of(&loading);
        for i in 0..n {
            out[[i, k]] = scores[i];
        }
    }
    Ok(out)
}

fn project_via_gram(centered: &DMatrix<f64>) -> Result<Array2<f64>, ProjectionError> {
    let n = centered.nrows();
    let eig = decompose(centered * centered.transpose())?;
    let mut out = Array2::zeros((n, COMPONENTS));
    for (k, idx) in top_components(&eig.eigenvalues).into_iter().enumerate() {
        let lambda = eig.eigenvalues[idx];
        if lambda <= 0.0 {
            continue;
        }
        let u: DVector<f64> = eig.eigenvectors.column(idx).into_owned();
        // Loading direction up to scale, used only for its sign.
        let loading = centered.transpose() * &u;
        let scale = lambda.sqrt() * sign_of(&loading);
        for i in 0..n {
            out[[i, k]] = u[i] * scale;
        }
    }
    Ok(out)
}
