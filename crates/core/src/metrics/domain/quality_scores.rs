//! Internal cluster-validity indices over `(embedding, label)` pairs.
//!
//! Noise is treated as one more label value. All three indices require
//! between 2 and `n - 1` distinct labels.

use std::collections::BTreeMap;

use ndarray::{Array1, ArrayView2, Axis};
use thiserror::Error;

use crate::shared::cluster_id::ClusterId;
use crate::shared::vector_math::{euclidean, squared_euclidean};

/// Distances at or below this count as zero when checking degeneracy.
const ZERO_TOLERANCE: f64 = 1e-8;

#[derive(Error, Debug, PartialEq)]
pub enum ScoreError {
    #[error("{labels} distinct labels for {samples} samples, need 2 to n-1")]
    TooFewLabels { labels: usize, samples: usize },
    #[error("{rows} embeddings but {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("score is not finite")]
    NonFinite,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QualityScores {
    pub silhouette: f64,
    pub davies_bouldin: f64,
    pub calinski_harabasz: f64,
}

impl QualityScores {
    pub fn compute(
        points: ArrayView2<'_, f64>,
        labels: &[ClusterId],
    ) -> Result<Self, ScoreError> {
        Ok(Self {
            silhouette: silhouette(points, labels)?,
            davies_bouldin: davies_bouldin(points, labels)?,
            calinski_harabasz: calinski_harabasz(points, labels)?,
        })
    }
}

/// Member indices per label, ordered by label.
fn group_members(points: ArrayView2<'_, f64>, labels: &[ClusterId]) -> Result<Vec<Vec<usize>>, ScoreError> {
    if points.nrows() != labels.len() {
        return Err(ScoreError::LengthMismatch {
            rows: points.nrows(),
            labels: labels.len(),
        });
    }
    let mut by_label: BTreeMap<ClusterId, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        by_label.entry(*label).or_default().push(i);
    }
    let n = labels.len();
    let k = by_label.len();
    if k < 2 || k >= n {
        return Err(ScoreError::TooFewLabels {
            labels: k,
            samples: n,
        });
    }
    Ok(by_label.into_values().collect())
}

fn centroids(points: ArrayView2<'_, f64>, groups: &[Vec<usize>]) -> Vec<Array1<f64>> {
    groups
        .iter()
        .map(|members| {
            let sum = members
                .iter()
                .fold(Array1::<f64>::zeros(points.ncols()), |acc, &i| acc + points.row(i));
            sum / members.len() as f64
        })
        .collect()
}

fn near_zero(values: impl IntoIterator<Item = f64>) -> bool {
    values.into_iter().all(|v| v.abs() <= ZERO_TOLERANCE)
}

fn finite(score: f64) -> Result<f64, ScoreError> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(ScoreError::NonFinite)
    }
}

/// Mean silhouette coefficient in `[-1, 1]`; higher is better.
///
/// Members of singleton clusters score 0.
pub fn silhouette(points: ArrayView2<'_, f64>, labels: &[ClusterId]) -> Result<f64, ScoreError> {
    let groups = group_members(points, labels)?;
    let n = labels.len();

    let mut group_of = vec![0usize; n];
    for (g, members) in groups.iter().enumerate() {
        for &i in members {
            group_of[i] = g;
        }
    }

    // One row of distances at a time; memory stays O(k), not O(n^2).
    let mut sums = vec![0.0; groups.len()];
    let mut total = 0.0;
    for i in 0..n {
        let own = group_of[i];
        if groups[own].len() == 1 {
            continue;
        }
        sums.iter_mut().for_each(|s| *s = 0.0);
        for j in (0..n).filter(|&j| j != i) {
            sums[group_of[j]] += euclidean(points.row(i), points.row(j));
        }
        let a = sums[own] / (groups[own].len() - 1) as f64;
        let b = groups
            .iter()
            .enumerate()
            .filter(|(g, _)| *g != own)
            .map(|(g, members)| sums[g] / members.len() as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    finite(total / n as f64)
}

/// Davies-Bouldin index, `>= 0`; lower is better.
pub fn davies_bouldin(points: ArrayView2<'_, f64>, labels: &[ClusterId]) -> Result<f64, ScoreError> {
    let groups = group_members(points, labels)?;
    let centers = centroids(points, &groups);
    let k = groups.len();

    let spread: Vec<f64> = groups
        .iter()
        .zip(&centers)
        .map(|(members, c)| {
            members
                .iter()
                .map(|&i| euclidean(points.row(i), c.view()))
                .sum::<f64>()
                / members.len() as f64
        })
        .collect();

    let mut center_dist = vec![vec![0.0; k]; k];
    for i in 0..k {
        for j in (i + 1)..k {
            let d = euclidean(centers[i].view(), centers[j].view());
            center_dist[i][j] = d;
            center_dist[j][i] = d;
        }
    }

    if near_zero(spread.iter().copied()) || near_zero(center_dist.iter().flatten().copied()) {
        return Ok(0.0);
    }

    let total: f64 = (0..k)
        .map(|i| {
            (0..k)
                .filter(|&j| j != i && center_dist[i][j] > 0.0)
                .map(|j| (spread[i] + spread[j]) / center_dist[i][j])
                .fold(0.0, f64::max)
        })
        .sum();
    finite(total / k as f64)
}

/// Calinski-Harabasz variance ratio, `>= 0`; higher is better.
///
/// Returns 1.0 when every cluster is a single repeated point.
pub fn calinski_harabasz(
    points: ArrayView2<'_, f64>,
    labels: &[ClusterId],
) -> Result<f64, ScoreError> {
    let groups = group_members(points, labels)?;
    let centers = centroids(points, &groups);
    let n = labels.len() as f64;
    let k = groups.len() as f64;
    let mean = points
        .mean_axis(Axis(0))
        .ok_or(ScoreError::NonFinite)?;

    let mut between = 0.0;
    let mut within = 0.0;
    for (members, c) in groups.iter().zip(&centers) {
        between += members.len() as f64 * squared_euclidean(c.view(), mean.view());
        within += members
            .iter()
            .map(|&i| squared_euclidean(points.row(i), c.view()))
            .sum::<f64>();
    }

    if within == 0.0 {
        return Ok(1.0);
    }
    finite(between * (n - k) / (within * (k - 1.0)))
}
