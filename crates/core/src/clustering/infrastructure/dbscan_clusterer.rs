//! Density-based clustering (DBSCAN) over raw embeddings.
//!
//! A point is a core point when at least `min_points` points, itself
//! included, lie within Euclidean distance `eps` (inclusive). Clusters are
//! the connected components of core points plus the border points they
//! reach; everything else is noise. Cluster ids follow discovery order.
//!
//! Core/noise classification does not depend on input order. A border
//! point within reach of two clusters joins whichever is discovered first.

use std::collections::VecDeque;

use ndarray::ArrayView2;

use crate::clustering::domain::clusterer::{Clusterer, ClusteringError};
use crate::shared::cluster_id::ClusterId;
use crate::shared::constants::{CLUSTER_EPS, CLUSTER_MIN_POINTS};
use crate::shared::vector_math::euclidean;

pub struct DbscanClusterer {
    eps: f64,
    min_points: usize,
}

impl DbscanClusterer {
    pub fn new(eps: f64, min_points: usize) -> Result<Self, ClusteringError> {
        if !eps.is_finite() || eps <= 0.0 {
            return Err(ClusteringError::InvalidParameters(format!(
                "eps must be positive, got {eps}"
            )));
        }
        if min_points == 0 {
            return Err(ClusteringError::InvalidParameters(
                "min_points must be at least 1".into(),
            ));
        }
        Ok(Self { eps, min_points })
    }

    /// Indices within `eps` of every point, the point itself included.
    fn neighborhoods(&self, points: ArrayView2<'_, f64>) -> Vec<Vec<usize>> {
        let n = points.nrows();
        let mut neighbors: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        for i in 0..n {
            for j in (i + 1)..n {
                if euclidean(points.row(i), points.row(j)) <= self.eps {
                    neighbors[i].push(j);
                    neighbors[j].push(i);
                }
            }
        }
        neighbors
    }
}

impl Default for DbscanClusterer {
    fn default() -> Self {
        Self {
            eps: CLUSTER_EPS,
            min_points: CLUSTER_MIN_POINTS,
        }
    }
}

impl Clusterer for DbscanClusterer {
    fn cluster(&self, embeddings: ArrayView2<'_, f64>) -> Result<Vec<ClusterId>, ClusteringError> {
        if let Some(row) = embeddings
            .rows()
            .into_iter()
            .position(|r| r.iter().any(|v| !v.is_finite()))
        {
            return Err(ClusteringError::NonFinite { row });
        }

        let n = embeddings.nrows();
        if n == 0 {
            return Ok(Vec::new());
        }

        let neighbors = self.neighborhoods(embeddings);
        let is_core: Vec<bool> = neighbors
            .iter()
            .map(|nb| nb.len() >= self.min_points)
            .collect();

        let mut labels = vec![ClusterId::NOISE; n];
        let mut next_cluster = 0usize;
        let mut queue = VecDeque::new();

        for seed in 0..n {
            if !is_core[seed] || !labels[seed].is_noise() {
                continue;
            }
            let id = ClusterId::from_index(next_cluster);
            next_cluster += 1;

            labels[seed] = id;
            queue.push_back(seed);
            while let Some(p) = queue.pop_front() {
                // Border points join but do not expand the cluster.
                if !is_core[p] {
                    continue;
                }
                for &q in &neighbors[p] {
                    if labels[q].is_noise() {
                        labels[q] = id;
                        queue.push_back(q);
                    }
                }
            }
        }

        log::debug!(
            "DBSCAN: {n} points, {next_cluster} clusters, {} noise",
            labels.iter().filter(|l| l.is_noise()).count()
        );
        Ok(labels)
    }
}
