use std::collections::BTreeSet;

use serde::Serialize;

use crate::metrics::domain::quality_scores::QualityScores;
use crate::shared::constants::{CONFIDENCE_DECIMALS, SCORE_DECIMALS};
use crate::shared::face_observation::{embedding_matrix, FaceObservation};
use crate::shared::vector_math::round_to;

/// Aggregate statistics over the current corpus.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_faces: usize,
    pub total_people: usize,
    pub noise_faces: usize,
    /// Mean detection confidence as a percentage.
    pub avg_confidence: f64,
    pub silhouette_score: f64,
    pub davies_bouldin_score: f64,
    pub calinski_harabasz_score: f64,
}

impl MetricsSnapshot {
    /// Computes counts and quality scores.
    ///
    /// Scores fall back to 0.0 when they are undefined for the current
    /// labeling (fewer than two labels, one label per face, degenerate
    /// geometry). An empty corpus yields the all-zero snapshot.
    pub fn compute(observations: &[FaceObservation]) -> Self {
        if observations.is_empty() {
            return Self::default();
        }

        let total_faces = observations.len();
        let noise_faces = observations
            .iter()
            .filter(|o| o.cluster_id.is_noise())
            .count();
        let total_people = observations
            .iter()
            .filter(|o| !o.cluster_id.is_noise())
            .map(|o| o.cluster_id)
            .collect::<BTreeSet<_>>()
            .len();
        let mean_confidence =
            observations.iter().map(|o| o.confidence).sum::<f64>() / total_faces as f64;

        let scores = quality_scores(observations);

        Self {
            total_faces,
            total_people,
            noise_faces,
            avg_confidence: round_to(mean_confidence * 100.0, CONFIDENCE_DECIMALS),
            silhouette_score: round_to(scores.silhouette, SCORE_DECIMALS),
            davies_bouldin_score: round_to(scores.davies_bouldin, SCORE_DECIMALS),
            calinski_harabasz_score: round_to(scores.calinski_harabasz, SCORE_DECIMALS),
        }
    }
}

fn quality_scores(observations: &[FaceObservation]) -> QualityScores {
    let Some(points) = embedding_matrix(observations) else {
        log::debug!("Quality scores skipped: mixed embedding dimensions");
        return QualityScores::default();
    };
    let labels: Vec<_> = observations.iter().map(|o| o.cluster_id).collect();
    QualityScores::compute(points.view(), &labels).unwrap_or_else(|e| {
        log::debug!("Quality scores unavailable: {e}");
        QualityScores::default()
    })
}
