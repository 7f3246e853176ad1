use serde::Serialize;

use crate::identity::domain::identity_registry::IdentityRegistry;
use crate::projection::domain::projector::Projector;
use crate::shared::cluster_id::ClusterId;
use crate::shared::constants::NOISE_LABEL;
use crate::shared::face_observation::{embedding_matrix, FaceObservation};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub cluster: ClusterId,
    pub label: String,
    pub crop_ref: String,
}

/// Projects every observation to the plane and tags it for display.
///
/// Fewer than two observations, or a projection failure, yields an empty
/// result.
pub fn scatter(
    observations: &[FaceObservation],
    registry: &IdentityRegistry,
    projector: &dyn Projector,
) -> Vec<ScatterPoint> {
    if observations.len() < 2 {
        return Vec::new();
    }
    let Some(points) = embedding_matrix(observations) else {
        log::warn!("Scatter skipped: mixed embedding dimensions");
        return Vec::new();
    };
    let coords = match projector.project(points.view()) {
        Ok(coords) => coords,
        Err(e) => {
            log::warn!("Scatter projection failed: {e}");
            return Vec::new();
        }
    };

    observations
        .iter()
        .zip(coords.rows())
        .map(|(obs, xy)| ScatterPoint {
            x: xy[0],
            y: xy[1],
            cluster: obs.cluster_id,
            label: if obs.cluster_id.is_noise() {
                NOISE_LABEL.to_string()
            } else {
                registry.resolve_name(obs.cluster_id)
            },
            crop_ref: obs.crop_reference.clone(),
        })
        .collect()
}
