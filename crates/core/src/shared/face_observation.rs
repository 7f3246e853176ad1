use ndarray::Array2;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::cluster_id::ClusterId;
use crate::shared::constants::CROP_PREFIX;

/// One detected face that passed the confidence filter.
///
/// `cluster_id` starts as noise and is only rewritten by a clustering pass.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceObservation {
    pub source_image: String,
    pub crop_reference: String,
    pub bbox: BoundingBox,
    pub embedding: Vec<f32>,
    pub confidence: f64,
    pub cluster_id: ClusterId,
}

/// Crop artifact stem: stable and collision-free within one run.
pub fn crop_name(image_index: usize, detection_index: usize) -> String {
    format!("{CROP_PREFIX}{image_index}_{detection_index}")
}

/// Stacks observation embeddings into an `n x D` matrix.
///
/// Returns `None` if the embeddings do not share one dimension.
pub fn embedding_matrix(observations: &[FaceObservation]) -> Option<Array2<f64>> {
    let dim = observations.first().map_or(0, |o| o.embedding.len());
    if observations.iter().any(|o| o.embedding.len() != dim) {
        return None;
    }
    let data: Vec<f64> = observations
        .iter()
        .flat_map(|o| o.embedding.iter().map(|&v| v as f64))
        .collect();
    Array2::from_shape_vec((observations.len(), dim), data).ok()
}
