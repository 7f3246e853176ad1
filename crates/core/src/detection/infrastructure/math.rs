//! Post-processing helpers for the ONNX provider.

use crate::detection::domain::embedding_provider::Detection;

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
pub fn nms(mut dets: Vec<Detection>, iou_thresh: f64) -> Vec<Detection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    for det in dets {
        if keep.iter().all(|k| k.bbox.iou(&det.bbox) <= iou_thresh) {
            keep.push(det);
        }
    }
    keep
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
