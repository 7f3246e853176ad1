use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// One raw face detection, before the acceptance threshold is applied.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Detector score in `[0, 1]`.
    pub confidence: f64,
}

/// External face detection + embedding collaborator.
///
/// Implementations may keep inference sessions and scratch buffers, hence
/// `&mut self`.
pub trait EmbeddingProvider: Send {
    /// Faces found in `frame`, in the provider's own order.
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<Detection>, Box<dyn std::error::Error + Send + Sync>>;

    /// One fixed-dimension embedding per box, in the same order.
    fn embed(
        &mut self,
        frame: &Frame,
        boxes: &[BoundingBox],
    ) -> Result<Vec<Vec<f32>>, Box<dyn std::error::Error + Send + Sync>>;
}
