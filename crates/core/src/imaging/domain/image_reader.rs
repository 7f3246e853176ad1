use std::path::Path;

use crate::shared::frame::Frame;

/// Decodes one image file into an RGB frame.
pub trait ImageReader: Send {
    /// `image_index` is stamped onto the returned frame.
    fn read(
        &self,
        path: &Path,
        image_index: usize,
    ) -> Result<Frame, Box<dyn std::error::Error + Send + Sync>>;
}
