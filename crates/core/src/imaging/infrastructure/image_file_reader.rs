use std::path::Path;

use crate::imaging::domain::image_reader::ImageReader;
use crate::shared::frame::Frame;

/// Decodes image files with the `image` crate, converting to RGB8.
pub struct ImageFileReader;

impl ImageFileReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageReader for ImageFileReader {
    fn read(
        &self,
        path: &Path,
        image_index: usize,
    ) -> Result<Frame, Box<dyn std::error::Error + Send + Sync>> {
        let img = image::open(path)?.to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Frame::new(img.into_raw(), width, height, 3, image_index))
    }
}
