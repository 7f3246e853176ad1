use std::path::Path;

use crate::imaging::domain::image_writer::ImageWriter;
use crate::shared::frame::Frame;

/// Writes face crops with the `image` crate; format follows the extension.
///
/// Supports optional resizing for thumbnails.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(
        &self,
        path: &Path,
        frame: &Frame,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if frame.channels() != 3 {
            return Err(format!("expected an RGB frame, got {} channels", frame.channels()).into());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Failed to create image from frame data")?;

        let img = match size {
            Some((w, h)) => image::imageops::resize(&img, w, h, image::imageops::FilterType::Triangle),
            None => img,
        };

        img.save(path)?;
        Ok(())
    }
}
