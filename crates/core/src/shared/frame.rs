use ndarray::ArrayView3;

use crate::shared::bounding_box::BoundingBox;

/// A decoded image: contiguous RGB bytes in row-major order.
///
/// `image_index` is the position of the source image within the image set
/// of the current run. Format conversion happens at I/O boundaries only.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    image_index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, image_index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            image_index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn image_index(&self) -> usize {
        self.image_index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels inside `bbox`, clamped to the frame bounds.
    ///
    /// Returns `None` when the clamped box is empty.
    pub fn crop(&self, bbox: &BoundingBox) -> Option<Frame> {
        let (x1, y1, x2, y2) = bbox.pixel_bounds(self.width, self.height)?;
        let channels = self.channels as usize;
        let src = self.as_ndarray();
        let mut data = Vec::with_capacity((x2 - x1) * (y2 - y1) * channels);

        for row in y1..y2 {
            for col in x1..x2 {
                for c in 0..channels {
                    data.push(src[[row, col, c]]);
                }
            }
        }

        Some(Frame::new(
            data,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
            self.channels,
            self.image_index,
        ))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
