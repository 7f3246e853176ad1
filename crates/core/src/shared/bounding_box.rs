/// Axis-aligned face box in source-image pixel coordinates, `[x1, y1, x2, y2]`.
///
/// Coordinates may fall outside the image; clamping happens when pixels are
/// actually read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Rounded integer bounds clamped to a `width` x `height` image, as
    /// `(x1, y1, x2, y2)` with exclusive upper edges.
    ///
    /// Returns `None` if nothing of the box lies inside the image.
    pub fn pixel_bounds(&self, width: u32, height: u32) -> Option<(usize, usize, usize, usize)> {
        let clamp = |v: f64, max: u32| v.round().clamp(0.0, max as f64) as usize;
        let x1 = clamp(self.x1, width);
        let y1 = clamp(self.y1, height);
        let x2 = clamp(self.x2, width);
        let y2 = clamp(self.y2, height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2, y2))
    }
}
