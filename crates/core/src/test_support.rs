//! Stubs for the domain traits, shared by unit tests across contexts.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::detection::domain::embedding_provider::{Detection, EmbeddingProvider};
use crate::imaging::domain::image_library::{CropLocation, ImageLibrary, ImageRef};
use crate::imaging::domain::image_reader::ImageReader;
use crate::imaging::domain::image_writer::ImageWriter;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const FRAME_SIZE: u32 = 100;

/// A canned face: detector confidence plus the embedding it will produce.
#[derive(Clone, Debug)]
pub struct StubFace {
    pub confidence: f64,
    pub embedding: Vec<f32>,
}

pub fn face(confidence: f64, embedding: Vec<f32>) -> StubFace {
    StubFace {
        confidence,
        embedding,
    }
}

/// Box of the `j`-th canned face; distinct per index and inside the frame.
fn stub_box(j: usize) -> BoundingBox {
    let x = (j % 10) as f64 * 10.0;
    BoundingBox::new(x + 1.0, 10.0, x + 9.0, 20.0)
}

/// Provider replaying canned faces keyed by image index.
pub struct StubProvider {
    faces: HashMap<usize, Vec<StubFace>>,
    failing: HashSet<usize>,
    embedded: Arc<Mutex<Vec<usize>>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            faces: HashMap::new(),
            failing: HashSet::new(),
            embedded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn image(mut self, image_index: usize, faces: Vec<StubFace>) -> Self {
        self.faces.insert(image_index, faces);
        self
    }

    pub fn failing(mut self, image_index: usize) -> Self {
        self.failing.insert(image_index);
        self
    }

    /// Number of boxes passed to each `embed` call, in call order.
    pub fn embedded_counts(&self) -> Arc<Mutex<Vec<usize>>> {
        self.embedded.clone()
    }
}

impl EmbeddingProvider for StubProvider {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, BoxError> {
        if self.failing.contains(&frame.image_index()) {
            return Err("detector exploded".into());
        }
        Ok(self
            .faces
            .get(&frame.image_index())
            .map(|faces| {
                faces
                    .iter()
                    .enumerate()
                    .map(|(j, f)| Detection {
                        bbox: stub_box(j),
                        confidence: f.confidence,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn embed(&mut self, frame: &Frame, boxes: &[BoundingBox]) -> Result<Vec<Vec<f32>>, BoxError> {
        self.embedded.lock().unwrap().push(boxes.len());
        let faces = self.faces.get(&frame.image_index()).ok_or("unknown image")?;
        boxes
            .iter()
            .map(|b| {
                (0..faces.len())
                    .find(|&j| stub_box(j) == *b)
                    .map(|j| faces[j].embedding.clone())
                    .ok_or_else(|| "unknown box".into())
            })
            .collect()
    }
}

/// Produces blank frames; any file named `corrupt*` fails to decode.
pub struct StubReader;

impl StubReader {
    pub fn new() -> Self {
        Self
    }
}

impl ImageReader for StubReader {
    fn read(&self, path: &Path, image_index: usize) -> Result<Frame, BoxError> {
        let corrupt = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with("corrupt"))
            .unwrap_or(false);
        if corrupt {
            return Err("cannot identify image file".into());
        }
        let len = (FRAME_SIZE * FRAME_SIZE * 3) as usize;
        Ok(Frame::new(vec![128; len], FRAME_SIZE, FRAME_SIZE, 3, image_index))
    }
}

/// Records written crop paths instead of touching the filesystem.
pub struct RecordingWriter {
    written: Arc<Mutex<Vec<PathBuf>>>,
    fail_after: Option<usize>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            fail_after: None,
        }
    }

    pub fn failing() -> Self {
        Self::failing_after(0)
    }

    /// Accepts `count` writes, then fails every later one.
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::new()
        }
    }

    pub fn written(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        self.written.clone()
    }
}

impl ImageWriter for RecordingWriter {
    fn write(&self, path: &Path, _frame: &Frame, _size: Option<(u32, u32)>) -> Result<(), BoxError> {
        let mut written = self.written.lock().unwrap();
        if self.fail_after.is_some_and(|limit| written.len() >= limit) {
            return Err("disk full".into());
        }
        written.push(path.to_path_buf());
        Ok(())
    }
}

/// Image set held in memory; references are the bare image names.
pub struct InMemoryLibrary {
    images: Mutex<Vec<String>>,
    resets: AtomicUsize,
    discarded: Mutex<Vec<String>>,
    fail_listing: bool,
}

impl InMemoryLibrary {
    pub fn with_images(names: &[&str]) -> Self {
        Self {
            images: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
            resets: AtomicUsize::new(0),
            discarded: Mutex::new(Vec::new()),
            fail_listing: false,
        }
    }

    pub fn unlistable() -> Self {
        Self {
            fail_listing: true,
            ..Self::with_images(&[])
        }
    }

    pub fn set_images(&self, names: &[&str]) {
        *self.images.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
    }

    pub fn image(&self, index: usize) -> ImageRef {
        let name = self.images.lock().unwrap()[index].clone();
        ImageRef {
            path: PathBuf::from(&name),
            reference: name,
        }
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// References of crops removed through `discard_crop`, in call order.
    pub fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }
}

impl ImageLibrary for InMemoryLibrary {
    fn list_images(&self) -> Result<Vec<ImageRef>, BoxError> {
        if self.fail_listing {
            return Err("upload folder missing".into());
        }
        let count = self.images.lock().unwrap().len();
        Ok((0..count).map(|i| self.image(i)).collect())
    }

    fn reset_crops(&self) -> Result<(), BoxError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn discard_crop(&self, location: &CropLocation) -> Result<(), BoxError> {
        self.discarded
            .lock()
            .unwrap()
            .push(location.reference.clone());
        Ok(())
    }

    fn crop_location(&self, stem: &str, extension: &str) -> CropLocation {
        let reference = format!("faces/{stem}.{extension}");
        CropLocation {
            path: PathBuf::from(&reference),
            reference,
        }
    }
}
