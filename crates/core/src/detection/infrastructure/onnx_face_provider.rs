//! ONNX Runtime embedding provider: YOLO face detection plus ArcFace
//! embeddings.
//!
//! Detection handles letterbox preprocessing, both YOLO output layouts and
//! greedy NMS. Embeddings are L2-normalized so Euclidean distances stay on
//! the scale the clustering radius expects.

use std::path::Path;

use crate::detection::domain::embedding_provider::{Detection, EmbeddingProvider};
use crate::detection::infrastructure::math::{l2_normalize, nms};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fallback YOLO input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

const EMBED_INPUT_SIZE: usize = 112;
const EMBED_NORM_MEAN: f32 = 127.5;
const EMBED_NORM_STD: f32 = 127.5;

/// Platform accelerator, if any; ONNX Runtime falls back to CPU when it
/// cannot be registered.
#[cfg(target_os = "macos")]
fn accelerators() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
}

#[cfg(target_os = "windows")]
fn accelerators() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn accelerators() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    Vec::new()
}

pub struct OnnxFaceProvider {
    detector: ort::session::Session,
    embedder: ort::session::Session,
    detector_confidence: f64,
    input_size: u32,
}

impl OnnxFaceProvider {
    /// Loads both models.
    ///
    /// The detector input resolution is read from the model's NCHW input
    /// shape, falling back to 640 when the shape is dynamic.
    pub fn new(
        detector_path: &Path,
        embedder_path: &Path,
        detector_confidence: f64,
    ) -> Result<Self, BoxError> {
        let detector = ort::session::Session::builder()?
            .with_execution_providers(accelerators())?
            .commit_from_file(detector_path)?;
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let embedder = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .with_execution_providers(accelerators())?
            .commit_from_file(embedder_path)?;

        let input_size = detector
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            detector,
            embedder,
            detector_confidence,
            input_size,
        })
    }

    fn embed_one(&mut self, crop: &Frame) -> Result<Vec<f32>, BoxError> {
        let tensor = preprocess_crop(crop);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.embedder.run(ort::inputs![input_value])?;
        let array = outputs[0].try_extract_array::<f32>()?;
        let mut embedding = array
            .as_slice()
            .ok_or("Cannot get embedding slice")?
            .to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

impl EmbeddingProvider for OnnxFaceProvider {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, BoxError> {
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.detector.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }
        // [1, features, detections] when transposed, else [1, detections, features].
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats < 5 {
            return Ok(Vec::new());
        }
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let feature = |det: usize, f: usize| {
            if transposed {
                data[f * num_dets + det]
            } else {
                data[det * num_feats + f]
            }
        };

        let mut raw = Vec::new();
        for i in 0..num_dets {
            let confidence = feature(i, 4) as f64;
            if confidence < self.detector_confidence {
                continue;
            }
            let cx = feature(i, 0) as f64;
            let cy = feature(i, 1) as f64;
            let w = feature(i, 2) as f64;
            let h = feature(i, 3) as f64;

            // Letterbox coordinates back to source-image pixels.
            let unmap_x = |x: f64| (x - pad_x as f64) / scale;
            let unmap_y = |y: f64| (y - pad_y as f64) / scale;
            raw.push(Detection {
                bbox: BoundingBox::new(
                    unmap_x(cx - w / 2.0),
                    unmap_y(cy - h / 2.0),
                    unmap_x(cx + w / 2.0),
                    unmap_y(cy + h / 2.0),
                ),
                confidence: confidence.clamp(0.0, 1.0),
            });
        }

        Ok(nms(raw, NMS_IOU_THRESH))
    }

    fn embed(&mut self, frame: &Frame, boxes: &[BoundingBox]) -> Result<Vec<Vec<f32>>, BoxError> {
        boxes
            .iter()
            .map(|bbox| {
                let crop = frame
                    .crop(bbox)
                    .ok_or("Face box lies outside the image")?;
                self.embed_one(&crop)
            })
            .collect()
    }
}

/// Letterbox-resize a frame to `target_size` x `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, the YOLO convention.
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, pad_y as usize + y, pad_x as usize + x]] =
                    src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Resize a face crop to 112x112, normalize to [-1, 1], NCHW layout.
fn preprocess_crop(crop: &Frame) -> ndarray::Array4<f32> {
    let src_w = crop.width() as usize;
    let src_h = crop.height() as usize;
    let src = crop.as_ndarray();

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, EMBED_INPUT_SIZE, EMBED_INPUT_SIZE));
    for y in 0..EMBED_INPUT_SIZE {
        let src_y =
            (((y as f64 + 0.5) * src_h as f64 / EMBED_INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..EMBED_INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / EMBED_INPUT_SIZE as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - EMBED_NORM_MEAN) / EMBED_NORM_STD;
            }
        }
    }
    tensor
}
