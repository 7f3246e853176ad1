//! Turns one image into face observations: decode, detect, filter by
//! confidence, embed, persist crops.

use thiserror::Error;

use crate::detection::domain::embedding_provider::{Detection, EmbeddingProvider};
use crate::imaging::domain::image_library::{CropLocation, ImageLibrary, ImageRef};
use crate::imaging::domain::image_reader::ImageReader;
use crate::imaging::domain::image_writer::ImageWriter;
use crate::shared::cluster_id::ClusterId;
use crate::shared::face_observation::{crop_name, FaceObservation};
use crate::shared::frame::Frame;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure confined to a single image. The image is skipped; the batch goes on.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("failed to read {image}: {source}")]
    Read {
        image: String,
        #[source]
        source: BoxError,
    },
    #[error("face detection failed on {image}: {source}")]
    Detection {
        image: String,
        #[source]
        source: BoxError,
    },
    #[error("embedding failed on {image}: {source}")]
    Embedding {
        image: String,
        #[source]
        source: BoxError,
    },
    #[error("provider returned {actual} embeddings for {expected} faces on {image}")]
    EmbeddingCount {
        image: String,
        expected: usize,
        actual: usize,
    },
    #[error("provider returned an empty embedding on {image}")]
    EmptyEmbedding { image: String },
    #[error("embedding dimension {actual} on {image} differs from corpus dimension {expected}")]
    DimensionMismatch {
        image: String,
        expected: usize,
        actual: usize,
    },
    #[error("failed to write crop for {image}: {source}")]
    CropWrite {
        image: String,
        #[source]
        source: BoxError,
    },
}

impl ProviderError {
    pub fn image(&self) -> &str {
        match self {
            ProviderError::Read { image, .. }
            | ProviderError::Detection { image, .. }
            | ProviderError::Embedding { image, .. }
            | ProviderError::EmbeddingCount { image, .. }
            | ProviderError::EmptyEmbedding { image }
            | ProviderError::DimensionMismatch { image, .. }
            | ProviderError::CropWrite { image, .. } => image,
        }
    }
}

/// Adapter between the embedding provider and the corpus.
///
/// Detections scoring below `threshold`, and boxes lying entirely outside
/// the image, are dropped before embedding. Surviving faces get their crop
/// written as `face_<imageIndex>_<detectionIndex>`, where the detection
/// index is the position in the provider's raw output.
pub struct ObservationExtractor {
    reader: Box<dyn ImageReader>,
    provider: Box<dyn EmbeddingProvider>,
    writer: Box<dyn ImageWriter>,
    threshold: f64,
    crop_extension: String,
}

impl ObservationExtractor {
    pub fn new(
        reader: Box<dyn ImageReader>,
        provider: Box<dyn EmbeddingProvider>,
        writer: Box<dyn ImageWriter>,
        threshold: f64,
        crop_extension: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            provider,
            writer,
            threshold,
            crop_extension: crop_extension.into(),
        }
    }

    /// Extracts every accepted face of one image.
    ///
    /// `expected_dim` is the corpus embedding dimension once known; any
    /// other dimension fails the whole image.
    pub fn extract(
        &mut self,
        image_index: usize,
        image: &ImageRef,
        library: &dyn ImageLibrary,
        expected_dim: Option<usize>,
    ) -> Result<Vec<FaceObservation>, ProviderError> {
        let name = || image.reference.clone();

        let frame = self
            .reader
            .read(&image.path, image_index)
            .map_err(|source| ProviderError::Read {
                image: name(),
                source,
            })?;

        let detections = self
            .provider
            .detect(&frame)
            .map_err(|source| ProviderError::Detection {
                image: name(),
                source,
            })?;

        let accepted = self.accept(&frame, &detections);
        if accepted.is_empty() {
            return Ok(Vec::new());
        }

        let boxes: Vec<_> = accepted.iter().map(|(_, d, _)| d.bbox).collect();
        let embeddings = self
            .provider
            .embed(&frame, &boxes)
            .map_err(|source| ProviderError::Embedding {
                image: name(),
                source,
            })?;
        check_embeddings(&embeddings, accepted.len(), expected_dim, &image.reference)?;

        // A skipped image leaves no crops behind.
        let mut written: Vec<CropLocation> = Vec::with_capacity(accepted.len());
        let mut observations = Vec::with_capacity(accepted.len());
        for ((detection_index, detection, crop), embedding) in accepted.into_iter().zip(embeddings)
        {
            let location =
                library.crop_location(&crop_name(image_index, detection_index), &self.crop_extension);
            if let Err(source) = self.writer.write(&location.path, &crop, None) {
                discard_all(library, &written);
                return Err(ProviderError::CropWrite {
                    image: name(),
                    source,
                });
            }

            observations.push(FaceObservation {
                source_image: image.reference.clone(),
                crop_reference: location.reference.clone(),
                bbox: detection.bbox,
                embedding,
                confidence: detection.confidence,
                cluster_id: ClusterId::NOISE,
            });
            written.push(location);
        }

        Ok(observations)
    }

    fn accept<'a>(
        &self,
        frame: &Frame,
        detections: &'a [Detection],
    ) -> Vec<(usize, &'a Detection, Frame)> {
        detections
            .iter()
            .enumerate()
            .filter(|(_, d)| d.confidence >= self.threshold)
            .filter_map(|(i, d)| match frame.crop(&d.bbox) {
                Some(crop) => Some((i, d, crop)),
                None => {
                    log::debug!("Dropping detection {i} of image {}: box outside image", frame.image_index());
                    None
                }
            })
            .collect()
    }
}

fn discard_all(library: &dyn ImageLibrary, written: &[CropLocation]) {
    for location in written {
        if let Err(e) = library.discard_crop(location) {
            log::warn!("Failed to remove crop {}: {e}", location.reference);
        }
    }
}

fn check_embeddings(
    embeddings: &[Vec<f32>],
    expected_count: usize,
    expected_dim: Option<usize>,
    image: &str,
) -> Result<(), ProviderError> {
    if embeddings.len() != expected_count {
        return Err(ProviderError::EmbeddingCount {
            image: image.to_string(),
            expected: expected_count,
            actual: embeddings.len(),
        });
    }
    let dim = expected_dim.or_else(|| embeddings.first().map(Vec::len));
    for embedding in embeddings {
        if embedding.is_empty() {
            return Err(ProviderError::EmptyEmbedding {
                image: image.to_string(),
            });
        }
        if let Some(expected) = dim {
            if embedding.len() != expected {
                return Err(ProviderError::DimensionMismatch {
                    image: image.to_string(),
                    expected,
                    actual: embedding.len(),
                });
            }
        }
    }
    Ok(())
}
