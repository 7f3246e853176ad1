use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::clustering::domain::clusterer::{Clusterer, ClusteringError};
use crate::detection::domain::observation_extractor::ObservationExtractor;
use crate::imaging::domain::image_library::ImageLibrary;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::error::CoreError;
use crate::shared::face_observation::{embedding_matrix, FaceObservation};

/// An image skipped during a run, with the reason it was skipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageFailure {
    pub image: String,
    pub reason: String,
}

/// Result of one full pass over the image set.
#[derive(Debug, Default)]
pub struct ProcessReport {
    /// Every accepted face, in image order then detection order, labeled.
    pub observations: Vec<FaceObservation>,
    pub failures: Vec<ImageFailure>,
}

/// Batch pipeline: reset crops → list images → extract each → cluster.
///
/// Extraction is a fold over the image set that collects observations and
/// failures side by side; one bad image never stops the batch. Storage and
/// clustering failures abort the run.
pub struct ProcessImagesUseCase {
    extractor: ObservationExtractor,
    clusterer: Box<dyn Clusterer>,
    library: Arc<dyn ImageLibrary>,
    logger: Box<dyn PipelineLogger>,
}

impl ProcessImagesUseCase {
    pub fn new(
        extractor: ObservationExtractor,
        clusterer: Box<dyn Clusterer>,
        library: Arc<dyn ImageLibrary>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            extractor,
            clusterer,
            library,
            logger,
        }
    }

    pub fn execute(&mut self) -> Result<ProcessReport, CoreError> {
        self.library.reset_crops().map_err(CoreError::Storage)?;
        let images = self.library.list_images().map_err(CoreError::Storage)?;
        let total = images.len();
        self.logger.info(&format!("Processing {total} images"));
        self.logger.progress(0, total);

        let mut report = ProcessReport::default();
        for (index, image) in images.iter().enumerate() {
            let started = Instant::now();
            let expected_dim = report.observations.first().map(|o| o.embedding.len());
            match self
                .extractor
                .extract(index, image, self.library.as_ref(), expected_dim)
            {
                Ok(found) => {
                    self.logger.metric("faces", found.len() as f64);
                    report.observations.extend(found);
                }
                Err(e) => {
                    log::warn!("Skipping image {}: {e}", e.image());
                    report.failures.push(ImageFailure {
                        image: e.image().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
            self.logger.timing("extract", elapsed_ms(started));
            self.logger.progress(index + 1, total);
        }

        if report.observations.is_empty() {
            self.logger.info("No faces found; clustering skipped");
        } else {
            let started = Instant::now();
            self.assign_clusters(&mut report.observations)?;
            self.logger.timing("cluster", elapsed_ms(started));
        }

        self.logger.info(&format!(
            "Found {} faces in {} images ({} skipped)",
            report.observations.len(),
            total - report.failures.len(),
            report.failures.len()
        ));
        self.logger.summary();
        Ok(report)
    }

    fn assign_clusters(&self, observations: &mut [FaceObservation]) -> Result<(), ClusteringError> {
        let matrix = embedding_matrix(observations).ok_or_else(|| {
            ClusteringError::InvalidParameters("embeddings differ in dimension".into())
        })?;
        let labels = self.clusterer.cluster(matrix.view())?;
        if labels.len() != observations.len() {
            return Err(ClusteringError::LabelCount {
                expected: observations.len(),
                actual: labels.len(),
            });
        }
        for (obs, label) in observations.iter_mut().zip(labels) {
            obs.cluster_id = label;
        }
        Ok(())
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
