//! The owned in-memory corpus: observations, identity names, generation.
//!
//! One writer at a time. `process` holds the pipeline mutex for the whole
//! run and takes the state write lock only to clear and to publish; reads
//! take the state read lock and never fail.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use serde::Serialize;

use crate::identity::domain::identity_registry::IdentityRegistry;
use crate::identity::domain::identity_summary::{summarize, IdentitySummary};
use crate::imaging::domain::image_library::ImageLibrary;
use crate::metrics::domain::metrics_snapshot::MetricsSnapshot;
use crate::pipeline::process_images_use_case::{ImageFailure, ProcessImagesUseCase};
use crate::projection::domain::projector::Projector;
use crate::projection::domain::scatter_point::{scatter, ScatterPoint};
use crate::shared::cluster_id::{ClusterId, CorpusGeneration};
use crate::shared::error::CoreError;
use crate::shared::face_observation::FaceObservation;

/// What happens to assigned names when the corpus is rebuilt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NamePolicy {
    /// Names stay attached to their numeric cluster ids.
    #[default]
    Keep,
    /// Every name is dropped before the rebuild.
    Reset,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProcessOutcome {
    pub generation: CorpusGeneration,
    pub identities: Vec<IdentitySummary>,
    pub failures: Vec<ImageFailure>,
}

#[derive(Default)]
struct CorpusState {
    observations: Vec<FaceObservation>,
    registry: IdentityRegistry,
    generation: CorpusGeneration,
}

pub struct FaceCorpus {
    state: RwLock<CorpusState>,
    pipeline: Mutex<ProcessImagesUseCase>,
    library: Arc<dyn ImageLibrary>,
    projector: Box<dyn Projector>,
}

impl FaceCorpus {
    pub fn new(
        pipeline: ProcessImagesUseCase,
        library: Arc<dyn ImageLibrary>,
        projector: Box<dyn Projector>,
    ) -> Self {
        Self {
            state: RwLock::new(CorpusState::default()),
            pipeline: Mutex::new(pipeline),
            library,
            projector,
        }
    }

    /// Rebuilds the corpus from the current image set.
    ///
    /// Fails with `ProcessingInProgress` if another run holds the pipeline.
    /// The previous corpus is discarded before the rebuild starts, so a
    /// failed run leaves the corpus empty, never stale.
    pub fn process(&self, policy: NamePolicy) -> Result<ProcessOutcome, CoreError> {
        let mut pipeline = match self.pipeline.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(CoreError::ProcessingInProgress),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let generation = {
            let mut state = self.write();
            state.generation = state.generation.next();
            state.observations.clear();
            if policy == NamePolicy::Reset {
                state.registry.clear();
            }
            state.generation
        };
        log::info!("Rebuilding corpus, generation {generation}");

        let report = pipeline.execute()?;

        let mut state = self.write();
        state.observations = report.observations;
        let identities = summarize(&state.observations, &state.registry);
        log::info!(
            "Generation {generation}: {} faces, {} identities",
            state.observations.len(),
            identities.len()
        );
        Ok(ProcessOutcome {
            generation,
            identities,
            failures: report.failures,
        })
    }

    pub fn generation(&self) -> CorpusGeneration {
        self.read().generation
    }

    /// Non-noise identities of the current corpus, ordered by id.
    pub fn list_identities(&self) -> Vec<IdentitySummary> {
        let state = self.read();
        summarize(&state.observations, &state.registry)
    }

    /// Distinct images containing at least one face of `id`, sorted.
    pub fn list_images_for_identity(&self, id: ClusterId) -> Result<Vec<String>, CoreError> {
        if id.is_noise() {
            return Err(CoreError::InvalidArgument(
                "noise is not an identity".into(),
            ));
        }
        let state = self.read();
        let images: BTreeSet<&str> = state
            .observations
            .iter()
            .filter(|o| o.cluster_id == id)
            .map(|o| o.source_image.as_str())
            .collect();
        if images.is_empty() {
            return Err(CoreError::InvalidArgument(format!("unknown identity {id}")));
        }
        Ok(images.into_iter().map(str::to_string).collect())
    }

    /// Names cluster `id`. The name is keyed by the bare id and survives
    /// reprocessing under [`NamePolicy::Keep`]; the id need not exist in the
    /// current corpus.
    pub fn rename_identity(&self, id: ClusterId, name: &str) -> Result<(), CoreError> {
        let mut state = self.write();
        let generation = state.generation;
        state.registry.rename(id, name, generation)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot::compute(&self.read().observations)
    }

    pub fn scatter(&self) -> Vec<ScatterPoint> {
        let state = self.read();
        scatter(&state.observations, &state.registry, self.projector.as_ref())
    }

    /// Every image in the current image set, with or without faces.
    pub fn list_gallery(&self) -> Vec<String> {
        match self.library.list_images() {
            Ok(images) => images.into_iter().map(|i| i.reference).collect(),
            Err(e) => {
                log::warn!("Cannot list gallery: {e}");
                Vec::new()
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CorpusState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CorpusState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::domain::clusterer::{Clusterer, ClusteringError};
    use crate::clustering::infrastructure::dbscan_clusterer::DbscanClusterer;
    use crate::detection::domain::embedding_provider::{Detection, EmbeddingProvider};
    use crate::detection::domain::observation_extractor::ObservationExtractor;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::projection::infrastructure::pca_projector::PcaProjector;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::frame::Frame;
    use crate::shared::constants::NOISE_LABEL;
    use crate::test_support::{face, InMemoryLibrary, RecordingWriter, StubProvider, StubReader};
    use ndarray::ArrayView2;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    type BoxError = Box<dyn std::error::Error + Send + Sync>;

    /// Parks inside the `park_at`-th `detect` call until released.
    struct ParkingProvider {
        inner: StubProvider,
        calls: usize,
        park_at: usize,
        parked: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    }

    impl EmbeddingProvider for ParkingProvider {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, BoxError> {
            self.calls += 1;
            if self.calls == self.park_at {
                self.parked.send(()).map_err(|e| e.to_string())?;
                self.release.recv().map_err(|e| e.to_string())?;
            }
            self.inner.detect(frame)
        }

        fn embed(
            &mut self,
            frame: &Frame,
            boxes: &[BoundingBox],
        ) -> Result<Vec<Vec<f32>>, BoxError> {
            self.inner.embed(frame, boxes)
        }
    }

    fn corpus_with(
        provider: impl EmbeddingProvider + 'static,
        library: Arc<InMemoryLibrary>,
        clusterer: Box<dyn Clusterer>,
    ) -> FaceCorpus {
        let extractor = ObservationExtractor::new(
            Box::new(StubReader::new()),
            Box::new(provider),
            Box::new(RecordingWriter::new()),
            0.90,
            "jpg",
        );
        let pipeline = ProcessImagesUseCase::new(
            extractor,
            clusterer,
            library.clone(),
            Box::new(NullPipelineLogger),
        );
        FaceCorpus::new(pipeline, library, Box::new(PcaProjector))
    }

    fn corpus(provider: impl EmbeddingProvider + 'static, library: Arc<InMemoryLibrary>) -> FaceCorpus {
        corpus_with(provider, library, Box::new(DbscanClusterer::default()))
    }

    fn images(names: &[&str]) -> Arc<InMemoryLibrary> {
        Arc::new(InMemoryLibrary::with_images(names))
    }

    #[test]
    fn test_same_person_in_three_images_and_another_in_one() {
        // Three near-identical faces of one person across three images, and
        // a second person seen twice in a fourth image.
        let provider = StubProvider::new()
            .image(0, vec![face(0.99, vec![0.0, 0.0, 0.0])])
            .image(1, vec![face(0.98, vec![0.1, 0.0, 0.0])])
            .image(2, vec![face(0.97, vec![0.0, 0.1, 0.0])])
            .image(
                3,
                vec![face(0.96, vec![2.0, 0.0, 0.0]), face(0.95, vec![2.0, 0.05, 0.0])],
            );
        let corpus = corpus(provider, images(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]));

        let outcome = corpus.process(NamePolicy::Keep).unwrap();

        assert_eq!(outcome.identities.len(), 2);
        assert_eq!(outcome.identities[0].id, ClusterId::new(0));
        assert_eq!(outcome.identities[0].image_refs.len(), 3);
        assert_eq!(outcome.identities[0].name, "Person 0");
        assert_eq!(outcome.identities[0].thumbnail_ref, "faces/face_0_0.jpg");
        assert_eq!(outcome.identities[1].image_refs.len(), 1);
        assert!(outcome.failures.is_empty());
        assert_eq!(corpus.list_identities(), outcome.identities);
        assert_eq!(
            corpus.list_images_for_identity(ClusterId::new(0)).unwrap(),
            vec!["a.jpg", "b.jpg", "c.jpg"]
        );
    }

    #[test]
    fn test_low_confidence_face_yields_nothing() {
        let provider = StubProvider::new().image(0, vec![face(0.5, vec![0.0, 0.0])]);
        let corpus = corpus(provider, images(&["a.jpg"]));

        let outcome = corpus.process(NamePolicy::Keep).unwrap();

        assert!(outcome.identities.is_empty());
        assert_eq!(corpus.metrics().total_faces, 0);
        assert_eq!(corpus.metrics(), MetricsSnapshot::default());
        assert!(corpus.scatter().is_empty());
    }

    #[test]
    fn test_equidistant_faces_are_all_noise() {
        // Unit vectors scaled so every pair is exactly 1.0 apart.
        let s = std::f32::consts::FRAC_1_SQRT_2;
        let provider = StubProvider::new()
            .image(0, vec![face(0.95, vec![s, 0.0, 0.0, 0.0])])
            .image(1, vec![face(0.95, vec![0.0, s, 0.0, 0.0])])
            .image(2, vec![face(0.95, vec![0.0, 0.0, s, 0.0])])
            .image(3, vec![face(0.95, vec![0.0, 0.0, 0.0, s])]);
        let corpus = corpus(provider, images(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]));

        let outcome = corpus.process(NamePolicy::Keep).unwrap();
        let metrics = corpus.metrics();

        assert!(outcome.identities.is_empty());
        assert_eq!(metrics.total_faces, 4);
        assert_eq!(metrics.total_people, 0);
        assert_eq!(metrics.noise_faces, 4);
        assert_eq!(metrics.silhouette_score, 0.0);

        let points = corpus.scatter();
        assert_eq!(points.len(), 4);
        assert!(points.iter().all(|p| p.label == NOISE_LABEL));
    }

    #[test]
    fn test_name_stays_on_numeric_id_across_runs() {
        // Run 1 sees pairs A, B, C (ids 0, 1, 2) and a lone face X.
        // Run 2 adds a second X, which is discovered before B and C and
        // shifts them: id 2 now denotes B but keeps the name given to C.
        let a = vec![0.0, 0.0];
        let b = vec![5.0, 0.0];
        let c = vec![0.0, 5.0];
        let x = vec![5.0, 5.0];
        let provider = StubProvider::new()
            .image(0, vec![face(0.95, a.clone())])
            .image(1, vec![face(0.95, a)])
            .image(2, vec![face(0.95, x.clone())])
            .image(3, vec![face(0.95, b.clone())])
            .image(4, vec![face(0.95, b)])
            .image(5, vec![face(0.95, c.clone())])
            .image(6, vec![face(0.95, c)])
            .image(7, vec![face(0.95, x)]);
        let library = images(&["0.jpg", "1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg"]);
        let corpus = corpus(provider, library.clone());

        let first = corpus.process(NamePolicy::Keep).unwrap();
        assert_eq!(first.identities.len(), 3);
        assert_eq!(
            corpus.list_images_for_identity(ClusterId::new(2)).unwrap(),
            vec!["5.jpg", "6.jpg"]
        );
        corpus.rename_identity(ClusterId::new(2), "Bob").unwrap();

        library.set_images(&["0.jpg", "1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg", "6.jpg", "7.jpg"]);
        let second = corpus.process(NamePolicy::Keep).unwrap();

        assert_eq!(second.generation, first.generation.next());
        let two = &second.identities[2];
        assert_eq!(two.name, "Bob");
        assert_eq!(two.image_refs.iter().collect::<Vec<_>>(), vec!["3.jpg", "4.jpg"]);
        // The name predates the current generation, so it may be stale.
        assert_eq!(two.name_generation, Some(first.generation));
        assert_eq!(second.identities[3].name, "Person 3");
    }

    #[test]
    fn test_reset_policy_drops_names() {
        let provider = StubProvider::new()
            .image(0, vec![face(0.95, vec![0.0])])
            .image(1, vec![face(0.95, vec![0.1])]);
        let corpus = corpus(provider, images(&["a.jpg", "b.jpg"]));
        corpus.process(NamePolicy::Keep).unwrap();
        corpus.rename_identity(ClusterId::new(0), "Alice").unwrap();
        assert_eq!(corpus.list_identities()[0].name, "Alice");

        let outcome = corpus.process(NamePolicy::Reset).unwrap();
        assert_eq!(outcome.identities[0].name, "Person 0");
        assert_eq!(outcome.identities[0].name_generation, None);
    }

    #[test]
    fn test_rename_is_idempotent_and_rejects_empty() {
        let provider = StubProvider::new()
            .image(0, vec![face(0.95, vec![0.0])])
            .image(1, vec![face(0.95, vec![0.1])]);
        let corpus = corpus(provider, images(&["a.jpg", "b.jpg"]));
        corpus.process(NamePolicy::Keep).unwrap();

        corpus.rename_identity(ClusterId::new(0), "Alice").unwrap();
        corpus.rename_identity(ClusterId::new(0), "Alice").unwrap();
        assert_eq!(corpus.list_identities()[0].name, "Alice");

        assert!(matches!(
            corpus.rename_identity(ClusterId::new(0), ""),
            Err(CoreError::InvalidArgument(_))
        ));
        assert_eq!(corpus.list_identities()[0].name, "Alice");
    }

    #[test]
    fn test_unknown_or_noise_identity_lookup_is_invalid() {
        let provider = StubProvider::new()
            .image(0, vec![face(0.95, vec![0.0])])
            .image(1, vec![face(0.95, vec![9.0])]);
        let corpus = corpus(provider, images(&["a.jpg", "b.jpg"]));
        corpus.process(NamePolicy::Keep).unwrap();

        assert!(matches!(
            corpus.list_images_for_identity(ClusterId::new(0)),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            corpus.list_images_for_identity(ClusterId::NOISE),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_concurrent_process_is_rejected() {
        let corpus = corpus(StubProvider::new(), images(&[]));
        let _running = corpus.pipeline.lock().unwrap();
        assert!(matches!(
            corpus.process(NamePolicy::Keep),
            Err(CoreError::ProcessingInProgress)
        ));
        assert_eq!(corpus.generation(), CorpusGeneration::default());
    }

    #[test]
    fn test_reads_during_rebuild_see_cleared_corpus() {
        let (parked_tx, parked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let provider = ParkingProvider {
            inner: StubProvider::new()
                .image(0, vec![face(0.95, vec![0.0, 0.0])])
                .image(1, vec![face(0.95, vec![0.1, 0.0])]),
            calls: 0,
            // First detect call of the second run.
            park_at: 3,
            parked: parked_tx,
            release: release_rx,
        };
        let corpus = corpus(provider, images(&["a.jpg", "b.jpg"]));
        assert_eq!(corpus.process(NamePolicy::Keep).unwrap().identities.len(), 1);
        corpus.rename_identity(ClusterId::new(0), "Alice").unwrap();

        thread::scope(|scope| {
            let rebuild = scope.spawn(|| corpus.process(NamePolicy::Keep));
            parked_rx.recv().unwrap();

            assert_eq!(corpus.generation(), CorpusGeneration::new(2));
            assert!(corpus.list_identities().is_empty());
            assert_eq!(corpus.metrics(), MetricsSnapshot::default());
            assert!(corpus.scatter().is_empty());
            assert!(corpus.list_images_for_identity(ClusterId::new(0)).is_err());
            assert!(matches!(
                corpus.process(NamePolicy::Keep),
                Err(CoreError::ProcessingInProgress)
            ));

            release_tx.send(()).unwrap();
            let outcome = rebuild.join().unwrap().unwrap();
            assert_eq!(outcome.generation, CorpusGeneration::new(2));
            assert_eq!(outcome.identities.len(), 1);
        });

        assert_eq!(corpus.list_identities()[0].name, "Alice");
    }

    #[test]
    fn test_clustering_failure_leaves_corpus_empty() {
        /// Succeeds on the first call, fails on every later one.
        struct FlakyClusterer {
            calls: AtomicUsize,
        }
        impl Clusterer for FlakyClusterer {
            fn cluster(
                &self,
                embeddings: ArrayView2<'_, f64>,
            ) -> Result<Vec<ClusterId>, ClusteringError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(vec![ClusterId::new(0); embeddings.nrows()])
                } else {
                    Err(ClusteringError::NonFinite { row: 0 })
                }
            }
        }

        let provider = StubProvider::new()
            .image(0, vec![face(0.95, vec![0.0])])
            .image(1, vec![face(0.95, vec![0.1])]);
        let corpus = corpus_with(
            provider,
            images(&["a.jpg", "b.jpg"]),
            Box::new(FlakyClusterer {
                calls: AtomicUsize::new(0),
            }),
        );
        corpus.process(NamePolicy::Keep).unwrap();
        assert_eq!(corpus.metrics().total_faces, 2);

        let result = corpus.process(NamePolicy::Keep);
        assert!(matches!(result, Err(CoreError::Clustering(_))));
        assert!(corpus.list_identities().is_empty());
        assert_eq!(corpus.metrics(), MetricsSnapshot::default());
        assert_eq!(corpus.generation(), CorpusGeneration::new(2));
    }

    #[test]
    fn test_gallery_lists_every_image() {
        let provider = StubProvider::new().image(0, vec![face(0.95, vec![0.0])]);
        let corpus = corpus(provider, images(&["a.jpg", "corrupt.png", "empty.jpg"]));
        let outcome = corpus.process(NamePolicy::Keep).unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(corpus.list_gallery(), vec!["a.jpg", "corrupt.png", "empty.jpg"]);
    }

    #[test]
    fn test_storage_failure_fails_run_and_empties_gallery() {
        let corpus = corpus(StubProvider::new(), Arc::new(InMemoryLibrary::unlistable()));
        assert!(matches!(
            corpus.process(NamePolicy::Keep),
            Err(CoreError::Storage(_))
        ));
        assert!(corpus.list_gallery().is_empty());
        assert!(corpus.list_identities().is_empty());
    }

    #[test]
    fn test_reads_before_first_run_are_empty() {
        let corpus = corpus(StubProvider::new(), images(&[]));
        assert!(corpus.list_identities().is_empty());
        assert_eq!(corpus.metrics(), MetricsSnapshot::default());
        assert!(corpus.scatter().is_empty());
        assert_eq!(corpus.generation(), CorpusGeneration::new(0));
    }

    #[test]
    fn test_scatter_covers_every_observation() {
        let provider = StubProvider::new()
            .image(0, vec![face(0.95, vec![0.0, 0.0]), face(0.95, vec![0.1, 0.0])])
            .image(1, vec![face(0.95, vec![4.0, 4.0])]);
        let corpus = corpus(provider, images(&["a.jpg", "b.jpg"]));
        corpus.process(NamePolicy::Keep).unwrap();
        corpus.rename_identity(ClusterId::new(0), "Alice").unwrap();

        let points = corpus.scatter();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].label, "Alice");
        assert_eq!(points[1].crop_ref, "faces/face_0_1.jpg");
        assert_eq!(points[2].label, NOISE_LABEL);
    }
}
