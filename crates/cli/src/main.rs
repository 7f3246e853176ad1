use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use serde_json::json;

use facecluster_core::clustering::infrastructure::dbscan_clusterer::DbscanClusterer;
use facecluster_core::detection::domain::observation_extractor::ObservationExtractor;
use facecluster_core::detection::infrastructure::onnx_face_provider::OnnxFaceProvider;
use facecluster_core::imaging::domain::image_library::ImageLibrary;
use facecluster_core::imaging::infrastructure::directory_image_library::DirectoryImageLibrary;
use facecluster_core::imaging::infrastructure::image_file_reader::ImageFileReader;
use facecluster_core::imaging::infrastructure::image_file_writer::ImageFileWriter;
use facecluster_core::pipeline::face_corpus::{FaceCorpus, NamePolicy, ProcessOutcome};
use facecluster_core::pipeline::pipeline_logger::LogPipelineLogger;
use facecluster_core::pipeline::process_images_use_case::ProcessImagesUseCase;
use facecluster_core::projection::infrastructure::pca_projector::PcaProjector;
use facecluster_core::shared::cluster_id::ClusterId;
use facecluster_core::shared::config::ProcessingConfig;
use facecluster_core::shared::model_resolver::{self, ModelSpec, DETECTOR_MODEL, EMBEDDING_MODEL};

/// Group the faces found in a folder of images by person.
#[derive(Parser)]
#[command(name = "facecluster")]
struct Cli {
    /// Folder holding the images to process.
    upload_dir: PathBuf,

    /// Folder for face crops (default: <UPLOAD_DIR>/faces). Emptied on every run.
    #[arg(long)]
    faces_dir: Option<PathBuf>,

    /// JSON processing config; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum detection confidence for a face to be kept (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Clustering neighborhood radius.
    #[arg(long)]
    eps: Option<f64>,

    /// Faces within eps (itself included) needed for a dense region.
    #[arg(long)]
    min_points: Option<usize>,

    /// Name an identity after processing, as ID=NAME. Repeatable.
    #[arg(long = "rename", value_name = "ID=NAME", value_parser = parse_rename)]
    renames: Vec<(ClusterId, String)>,

    /// Which report to print.
    #[arg(long, value_enum, default_value_t = Report::People)]
    report: Report,

    /// Face detector ONNX model (skips model resolution).
    #[arg(long)]
    detector_model: Option<PathBuf>,

    /// Face embedding ONNX model (skips model resolution).
    #[arg(long)]
    embedding_model: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Report {
    People,
    Metrics,
    Scatter,
    Gallery,
    All,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let config = build_config(&cli)?;

    let detector_path = model_path(cli.detector_model.clone(), DETECTOR_MODEL)?;
    let embedding_path = model_path(cli.embedding_model.clone(), EMBEDDING_MODEL)?;
    let provider = OnnxFaceProvider::new(&detector_path, &embedding_path, config.detector_confidence)
        .map_err(|e| format!("Failed to load models: {e}"))?;

    let library: Arc<dyn ImageLibrary> = Arc::new(directory_library(&cli));

    let extractor = ObservationExtractor::new(
        Box::new(ImageFileReader::new()),
        Box::new(provider),
        Box::new(ImageFileWriter::new()),
        config.confidence_threshold,
        config.crop_extension.clone(),
    );
    let clusterer = DbscanClusterer::new(config.cluster_eps, config.cluster_min_points)?;
    let pipeline = ProcessImagesUseCase::new(
        extractor,
        Box::new(clusterer),
        library.clone(),
        Box::new(LogPipelineLogger::default()),
    );
    let corpus = FaceCorpus::new(pipeline, library, Box::new(PcaProjector));

    let outcome = corpus.process(NamePolicy::Keep)?;
    for failure in &outcome.failures {
        log::warn!("Skipped {}: {}", failure.image, failure.reason);
    }
    for (id, name) in &cli.renames {
        corpus.rename_identity(*id, name)?;
    }

    let report = render_report(&corpus, &outcome, cli.report)?;
    println!("{report}");
    Ok(())
}

fn render_report(
    corpus: &FaceCorpus,
    outcome: &ProcessOutcome,
    report: Report,
) -> Result<String, serde_json::Error> {
    let value = match report {
        Report::People => serde_json::to_value(corpus.list_identities())?,
        Report::Metrics => serde_json::to_value(corpus.metrics())?,
        Report::Scatter => serde_json::to_value(corpus.scatter())?,
        Report::Gallery => serde_json::to_value(corpus.list_gallery())?,
        Report::All => json!({
            "generation": outcome.generation,
            "people": corpus.list_identities(),
            "metrics": corpus.metrics(),
            "scatter": corpus.scatter(),
            "gallery": corpus.list_gallery(),
            "failures": outcome.failures,
        }),
    };
    serde_json::to_string_pretty(&value)
}

fn build_config(cli: &Cli) -> Result<ProcessingConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => ProcessingConfig::load(path)?,
        None => ProcessingConfig::default(),
    };
    if let Some(confidence) = cli.confidence {
        config.confidence_threshold = confidence;
    }
    if let Some(eps) = cli.eps {
        config.cluster_eps = eps;
    }
    if let Some(min_points) = cli.min_points {
        config.cluster_min_points = min_points;
    }
    config.validate()?;
    Ok(config)
}

fn model_path(
    explicit: Option<PathBuf>,
    model: ModelSpec,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    log::info!("Resolving model: {}", model.name);
    let name = model.name;
    let path = model_resolver::resolve(
        model,
        None,
        Some(Box::new(move |downloaded, total| {
            download_progress(name, downloaded, total)
        })),
    )?;
    Ok(path)
}

fn directory_library(cli: &Cli) -> DirectoryImageLibrary {
    let faces_dir = cli
        .faces_dir
        .clone()
        .unwrap_or_else(|| cli.upload_dir.join("faces"));
    DirectoryImageLibrary::new(&cli.upload_dir, faces_dir)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.upload_dir.is_dir() {
        return Err(format!("Upload folder not found: {}", cli.upload_dir.display()).into());
    }
    for (flag, path) in [
        ("--config", &cli.config),
        ("--detector-model", &cli.detector_model),
        ("--embedding-model", &cli.embedding_model),
    ] {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(format!("{flag} file not found: {}", path.display()).into());
            }
        }
    }
    if directory_library(cli).faces_dir_contains_uploads()? {
        return Err("--faces-dir must not be or contain the upload folder".into());
    }
    Ok(())
}

fn parse_rename(arg: &str) -> Result<(ClusterId, String), String> {
    let (id, name) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ID=NAME, got '{arg}'"))?;
    let id: i32 = id
        .trim()
        .parse()
        .map_err(|_| format!("identity id must be an integer, got '{id}'"))?;
    if id < 0 {
        return Err(format!("identity id must not be negative, got {id}"));
    }
    if name.trim().is_empty() {
        return Err("name must not be empty".into());
    }
    Ok((ClusterId::new(id), name.to_string()))
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}
