pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Detections scoring below this never enter the corpus.
pub const CONFIDENCE_THRESHOLD: f64 = 0.90;

/// DBSCAN neighborhood radius, Euclidean on raw embeddings.
pub const CLUSTER_EPS: f64 = 0.85;

/// DBSCAN minimum neighborhood size, the point itself included.
pub const CLUSTER_MIN_POINTS: usize = 2;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const CROP_EXTENSION: &str = "jpg";

/// File name prefix of every crop artifact.
pub const CROP_PREFIX: &str = "face_";

/// Scatter label for observations without an identity.
pub const NOISE_LABEL: &str = "Noise";

pub const SCORE_DECIMALS: usize = 4;
pub const CONFIDENCE_DECIMALS: usize = 2;
