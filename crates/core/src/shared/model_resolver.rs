use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{
    EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// A downloadable model file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub url: &'static str,
}

pub const DETECTOR_MODEL: ModelSpec = ModelSpec {
    name: YOLO_MODEL_NAME,
    url: YOLO_MODEL_URL,
};

pub const EMBEDDING_MODEL: ModelSpec = ModelSpec {
    name: EMBEDDING_MODEL_NAME,
    url: EMBEDDING_MODEL_URL,
};

/// Resolve a model file, preferring local copies over a download.
///
/// Order: user cache directory, then `bundled_dir`, then download into the
/// cache.
pub fn resolve(
    model: ModelSpec,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache_dir = model_cache_dir()?;
    if let Some(found) = find_local(model.name, &cache_dir, bundled_dir) {
        return Ok(found);
    }

    fs::create_dir_all(&cache_dir).map_err(ModelResolveError::CacheDir)?;
    let cached_path = cache_dir.join(model.name);
    log::info!("Downloading {} from {}", model.name, model.url);
    download(model.url, &cached_path, progress)?;
    Ok(cached_path)
}

fn find_local(name: &str, cache_dir: &Path, bundled_dir: Option<&Path>) -> Option<PathBuf> {
    std::iter::once(cache_dir)
        .chain(bundled_dir)
        .map(|dir| dir.join(name))
        .find(|path| path.exists())
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Face Cluster/models/`
/// - Linux: `$XDG_CACHE_HOME/Face Cluster/models/` or `~/.cache/Face Cluster/models/`
/// - Windows: `%LOCALAPPDATA%/Face Cluster/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join("Face Cluster").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let download_err = |source| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;
    let total = response.content_length().unwrap_or(0);
    let bytes = response.bytes().map_err(download_err)?;

    // Write next to the destination, then rename so a failed download
    // never leaves a truncated model behind.
    let temp_path = dest.with_extension("part");
    let write_err = |source| ModelResolveError::Write {
        path: temp_path.clone(),
        source,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;

    let mut downloaded: u64 = 0;
    for chunk in bytes.chunks(1024 * 1024) {
        if let Err(e) = file.write_all(chunk) {
            let _ = fs::remove_file(&temp_path);
            return Err(write_err(e));
        }
        downloaded += chunk.len() as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}
