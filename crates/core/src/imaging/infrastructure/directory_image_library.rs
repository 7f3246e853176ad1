use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::imaging::domain::image_library::{CropLocation, ImageLibrary, ImageRef};
use crate::shared::constants::{CROP_PREFIX, IMAGE_EXTENSIONS};

/// Image set backed by an upload directory; crops live in a faces directory.
///
/// Only regular files with an image extension (case-insensitive) count.
/// Images are listed sorted by file name so image indices are reproducible.
pub struct DirectoryImageLibrary {
    upload_dir: PathBuf,
    faces_dir: PathBuf,
}

impl DirectoryImageLibrary {
    pub fn new(upload_dir: impl Into<PathBuf>, faces_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            faces_dir: faces_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn faces_dir(&self) -> &Path {
        &self.faces_dir
    }

    /// True when the faces directory is the upload directory or one of its
    /// ancestors. Symlinks and `..` segments are resolved first.
    pub fn faces_dir_contains_uploads(&self) -> io::Result<bool> {
        Ok(resolve(&self.upload_dir)?.starts_with(resolve(&self.faces_dir)?))
    }
}

impl ImageLibrary for DirectoryImageLibrary {
    fn list_images(&self) -> Result<Vec<ImageRef>, Box<dyn std::error::Error + Send + Sync>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.upload_dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(paths
            .into_iter()
            .map(|path| ImageRef {
                reference: path.display().to_string(),
                path,
            })
            .collect())
    }

    /// Removes only `face_*` image files; anything else in the faces
    /// directory is left alone.
    fn reset_crops(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.faces_dir_contains_uploads()? {
            return Err(format!(
                "faces directory {} must not be or contain the upload directory {}",
                self.faces_dir.display(),
                self.upload_dir.display()
            )
            .into());
        }
        fs::create_dir_all(&self.faces_dir)?;
        for entry in fs::read_dir(&self.faces_dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file() && is_crop(&path) {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn discard_crop(
        &self,
        location: &CropLocation,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match fs::remove_file(&location.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn crop_location(&self, stem: &str, extension: &str) -> CropLocation {
        let path = self.faces_dir.join(format!("{stem}.{extension}"));
        CropLocation {
            reference: path.display().to_string(),
            path,
        }
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_crop(path: &Path) -> bool {
    let named = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(CROP_PREFIX));
    named && is_image(path)
}

/// Absolute, symlink-free form of `path`, which need not exist yet.
fn resolve(path: &Path) -> io::Result<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path) {
        return Ok(canonical);
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => Ok(resolve(parent)?.join(name)),
        // `..` as the last segment of a missing path.
        (Some(parent), None) => Ok(resolve(parent)?.parent().map(Path::to_path_buf).unwrap_or_default()),
        (None, _) => Ok(absolute),
    }
}
