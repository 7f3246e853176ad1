use std::path::PathBuf;

/// An image in the current image set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRef {
    pub path: PathBuf,
    /// Opaque reference handed to callers (gallery, identity image lists).
    pub reference: String,
}

/// Where a crop artifact is stored and how callers refer to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CropLocation {
    pub path: PathBuf,
    pub reference: String,
}

/// Filesystem-like facility holding the image set and crop artifacts.
///
/// Shared between the process pipeline and read-only gallery queries.
pub trait ImageLibrary: Send + Sync {
    /// Current image set, in the order that defines image indices.
    fn list_images(&self) -> Result<Vec<ImageRef>, Box<dyn std::error::Error + Send + Sync>>;

    /// Discards every crop artifact of the previous run.
    fn reset_crops(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Removes one crop artifact written during the current run.
    fn discard_crop(&self, location: &CropLocation) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Location for a crop named `stem` with the given file extension.
    fn crop_location(&self, stem: &str, extension: &str) -> CropLocation;
}
