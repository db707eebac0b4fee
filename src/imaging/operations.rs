//! High-level image operations.
//!
//! These functions combine calculations with backend execution: they take the
//! configured bounds, compute exact output dimensions from the source's
//! oriented size, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::fit_within;
use super::params::{Quality, ResizeParams, Sharpening};
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Bounds and encoding settings for the two derivatives of every upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivativeConfig {
    /// Bounding box (width, height) for the full-size image.
    pub full: (u32, u32),
    /// Bounding box (width, height) for the thumbnail.
    pub thumbnail: (u32, u32),
    pub quality: Quality,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            full: (1280, 1280),
            thumbnail: (320, 320),
            quality: Quality::default(),
        }
    }
}

/// Paths of the derivatives written into the temp directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivatives {
    pub full: PathBuf,
    pub thumbnail: PathBuf,
}

/// Derivative paths for the candidate at `position` in a run.
///
/// Names depend only on the position, never on the source file name, so they
/// stay short however long the source name is. `work_dir` must be private to
/// the run.
pub fn derivative_paths(work_dir: &Path, position: usize) -> Derivatives {
    Derivatives {
        full: work_dir.join(format!("{position:05}.full.jpg")),
        thumbnail: work_dir.join(format!("{position:05}.thumb.jpg")),
    }
}

/// Create the full-size and thumbnail JPEGs for one source image.
///
/// Both fit inside their configured box with the source aspect ratio and are
/// never upscaled. Only the thumbnail is sharpened.
pub fn create_derivatives(
    backend: &impl ImageBackend,
    source: &Path,
    work_dir: &Path,
    position: usize,
    config: &DerivativeConfig,
) -> Result<Derivatives> {
    let dims = backend.identify(source)?;
    let original = (dims.width, dims.height);
    let paths = derivative_paths(work_dir, position);

    let (width, height) = fit_within(original, config.full);
    backend.resize(&ResizeParams {
        source: source.to_path_buf(),
        output: paths.full.clone(),
        width,
        height,
        quality: config.quality,
        sharpening: None,
    })?;

    let (width, height) = fit_within(original, config.thumbnail);
    backend.resize(&ResizeParams {
        source: source.to_path_buf(),
        output: paths.thumbnail.clone(),
        width,
        height,
        quality: config.quality,
        sharpening: Some(Sharpening::light()),
    })?;

    Ok(paths)
}

/// Delete both derivatives, ignoring files that are already gone.
pub fn remove_derivatives(derivatives: &Derivatives) -> std::io::Result<()> {
    for path in [&derivatives.full, &derivatives.thumbnail] {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
