//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the uploader needs:
//! identify (oriented dimensions) and resize (decode, scale, encode).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, statically
//! linked into the binary.

use super::params::ResizeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation, with EXIF orientation already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Both operations must be implemented so the uploader stays backend-agnostic
/// and tests can substitute a recording mock.
pub trait ImageBackend {
    /// Get the displayed image dimensions (after orientation).
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Execute a resize operation, writing the derivative to `params.output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
