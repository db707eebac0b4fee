//! Hosting backend trait and shared types.
//!
//! A backend is constructed once from [`BackendCredentials`], authenticated
//! once, and then asked to upload many image pairs. Every implementation must
//! honour the same cleanup contract: a failed [`upload`](HostingBackend::upload)
//! either leaves nothing behind on the remote side, or reports what it left in
//! [`UploadError::orphaned`] so the caller can record it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Opaque credentials handed to a backend at construction.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct BackendCredentials {
    pub client_id: String,
    pub secret: String,
    /// Backend-specific options from the `[backend]` config section.
    pub options: BTreeMap<String, String>,
}

impl fmt::Debug for BackendCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendCredentials")
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

/// References to both uploaded derivatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteImage {
    pub full_image_url: String,
    pub thumbnail_url: String,
}

/// Credentials were rejected or could not be checked. Fatal for the run.
#[derive(Error, Debug)]
#[error("{backend}: authentication failed: {message}")]
pub struct AuthError {
    pub backend: String,
    pub message: String,
}

/// A single upload failed. Recoverable: the run moves on to the next image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UploadError {
    pub message: String,
    /// Remote objects created before the failure that could not be removed.
    pub orphaned: Vec<String>,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            orphaned: Vec::new(),
        }
    }

    pub fn with_orphan(mut self, reference: impl Into<String>) -> Self {
        self.orphaned.push(reference.into());
        self
    }
}

/// Trait for remote hosting services.
pub trait HostingBackend {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Check the credentials given at construction.
    fn authenticate(&mut self) -> Result<(), AuthError>;

    /// Upload the full-size image and its thumbnail.
    fn upload(&self, full: &Path, thumbnail: &Path) -> Result<RemoteImage, UploadError>;
}
