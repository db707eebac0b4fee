//! One complete uploader run, and the read-only status report.
//!
//! ```text
//! Config ─▶ Registry ─▶ ProgressStore::open ─▶ FileCatalog::scan
//!        ─▶ upload_all ─▶ collect_entries ─▶ render ─▶ write_gallery
//! ```
//!
//! Everything before `upload_all` is setup: any error there ends the run
//! before a single candidate is touched.

use crate::catalog::{CatalogError, FileCatalog};
use crate::config::{Config, ConfigError};
use crate::gallery::{GalleryError, WrittenGallery, collect_entries, read_blob, render, write_gallery};
use crate::hosting::{AuthError, Registry};
use crate::imaging::ImageBackend;
use crate::store::{ProgressStore, StoreError, UploadRecord, UploadStatus, hash_file};
use crate::upload::{RunSummary, UploadAbort, UploadEvent, UploadSettings, upload_all};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error("Cannot create a working directory in {}: {}", .0.display(), .1)]
    WorkDir(PathBuf, #[source] std::io::Error),
}

impl From<UploadAbort> for RunError {
    fn from(abort: UploadAbort) -> Self {
        match abort {
            UploadAbort::Auth(e) => Self::Auth(e),
            UploadAbort::Store(e) => Self::Store(e),
            UploadAbort::WorkDir(path, e) => Self::WorkDir(path, e),
        }
    }
}

/// What a successful run did.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub gallery: WrittenGallery,
    /// Number of images linked from the gallery.
    pub gallery_entries: usize,
}

/// Upload the images in `source_dir` and write its gallery.
pub fn run(
    source_dir: &Path,
    config: &Config,
    registry: &Registry,
    imaging: &impl ImageBackend,
    progress: Option<Sender<UploadEvent>>,
) -> Result<RunReport, RunError> {
    let mut host = registry.create(&config.backend, config.credentials.clone())?;
    info!(backend = host.name(), "selected hosting backend");

    let mut store = ProgressStore::open(source_dir)?;
    let catalog = FileCatalog::scan(source_dir)?;
    debug!(files = catalog.len(), dir = %source_dir.display(), "listed image directory");

    let summary = upload_all(
        catalog.candidates(),
        &mut store,
        imaging,
        host.as_mut(),
        &UploadSettings::from_config(config),
        progress,
    )?;

    let entries = collect_entries(catalog.candidates(), &store);
    let header = read_blob(config.header_path.as_deref());
    let footer = read_blob(config.footer_path.as_deref());
    let html = render(&header, &entries, &footer);
    let gallery = write_gallery(source_dir, &config.output_filename, &html)?;
    info!(path = %gallery.path.display(), entries = entries.len(), "wrote gallery");

    store.persist()?;
    Ok(RunReport {
        summary,
        gallery,
        gallery_entries: entries.len(),
    })
}

/// Load the configuration at `config_path`, then [`run`].
///
/// A configuration error is returned before the directory is scanned or the
/// ledger is opened.
pub fn run_with_config_file(
    source_dir: &Path,
    config_path: &Path,
    registry: &Registry,
    imaging: &impl ImageBackend,
    progress: Option<Sender<UploadEvent>>,
) -> Result<RunReport, RunError> {
    let config = Config::load(config_path)?;
    run(source_dir, &config, registry, imaging, progress)
}

/// State of one image in the status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStatus {
    /// Never attempted, or interrupted before its outcome was recorded.
    Pending,
    Uploaded {
        full_image_url: String,
        /// Source content no longer matches what was uploaded.
        changed: bool,
    },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub identity: String,
    pub status: ImageStatus,
}

/// Ledger contents against the images currently in `source_dir`.
///
/// Read-only: takes no lock, writes nothing, and never touches the network.
pub fn status(source_dir: &Path) -> Result<Vec<StatusLine>, RunError> {
    let records = ProgressStore::load(source_dir)?;
    let catalog = FileCatalog::scan(source_dir)?;

    Ok(catalog
        .candidates()
        .map(|candidate| {
            let status = match records.get(&candidate.identity) {
                None => ImageStatus::Pending,
                Some(record) => status_of(record, &candidate.path),
            };
            StatusLine {
                identity: candidate.identity,
                status,
            }
        })
        .collect())
}

fn status_of(record: &UploadRecord, source: &Path) -> ImageStatus {
    match record.status {
        UploadStatus::Pending => ImageStatus::Pending,
        UploadStatus::Uploaded => {
            let changed = match (&record.source_hash, hash_file(source)) {
                (Some(recorded), Ok(current)) => *recorded != current,
                _ => false,
            };
            ImageStatus::Uploaded {
                full_image_url: record.full_image_url.clone().unwrap_or_default(),
                changed,
            }
        }
        UploadStatus::Failed => ImageStatus::Failed {
            reason: record
                .failure
                .as_ref()
                .map(|f| f.message.clone())
                .unwrap_or_default(),
        },
    }
}
