//! Upload orchestration.
//!
//! Drives every catalog candidate through its lifecycle, one at a time:
//!
//! ```text
//! Pending ──(ledger says Uploaded)──────────────────────────▶ Uploaded (skipped)
//!    │
//!    ▼
//! Resizing ──(resize error)──▶ Failed { stage: resize }
//!    │
//!    ▼
//! Uploading ──(upload error)──▶ Failed { stage: upload, orphaned }
//!    │
//!    ▼
//! Uploaded
//! ```
//!
//! Every terminal state other than the skip is written to the
//! [`ProgressStore`] before the next candidate starts, so an interrupted run
//! loses at most the candidate in flight. Per-candidate failures are recorded
//! and the run moves on; a ledger write failure aborts the run, since
//! continuing would upload images whose outcome can no longer be remembered.
//!
//! The hosting backend is authenticated once, right before the first
//! candidate that actually needs uploading. A run where everything is already
//! uploaded never contacts the service; a rejected credential aborts the run
//! before any upload.
//!
//! Derivatives are written to a working directory created for the run inside
//! the configured temp directory (`<tmpDirPath>/imguploader-XXXXXX/`) and
//! named by candidate position (`00001.full.jpg`, `00001.thumb.jpg`). Runs on
//! other image directories can share `tmpDirPath` without touching each
//! other's files. The working directory is removed when the run ends, however
//! it ends.
//!
//! There are no retries within a run. A later run retries everything that is
//! not marked uploaded.

use crate::catalog::ImageCandidate;
use crate::config::Config;
use crate::hosting::{AuthError, HostingBackend};
use crate::imaging::operations::derivative_paths;
use crate::imaging::{DerivativeConfig, ImageBackend, create_derivatives, remove_derivatives};
use crate::store::{FailureStage, ProgressStore, StoreError, UploadRecord, hash_file};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a run stopped before working through every candidate.
#[derive(Error, Debug)]
pub enum UploadAbort {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Cannot create a working directory in {}: {}", .0.display(), .1)]
    WorkDir(PathBuf, #[source] std::io::Error),
}

/// Settings the orchestrator takes from [`Config`].
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Parent of the per-run working directory for derivatives.
    pub tmp_dir: PathBuf,
    pub derivatives: DerivativeConfig,
}

impl UploadSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tmp_dir: config.tmp_dir.clone(),
            derivatives: config.derivatives,
        }
    }
}

/// Lifecycle position of a candidate within a run.
///
/// Every candidate starts `Pending`. Only `Resizing` and `Uploading` are
/// announced through [`UploadEvent::Transition`]; the terminal states have
/// their own events ([`UploadEvent::Skipped`], [`UploadEvent::Uploaded`],
/// [`UploadEvent::Failed`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateState {
    Pending,
    Resizing,
    Uploading,
    Uploaded,
    Failed,
}

impl fmt::Display for CandidateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Resizing => "resizing",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Failed => "failed",
        })
    }
}

/// Progress notifications, sent in lifecycle order. `index` is the 1-based
/// position of the candidate in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Already uploaded by an earlier run.
    Skipped { index: usize, identity: String },
    /// The candidate entered `Resizing` or `Uploading`. Never carries
    /// `Pending` or a terminal state.
    Transition {
        index: usize,
        identity: String,
        state: CandidateState,
    },
    Uploaded {
        index: usize,
        identity: String,
        full_image_url: String,
    },
    Failed {
        index: usize,
        identity: String,
        stage: FailureStage,
        message: String,
        orphaned: Vec<String>,
    },
}

/// Counts for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Candidates the ledger already marked as uploaded.
    pub skipped: u32,
    pub uploaded: u32,
    /// (identity, reason) for every candidate that failed this run.
    pub failed: Vec<(String, String)>,
}

impl RunSummary {
    pub fn total(&self) -> u32 {
        self.skipped + self.uploaded + self.failed.len() as u32
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total() == 0 {
            return write!(f, "no images found");
        }
        write!(f, "{} uploaded", self.uploaded)?;
        if self.skipped > 0 {
            write!(f, ", {} already uploaded", self.skipped)?;
        }
        if self.has_failures() {
            write!(f, ", {} failed", self.failed.len())?;
        }
        write!(f, " ({} total)", self.total())
    }
}

fn create_work_dir(tmp_dir: &Path) -> Result<TempDir, UploadAbort> {
    let dir = tempfile::Builder::new()
        .prefix("imguploader-")
        .tempdir_in(tmp_dir)
        .map_err(|e| UploadAbort::WorkDir(tmp_dir.to_path_buf(), e))?;
    debug!(dir = %dir.path().display(), "created working directory");
    Ok(dir)
}

fn emit(progress: &Option<Sender<UploadEvent>>, event: UploadEvent) {
    if let Some(tx) = progress {
        // A closed receiver only means nobody is listening.
        let _ = tx.send(event);
    }
}

/// Upload every candidate not yet marked uploaded, recording each outcome.
///
/// Returns `Err` only when authentication fails, the working directory cannot
/// be created, or the ledger cannot be written.
pub fn upload_all(
    candidates: impl IntoIterator<Item = ImageCandidate>,
    store: &mut ProgressStore,
    imaging: &impl ImageBackend,
    host: &mut dyn HostingBackend,
    settings: &UploadSettings,
    progress: Option<Sender<UploadEvent>>,
) -> Result<RunSummary, UploadAbort> {
    let mut summary = RunSummary::default();
    // Created together with authentication, on the first candidate to upload.
    let mut work_dir: Option<TempDir> = None;

    for (position, candidate) in candidates.into_iter().enumerate() {
        let index = position + 1;
        let identity = candidate.identity.clone();

        if store.get(&identity).is_some_and(UploadRecord::is_uploaded) {
            debug!(%identity, "already uploaded, skipping");
            summary.skipped += 1;
            emit(&progress, UploadEvent::Skipped { index, identity });
            continue;
        }

        let work = match work_dir.take() {
            Some(dir) => dir,
            None => {
                host.authenticate()?;
                create_work_dir(&settings.tmp_dir)?
            }
        };
        let record = attempt(&candidate, index, work.path(), imaging, &*host, settings, &progress);
        work_dir = Some(work);
        store.upsert(record.clone())?;

        match record.failure {
            None => {
                info!(%identity, url = record.full_image_url.as_deref().unwrap_or_default(), "uploaded");
                summary.uploaded += 1;
                emit(
                    &progress,
                    UploadEvent::Uploaded {
                        index,
                        identity,
                        full_image_url: record.full_image_url.unwrap_or_default(),
                    },
                );
            }
            Some(failure) => {
                warn!(%identity, stage = ?failure.stage, error = %failure.message, "upload failed");
                summary.failed.push((identity.clone(), failure.message.clone()));
                emit(
                    &progress,
                    UploadEvent::Failed {
                        index,
                        identity,
                        stage: failure.stage,
                        message: failure.message,
                        orphaned: record.orphaned,
                    },
                );
            }
        }
    }

    if let Some(dir) = work_dir
        && let Err(e) = dir.close()
    {
        warn!(error = %e, "cannot remove working directory");
    }
    Ok(summary)
}

/// Resize and upload one candidate, returning the record to store.
fn attempt(
    candidate: &ImageCandidate,
    index: usize,
    work_dir: &Path,
    imaging: &impl ImageBackend,
    host: &dyn HostingBackend,
    settings: &UploadSettings,
    progress: &Option<Sender<UploadEvent>>,
) -> UploadRecord {
    let identity = candidate.identity.as_str();
    let transition = |state| {
        emit(
            progress,
            UploadEvent::Transition {
                index,
                identity: identity.to_string(),
                state,
            },
        )
    };

    transition(CandidateState::Resizing);
    let source_hash = match hash_file(&candidate.path) {
        Ok(hash) => Some(hash),
        Err(e) => {
            warn!(%identity, error = %e, "cannot hash source file");
            None
        }
    };

    let derivatives = match create_derivatives(
        imaging,
        &candidate.path,
        work_dir,
        index,
        &settings.derivatives,
    ) {
        Ok(d) => d,
        Err(e) => {
            // A failed thumbnail can leave the full-size derivative behind.
            let partial = derivative_paths(work_dir, index);
            if let Err(e) = remove_derivatives(&partial) {
                debug!(%identity, error = %e, "cannot remove partial derivatives");
            }
            return UploadRecord::failed(identity, FailureStage::Resize, format!("resize error: {e}"))
                .with_source_hash(source_hash);
        }
    };

    transition(CandidateState::Uploading);
    debug!(%identity, backend = host.name(), "uploading derivatives");
    let result = host.upload(&derivatives.full, &derivatives.thumbnail);

    if let Err(e) = remove_derivatives(&derivatives) {
        warn!(%identity, error = %e, "cannot remove derivatives from temp directory");
    }

    match result {
        Ok(remote) => UploadRecord::uploaded(identity, remote.full_image_url, remote.thumbnail_url)
            .with_source_hash(source_hash),
        Err(e) => UploadRecord::failed(identity, FailureStage::Upload, e.message)
            .with_source_hash(source_hash)
            .with_orphans(e.orphaned),
    }
}
