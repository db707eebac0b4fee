//! Directory listing and image classification.
//!
//! The catalog is the first step of every run. It lists the regular files
//! directly inside the source directory, in file-name order, and decides which
//! of them are images by looking at their content.
//!
//! ```text
//! photos/
//! ├── .imguploader-progress.jsonl   # ledger, not an image: skipped
//! ├── a.jpg                         # candidate "a.jpg"
//! ├── b.txt                         # skipped
//! ├── c.png                         # candidate "c.png"
//! └── raw/                          # directories are never entered
//! ```
//!
//! The identity of a candidate is its file name. It is stable across runs of
//! the same directory, which is what lets the progress ledger match a file to
//! its earlier outcome.

use crate::imaging::sniff_format;
use image::ImageFormat;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot read image directory {}: {}", .0.display(), .1)]
    Unreadable(PathBuf, #[source] walkdir::Error),
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

/// A file recognised as an image to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub path: PathBuf,
    /// File name within the scanned directory.
    pub identity: String,
    /// Format detected from the file's leading bytes.
    pub media_kind: ImageFormat,
}

/// Ordered, deduplicated listing of one directory.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    root: PathBuf,
    /// (identity, path) for every regular file, sorted by file name.
    files: Vec<(String, PathBuf)>,
}

impl FileCatalog {
    /// List the regular files directly inside `dir`.
    ///
    /// Only the listing happens here; classification is deferred to
    /// [`candidates`](Self::candidates).
    pub fn scan(dir: &Path) -> Result<Self, CatalogError> {
        if !dir.is_dir() {
            return Err(CatalogError::NotADirectory(dir.to_path_buf()));
        }

        let mut seen = HashSet::new();
        let mut files = Vec::new();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| CatalogError::Unreadable(dir.to_path_buf(), e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let identity = entry.file_name().to_string_lossy().into_owned();
            // Lossy conversion can map two raw names onto one identity.
            if !seen.insert(identity.clone()) {
                debug!(file = %entry.path().display(), "duplicate identity, skipping");
                continue;
            }
            files.push((identity, entry.into_path()));
        }

        Ok(Self {
            root: dir.to_path_buf(),
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of files listed, images or not.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether a file with this identity was listed.
    pub fn contains(&self, identity: &str) -> bool {
        self.files.iter().any(|(id, _)| id == identity)
    }

    /// Lazily classify the listing, yielding images in file-name order.
    ///
    /// Each call starts a fresh enumeration.
    pub fn candidates(&self) -> impl Iterator<Item = ImageCandidate> + '_ {
        self.files
            .iter()
            .filter_map(|(identity, path)| classify(identity, path))
    }
}

fn classify(identity: &str, path: &Path) -> Option<ImageCandidate> {
    match sniff_format(path) {
        Ok(Some(media_kind)) => Some(ImageCandidate {
            path: path.to_path_buf(),
            identity: identity.to_string(),
            media_kind,
        }),
        Ok(None) => {
            debug!(file = %path.display(), "not an image, skipping");
            None
        }
        Err(e) => {
            debug!(file = %path.display(), error = %e, "unreadable, skipping");
            None
        }
    }
}
