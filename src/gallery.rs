//! Static HTML gallery for uploaded images.
//!
//! The gallery is a plain concatenation: the configured header blob, one
//! linked thumbnail per uploaded image, and the footer blob. Each entry is
//!
//! ```html
//! <a target="_blank" href="FULL"><img alt="Click here to enlarge the image!" src="THUMB"></a>&nbsp;
//! ```
//!
//! Entries appear in catalog order. Ordering is never decided here; the
//! caller passes candidates in the order the catalog produced them, and only
//! those the ledger marks as uploaded become entries.
//!
//! An existing gallery file is kept: it is renamed to `<name>.1`, `<name>.2`,
//! and so on (lowest free number) before the new one is written.

use crate::catalog::ImageCandidate;
use crate::store::ProgressStore;
use maud::{Markup, PreEscaped, html};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const ENLARGE_HINT: &str = "Click here to enlarge the image!";

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Cannot move existing gallery {} to {}: {}", .from.display(), .to.display(), .source)]
    Backup {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot write gallery {}: {}", .0.display(), .1)]
    Write(PathBuf, #[source] std::io::Error),
}

/// One uploaded image as it appears in the gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryEntry {
    pub thumbnail_url: String,
    pub full_image_url: String,
    /// 1-based position in the gallery.
    pub display_order: usize,
}

/// Where the gallery was written, and where the previous one went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenGallery {
    pub path: PathBuf,
    pub backup: Option<PathBuf>,
}

/// Entries for every candidate the ledger marks as uploaded, in candidate order.
pub fn collect_entries(
    candidates: impl IntoIterator<Item = ImageCandidate>,
    store: &ProgressStore,
) -> Vec<GalleryEntry> {
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let record = store.get(&candidate.identity)?;
            if !record.is_uploaded() {
                return None;
            }
            Some((
                record.full_image_url.clone()?,
                record.thumbnail_url.clone()?,
            ))
        })
        .enumerate()
        .map(|(position, (full_image_url, thumbnail_url))| GalleryEntry {
            thumbnail_url,
            full_image_url,
            display_order: position + 1,
        })
        .collect()
}

fn entry_markup(entry: &GalleryEntry) -> Markup {
    html! {
        a target="_blank" href=(entry.full_image_url) {
            img alt=(ENLARGE_HINT) src=(entry.thumbnail_url);
        }
        (PreEscaped("&nbsp;"))
    }
}

/// Header, then each entry in order, then footer. The blobs are copied verbatim.
pub fn render(header: &str, entries: &[GalleryEntry], footer: &str) -> String {
    let mut page = String::from(header);
    for entry in entries {
        page.push_str(&entry_markup(entry).into_string());
    }
    page.push_str(footer);
    page
}

/// Read an optional header/footer blob.
///
/// No path means an empty blob. A file that cannot be read is reported and
/// treated as empty; it never stops the gallery from being written.
pub fn read_blob(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return String::new();
    };
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "cannot read HTML blob, using an empty one");
            String::new()
        }
    }
}

/// First `<file_name>.N` (N ≥ 1) that does not exist in `dir`.
fn backup_path(dir: &Path, file_name: &str) -> PathBuf {
    (1..)
        .map(|n| dir.join(format!("{file_name}.{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| dir.join(format!("{file_name}.bak")))
}

/// Write `html` to `dir/file_name`, moving any existing file aside first.
pub fn write_gallery(dir: &Path, file_name: &str, html: &str) -> Result<WrittenGallery, GalleryError> {
    let path = dir.join(file_name);
    let backup = if path.exists() {
        let to = backup_path(dir, file_name);
        fs::rename(&path, &to).map_err(|source| GalleryError::Backup {
            from: path.clone(),
            to: to.clone(),
            source,
        })?;
        info!(from = %path.display(), to = %to.display(), "kept previous gallery");
        Some(to)
    } else {
        None
    };

    fs::write(&path, html).map_err(|e| GalleryError::Write(path.clone(), e))?;
    Ok(WrittenGallery { path, backup })
}
