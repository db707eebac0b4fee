//! # imguploader
//!
//! Resumable batch upload of a directory of images to a hosting service,
//! followed by a static HTML gallery linking every uploaded image.
//!
//! # Architecture
//!
//! A run is a single sequential pass:
//!
//! ```text
//! FileCatalog ──▶ upload_all ──▶ GalleryAssembler
//!                  │      ▲
//!                  ▼      │
//!         HostingBackend  ProgressStore (.imguploader-progress.jsonl)
//! ```
//!
//! 1. The [`catalog`] lists the directory and recognises images by content.
//! 2. The [`upload`] orchestrator resizes each image into a full-size JPEG
//!    and a thumbnail, uploads both through a [`hosting`] backend, and records
//!    the outcome in the [`store`] before moving on.
//! 3. The [`gallery`] is rendered from the ledger, in catalog order.
//!
//! Resume is the whole point. An image whose record says *uploaded* is never
//! resized, uploaded, or even authenticated for again, so re-running after a
//! crash, a network outage, or a revoked token only does the missing work.
//! Failures are not permanent: the next run retries them.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | TOML configuration lookup, parsing, and validation |
//! | [`catalog`] | Directory listing and content-based image detection |
//! | [`store`] | Durable JSON Lines ledger of upload outcomes, with locking |
//! | [`imaging`] | Pure-Rust resize to JPEG derivatives (EXIF-aware) |
//! | [`hosting`] | Hosting backend trait, registry, and the Imgur backend |
//! | [`upload`] | Per-image lifecycle: resize, upload, record |
//! | [`gallery`] | HTML gallery rendering (Maud) and safe output writing |
//! | [`run`] | Wires the above into one run, plus the read-only status report |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Ledger Line per Outcome
//!
//! The ledger is appended to, never rewritten in place, while a run is in
//! progress. A crash can tear at most the final line, and a torn final line is
//! simply ignored on the next start. Compaction happens through a temporary
//! file and an atomic rename.
//!
//! ## Backends Behind a Registry
//!
//! The configuration names a backend (`hostingServerBackendClass = "imgur"`);
//! the [`hosting::Registry`] maps that name to a constructor. The orchestrator
//! only sees [`hosting::HostingBackend`], so another service is one trait
//! implementation and one `register` call away.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resizing, and JPEG encoding use the `image` crate. No
//! ImageMagick, no system libraries: the binary is self-contained.

pub mod catalog;
pub mod config;
pub mod gallery;
pub mod hosting;
pub mod imaging;
pub mod output;
pub mod run;
pub mod store;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
