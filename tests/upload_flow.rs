//! End-to-end runs through the public library API.
//!
//! Real images, the real `RustBackend`, a real ledger on disk. Only the
//! hosting service is replaced, by a recording backend registered under its
//! own name, the same way a new hosting service would be plugged in.

use image::{ImageFormat, Rgb, RgbImage};
use imguploader::config::{Config, ConfigError};
use imguploader::hosting::{
    AuthError, BackendCredentials, HostingBackend, Registry, RemoteImage, UploadError,
};
use imguploader::imaging::RustBackend;
use imguploader::run::{ImageStatus, RunError, run, run_with_config_file, status};
use imguploader::store::{LEDGER_FILENAME, LOCK_FILENAME, ProgressStore, UploadStatus};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// =========================================================================
// Recording hosting backend
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
struct Upload {
    full_name: String,
    full_dims: (u32, u32),
    thumb_dims: (u32, u32),
}

#[derive(Clone, Default)]
struct RecordingHost {
    uploads: Arc<Mutex<Vec<Upload>>>,
    /// Full-derivative file names the service refuses.
    failing: Arc<Mutex<HashSet<String>>>,
    authentications: Arc<Mutex<u32>>,
}

impl RecordingHost {
    fn uploaded_names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.full_name.clone())
            .collect()
    }

    fn fail_on(&self, full_name: &str) {
        self.failing.lock().unwrap().insert(full_name.to_string());
    }

    fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn registry(&self) -> Registry {
        let host = self.clone();
        let mut registry = Registry::empty();
        registry.register("recording", move |_: BackendCredentials| {
            Ok(Box::new(host.clone()))
        });
        registry
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

impl HostingBackend for RecordingHost {
    fn name(&self) -> &str {
        "Recording host"
    }

    fn authenticate(&mut self) -> Result<(), AuthError> {
        *self.authentications.lock().unwrap() += 1;
        Ok(())
    }

    fn upload(&self, full: &Path, thumbnail: &Path) -> Result<RemoteImage, UploadError> {
        let full_name = file_name(full);
        if self.failing.lock().unwrap().contains(&full_name) {
            return Err(UploadError::new("service unavailable"));
        }
        self.uploads.lock().unwrap().push(Upload {
            full_name: full_name.clone(),
            full_dims: image::image_dimensions(full).unwrap(),
            thumb_dims: image::image_dimensions(thumbnail).unwrap(),
        });
        Ok(RemoteImage {
            full_image_url: format!("https://img.test/{full_name}"),
            thumbnail_url: format!("https://img.test/{}", file_name(thumbnail)),
        })
    }
}

// =========================================================================
// Fixtures
// =========================================================================

struct Setup {
    photos: TempDir,
    scratch: TempDir,
    config_path: PathBuf,
}

fn write_image(path: &Path, width: u32, height: u32, format: ImageFormat) {
    RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]))
        .save_with_format(path, format)
        .unwrap();
}

/// `a.jpg`, `b.txt`, `c.png`, plus header/footer blobs and a config file.
fn setup(extra_config: &str) -> Setup {
    let photos = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    write_image(&photos.path().join("a.jpg"), 200, 100, ImageFormat::Jpeg);
    fs::write(photos.path().join("b.txt"), "shopping list").unwrap();
    write_image(&photos.path().join("c.png"), 90, 120, ImageFormat::Png);

    let tmp_dir = scratch.path().join("derivatives");
    fs::create_dir(&tmp_dir).unwrap();
    let header = scratch.path().join("header.html");
    let footer = scratch.path().join("footer.html");
    fs::write(&header, "<html><body>\n").unwrap();
    fs::write(&footer, "\n</body></html>\n").unwrap();

    let config_path = scratch.path().join("uploader.toml");
    fs::write(
        &config_path,
        format!(
            r#"[config]
hostingServerBackendClass = "Recording"
tmpDirPath = "{}"
oauthClientId = "client"
oauthSecret = "secret"
HTMLHeaderFilePath = "{}"
HTMLFooterFilePath = "{}"
targetImageWidthPx = 64
targetImageHeightPx = 64
thumbImageWidthPx = 16
thumbImageHeightPx = 16
{extra_config}"#,
            tmp_dir.display(),
            header.display(),
            footer.display()
        ),
    )
    .unwrap();

    Setup {
        photos,
        scratch,
        config_path,
    }
}

/// Gallery entry for the candidate at `position`; the recording host derives
/// its URLs from the derivative file names.
fn markup(position: usize) -> String {
    format!(
        r#"<a target="_blank" href="https://img.test/{position:05}.full.jpg"><img alt="Click here to enlarge the image!" src="https://img.test/{position:05}.thumb.jpg"></a>&nbsp;"#
    )
}

fn run_once(setup: &Setup, host: &RecordingHost) -> Result<imguploader::run::RunReport, RunError> {
    run_with_config_file(
        setup.photos.path(),
        &setup.config_path,
        &host.registry(),
        &RustBackend::new(),
        None,
    )
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn end_to_end_example() {
    let setup = setup("");
    let host = RecordingHost::default();

    let report = run_once(&setup, &host).unwrap();

    assert_eq!(report.summary.uploaded, 2);
    assert!(!report.summary.has_failures());
    let html = fs::read_to_string(setup.photos.path().join("listing.html")).unwrap();
    assert_eq!(
        html,
        format!(
            "<html><body>\n{}{}\n</body></html>\n",
            markup(1),
            markup(2)
        )
    );

    let records = ProgressStore::load(setup.photos.path()).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.values().all(|r| r.status == UploadStatus::Uploaded));
    assert!(!records.contains_key("b.txt"));
}

#[test]
fn derivatives_fit_bounds_and_are_cleaned_up() {
    let setup = setup("");
    let host = RecordingHost::default();

    run_once(&setup, &host).unwrap();

    let uploads = host.uploads.lock().unwrap().clone();
    assert_eq!(
        uploads,
        vec![
            Upload {
                full_name: "00001.full.jpg".into(),
                full_dims: (64, 32),
                thumb_dims: (16, 8),
            },
            Upload {
                full_name: "00002.full.jpg".into(),
                full_dims: (48, 64),
                thumb_dims: (12, 16),
            },
        ]
    );
    let leftovers = fs::read_dir(setup.scratch.path().join("derivatives"))
        .unwrap()
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn second_run_skips_everything() {
    let setup = setup("");
    let host = RecordingHost::default();
    run_once(&setup, &host).unwrap();
    let first_html = fs::read_to_string(setup.photos.path().join("listing.html")).unwrap();

    let report = run_once(&setup, &host).unwrap();

    assert_eq!(report.summary.skipped, 2);
    assert_eq!(report.summary.uploaded, 0);
    assert_eq!(host.uploaded_names().len(), 2);
    assert_eq!(*host.authentications.lock().unwrap(), 1);

    // Same gallery, and the previous file is kept beside it.
    let listing = setup.photos.path().join("listing.html");
    assert_eq!(fs::read_to_string(&listing).unwrap(), first_html);
    assert_eq!(report.gallery.backup, Some(setup.photos.path().join("listing.html.1")));
    assert_eq!(
        fs::read_to_string(setup.photos.path().join("listing.html.1")).unwrap(),
        first_html
    );
}

#[test]
fn failed_image_is_retried_on_next_run() {
    let setup = setup("");
    let host = RecordingHost::default();
    host.fail_on("00001.full.jpg");

    let first = run_once(&setup, &host).unwrap();
    assert_eq!(first.summary.uploaded, 1);
    assert_eq!(first.summary.failed.len(), 1);
    assert_eq!(first.summary.failed[0].0, "a.jpg");
    let html = fs::read_to_string(setup.photos.path().join("listing.html")).unwrap();
    assert_eq!(
        html,
        format!("<html><body>\n{}\n</body></html>\n", markup(2))
    );

    host.heal();
    let second = run_once(&setup, &host).unwrap();

    assert_eq!(second.summary.uploaded, 1);
    assert_eq!(second.summary.skipped, 1);
    assert_eq!(host.uploaded_names(), vec!["00002.full.jpg", "00001.full.jpg"]);
    // Gallery order is directory order, not upload order.
    let html = fs::read_to_string(setup.photos.path().join("listing.html")).unwrap();
    assert_eq!(
        html,
        format!("<html><body>\n{}{}\n</body></html>\n", markup(1), markup(2))
    );
}

#[test]
fn missing_secret_aborts_before_anything_is_touched() {
    let setup = setup("");
    let content = fs::read_to_string(&setup.config_path).unwrap();
    fs::write(
        &setup.config_path,
        content.replace("oauthSecret = \"secret\"\n", ""),
    )
    .unwrap();
    let host = RecordingHost::default();

    let err = run_once(&setup, &host).unwrap_err();

    assert!(matches!(err, RunError::Config(ConfigError::MissingKey("oauthSecret"))));
    assert!(err.to_string().contains("oauthSecret"));
    assert!(!setup.photos.path().join(LEDGER_FILENAME).exists());
    assert!(!setup.photos.path().join(LOCK_FILENAME).exists());
    assert!(!setup.photos.path().join("listing.html").exists());
    assert_eq!(*host.authentications.lock().unwrap(), 0);
}

#[test]
fn custom_output_name_and_status_report() {
    let setup = setup("outputHTMLFilename = \"index.html\"\n");
    let host = RecordingHost::default();
    host.fail_on("00002.full.jpg");

    run_once(&setup, &host).unwrap();

    assert!(setup.photos.path().join("index.html").exists());
    assert!(!setup.photos.path().join("listing.html").exists());

    let lines = status(setup.photos.path()).unwrap();
    assert_eq!(lines.len(), 2);
    assert!(matches!(
        lines[0].status,
        ImageStatus::Uploaded { changed: false, .. }
    ));
    assert_eq!(
        lines[1].status,
        ImageStatus::Failed {
            reason: "service unavailable".into()
        }
    );
}

#[test]
fn run_accepts_a_parsed_config() {
    let setup = setup("");
    let config = Config::load(&setup.config_path).unwrap();
    let host = RecordingHost::default();

    let report = run(
        setup.photos.path(),
        &config,
        &host.registry(),
        &RustBackend::new(),
        None,
    )
    .unwrap();

    assert_eq!(report.gallery_entries, 2);
    assert_eq!(report.gallery.path, setup.photos.path().join("listing.html"));
}

#[test]
fn directories_sharing_a_temp_dir_do_not_collide() {
    let first = setup("");
    let second = setup("");
    // Point the second configuration at the first one's temp directory.
    let shared = first.scratch.path().join("derivatives");
    let content = fs::read_to_string(&second.config_path).unwrap();
    let own = second.scratch.path().join("derivatives");
    fs::write(
        &second.config_path,
        content.replace(&own.display().to_string(), &shared.display().to_string()),
    )
    .unwrap();
    let host = RecordingHost::default();

    run_once(&first, &host).unwrap();
    let report = run_once(&second, &host).unwrap();

    assert_eq!(report.summary.uploaded, 2);
    assert_eq!(fs::read_dir(&shared).unwrap().count(), 0);
}

#[test]
fn very_long_file_name_is_uploaded() {
    let setup = setup("");
    let long = format!("{}.jpg", "x".repeat(246));
    write_image(&setup.photos.path().join(&long), 40, 30, ImageFormat::Jpeg);
    let host = RecordingHost::default();

    let report = run_once(&setup, &host).unwrap();

    assert!(!report.summary.has_failures(), "{:?}", report.summary.failed);
    assert_eq!(report.summary.uploaded, 3);
    let records = ProgressStore::load(setup.photos.path()).unwrap();
    assert!(records[&long].status == UploadStatus::Uploaded);
}
