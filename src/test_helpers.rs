//! Shared test utilities for the imguploader test suite.
//!
//! Synthetic images for the imaging and catalog tests, and a ready-made
//! [`Config`] for anything that needs one.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! create_test_jpeg(&tmp.path().join("a.jpg"), 64, 48);
//! let config = test_config(tmp.path());
//! ```

use crate::config::Config;
use image::{ImageFormat, Rgb, RgbImage};
use std::path::Path;

// =========================================================================
// Synthetic images
// =========================================================================

/// A gradient, so resizing and encoding have real pixel data to work with.
fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Write a JPEG regardless of the path's extension.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    gradient(width, height)
        .save_with_format(path, ImageFormat::Jpeg)
        .unwrap();
}

/// Write a PNG regardless of the path's extension.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    gradient(width, height)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
}

// =========================================================================
// Configuration
// =========================================================================

/// Minimal valid configuration text using `tmp_dir` for derivatives.
pub fn test_config_toml(tmp_dir: &Path) -> String {
    format!(
        r#"[config]
hostingServerBackendClass = "imgur"
tmpDirPath = "{}"
oauthClientId = "test-client"
oauthSecret = "test-secret"
"#,
        tmp_dir.display()
    )
}

/// Parsed [`test_config_toml`]. Panics if `tmp_dir` does not exist.
pub fn test_config(tmp_dir: &Path) -> Config {
    Config::from_toml_str(&test_config_toml(tmp_dir)).unwrap()
}
