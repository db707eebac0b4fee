//! Uploader configuration.
//!
//! Handles locating, parsing and validating the TOML configuration file. The
//! result is an immutable [`Config`] that is passed explicitly to the
//! orchestrator and the hosting backend; nothing reads configuration globally.
//!
//! ## Config File Location
//!
//! First match wins:
//!
//! ```text
//! --config <path>          # explicit path on the command line
//! ~/.imguploader.toml      # per-user config
//! ./.imguploader.toml      # config next to the images
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! [config]
//! hostingServerBackendClass = "imgur"   # required
//! tmpDirPath = "/tmp/imguploader"       # required, must exist
//! oauthClientId = "..."                 # required
//! oauthSecret = "..."                   # required
//!
//! HTMLHeaderFilePath = ""               # optional
//! HTMLFooterFilePath = ""               # optional
//! targetImageWidthPx = 1280
//! targetImageHeightPx = 1280
//! thumbImageWidthPx = 320
//! thumbImageHeightPx = 320
//! outputHTMLFilename = "listing.html"
//! jpegQuality = 90
//!
//! [backend]                             # optional, backend-specific values
//! apiUrl = "https://api.imgur.com"
//! timeoutSecs = 60
//! ```
//!
//! Unknown keys are rejected to catch typos early. Any error here is fatal
//! and happens before the image directory is touched.

use crate::hosting::BackendCredentials;
use crate::imaging::{DerivativeConfig, Quality};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the home directory and the working directory.
pub const CONFIG_FILE_NAME: &str = ".imguploader.toml";

const KEY_BACKEND: &str = "hostingServerBackendClass";
const KEY_TMP_DIR: &str = "tmpDirPath";
const KEY_CLIENT_ID: &str = "oauthClientId";
const KEY_SECRET: &str = "oauthSecret";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No config file was found, neither {} nor {}", .0.display(), .1.display())]
    NotFound(PathBuf, PathBuf),
    #[error("Cannot read config file {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("The configuration does not provide the required [config] section")]
    MissingSection,
    #[error("\"{0}\" is missing in the configuration file")]
    MissingKey(&'static str),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Unknown hosting backend \"{0}\" (available: {1})")]
    UnknownBackend(String, String),
}

/// On-disk shape of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    config: Option<RawSection>,
    #[serde(default)]
    backend: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSection {
    #[serde(rename = "hostingServerBackendClass")]
    backend: Option<String>,
    #[serde(rename = "tmpDirPath")]
    tmp_dir: Option<PathBuf>,
    #[serde(rename = "oauthClientId")]
    client_id: Option<String>,
    #[serde(rename = "oauthSecret")]
    secret: Option<String>,
    #[serde(rename = "HTMLHeaderFilePath", default)]
    header_path: String,
    #[serde(rename = "HTMLFooterFilePath", default)]
    footer_path: String,
    #[serde(rename = "targetImageWidthPx", default = "default_target_edge")]
    target_width: u32,
    #[serde(rename = "targetImageHeightPx", default = "default_target_edge")]
    target_height: u32,
    #[serde(rename = "thumbImageWidthPx", default = "default_thumb_edge")]
    thumb_width: u32,
    #[serde(rename = "thumbImageHeightPx", default = "default_thumb_edge")]
    thumb_height: u32,
    #[serde(rename = "outputHTMLFilename", default = "default_output_filename")]
    output_filename: String,
    #[serde(rename = "jpegQuality", default = "default_quality")]
    quality: u32,
}

fn default_target_edge() -> u32 {
    1280
}

fn default_thumb_edge() -> u32 {
    320
}

fn default_output_filename() -> String {
    "listing.html".to_string()
}

fn default_quality() -> u32 {
    90
}

/// Validated, immutable uploader configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Registry name of the hosting backend.
    pub backend: String,
    /// Directory for the resized derivatives.
    pub tmp_dir: PathBuf,
    pub credentials: BackendCredentials,
    /// Optional HTML blob written before the gallery. Empty = none.
    pub header_path: Option<PathBuf>,
    /// Optional HTML blob written after the gallery. Empty = none.
    pub footer_path: Option<PathBuf>,
    pub derivatives: DerivativeConfig,
    /// Gallery file name, created in the image directory.
    pub output_filename: String,
}

impl Config {
    /// Parse and validate configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let section = raw.config.ok_or(ConfigError::MissingSection)?;

        let tmp_dir = section.tmp_dir.ok_or(ConfigError::MissingKey(KEY_TMP_DIR))?;
        if !tmp_dir.is_dir() {
            return Err(ConfigError::Validation(format!(
                "The temporary directory \"{}\" does not exist or it is not accessible",
                tmp_dir.display()
            )));
        }

        if !is_valid_file_name(&section.output_filename) {
            return Err(ConfigError::Validation(format!(
                "Invalid output HTML file name \"{}\", only alphanumeric characters, '.', '_' and '-' are allowed",
                section.output_filename
            )));
        }

        for (key, value) in [
            ("targetImageWidthPx", section.target_width),
            ("targetImageHeightPx", section.target_height),
            ("thumbImageWidthPx", section.thumb_width),
            ("thumbImageHeightPx", section.thumb_height),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{key} must be greater than 0")));
            }
        }

        if !(1..=100).contains(&section.quality) {
            return Err(ConfigError::Validation("jpegQuality must be 1-100".into()));
        }

        let client_id = required_string(section.client_id, KEY_CLIENT_ID)?;
        let secret = required_string(section.secret, KEY_SECRET)?;
        let backend = required_string(section.backend, KEY_BACKEND)?;
        let options = backend_options(raw.backend)?;

        Ok(Self {
            backend,
            tmp_dir,
            credentials: BackendCredentials {
                client_id,
                secret,
                options,
            },
            header_path: optional_path(section.header_path),
            footer_path: optional_path(section.footer_path),
            derivatives: DerivativeConfig {
                full: (section.target_width, section.target_height),
                thumbnail: (section.thumb_width, section.thumb_height),
                quality: Quality::new(section.quality),
            },
            output_filename: section.output_filename,
        })
    }

    /// Load and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&content)
    }
}

fn required_string(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    match value {
        None => Err(ConfigError::MissingKey(key)),
        Some(v) if v.trim().is_empty() => Err(ConfigError::Validation(format!(
            "{key} must not be empty"
        ))),
        Some(v) => Ok(v),
    }
}

/// Backend options are handed to backends as strings; scalars are accepted
/// in their natural TOML form (`timeoutSecs = 60`).
fn backend_options(
    table: BTreeMap<String, toml::Value>,
) -> Result<BTreeMap<String, String>, ConfigError> {
    table
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => {
                    return Err(ConfigError::Validation(format!(
                        "backend.{key} must be a string, number or boolean, not {}",
                        other.type_str()
                    )));
                }
            };
            Ok((key, text))
        })
        .collect()
}

fn optional_path(value: String) -> Option<PathBuf> {
    if value.trim().is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Only `[A-Za-z0-9._-]`, and not a bare `.`/`..`.
fn is_valid_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Find the configuration file to use.
///
/// An explicit path always wins (and must exist). Otherwise the user's home
/// directory is tried before `cwd`.
pub fn locate_config(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let home = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("~"))
        .join(CONFIG_FILE_NAME);
    let local = cwd.join(CONFIG_FILE_NAME);
    if home.is_file() {
        Ok(home)
    } else if local.is_file() {
        Ok(local)
    } else {
        Err(ConfigError::NotFound(home, local))
    }
}

/// Returns a fully-commented stock configuration file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imguploader configuration
# =========================
# Save as ~/.imguploader.toml or ./.imguploader.toml (or pass --config).
# Unknown keys will cause an error.

[config]
# Hosting backend. Available: "imgur".
hostingServerBackendClass = "imgur"

# Existing, writable directory for resized images before upload.
tmpDirPath = "/tmp"

# OAuth application credentials issued by the hosting service.
oauthClientId = "your-client-id"
oauthSecret = "your-client-secret"

# HTML blobs placed before and after the generated gallery (optional).
HTMLHeaderFilePath = ""
HTMLFooterFilePath = ""

# Bounding box for the uploaded full-size image, in pixels.
# Images are scaled down to fit, preserving aspect ratio, never up.
targetImageWidthPx = 1280
targetImageHeightPx = 1280

# Bounding box for the uploaded thumbnail, in pixels.
thumbImageWidthPx = 320
thumbImageHeightPx = 320

# Gallery file written to the image directory.
# An existing file is renamed to <name>.1, <name>.2, ... first.
outputHTMLFilename = "listing.html"

# JPEG quality of the uploaded derivatives (1-100).
jpegQuality = 90

# ---------------------------------------------------------------------------
# Backend-specific options (all optional)
# ---------------------------------------------------------------------------
[backend]
# apiUrl = "https://api.imgur.com"
# timeoutSecs = 60
"##
}
