//! Imgur hosting backend.
//!
//! Talks to the Imgur v3 REST API with a blocking `reqwest` client.
//! Uploads are anonymous uploads attributed to the registered application,
//! so only the client id is sent (`Authorization: Client-ID <id>`); the secret
//! is carried for interface compatibility and never leaves the process.
//!
//! | Call | Endpoint |
//! |---|---|
//! | authenticate | `GET {apiUrl}/3/credits` |
//! | upload (x2) | `POST {apiUrl}/3/image`, multipart field `image` |
//! | cleanup | `DELETE {apiUrl}/3/image/{deletehash}` |
//!
//! Backend options (from the `[backend]` config table):
//!
//! - `apiUrl`: base URL, default `https://api.imgur.com`
//! - `timeoutSecs`: per-request timeout, default `60`

use super::backend::{AuthError, BackendCredentials, HostingBackend, RemoteImage, UploadError};
use crate::config::ConfigError;
use reqwest::StatusCode;
use reqwest::blocking::{Client, multipart};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "https://api.imgur.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const OPTION_API_URL: &str = "apiUrl";
const OPTION_TIMEOUT: &str = "timeoutSecs";

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ImageData {
    link: String,
    #[serde(default)]
    deletehash: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Credits {
    #[serde(default)]
    client_remaining: Option<i64>,
}

/// One image stored on Imgur.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Hosted {
    link: String,
    deletehash: Option<String>,
}

pub struct ImgurBackend {
    client: Client,
    api_url: String,
    client_id: String,
}

impl ImgurBackend {
    /// Build the backend and its HTTP client. No request is made until
    /// [`authenticate`](HostingBackend::authenticate).
    pub fn new(credentials: BackendCredentials) -> Result<Self, ConfigError> {
        if let Some(key) = credentials
            .options
            .keys()
            .find(|k| !matches!(k.as_str(), OPTION_API_URL | OPTION_TIMEOUT))
        {
            return Err(ConfigError::Validation(format!(
                "Unknown Imgur backend option \"{key}\" (known: {OPTION_API_URL}, {OPTION_TIMEOUT})"
            )));
        }

        let api_url = credentials
            .options
            .get(OPTION_API_URL)
            .map(String::as_str)
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();

        let timeout = match credentials.options.get(OPTION_TIMEOUT) {
            Some(value) => value.trim().parse::<u64>().map_err(|_| {
                ConfigError::Validation(format!(
                    "backend.{OPTION_TIMEOUT} must be a whole number of seconds, got \"{value}\""
                ))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .user_agent(concat!("imguploader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Validation(format!("Cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url,
            client_id: credentials.client_id,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn authorization(&self) -> String {
        format!("Client-ID {}", self.client_id)
    }

    fn post_image(&self, path: &Path) -> Result<Hosted, String> {
        let form = multipart::Form::new()
            .file("image", path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        let response = self
            .client
            .post(format!("{}/3/image", self.api_url))
            .header(AUTHORIZATION, self.authorization())
            .multipart(form)
            .send()
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| format!("cannot read response: {e}"))?;
        if !status.is_success() {
            return Err(describe_failure(status, &body));
        }
        parse_image_response(&body)
    }

    fn delete_image(&self, deletehash: &str) -> Result<(), String> {
        let response = self
            .client
            .delete(format!("{}/3/image/{deletehash}", self.api_url))
            .header(AUTHORIZATION, self.authorization())
            .send()
            .map_err(|e| format!("request failed: {e}"))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().unwrap_or_default();
            Err(describe_failure(status, &body))
        }
    }

    /// Remove an image uploaded earlier in a failed pair. Returns the orphan
    /// reference when it stays on the server.
    fn discard(&self, hosted: &Hosted) -> Option<String> {
        let Some(deletehash) = hosted.deletehash.as_deref() else {
            warn!(link = %hosted.link, "no deletehash returned; image cannot be removed");
            return Some(hosted.link.clone());
        };
        match self.delete_image(deletehash) {
            Ok(()) => {
                info!(link = %hosted.link, "removed full-size image after thumbnail failure");
                None
            }
            Err(e) => {
                warn!(link = %hosted.link, error = %e, "could not remove full-size image");
                Some(format!("{} (deletehash {deletehash})", hosted.link))
            }
        }
    }
}

/// Human-readable reason for a non-success response.
fn describe_failure(status: StatusCode, body: &str) -> String {
    let reason = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            "invalid or expired credentials".to_string()
        }
        StatusCode::TOO_MANY_REQUESTS => "rate limit exceeded".to_string(),
        _ => format!("HTTP {}", status.as_u16()),
    };
    match api_error(body) {
        Some(detail) => format!("{reason}: {detail}"),
        None => reason,
    }
}

/// `data.error` from an Imgur error envelope, when it is a plain string.
fn api_error(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("data")?
        .get("error")?
        .as_str()
        .map(str::to_string)
}

fn parse_image_response(body: &str) -> Result<Hosted, String> {
    let envelope: Envelope<ImageData> =
        serde_json::from_str(body).map_err(|e| format!("malformed upload response: {e}"))?;
    if envelope.data.link.is_empty() {
        return Err("upload response carries no link".to_string());
    }
    Ok(Hosted {
        link: envelope.data.link,
        deletehash: envelope.data.deletehash.filter(|h| !h.is_empty()),
    })
}

impl HostingBackend for ImgurBackend {
    fn name(&self) -> &str {
        "Imgur backend"
    }

    fn authenticate(&mut self) -> Result<(), AuthError> {
        let fail = |message: String| AuthError {
            backend: self.name().to_string(),
            message,
        };

        let response = self
            .client
            .get(format!("{}/3/credits", self.api_url))
            .header(AUTHORIZATION, self.authorization())
            .send()
            .map_err(|e| fail(format!("cannot reach {}: {e}", self.api_url)))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| fail(format!("cannot read response: {e}")))?;
        if !status.is_success() {
            return Err(fail(describe_failure(status, &body)));
        }

        match serde_json::from_str::<Envelope<Credits>>(&body) {
            Ok(credits) => match credits.data.client_remaining {
                Some(0) => warn!("Imgur reports no upload credits left for this client"),
                Some(remaining) => debug!(remaining, "Imgur client credits"),
                None => {}
            },
            Err(e) => debug!(error = %e, "unexpected credits payload"),
        }
        info!(api = %self.api_url, "authenticated with Imgur");
        Ok(())
    }

    fn upload(&self, full: &Path, thumbnail: &Path) -> Result<RemoteImage, UploadError> {
        let hosted_full = self
            .post_image(full)
            .map_err(|e| UploadError::new(format!("full-size upload failed: {e}")))?;
        debug!(link = %hosted_full.link, "uploaded full-size image");

        match self.post_image(thumbnail) {
            Ok(hosted_thumb) => Ok(RemoteImage {
                full_image_url: hosted_full.link,
                thumbnail_url: hosted_thumb.link,
            }),
            Err(e) => {
                let err = UploadError::new(format!("thumbnail upload failed: {e}"));
                Err(match self.discard(&hosted_full) {
                    Some(orphan) => err.with_orphan(orphan),
                    None => err,
                })
            }
        }
    }
}
