//! Durable upload progress, the mechanism behind resume.
//!
//! Every candidate the orchestrator attempts ends up as one [`UploadRecord`]
//! in a ledger next to the images. On the next run, records marked
//! [`UploadStatus::Uploaded`] are skipped outright, so re-invoking the tool
//! after a crash or a network outage only redoes what is missing.
//!
//! # Storage
//!
//! The ledger is a JSON Lines file at `<image_dir>/.imguploader-progress.jsonl`:
//!
//! ```text
//! {"format":"imguploader-progress","version":1}
//! {"identity":"a.jpg","status":"uploaded","full_image_url":"https://…","thumbnail_url":"https://…","last_attempt":"2024-05-01T10:00:00Z","source_hash":"9f86…"}
//! {"identity":"c.png","status":"failed","last_attempt":"2024-05-01T10:00:03Z","failure":{"stage":"upload","message":"rate limit exceeded"}}
//! ```
//!
//! Later lines override earlier lines for the same identity.
//!
//! ## Write discipline
//!
//! - [`upsert`](ProgressStore::upsert) appends one complete line with a single
//!   `write` and `fsync`s it before returning. A crash mid-write can only leave
//!   a final line without its newline; that torn tail is dropped on the next
//!   load, which restores the previous state for that identity.
//! - [`persist`](ProgressStore::persist) compacts the ledger to one line per
//!   identity by writing a temporary file in the same directory and renaming
//!   it over the ledger.
//!
//! ## Locking
//!
//! A lock file (`.imguploader-progress.lock`) is held exclusively for as long
//! as the store is open. A second instance pointed at the same directory fails
//! with [`StoreError::Locked`] instead of interleaving its writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the ledger file within the image directory.
pub const LEDGER_FILENAME: &str = ".imguploader-progress.jsonl";

/// Name of the lock file within the image directory.
pub const LOCK_FILENAME: &str = ".imguploader-progress.lock";

const LEDGER_FORMAT: &str = "imguploader-progress";

/// Version of the ledger format. Ledgers with another version are refused
/// rather than silently discarded: losing them would re-upload everything.
const LEDGER_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Progress ledger I/O error on {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] io::Error),
    #[error("Progress ledger {} is corrupt at line {line}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("Another imguploader instance is working on this directory (lock held on {})", .0.display())]
    Locked(PathBuf),
    #[error("Cannot encode progress record: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploaded,
    Failed,
}

/// Which step of the candidate lifecycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Resize,
    Upload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub stage: FailureStage,
    pub message: String,
}

/// Outcome of the latest attempt for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub identity: String,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub last_attempt: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    /// SHA-256 of the source file when it was attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
    /// Remote objects a failed upload left behind.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orphaned: Vec<String>,
}

impl UploadRecord {
    pub fn uploaded(
        identity: impl Into<String>,
        full_image_url: impl Into<String>,
        thumbnail_url: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            status: UploadStatus::Uploaded,
            full_image_url: Some(full_image_url.into()),
            thumbnail_url: Some(thumbnail_url.into()),
            last_attempt: Utc::now(),
            failure: None,
            source_hash: None,
            orphaned: Vec::new(),
        }
    }

    pub fn failed(identity: impl Into<String>, stage: FailureStage, message: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            status: UploadStatus::Failed,
            full_image_url: None,
            thumbnail_url: None,
            last_attempt: Utc::now(),
            failure: Some(Failure {
                stage,
                message: message.into(),
            }),
            source_hash: None,
            orphaned: Vec::new(),
        }
    }

    pub fn with_source_hash(mut self, source_hash: Option<String>) -> Self {
        self.source_hash = source_hash;
        self
    }

    pub fn with_orphans(mut self, orphaned: Vec<String>) -> Self {
        self.orphaned = orphaned;
        self
    }

    pub fn is_uploaded(&self) -> bool {
        self.status == UploadStatus::Uploaded
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerHeader {
    format: String,
    version: u32,
}

fn header_line() -> Result<String, StoreError> {
    let mut line = serde_json::to_string(&LedgerHeader {
        format: LEDGER_FORMAT.to_string(),
        version: LEDGER_VERSION,
    })?;
    line.push('\n');
    Ok(line)
}

/// Resolve the ledger path for an image directory.
pub fn ledger_path(dir: &Path) -> PathBuf {
    dir.join(LEDGER_FILENAME)
}

/// Records parsed from a ledger, plus whether a torn tail was dropped.
struct Loaded {
    records: BTreeMap<String, UploadRecord>,
    torn_tail: bool,
}

fn read_ledger(path: &Path) -> Result<Loaded, StoreError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Loaded {
                records: BTreeMap::new(),
                torn_tail: false,
            });
        }
        Err(e) => return Err(StoreError::Io(path.to_path_buf(), e)),
    };

    let corrupt = |line: usize, reason: String| StoreError::Corrupt {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut lines: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
    // Whatever follows the last newline never completed its write.
    let tail = lines.pop().unwrap_or_default();
    let torn_tail = !tail.is_empty();

    let mut records = BTreeMap::new();
    let mut header_seen = false;
    for (index, raw) in lines.iter().enumerate() {
        let number = index + 1;
        let text = std::str::from_utf8(raw).map_err(|e| corrupt(number, e.to_string()))?;
        if text.trim().is_empty() {
            continue;
        }
        if !header_seen {
            let header: LedgerHeader = serde_json::from_str(text)
                .map_err(|e| corrupt(number, format!("invalid header: {e}")))?;
            if header.format != LEDGER_FORMAT {
                return Err(corrupt(number, format!("unknown format \"{}\"", header.format)));
            }
            if header.version != LEDGER_VERSION {
                return Err(corrupt(
                    number,
                    format!("unsupported version {} (expected {LEDGER_VERSION})", header.version),
                ));
            }
            header_seen = true;
            continue;
        }
        let record: UploadRecord =
            serde_json::from_str(text).map_err(|e| corrupt(number, e.to_string()))?;
        records.insert(record.identity.clone(), record);
    }

    Ok(Loaded { records, torn_tail })
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// Exclusive, durable view of one directory's ledger.
#[derive(Debug)]
pub struct ProgressStore {
    dir: PathBuf,
    records: BTreeMap<String, UploadRecord>,
    /// Lines appended since the last compaction.
    appended: usize,
    /// Held for the lifetime of the store; closing it releases the lock.
    _lock: File,
}

impl ProgressStore {
    /// Lock the directory's ledger and load it.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let lock_path = dir.join(LOCK_FILENAME);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::Io(lock_path.clone(), e))?;
        match lock.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(StoreError::Locked(lock_path)),
            Err(TryLockError::Error(e)) => return Err(StoreError::Io(lock_path, e)),
        }

        let path = ledger_path(dir);
        let loaded = read_ledger(&path)?;
        let mut store = Self {
            dir: dir.to_path_buf(),
            records: loaded.records,
            appended: 0,
            _lock: lock,
        };
        debug!(records = store.records.len(), ledger = %path.display(), "loaded progress ledger");

        if loaded.torn_tail {
            warn!(ledger = %path.display(), "discarding incomplete final ledger line from an interrupted run");
            store.persist()?;
        }
        Ok(store)
    }

    /// Read a directory's ledger without locking or modifying it.
    ///
    /// A missing ledger yields an empty mapping; a torn final line is ignored.
    pub fn load(dir: &Path) -> Result<BTreeMap<String, UploadRecord>, StoreError> {
        read_ledger(&ledger_path(dir)).map(|loaded| loaded.records)
    }

    pub fn get(&self, identity: &str) -> Option<&UploadRecord> {
        self.records.get(identity)
    }

    /// All records, in identity order.
    pub fn records(&self) -> impl Iterator<Item = &UploadRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ledger_path(&self) -> PathBuf {
        ledger_path(&self.dir)
    }

    /// Durably record `record`, replacing any earlier record for its identity.
    ///
    /// The in-memory view only changes once the line is on disk.
    pub fn upsert(&mut self, record: UploadRecord) -> Result<(), StoreError> {
        let path = self.ledger_path();
        let io_err = |e| StoreError::Io(path.clone(), e);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        let mut payload = if file.metadata().map_err(io_err)?.len() == 0 {
            header_line()?
        } else {
            String::new()
        };
        payload.push_str(&serde_json::to_string(&record)?);
        payload.push('\n');

        file.write_all(payload.as_bytes()).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;

        self.records.insert(record.identity.clone(), record);
        self.appended += 1;
        Ok(())
    }

    /// Compact the ledger to one line per identity, atomically.
    ///
    /// Does nothing for an empty store with no ledger on disk.
    pub fn persist(&mut self) -> Result<(), StoreError> {
        let path = self.ledger_path();
        if self.records.is_empty() && !path.exists() {
            return Ok(());
        }
        let io_err = |e| StoreError::Io(path.clone(), e);

        let mut tmp = tempfile::Builder::new()
            .prefix(LEDGER_FILENAME)
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            writer.write_all(header_line()?.as_bytes()).map_err(io_err)?;
            for record in self.records.values() {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n").map_err(io_err)?;
            }
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        debug!(records = self.records.len(), "compacted progress ledger");
        self.appended = 0;
        Ok(())
    }
}

impl Drop for ProgressStore {
    fn drop(&mut self) {
        if self.appended > 0
            && let Err(e) = self.persist()
        {
            warn!(error = %e, "could not compact progress ledger");
        }
    }
}
