//! CLI output formatting.
//!
//! Every image is shown by its positional index and file name, the same
//! identity the ledger uses, so terminal output can be matched against
//! `.imguploader-progress.jsonl` line by line.
//!
//! # Output Format
//!
//! ## Run
//!
//! ```text
//! 001 a.jpg: already uploaded
//! 002 c.png: resizing
//! 002 c.png: uploading
//! 002 c.png → https://i.imgur.com/Xy12abc.jpg
//! 003 d.jpg: resizing
//! 003 d.jpg: FAILED (resize): resize error: Failed to decode …
//!
//! 1 uploaded, 1 already uploaded, 1 failed (3 total)
//! Failed:
//!     d.jpg: resize error: Failed to decode …
//! Gallery: photos/listing.html (2 images)
//!     previous gallery kept as photos/listing.html.1
//! ```
//!
//! ## Status
//!
//! ```text
//! 001 a.jpg: uploaded → https://i.imgur.com/Xy12abc.jpg
//! 002 c.png: uploaded, changed since upload → https://i.imgur.com/Zz98xyz.jpg
//! 003 d.jpg: failed: rate limit exceeded
//! 004 e.jpg: pending
//!
//! 2 uploaded, 1 failed, 1 pending
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::run::{ImageStatus, RunReport, StatusLine};
use crate::store::FailureStage;
use crate::upload::UploadEvent;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn image_line(index: usize, identity: &str) -> String {
    format!("{} {}", format_index(index), identity)
}

fn stage_label(stage: FailureStage) -> &'static str {
    match stage {
        FailureStage::Resize => "resize",
        FailureStage::Upload => "upload",
    }
}

// ============================================================================
// Run output
// ============================================================================

/// Format a single upload progress event as display lines.
pub fn format_upload_event(event: &UploadEvent) -> Vec<String> {
    match event {
        UploadEvent::Skipped { index, identity } => {
            vec![format!("{}: already uploaded", image_line(*index, identity))]
        }
        UploadEvent::Transition {
            index,
            identity,
            state,
        } => vec![format!("{}: {}", image_line(*index, identity), state)],
        UploadEvent::Uploaded {
            index,
            identity,
            full_image_url,
        } => vec![format!("{} → {}", image_line(*index, identity), full_image_url)],
        UploadEvent::Failed {
            index,
            identity,
            stage,
            message,
            orphaned,
        } => {
            let mut lines = vec![format!(
                "{}: FAILED ({}): {}",
                image_line(*index, identity),
                stage_label(*stage),
                message
            )];
            for reference in orphaned {
                lines.push(format!("{}left on server: {}", indent(1), reference));
            }
            lines
        }
    }
}

/// Format the end-of-run summary.
pub fn format_run_report(report: &RunReport) -> Vec<String> {
    let mut lines = vec![String::new(), report.summary.to_string()];

    if report.summary.has_failures() {
        lines.push("Failed:".to_string());
        for (identity, reason) in &report.summary.failed {
            lines.push(format!("{}{}: {}", indent(1), identity, reason));
        }
    }

    let noun = if report.gallery_entries == 1 {
        "image"
    } else {
        "images"
    };
    lines.push(format!(
        "Gallery: {} ({} {})",
        report.gallery.path.display(),
        report.gallery_entries,
        noun
    ));
    if let Some(backup) = &report.gallery.backup {
        lines.push(format!(
            "{}previous gallery kept as {}",
            indent(1),
            backup.display()
        ));
    }
    lines
}

pub fn print_run_report(report: &RunReport) {
    for line in format_run_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Status output
// ============================================================================

/// Format the status report: one line per image, then the totals.
pub fn format_status(lines: &[StatusLine]) -> Vec<String> {
    let mut out = Vec::new();
    let (mut uploaded, mut failed, mut pending) = (0, 0, 0);

    for (pos, line) in lines.iter().enumerate() {
        let head = image_line(pos + 1, &line.identity);
        out.push(match &line.status {
            ImageStatus::Pending => {
                pending += 1;
                format!("{head}: pending")
            }
            ImageStatus::Uploaded {
                full_image_url,
                changed,
            } => {
                uploaded += 1;
                if *changed {
                    format!("{head}: uploaded, changed since upload → {full_image_url}")
                } else {
                    format!("{head}: uploaded → {full_image_url}")
                }
            }
            ImageStatus::Failed { reason } => {
                failed += 1;
                format!("{head}: failed: {reason}")
            }
        });
    }

    if lines.is_empty() {
        out.push("No images found".to_string());
    } else {
        out.push(String::new());
        out.push(format!(
            "{uploaded} uploaded, {failed} failed, {pending} pending"
        ));
    }
    out
}

pub fn print_status(lines: &[StatusLine]) {
    for line in format_status(lines) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::WrittenGallery;
    use crate::upload::{CandidateState, RunSummary};
    use std::path::PathBuf;

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    // =========================================================================
    // Upload events
    // =========================================================================

    #[test]
    fn format_skipped_and_transition() {
        let skipped = UploadEvent::Skipped {
            index: 1,
            identity: "a.jpg".into(),
        };
        assert_eq!(format_upload_event(&skipped), vec!["001 a.jpg: already uploaded"]);

        let uploading = UploadEvent::Transition {
            index: 2,
            identity: "c.png".into(),
            state: CandidateState::Uploading,
        };
        assert_eq!(format_upload_event(&uploading), vec!["002 c.png: uploading"]);
    }

    #[test]
    fn format_uploaded() {
        let event = UploadEvent::Uploaded {
            index: 12,
            identity: "beach.jpg".into(),
            full_image_url: "https://i.imgur.com/abc.jpg".into(),
        };
        assert_eq!(
            format_upload_event(&event),
            vec!["012 beach.jpg → https://i.imgur.com/abc.jpg"]
        );
    }

    #[test]
    fn format_failed_with_orphan() {
        let event = UploadEvent::Failed {
            index: 3,
            identity: "d.jpg".into(),
            stage: FailureStage::Upload,
            message: "thumbnail upload failed: rate limit exceeded".into(),
            orphaned: vec!["https://i.imgur.com/full.jpg (deletehash h)".into()],
        };
        let lines = format_upload_event(&event);
        assert_eq!(
            lines[0],
            "003 d.jpg: FAILED (upload): thumbnail upload failed: rate limit exceeded"
        );
        assert_eq!(
            lines[1],
            "    left on server: https://i.imgur.com/full.jpg (deletehash h)"
        );
    }

    // =========================================================================
    // Run report
    // =========================================================================

    #[test]
    fn format_report_with_failures_and_backup() {
        let report = RunReport {
            summary: RunSummary {
                skipped: 1,
                uploaded: 1,
                failed: vec![("d.jpg".into(), "resize error: truncated".into())],
            },
            gallery: WrittenGallery {
                path: PathBuf::from("photos/listing.html"),
                backup: Some(PathBuf::from("photos/listing.html.1")),
            },
            gallery_entries: 2,
        };
        let lines = format_run_report(&report);
        assert_eq!(
            lines,
            vec![
                "",
                "1 uploaded, 1 already uploaded, 1 failed (3 total)",
                "Failed:",
                "    d.jpg: resize error: truncated",
                "Gallery: photos/listing.html (2 images)",
                "    previous gallery kept as photos/listing.html.1",
            ]
        );
    }

    #[test]
    fn format_report_single_entry() {
        let report = RunReport {
            summary: RunSummary {
                uploaded: 1,
                ..RunSummary::default()
            },
            gallery: WrittenGallery {
                path: PathBuf::from("listing.html"),
                backup: None,
            },
            gallery_entries: 1,
        };
        let lines = format_run_report(&report);
        assert_eq!(lines.last().unwrap(), "Gallery: listing.html (1 image)");
    }

    // =========================================================================
    // Status
    // =========================================================================

    #[test]
    fn format_status_lines_and_totals() {
        let lines = vec![
            StatusLine {
                identity: "a.jpg".into(),
                status: ImageStatus::Uploaded {
                    full_image_url: "https://i/a".into(),
                    changed: false,
                },
            },
            StatusLine {
                identity: "c.png".into(),
                status: ImageStatus::Uploaded {
                    full_image_url: "https://i/c".into(),
                    changed: true,
                },
            },
            StatusLine {
                identity: "d.jpg".into(),
                status: ImageStatus::Failed {
                    reason: "HTTP 500".into(),
                },
            },
            StatusLine {
                identity: "e.jpg".into(),
                status: ImageStatus::Pending,
            },
        ];
        assert_eq!(
            format_status(&lines),
            vec![
                "001 a.jpg: uploaded → https://i/a",
                "002 c.png: uploaded, changed since upload → https://i/c",
                "003 d.jpg: failed: HTTP 500",
                "004 e.jpg: pending",
                "",
                "2 uploaded, 1 failed, 1 pending",
            ]
        );
    }

    #[test]
    fn format_status_empty() {
        assert_eq!(format_status(&[]), vec!["No images found"]);
    }
}
