//! Log-line formatting for pipeline events and the run summary.
//!
//! # Output Format
//!
//! ```text
//! Found ./2019/beach.jpg
//! ./2019/beach.jpg: existing time-stamp 2019-08-02T14:03:11Z
//! ./2019/beach.jpg: 4032x3024 landscape, using lanczos3
//! ./2019/beach.jpg: resized to 1024x768, time-stamp restored to 2019-08-02T14:03:11Z
//! ./2019/broken.jpg: decode failed: cannot decode ./2019/broken.jpg: ...
//! Processing done: 1 resized, 1 failed, 0 cancelled of 2 files
//!     FAILED ./2019/broken.jpg: cannot decode ./2019/broken.jpg: ...
//! ```
//!
//! # Architecture
//!
//! Each `format_*` function returns `Vec<String>` (or a `String`) and does no
//! I/O, so it can be unit tested. The binary routes the lines through the
//! `log` facade at the level given by [`event_level`].

use crate::process::{FileStatus, ProcessEvent, RunReport};
use crate::scan::EligibleFile;
use log::Level;
use std::path::Path;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Render a filesystem timestamp as RFC 3339 in UTC.
pub fn format_timestamp(ts: SystemTime) -> String {
    OffsetDateTime::from(ts)
        .format(&Rfc3339)
        .unwrap_or_else(|_| format!("{ts:?}"))
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Log level for an event: problems are warnings, progress is info.
pub fn event_level(event: &ProcessEvent) -> Level {
    match event {
        ProcessEvent::Failed { .. } | ProcessEvent::TraversalSkipped { .. } => Level::Warn,
        _ => Level::Info,
    }
}

/// Format a single progress event.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Found { path } => vec![format!("Found {}", display(path))],
        ProcessEvent::TimestampCaptured { path, modified } => vec![format!(
            "{}: existing time-stamp {}",
            display(path),
            format_timestamp(*modified)
        )],
        ProcessEvent::Started {
            path,
            original,
            orientation,
            algorithm,
        } => vec![format!(
            "{}: {}x{} {}, using {}",
            display(path),
            original.width,
            original.height,
            orientation.label(),
            algorithm
        )],
        ProcessEvent::Finished {
            path,
            resized,
            modified,
            ..
        } => vec![format!(
            "{}: resized to {}x{}, time-stamp restored to {}",
            display(path),
            resized.width,
            resized.height,
            format_timestamp(*modified)
        )],
        ProcessEvent::Failed { path, kind, error } => {
            vec![format!("{}: {} failed: {}", display(path), kind, error)]
        }
        ProcessEvent::TraversalSkipped { path, error } => match path {
            Some(p) => vec![format!("Skipped {}: {}", display(p), error)],
            None => vec![format!("Skipped entry: {}", error)],
        },
    }
}

/// Format the end-of-run summary: one headline plus one line per problem.
pub fn format_summary(report: &RunReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Processing done: {} resized, {} failed, {} cancelled of {} files",
        report.resized_count(),
        report.failed_count(),
        report.cancelled_count(),
        report.dispatched
    )];

    for record in report.failures() {
        let label = match record.status {
            FileStatus::Cancelled => "CANCELLED",
            _ => "FAILED",
        };
        lines.push(format!(
            "    {} {}: {}",
            label,
            display(&record.path),
            record.error.as_deref().unwrap_or("unknown error")
        ));
    }
    if report.lost > 0 {
        lines.push(format!("    {} file(s) lost to a worker panic", report.lost));
    }
    if !report.traversal_errors.is_empty() {
        lines.push(format!(
            "    {} director{} could not be read",
            report.traversal_errors.len(),
            if report.traversal_errors.len() == 1 { "y entry" } else { "y entries" }
        ));
    }
    if report.walk_aborted {
        lines.push("    walk aborted on a traversal error".to_string());
    }
    if report.cancelled {
        lines.push("    run was cancelled before all files were dispatched".to_string());
    }
    lines
}

/// Format the file list printed by `--dry-run`.
pub fn format_dry_run(files: &[EligibleFile], target_size: u32) -> Vec<String> {
    let mut lines: Vec<String> = files
        .iter()
        .map(|f| match f.modified {
            Some(ts) => format!(
                "would resize {} ({} bytes, modified {})",
                display(&f.path),
                f.len,
                format_timestamp(ts)
            ),
            None => format!("would resize {} ({} bytes)", display(&f.path), f.len),
        })
        .collect();
    lines.push(format!(
        "Dry run: {} file(s) would be resized to {}px on the long edge",
        files.len(),
        target_size
    ));
    lines
}

/// Log every line of an event at its level.
pub fn log_process_event(event: &ProcessEvent) {
    let level = event_level(event);
    for line in format_process_event(event) {
        log::log!(level, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{Algorithm, Dimensions, Orientation};
    use crate::process::{FileRecord, TraversalIssue};
    use std::path::PathBuf;
    use std::time::{Duration, UNIX_EPOCH};

    fn report(files: Vec<FileRecord>) -> RunReport {
        RunReport {
            root: PathBuf::from("."),
            target_size: 400,
            algorithm: Algorithm::Lanczos3,
            dispatched: files.len(),
            files,
            traversal_errors: Vec::new(),
            walk_aborted: false,
            cancelled: false,
            lost: 0,
        }
    }

    fn resized(path: &str) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            status: FileStatus::Resized,
            original: Some((800, 600)),
            resized: Some((400, 300)),
            error_kind: None,
            error: None,
        }
    }

    fn failed(path: &str, error: &str) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            status: FileStatus::Failed,
            original: None,
            resized: None,
            error_kind: Some("decode"),
            error: Some(error.to_string()),
        }
    }

    #[test]
    fn timestamp_is_rfc3339_utc() {
        let ts = UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        assert_eq!(format_timestamp(ts), "2017-07-14T02:40:00Z");
    }

    #[test]
    fn started_event_shows_dimensions_orientation_and_algorithm() {
        let event = ProcessEvent::Started {
            path: PathBuf::from("a.jpg"),
            original: Dimensions {
                width: 800,
                height: 600,
            },
            orientation: Orientation::Landscape,
            algorithm: Algorithm::Lanczos3,
        };
        assert_eq!(
            format_process_event(&event),
            vec!["a.jpg: 800x600 landscape, using lanczos3"]
        );
        assert_eq!(event_level(&event), Level::Info);
        assert_eq!(
            event_level(&ProcessEvent::Found {
                path: PathBuf::from("a.jpg")
            }),
            Level::Info
        );
    }

    #[test]
    fn finished_event_shows_restored_timestamp() {
        let ts = UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        let event = ProcessEvent::Finished {
            path: PathBuf::from("b.jpg"),
            original: Dimensions {
                width: 600,
                height: 800,
            },
            resized: Dimensions {
                width: 300,
                height: 400,
            },
            modified: ts,
        };
        assert_eq!(
            format_process_event(&event),
            vec!["b.jpg: resized to 300x400, time-stamp restored to 2017-07-14T02:40:00Z"]
        );
    }

    #[test]
    fn problems_log_as_warnings() {
        let failed = ProcessEvent::Failed {
            path: PathBuf::from("bad.jpg"),
            kind: "decode",
            error: "boom".into(),
        };
        assert_eq!(format_process_event(&failed), vec!["bad.jpg: decode failed: boom"]);
        assert_eq!(event_level(&failed), Level::Warn);

        let skipped = ProcessEvent::TraversalSkipped {
            path: None,
            error: "denied".into(),
        };
        assert_eq!(format_process_event(&skipped), vec!["Skipped entry: denied"]);
        assert_eq!(event_level(&skipped), Level::Warn);
    }

    #[test]
    fn summary_of_clean_run_is_one_line() {
        let lines = format_summary(&report(vec![resized("a.jpg"), resized("b.jpg")]));
        assert_eq!(
            lines,
            vec!["Processing done: 2 resized, 0 failed, 0 cancelled of 2 files"]
        );
    }

    #[test]
    fn summary_lists_each_failure() {
        let mut r = report(vec![resized("good.jpg"), failed("bad.jpg", "corrupt")]);
        r.traversal_errors.push(TraversalIssue {
            path: Some(PathBuf::from("locked")),
            error: "permission denied".into(),
        });

        let lines = format_summary(&r);
        assert_eq!(lines[0], "Processing done: 1 resized, 1 failed, 0 cancelled of 2 files");
        assert_eq!(lines[1], "    FAILED bad.jpg: corrupt");
        assert_eq!(lines[2], "    1 directory entry could not be read");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn dry_run_lists_files_and_total() {
        let files = vec![
            EligibleFile {
                path: PathBuf::from("x.jpg"),
                modified: None,
                len: 42,
            },
            EligibleFile {
                path: PathBuf::from("y.jpg"),
                modified: Some(UNIX_EPOCH + Duration::from_secs(1_500_000_000)),
                len: 7,
            },
        ];
        let lines = format_dry_run(&files, 512);
        assert_eq!(lines[0], "would resize x.jpg (42 bytes)");
        assert_eq!(
            lines[1],
            "would resize y.jpg (7 bytes, modified 2017-07-14T02:40:00Z)"
        );
        assert_eq!(
            lines[2],
            "Dry run: 2 file(s) would be resized to 512px on the long edge"
        );
    }
}
