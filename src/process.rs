//! Scan-and-transform driver.
//!
//! Binds the [`scan`](crate::scan) walk to a bounded pool of transform
//! workers:
//!
//! ```text
//! driver thread                    worker pool (N threads)
//! ─────────────                    ───────────────────────
//! walk tree ──► eligible file ──► register token ──► queue job ──► Transform::run
//!     │                                                              │
//!     └── traversal error → skip / abort                             ├─► FileRecord ─► channel
//!                                                                    └─► token.complete()
//! await_all() ◄──────────────────────────────────────────────────────┘
//! collect records → RunReport
//! ```
//!
//! ## Parallel Processing
//!
//! Files are processed on a dedicated [rayon](https://docs.rs/rayon) thread
//! pool sized by [`effective_threads`]. The walk runs on the calling thread
//! and keeps queueing jobs while workers drain them, so memory grows with
//! the number of queued *paths*, never with decoded images.
//!
//! ## Failure Handling
//!
//! A failing file never aborts the run by itself. Under
//! [`FailurePolicy::Isolate`] every other file is still processed; under
//! [`FailurePolicy::FailFast`] the shared [`Cancellation`] is raised, the walk
//! stops dispatching, and queued files finish as cancelled. Either way the
//! driver waits for every dispatched job before it returns the report.

use crate::barrier::CompletionBarrier;
use crate::config::{ConfigError, FailurePolicy, RunConfig, TraversalPolicy, effective_threads};
use crate::imaging::{Algorithm, Dimensions, ImageBackend, Orientation, RustBackend};
use crate::scan::{ScanError, Scanner};
use crate::task::{Cancellation, Resized, Transform, TransformError};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Progress notifications, sent while the run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Found {
        path: PathBuf,
    },
    TimestampCaptured {
        path: PathBuf,
        modified: SystemTime,
    },
    Started {
        path: PathBuf,
        original: Dimensions,
        orientation: Orientation,
        algorithm: Algorithm,
    },
    Finished {
        path: PathBuf,
        original: Dimensions,
        resized: Dimensions,
        modified: SystemTime,
    },
    Failed {
        path: PathBuf,
        kind: &'static str,
        error: String,
    },
    TraversalSkipped {
        path: Option<PathBuf>,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Resized,
    Failed,
    Cancelled,
}

/// Outcome for one dispatched file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resized: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileRecord {
    pub fn from_result(path: PathBuf, result: &Result<Resized, TransformError>) -> Self {
        match result {
            Ok(done) => Self {
                path,
                status: FileStatus::Resized,
                original: Some(done.original.as_tuple()),
                resized: Some(done.resized.as_tuple()),
                error_kind: None,
                error: None,
            },
            Err(err) => Self {
                path,
                status: if err.is_cancelled() {
                    FileStatus::Cancelled
                } else {
                    FileStatus::Failed
                },
                original: None,
                resized: None,
                error_kind: Some(err.kind()),
                error: Some(err.to_string()),
            },
        }
    }
}

/// A directory entry the walk could not visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraversalIssue {
    pub path: Option<PathBuf>,
    pub error: String,
}

impl From<&ScanError> for TraversalIssue {
    fn from(err: &ScanError) -> Self {
        Self {
            path: err.path().map(|p| p.to_path_buf()),
            error: err.to_string(),
        }
    }
}

/// Everything that happened during one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub target_size: u32,
    pub algorithm: Algorithm,
    /// Number of jobs handed to the pool.
    pub dispatched: usize,
    /// One record per finished job, sorted by path.
    pub files: Vec<FileRecord>,
    pub traversal_errors: Vec<TraversalIssue>,
    /// The walk stopped on a traversal error under the abort policy.
    pub walk_aborted: bool,
    /// The run was cancelled, by fail-fast or by the caller.
    pub cancelled: bool,
    /// Jobs that finished without reporting back (a worker panicked).
    pub lost: usize,
}

impl RunReport {
    fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|f| f.status == status).count()
    }

    pub fn resized_count(&self) -> usize {
        self.count(FileStatus::Resized)
    }

    pub fn failed_count(&self) -> usize {
        self.count(FileStatus::Failed)
    }

    pub fn cancelled_count(&self) -> usize {
        self.count(FileStatus::Cancelled)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().filter(|f| f.status != FileStatus::Resized)
    }

    /// Every dispatched file was resized and the walk ran to the end.
    ///
    /// Skipped traversal entries do not count against success.
    pub fn is_success(&self) -> bool {
        self.resized_count() == self.dispatched
            && self.lost == 0
            && !self.walk_aborted
            && !self.cancelled
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }
}

/// Run the pipeline with the production backend.
pub fn run(
    config: &RunConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<RunReport, ProcessError> {
    run_with_backend(
        Arc::new(RustBackend::new()),
        config,
        &Cancellation::new(),
        events,
    )
}

/// Run the pipeline with a specific backend (allows testing with mock).
///
/// `cancel` may be raised from another thread to stop the run early; files
/// already rewritten stay rewritten.
pub fn run_with_backend<B: ImageBackend + 'static>(
    backend: Arc<B>,
    config: &RunConfig,
    cancel: &Cancellation,
    events: Option<Sender<ProcessEvent>>,
) -> Result<RunReport, ProcessError> {
    config.validate()?;

    let threads = effective_threads(&config.settings.processing);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("longedge-worker-{i}"))
        .panic_handler(|_| log::error!("a transform worker panicked"))
        .build()?;
    log::debug!("worker pool: {threads} threads");

    let transform = Transform::from_config(config);
    let fail_fast = config.settings.processing.on_failure == FailurePolicy::FailFast;
    let on_walk_error = config.settings.scan.on_error;
    let scanner = Scanner::from_config(config);
    let barrier = CompletionBarrier::new();
    let (record_tx, record_rx) = mpsc::channel::<FileRecord>();

    let emit = |event: ProcessEvent| {
        if let Some(tx) = &events {
            tx.send(event).ok();
        }
    };

    let mut traversal_errors = Vec::new();
    let mut walk_aborted = false;

    for item in scanner.walk() {
        if cancel.is_cancelled() {
            log::debug!("cancelled; no further files will be dispatched");
            break;
        }

        let file = match item {
            Ok(file) => file,
            Err(err) => {
                emit(ProcessEvent::TraversalSkipped {
                    path: err.path().map(|p| p.to_path_buf()),
                    error: err.to_string(),
                });
                traversal_errors.push(TraversalIssue::from(&err));
                if on_walk_error == TraversalPolicy::Abort {
                    walk_aborted = true;
                    break;
                }
                continue;
            }
        };

        emit(ProcessEvent::Found {
            path: file.path.clone(),
        });

        let token = barrier.register();
        let backend = Arc::clone(&backend);
        let record_tx = record_tx.clone();
        let events = events.clone();
        let cancel = cancel.clone();

        pool.spawn(move || {
            let result = transform.run(backend.as_ref(), &file.path, &cancel, events.as_ref());
            if let Err(err) = &result {
                if fail_fast && !err.is_cancelled() {
                    cancel.cancel();
                }
                if let Some(tx) = &events {
                    tx.send(ProcessEvent::Failed {
                        path: file.path.clone(),
                        kind: err.kind(),
                        error: err.to_string(),
                    })
                    .ok();
                }
            }
            record_tx.send(FileRecord::from_result(file.path, &result)).ok();
            token.complete();
        });
    }
    drop(record_tx);

    barrier.await_all();

    // Every record was sent before its token completed.
    let mut files: Vec<FileRecord> = record_rx.try_iter().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let dispatched = barrier.registered();
    let lost = dispatched.saturating_sub(files.len());
    if lost > 0 {
        log::error!("{lost} file(s) did not report a result");
    }

    Ok(RunReport {
        root: config.root.clone(),
        target_size: config.target_size.get(),
        algorithm: transform.algorithm,
        dispatched,
        files,
        traversal_errors,
        walk_aborted,
        cancelled: cancel.is_cancelled(),
        lost,
    })
}
