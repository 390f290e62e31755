//! Timestamp-preserving transform task.
//!
//! One task rewrites one file, strictly in this order:
//!
//! 1. **stat**: capture the file's access and modification times
//! 2. **identify**: read its dimensions and pick the constrained axis
//! 3. **resize**: decode, resample and encode into a temp file beside it
//! 4. **commit**: copy permissions and the captured times onto the temp
//!    file, fsync it, and rename it over the original
//!
//! Because the times are applied before the rename, the file at the original
//! path is always either the untouched original or the fully written result
//! with its original timestamps. A failure at any step leaves the original
//! as it was; the temp file is removed when dropped.
//!
//! Symlinked paths are resolved first, so the link's target is rewritten and
//! the link itself stays a link.
//!
//! Two eligible paths that alias the same file (hard links, or symlinks when
//! links are followed) are not detected; each alias is processed as if it
//! were a distinct file.

use crate::config::{RunConfig, TargetSize};
use crate::imaging::{
    Algorithm, BackendError, Dimensions, ImageBackend, Orientation, Quality, ResizeParams,
    check_output_size, fit_long_edge,
};
use crate::process::ProcessEvent;
use std::fs::{self, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("cannot stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("cannot encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("cannot restore timestamps on {}: {source}", .path.display())]
    TimestampRestore {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cancelled before {} was rewritten", .path.display())]
    Cancelled { path: PathBuf },
}

impl TransformError {
    /// Short machine-friendly name of the failing step.
    pub fn kind(&self) -> &'static str {
        match self {
            TransformError::Stat { .. } => "stat",
            TransformError::Decode { .. } => "decode",
            TransformError::Encode { .. } => "encode",
            TransformError::TimestampRestore { .. } => "timestamp-restore",
            TransformError::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransformError::Cancelled { .. })
    }

    fn encode(path: &Path, source: impl Into<BackendError>) -> Self {
        TransformError::Encode {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }
}

/// Shared cancellation flag, checked by tasks between steps.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn check(&self, path: &Path) -> Result<(), TransformError> {
        if self.is_cancelled() {
            Err(TransformError::Cancelled {
                path: path.to_path_buf(),
            })
        } else {
            Ok(())
        }
    }
}

/// A successfully rewritten file.
#[derive(Debug, Clone, PartialEq)]
pub struct Resized {
    pub path: PathBuf,
    pub original: Dimensions,
    pub resized: Dimensions,
    pub orientation: Orientation,
    pub modified: SystemTime,
}

/// Everything a task needs besides the file itself; identical for every file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub target_size: TargetSize,
    pub algorithm: Algorithm,
    pub quality: Quality,
}

impl Transform {
    pub fn new(target_size: TargetSize) -> Self {
        Self {
            target_size,
            algorithm: Algorithm::default(),
            quality: Quality::default(),
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            target_size: config.target_size,
            algorithm: config.settings.resize.algorithm,
            quality: Quality::new(config.settings.resize.quality),
        }
    }

    /// Rewrite `path` in place at the target size, keeping its timestamps.
    pub fn run(
        &self,
        backend: &dyn ImageBackend,
        path: &Path,
        cancel: &Cancellation,
        events: Option<&Sender<ProcessEvent>>,
    ) -> Result<Resized, TransformError> {
        let emit = |event: ProcessEvent| {
            if let Some(tx) = events {
                tx.send(event).ok();
            }
        };

        // 1. stat
        cancel.check(path)?;
        let target = resolve_target(path)?;
        let stat_err = |source| TransformError::Stat {
            path: path.to_path_buf(),
            source,
        };
        let metadata = fs::metadata(&target).map_err(stat_err)?;
        let modified = metadata.modified().map_err(stat_err)?;
        let accessed = metadata.accessed().unwrap_or(modified);
        emit(ProcessEvent::TimestampCaptured {
            path: path.to_path_buf(),
            modified,
        });

        // 2. identify
        cancel.check(path)?;
        let original = backend
            .identify(&target)
            .map_err(|source| TransformError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        if original.width == 0 || original.height == 0 {
            return Err(TransformError::Decode {
                path: path.to_path_buf(),
                source: BackendError::Decode("image has no pixels".into()),
            });
        }
        let orientation = Orientation::of(original.width, original.height);
        let (width, height) = fit_long_edge(original.as_tuple(), self.target_size.get());
        check_output_size(width, height).map_err(|reason| {
            TransformError::encode(path, BackendError::Encode(reason))
        })?;
        let resized = Dimensions { width, height };
        emit(ProcessEvent::Started {
            path: path.to_path_buf(),
            original,
            orientation,
            algorithm: self.algorithm,
        });

        // 3. resize into a temp file in the same directory, so the rename
        //    below stays on one filesystem
        cancel.check(path)?;
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = tempfile::Builder::new()
            .prefix(".longedge-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| TransformError::encode(path, e))?;
        backend
            .resize(&ResizeParams {
                source: target.clone(),
                output: temp.path().to_path_buf(),
                width,
                height,
                algorithm: self.algorithm,
                quality: self.quality,
            })
            .map_err(|source| match source {
                BackendError::Decode(_) => TransformError::Decode {
                    path: path.to_path_buf(),
                    source,
                },
                other => TransformError::encode(path, other),
            })?;

        // 4. commit
        cancel.check(path)?;
        fs::set_permissions(temp.path(), metadata.permissions())
            .map_err(|e| TransformError::encode(path, e))?;
        temp.as_file()
            .set_times(
                FileTimes::new()
                    .set_accessed(accessed)
                    .set_modified(modified),
            )
            .map_err(|source| TransformError::TimestampRestore {
                path: path.to_path_buf(),
                source,
            })?;
        temp.as_file()
            .sync_all()
            .map_err(|e| TransformError::encode(path, e))?;
        temp.persist(&target)
            .map_err(|e| TransformError::encode(path, e.error))?;

        log::debug!(
            "{}: {}x{} -> {}x{}",
            path.display(),
            original.width,
            original.height,
            width,
            height
        );
        emit(ProcessEvent::Finished {
            path: path.to_path_buf(),
            original,
            resized,
            modified,
        });

        Ok(Resized {
            path: path.to_path_buf(),
            original,
            resized,
            orientation,
            modified,
        })
    }
}

/// Follow a symlink to the file it names; other paths are returned as-is.
fn resolve_target(path: &Path) -> Result<PathBuf, TransformError> {
    let stat_err = |source| TransformError::Stat {
        path: path.to_path_buf(),
        source,
    };
    let link = fs::symlink_metadata(path).map_err(stat_err)?;
    if link.file_type().is_symlink() {
        fs::canonicalize(path).map_err(stat_err)
    } else {
        Ok(path.to_path_buf())
    }
}
