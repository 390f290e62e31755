//! Tree scanner.
//!
//! Walks the scan root depth-first with [`walkdir`], visiting directories and
//! files alike, and yields an [`EligibleFile`] for every entry that passes the
//! eligibility predicate:
//!
//! - the entry is **not a directory** (nor a symlink to one), and
//! - its file name, lowercased, **ends with** one of the configured suffixes.
//!
//! The walk is lazy: files are yielded as they are discovered, so the driver
//! can dispatch work while the walk is still in progress. Entries within a
//! directory are visited in file-name order.
//!
//! Entries the walker cannot read (permission denied, vanished directories,
//! symlink loops when following links) are yielded as [`ScanError`]s; whether
//! they end the walk is the caller's policy, see
//! [`TraversalPolicy`](crate::config::TraversalPolicy).

use crate::config::RunConfig;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot visit {}: {source}", display_path(.path.as_deref()))]
    Traversal {
        path: Option<PathBuf>,
        #[source]
        source: walkdir::Error,
    },
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unknown>".to_string())
}

impl ScanError {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ScanError::Traversal { path, .. } => path.as_deref(),
        }
    }
}

impl From<walkdir::Error> for ScanError {
    fn from(source: walkdir::Error) -> Self {
        ScanError::Traversal {
            path: source.path().map(Path::to_path_buf),
            source,
        }
    }
}

/// A file picked by the scanner, consumed by exactly one transform task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibleFile {
    pub path: PathBuf,
    /// Modification time as seen during the walk, shown by `--dry-run`.
    /// The task re-reads it right before transforming.
    #[serde(skip)]
    pub modified: Option<SystemTime>,
    pub len: u64,
}

/// Case-insensitive suffix predicate on file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    suffixes: Vec<String>,
}

impl Eligibility {
    /// `suffixes` are compared against the lowercased file name and should
    /// already be lowercase (see [`crate::config::normalize_suffix`]).
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    pub fn matches_name(&self, file_name: &OsStr) -> bool {
        let name = file_name.to_string_lossy().to_lowercase();
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }

    /// Symlinks count as directories when their target is one, so a link
    /// named `album.jpg` pointing at a folder is never dispatched.
    pub fn matches(&self, entry: &DirEntry) -> bool {
        if entry.file_type().is_dir() || !self.matches_name(entry.file_name()) {
            return false;
        }
        !(entry.path_is_symlink() && entry.path().is_dir())
    }
}

/// Depth-first walker over one root.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    eligibility: Eligibility,
    follow_links: bool,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>, eligibility: Eligibility) -> Self {
        Self {
            root: root.into(),
            eligibility,
            follow_links: false,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(&config.root, Eligibility::new(config.settings.suffixes()))
            .follow_links(config.settings.scan.follow_links)
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the tree, yielding eligible files and traversal errors.
    pub fn walk(&self) -> impl Iterator<Item = Result<EligibleFile, ScanError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) if self.eligibility.matches(&entry) => Some(Ok(describe(entry))),
                Ok(_) => None,
                Err(err) => Some(Err(ScanError::from(err))),
            })
    }

    /// Walk the whole tree, skipping unreadable entries.
    ///
    /// Returns eligible files in walk order and every traversal error met.
    pub fn collect(&self) -> (Vec<EligibleFile>, Vec<ScanError>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();
        for item in self.walk() {
            match item {
                Ok(file) => files.push(file),
                Err(err) => errors.push(err),
            }
        }
        (files, errors)
    }
}

fn describe(entry: DirEntry) -> EligibleFile {
    let metadata = entry.metadata().ok();
    EligibleFile {
        modified: metadata.as_ref().and_then(|m| m.modified().ok()),
        len: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
        path: entry.into_path(),
    }
}
