//! # longedge
//!
//! Recursively resize images in place so that the longer edge of each one
//! matches a target size, keeping every file's original timestamps.
//!
//! # Architecture: Walk, Dispatch, Wait
//!
//! ```text
//! 1. Scan       root/      →  eligible files     (lazy depth-first walk)
//! 2. Transform  one file   →  same path, resized (bounded worker pool)
//! 3. Barrier    all tasks  →  RunReport          (driver waits, then reports)
//! ```
//!
//! The walk runs on the calling thread and feeds a fixed-size pool, so a tree
//! with a hundred thousand photos never has more than `max_processes`
//! decoded images in memory at once.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the root and yields files whose name ends with a configured suffix |
//! | [`task`] | Resizes one file: capture times, decode, resample, encode to a temp file, restore times, rename |
//! | [`barrier`] | Counts registered and completed tasks; the driver blocks on it before reporting |
//! | [`process`] | Driver binding the scan to the worker pool; produces the [`process::RunReport`] |
//! | [`config`] | Target size, `longedge.toml` loading and merging, policies and validation |
//! | [`imaging`] | Backend trait, pure-Rust backend, resampling filters and the long-edge calculation |
//! | [`output`] | Formatting of progress events and the end-of-run summary |
//!
//! # Design Decisions
//!
//! ## Per-File Failure Isolation
//!
//! A corrupt image is a fact of life in a photo archive. Each file's outcome
//! is recorded independently and the run carries on; the summary and exit
//! status say what went wrong. `on_failure = "fail-fast"` is available for
//! callers who prefer to stop at the first problem.
//!
//! ## Atomic Replacement
//!
//! The resized image is written to a temporary file beside the original,
//! given the original's permissions and timestamps, synced, and renamed over
//! the original. An interrupted run leaves each file either untouched or
//! completely resized with its original modification time.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling and encoding use the `image` crate. There are no
//! system dependencies to install.

pub mod barrier;
pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
pub mod scan;
pub mod task;

#[cfg(test)]
pub(crate) mod test_helpers;
