//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the transform task (which decides the output geometry)
//! and the [`backend`](super::backend) (which does the pixel work). This
//! separation allows swapping backends (e.g. for testing with a mock) without
//! changing task logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1-100, default 75). Clamped on construction.
//! - [`Algorithm`]: Interpolation filter used by the resampler.
//! - [`ResizeParams`]: Everything one resize needs: source, output path, target dimensions, filter, quality.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
///
/// Only JPEG output honours it; lossless formats ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Interpolation filter for the resample step.
///
/// Names follow the common resampling vocabulary; each maps onto one of the
/// `image` crate's filters.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    NearestNeighbor,
    Bilinear,
    Bicubic,
    Gaussian,
    #[default]
    Lanczos3,
}

impl Algorithm {
    pub fn filter(self) -> FilterType {
        match self {
            Algorithm::NearestNeighbor => FilterType::Nearest,
            Algorithm::Bilinear => FilterType::Triangle,
            Algorithm::Bicubic => FilterType::CatmullRom,
            Algorithm::Gaussian => FilterType::Gaussian,
            Algorithm::Lanczos3 => FilterType::Lanczos3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::NearestNeighbor => "nearest-neighbor",
            Algorithm::Bilinear => "bilinear",
            Algorithm::Bicubic => "bicubic",
            Algorithm::Gaussian => "gaussian",
            Algorithm::Lanczos3 => "lanczos3",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters for a single resize-and-encode operation.
///
/// The output format is always the source's format; `output` is usually a
/// temporary file next to the source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub algorithm: Algorithm,
    pub quality: Quality,
}
