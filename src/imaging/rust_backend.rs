//! Pure Rust image processing backend on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Resample | `image::DynamicImage::resize_exact` with the configured filter |
//! | Encode to JPEG | `image::codecs::jpeg::JpegEncoder` with explicit quality |
//! | Encode to others | `image::DynamicImage::write_to` in the source format |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{Quality, ResizeParams};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;

/// Extensions the tool can rewrite in place.
///
/// A format qualifies only if its decoder *and* encoder are compiled in,
/// since every processed file is written back in its own format.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled() && fmt.writing_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the file extensions (without dot, lowercase) that can be
/// decoded and re-encoded.
pub fn supported_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Open `path` and sniff its format from content, falling back to the extension.
fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<File>>, BackendError> {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| BackendError::Decode(format!("cannot read {}: {}", path.display(), e)))
}

/// Load and decode an image from disk, returning it with its detected format.
fn load_image(path: &Path) -> Result<(DynamicImage, ImageFormat), BackendError> {
    let reader = open_reader(path)?;
    let format = reader.format().ok_or_else(|| {
        BackendError::Decode(format!("unrecognised image format: {}", path.display()))
    })?;
    let img = reader
        .decode()
        .map_err(|e| BackendError::Decode(format!("{}: {}", path.display(), e)))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(BackendError::Decode(format!(
            "{} has no pixels",
            path.display()
        )));
    }
    Ok((img, format))
}

/// Encode `img` into `path` in the given format.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: ImageFormat,
    quality: Quality,
) -> Result<(), BackendError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha and no 16-bit channels
            let converted;
            let img = match img {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img,
                other => {
                    converted = DynamicImage::ImageRgb8(other.to_rgb8());
                    &converted
                }
            };
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality.value());
            img.write_with_encoder(encoder)
                .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {}", e)))?;
        }
        other => {
            img.write_to(&mut writer, other).map_err(|e| {
                BackendError::Encode(format!("{:?} encode failed: {}", other, e))
            })?;
        }
    }

    writer
        .flush()
        .map_err(|e| BackendError::Encode(format!("flush {}: {}", path.display(), e)))
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = open_reader(path)?.into_dimensions().map_err(|e| {
            BackendError::Decode(format!("cannot read dimensions of {}: {}", path.display(), e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let (img, format) = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, params.algorithm.filter());
        save_image(&resized, &params.output, format, params.quality)
    }
}
