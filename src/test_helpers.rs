//! Shared test utilities.
//!
//! Synthetic images are encoded on the fly so tests never depend on binary
//! fixtures, and timestamps are set to whole seconds so comparisons hold on
//! filesystems with coarse time resolution.
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join("a.jpg");
//! create_test_jpeg(&path, 800, 600);
//! set_mtime(&path, old_time());
//! assert_eq!(mtime(&path), old_time());
//! ```

use image::{ImageEncoder, RgbImage, RgbaImage};
use std::fs::{self, File, FileTimes};
use std::io::BufWriter;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Write a gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let writer = BufWriter::new(File::create(path).unwrap());
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a PNG with a varying alpha channel.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, ((x + y) % 256) as u8])
    });
    let writer = BufWriter::new(File::create(path).unwrap());
    image::codecs::png::PngEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
}

/// A fixed timestamp well in the past (2017-07-14T02:40:00Z).
pub fn old_time() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_500_000_000)
}

/// Set both access and modification time.
pub fn set_mtime(path: &Path, time: SystemTime) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_times(FileTimes::new().set_modified(time).set_accessed(time))
        .unwrap();
}

pub fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}
