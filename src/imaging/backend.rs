//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the codec adapter and resampler seen from the
//! transform task: `identify` reads dimensions, `resize` decodes, resamples
//! and encodes into the format the source was in.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) on top of the `image`
//! crate. Tests use the recording `MockBackend` below.

use super::params::ResizeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// Implementations must be `Send + Sync`: one instance is shared by every
/// worker in the pool.
pub trait ImageBackend: Send + Sync {
    /// Get image dimensions without a full decode where the format allows it.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode `params.source`, resample to exactly `width` x `height`, and
    /// encode into `params.output` in the source's own format.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::{Algorithm, Quality};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Mock backend that records operations without decoding anything.
    /// Uses Mutex (not RefCell) so it is Sync and works across pool workers.
    ///
    /// Dimensions are looked up by file name; files without an entry fail to
    /// identify with a decode error. `resize` writes a marker payload so the
    /// caller's temp-file handling is exercised.
    #[derive(Default)]
    pub struct MockBackend {
        pub dimensions: Mutex<HashMap<String, Dimensions>>,
        pub failing_encodes: Mutex<Vec<String>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(PathBuf),
        Resize {
            source: PathBuf,
            width: u32,
            height: u32,
            algorithm: Algorithm,
            quality: u8,
        },
    }

    pub const MOCK_PAYLOAD: &[u8] = b"resized-by-mock";

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(entries: &[(&str, u32, u32)]) -> Self {
            let backend = Self::new();
            {
                let mut dims = backend.dimensions.lock().unwrap();
                for (name, width, height) in entries {
                    dims.insert(
                        name.to_string(),
                        Dimensions {
                            width: *width,
                            height: *height,
                        },
                    );
                }
            }
            backend
        }

        pub fn fail_encode_for(self, name: &str) -> Self {
            self.failing_encodes.lock().unwrap().push(name.to_string());
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn resized_sources(&self) -> Vec<PathBuf> {
            let mut sources: Vec<PathBuf> = self
                .get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Resize { source, .. } => Some(source),
                    _ => None,
                })
                .collect();
            sources.sort();
            sources
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_path_buf()));

            self.dimensions
                .lock()
                .unwrap()
                .get(&file_name(path))
                .copied()
                .ok_or_else(|| {
                    BackendError::Decode(format!("no mock dimensions for {}", path.display()))
                })
        }

        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                source: params.source.clone(),
                width: params.width,
                height: params.height,
                algorithm: params.algorithm,
                quality: params.quality.value(),
            });

            if self
                .failing_encodes
                .lock()
                .unwrap()
                .contains(&file_name(&params.source))
            {
                return Err(BackendError::Encode("mock encode failure".into()));
            }
            std::fs::write(&params.output, MOCK_PAYLOAD)?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(&[("image.jpg", 800, 600)]);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == Path::new("/test/image.jpg")));
    }

    #[test]
    fn mock_identify_unknown_file_is_decode_error() {
        let backend = MockBackend::new();
        let result = backend.identify(Path::new("/test/missing.jpg"));
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn mock_records_resize_and_writes_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out.tmp");
        let backend = MockBackend::new();

        backend
            .resize(&ResizeParams {
                source: "/source.jpg".into(),
                output: output.clone(),
                width: 400,
                height: 300,
                algorithm: Algorithm::Bicubic,
                quality: Quality::new(90),
            })
            .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), MOCK_PAYLOAD);
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Resize {
                width: 400,
                height: 300,
                algorithm: Algorithm::Bicubic,
                quality: 90,
                ..
            }
        ));
    }

    #[test]
    fn mock_encode_failure_is_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new().fail_encode_for("bad.jpg");

        let result = backend.resize(&ResizeParams {
            source: "/bad.jpg".into(),
            output: tmp.path().join("out.tmp"),
            width: 10,
            height: 10,
            algorithm: Algorithm::default(),
            quality: Quality::default(),
        });
        assert!(matches!(result, Err(BackendError::Encode(_))));
    }
}
