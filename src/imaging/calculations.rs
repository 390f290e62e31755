//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Which axis the target size constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Width strictly greater than height: width is pinned to the target.
    Landscape,
    /// Height greater than or equal to width: height is pinned to the target.
    PortraitOrSquare,
}

impl Orientation {
    pub fn of(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::PortraitOrSquare
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::PortraitOrSquare => "portrait/square",
        }
    }
}

/// Calculate output dimensions that put `target` on the long edge.
///
/// Landscape images get `width = target`; portrait and square images get
/// `height = target`. The free axis is scaled proportionally and rounded,
/// never below one pixel. Images smaller than the target are scaled up.
///
/// # Examples
/// ```
/// # use longedge::imaging::fit_long_edge;
/// assert_eq!(fit_long_edge((800, 600), 400), (400, 300));
/// assert_eq!(fit_long_edge((600, 800), 400), (300, 400));
/// ```
pub fn fit_long_edge(original: (u32, u32), target: u32) -> (u32, u32) {
    let (width, height) = original;

    match Orientation::of(width, height) {
        Orientation::Landscape => (target, scale_axis(height, target, width)),
        Orientation::PortraitOrSquare => (scale_axis(width, target, height), target),
    }
}

/// Scale `free` by the ratio `target / pinned`.
fn scale_axis(free: u32, target: u32, pinned: u32) -> u32 {
    if pinned == 0 {
        return 1;
    }
    let scaled = (free as f64 * target as f64 / pinned as f64).round() as u32;
    scaled.max(1)
}

/// Largest edge every writable format can store (JPEG keeps edges in 16 bits).
pub const MAX_EDGE: u32 = u16::MAX as u32;

/// Bytes per pixel assumed when checking the allocation budget (8-bit RGBA).
const BYTES_PER_PIXEL: u64 = 4;

/// Check that a `width` x `height` output can be allocated and encoded.
///
/// The budget is the `image` crate's default `max_alloc`, the same ceiling
/// its decoders apply. Returns a description of the violated limit.
pub fn check_output_size(width: u32, height: u32) -> Result<(), String> {
    if width > MAX_EDGE || height > MAX_EDGE {
        return Err(format!(
            "{width}x{height} exceeds the maximum edge of {MAX_EDGE} pixels"
        ));
    }
    let budget = image::Limits::default().max_alloc.unwrap_or(u64::MAX);
    let bytes = u64::from(width) * u64::from(height) * BYTES_PER_PIXEL;
    if bytes > budget {
        return Err(format!(
            "{width}x{height} needs {bytes} bytes, over the {budget} byte allocation limit"
        ));
    }
    Ok(())
}
