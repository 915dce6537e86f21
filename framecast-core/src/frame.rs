//! Frame metadata shared across the pipeline.
//!
//! These describe the frames we *publish*: fixed RGBA8 layout, progressive
//! scan, 60000/1000 frame rate. The transport-facing struct layout lives in
//! [`crate::ndi::sys`]; this module is the plain-Rust view of it.

// ── Descriptor constants ─────────────────────────────────────────

/// Published frame-rate numerator (60000/1000 = 60 fps).
pub const FRAME_RATE_N: i32 = 60000;
/// Published frame-rate denominator.
pub const FRAME_RATE_D: i32 = 1000;
/// Published picture aspect ratio (16:9).
pub const PICTURE_ASPECT: f32 = 1.778;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of rendered and published frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 4 bytes per pixel: Blue, Green, Red, Alpha.
    Bgra8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
        }
    }
}

// ── ScanMode ─────────────────────────────────────────────────────

/// Scan structure of a published frame.
///
/// The pipeline only ever publishes progressive frames; the interlaced
/// variant exists because the transport descriptor can express it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Progressive,
    Interlaced,
}

// ── FrameInfo ────────────────────────────────────────────────────

/// Metadata block describing the currently published video stream.
///
/// Mutated on every resolution change; paired with a transport buffer
/// reference on every publish (see [`crate::transport::VideoFrame`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame-rate numerator.
    pub frame_rate_n: i32,
    /// Frame-rate denominator.
    pub frame_rate_d: i32,
    /// Picture aspect ratio.
    pub aspect_ratio: f32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Scan structure.
    pub scan: ScanMode,
}

impl FrameInfo {
    /// Descriptor for a progressive RGBA8 stream at the fixed rate.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_rate_n: FRAME_RATE_N,
            frame_rate_d: FRAME_RATE_D,
            aspect_ratio: PICTURE_ASPECT,
            format: PixelFormat::Rgba8,
            scan: ScanMode::Progressive,
        }
    }

    /// Row stride in bytes. Transport buffers are tightly packed, so this
    /// is exactly `width * bytes_per_pixel`.
    pub fn line_stride(&self) -> u32 {
        self.width * self.format.bytes_per_pixel() as u32
    }

    /// Total byte size of one frame buffer.
    pub fn buffer_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Update the resolution fields, leaving rate/aspect/format alone.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// True while the host has not yet established a drawable size.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for FrameInfo {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_is_width_times_depth() {
        let info = FrameInfo::new(1920, 1080);
        assert_eq!(info.line_stride(), 1920 * 4);
        assert_eq!(info.buffer_len(), 1920 * 1080 * 4);
    }

    #[test]
    fn fixed_rate_and_aspect() {
        let info = FrameInfo::new(1280, 720);
        assert_eq!(info.frame_rate_n, 60000);
        assert_eq!(info.frame_rate_d, 1000);
        assert!((info.aspect_ratio - 1.778).abs() < f32::EPSILON);
        assert_eq!(info.scan, ScanMode::Progressive);
    }

    #[test]
    fn resolution_update_preserves_format() {
        let mut info = FrameInfo::new(1920, 1080);
        info.set_resolution(1280, 720);
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert_eq!(info.format, PixelFormat::Rgba8);
        assert_eq!(info.buffer_len(), 1280 * 720 * 4);
    }

    #[test]
    fn zero_dimensions_are_idle() {
        assert!(FrameInfo::new(0, 1080).is_empty());
        assert!(FrameInfo::new(1920, 0).is_empty());
        assert!(!FrameInfo::new(2, 2).is_empty());
        assert!(FrameInfo::default().is_empty());
    }
}
