use std::fmt;

pub mod fourcc;
pub use fourcc::FourCC;

pub mod registry;
pub use registry::{ChromaSubsampling, Descriptor};

/// Axis aligned rectangle in pixels
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Requested capture format (single-planar)
pub struct FrameFormat {
    /// pixelformat code
    pub fourcc: FourCC,
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
}

impl FrameFormat {
    /// Returns a capture format
    ///
    /// # Arguments
    ///
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    /// * `fourcc` - Four character code (pixelformat)
    ///
    /// # Example
    ///
    /// ```
    /// use v4l_capture::{FourCC, FrameFormat};
    /// let fmt = FrameFormat::new(1280, 720, FourCC::UYVY);
    /// ```
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        FrameFormat {
            fourcc,
            width,
            height,
        }
    }

    /// Image area covered by a frame of this format
    pub const fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.fourcc)
    }
}
