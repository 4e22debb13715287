//! Process-wide table of the pixel formats this crate can decode.
//!
//! The table is built once, on first lookup, and never mutated afterwards, so
//! any number of threads may read it without further synchronization. Support
//! for a new format means a new entry in [`entries`].

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::format::FourCC;

/// How many luma samples share one chroma sample pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaSubsampling {
    /// Full chroma resolution
    Ratio444,
    /// Half horizontal chroma resolution
    Ratio422,
    /// Half horizontal and vertical chroma resolution
    Ratio420,
}

impl ChromaSubsampling {
    /// Returns the width and height of a chroma plane for a luma plane of the given size
    pub fn chroma_size(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            ChromaSubsampling::Ratio444 => (width, height),
            ChromaSubsampling::Ratio422 => (width / 2, height),
            ChromaSubsampling::Ratio420 => (width / 2, height / 2),
        }
    }

    /// Whether every chroma sample covers whole pixels of a frame of the given size
    pub fn fits(self, width: u32, height: u32) -> bool {
        match self {
            ChromaSubsampling::Ratio444 => true,
            ChromaSubsampling::Ratio422 => width % 2 == 0,
            ChromaSubsampling::Ratio420 => width % 2 == 0 && height % 2 == 0,
        }
    }
}

impl fmt::Display for ChromaSubsampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChromaSubsampling::Ratio444 => write!(f, "4:4:4"),
            ChromaSubsampling::Ratio422 => write!(f, "4:2:2"),
            ChromaSubsampling::Ratio420 => write!(f, "4:2:0"),
        }
    }
}

/// Decode properties of a pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// Bits per pixel in the packed buffer the device fills
    pub bits_per_pixel: u32,
    /// Chroma layout of the decoded planes
    pub subsampling: ChromaSubsampling,
}

impl Descriptor {
    /// Bytes of one packed row
    pub fn stride(&self, width: u32) -> usize {
        self.bits_per_pixel as usize / 8 * width as usize
    }

    /// Bytes of one packed frame
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        self.stride(width) * height as usize
    }
}

fn entries() -> HashMap<FourCC, Descriptor> {
    let mut map = HashMap::new();
    map.insert(
        FourCC::UYVY,
        Descriptor {
            bits_per_pixel: 16,
            subsampling: ChromaSubsampling::Ratio422,
        },
    );
    map
}

fn table() -> &'static HashMap<FourCC, Descriptor> {
    static TABLE: OnceLock<HashMap<FourCC, Descriptor>> = OnceLock::new();
    TABLE.get_or_init(entries)
}

/// Returns the descriptor of a supported pixel format
///
/// # Example
///
/// ```
/// use v4l_capture::format::{registry, FourCC};
///
/// assert!(registry::lookup(FourCC::UYVY).is_some());
/// assert!(registry::lookup(FourCC::new(b"MJPG")).is_none());
/// ```
pub fn lookup(fourcc: FourCC) -> Option<&'static Descriptor> {
    table().get(&fourcc)
}

/// Returns all supported pixel formats
pub fn supported() -> Vec<FourCC> {
    let mut codes: Vec<FourCC> = table().keys().copied().collect();
    codes.sort_by_key(|fourcc| u32::from(*fourcc));
    codes
}
