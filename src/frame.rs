use crate::buffer::Metadata;
use crate::format::{ChromaSubsampling, Rect};

/// Planar YCbCr image decoded from a captured buffer
///
/// Samples are stored row by row without padding: the luma plane has `width` samples per row,
/// each chroma plane has as many as the subsampling ratio leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    rect: Rect,
    subsampling: ChromaSubsampling,
    y: Vec<u8>,
    cb: Vec<u8>,
    cr: Vec<u8>,
    meta: Metadata,
}

impl Frame {
    /// Returns a zeroed frame
    pub fn new(width: u32, height: u32, subsampling: ChromaSubsampling) -> Self {
        let (cw, ch) = subsampling.chroma_size(width, height);
        let luma = width as usize * height as usize;
        let chroma = cw as usize * ch as usize;

        Frame {
            rect: Rect::new(0, 0, width, height),
            subsampling,
            y: vec![0; luma],
            cb: vec![0; chroma],
            cr: vec![0; chroma],
            meta: Metadata::default(),
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn width(&self) -> u32 {
        self.rect.width
    }

    pub fn height(&self) -> u32 {
        self.rect.height
    }

    pub fn subsampling(&self) -> ChromaSubsampling {
        self.subsampling
    }

    /// Luma samples
    pub fn y(&self) -> &[u8] {
        &self.y
    }

    /// Blue-difference chroma samples
    pub fn cb(&self) -> &[u8] {
        &self.cb
    }

    /// Red-difference chroma samples
    pub fn cr(&self) -> &[u8] {
        &self.cr
    }

    /// Luma samples per row
    pub fn y_stride(&self) -> usize {
        self.rect.width as usize
    }

    /// Chroma samples per row
    pub fn c_stride(&self) -> usize {
        self.subsampling
            .chroma_size(self.rect.width, self.rect.height)
            .0 as usize
    }

    /// Driver metadata of the buffer the frame was decoded from
    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn with_meta(mut self, meta: Metadata) -> Self {
        self.meta = meta;
        self
    }
}

/// Decodes a packed UYVY (4:2:2) buffer into a planar frame
///
/// Every four bytes hold `Cb Y0 Cr Y1` for two horizontally adjacent pixels sharing one chroma
/// pair.
///
/// # Panics
///
/// If `width` is odd, or if `raw` is not exactly `width * height * 2` bytes long.
///
/// # Example
///
/// ```
/// use v4l_capture::frame;
///
/// let raw: Vec<u8> = (0..24).collect();
/// let frame = frame::decode(&raw, 4, 3);
/// assert_eq!(frame.y().last(), Some(&23));
/// assert_eq!(frame.cb().last(), Some(&20));
/// ```
pub fn decode(raw: &[u8], width: u32, height: u32) -> Frame {
    let mut frame = Frame::new(width, height, ChromaSubsampling::Ratio422);
    decode_into(raw, &mut frame);
    frame
}

/// Decodes a packed UYVY buffer into an existing 4:2:2 frame of matching size
///
/// # Panics
///
/// If the frame width is odd, or the buffer length or the frame layout does not match.
pub fn decode_into(raw: &[u8], frame: &mut Frame) {
    assert_eq!(frame.subsampling, ChromaSubsampling::Ratio422);
    // a pixel pair never straddles two rows
    assert!(
        frame.rect.width % 2 == 0,
        "UYVY frames need an even width, got {}",
        frame.rect.width
    );
    assert_eq!(
        raw.len(),
        frame.y.len() * 2,
        "UYVY buffer does not match a {}x{} frame",
        frame.rect.width,
        frame.rect.height
    );

    let chroma = frame.cb.iter_mut().zip(frame.cr.iter_mut());
    for ((group, luma), (cb, cr)) in raw
        .chunks_exact(4)
        .zip(frame.y.chunks_exact_mut(2))
        .zip(chroma)
    {
        *cb = group[0];
        luma[0] = group[1];
        *cr = group[2];
        luma[1] = group[3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_4x3() {
        let raw: Vec<u8> = (0..24).collect();
        let frame = decode(&raw, 4, 3);

        assert_eq!(frame.y().len(), 12);
        assert_eq!(frame.cb().len(), 6);
        assert_eq!(frame.cr().len(), 6);
        assert_eq!(frame.y()[..4], [1, 3, 5, 7]);
        assert_eq!(frame.cb()[..2], [0, 4]);
        assert_eq!(frame.cr()[..2], [2, 6]);
        assert_eq!(*frame.y().last().unwrap(), 23);
        assert_eq!(*frame.cb().last().unwrap(), 20);
        assert_eq!(*frame.cr().last().unwrap(), 22);
    }

    #[test]
    fn strides_follow_subsampling() {
        let frame = Frame::new(640, 480, ChromaSubsampling::Ratio422);
        assert_eq!(frame.y_stride(), 640);
        assert_eq!(frame.c_stride(), 320);
        assert_eq!(frame.rect(), Rect::new(0, 0, 640, 480));
    }

    #[test]
    #[should_panic(expected = "even width")]
    fn odd_width_is_a_bug() {
        let raw: Vec<u8> = (1..=12).collect();
        decode(&raw, 3, 2);
    }

    #[test]
    #[should_panic]
    fn short_buffer_is_a_bug() {
        decode(&[0u8; 10], 4, 3);
    }
}
