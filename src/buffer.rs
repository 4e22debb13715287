use bitflags::bitflags;
use std::fmt;

use crate::v4l2::layout::v4l2_buffer;
use crate::Timestamp;

/// Buffer type
///
/// Only single-planar video capture buffers are exchanged.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    VideoCapture = 1,
}

bitflags! {
    #[allow(clippy::unreadable_literal)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Buffer is mapped
        const MAPPED                = 0x00000001;
        /// Buffer is queued for processing
        const QUEUED                = 0x00000002;
        /// Buffer is ready
        const DONE                  = 0x00000004;
        /// Image is a keyframe (I-frame)
        const KEYFRAME              = 0x00000008;
        /// Image is a P-frame
        const PFRAME                = 0x00000010;
        /// Image is a B-frame
        const BFRAME                = 0x00000020;
        /// Buffer is ready, but the data contained within is corrupted
        const ERROR                 = 0x00000040;
        /// Buffer is added to an unqueued request
        const IN_REQUEST            = 0x00000080;
        /// Timecode field is valid
        const TIMECODE              = 0x00000100;
        /// Buffer is prepared for queuing
        const PREPARED              = 0x00000400;
        /// Cache handling flags
        const NO_CACHE_INVALIDATE   = 0x00000800;
        const NO_CACHE_CLEAN        = 0x00001000;
        /// Timestamp type
        const TIMESTAMP_MASK        = 0x0000e000;
        const TIMESTAMP_MONOTONIC   = 0x00002000;
        const TIMESTAMP_COPY        = 0x00004000;
        /// Timestamp sources
        const TSTAMP_SRC_MASK       = 0x00070000;
        const TSTAMP_SRC_SOE        = 0x00010000;
        /// mem2mem encoder/decoder
        const LAST                  = 0x00100000;
        /// request_fd is valid
        const REQUEST_FD            = 0x00800000;
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::empty()
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Buffer metadata, mostly used not to convolute the main buffer structs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// Number of bytes occupied by the data in the buffer
    pub bytesused: u32,
    /// Buffer flags
    pub flags: Flags,
    /// Field order of the image in the buffer
    pub field: u32,
    /// Time of capture (usually set by the driver)
    pub timestamp: Timestamp,
    /// Sequence number, counting the frames
    pub sequence: u32,
}

impl From<&v4l2_buffer> for Metadata {
    fn from(buf: &v4l2_buffer) -> Self {
        Metadata {
            bytesused: buf.bytesused,
            flags: Flags::from(buf.flags),
            field: buf.field,
            timestamp: buf.timestamp.into(),
            sequence: buf.sequence,
        }
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sequence  : {}", self.sequence)?;
        writeln!(f, "timestamp : {}", self.timestamp)?;
        writeln!(f, "flags     : {}", self.flags)?;
        writeln!(f, "bytesused : {}", self.bytesused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v4l2::layout::timeval;

    #[test]
    fn metadata_from_dequeued_buffer() {
        let buf = v4l2_buffer {
            bytesused: 64,
            flags: 0x2005,
            sequence: 9,
            timestamp: timeval {
                tv_sec: 3,
                tv_usec: 250_000,
            },
            ..Default::default()
        };

        let meta = Metadata::from(&buf);
        assert_eq!(meta.sequence, 9);
        assert_eq!(meta.bytesused, 64);
        assert!(meta.flags.contains(Flags::MAPPED | Flags::DONE));
        assert!(meta.flags.contains(Flags::TIMESTAMP_MONOTONIC));
        assert_eq!(meta.timestamp, Timestamp::new(3, 250_000));
    }
}
