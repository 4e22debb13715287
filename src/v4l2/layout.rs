//! Byte-exact encodings of the V4L2 structures used for user pointer capture.
//!
//! Every structure is written field by field in declaration order, little-endian,
//! following `videodev2.h`. Nothing here relies on the in-memory layout Rust picks
//! for these types: alignment holes the C compiler would insert are spelled out
//! as explicit padding fields, and they differ between the 32-bit and 64-bit
//! kernel ABIs. Treat the field lists as a versioned contract with the kernel;
//! moving a single field silently breaks the protocol.
//!
//! Only the members needed for single-planar capture are modeled. Unions are
//! represented by the one member this crate uses, with the remaining bytes of
//! the union zeroed.

#![allow(non_camel_case_types)]

use std::io;

/// Kernel ABI the structures are laid out for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abi {
    /// 32-bit `long` and 32-bit `timeval` members
    Ilp32,
    /// 64-bit `long` and 64-bit `timeval` members
    Lp64,
}

impl Abi {
    /// ABI of the target this crate is compiled for
    #[cfg(target_pointer_width = "64")]
    pub const NATIVE: Abi = Abi::Lp64;
    /// ABI of the target this crate is compiled for
    #[cfg(not(target_pointer_width = "64"))]
    pub const NATIVE: Abi = Abi::Ilp32;

    /// Size of a C `long` (and of every pointer sized union member)
    pub const fn long_size(self) -> usize {
        match self {
            Abi::Ilp32 => 4,
            Abi::Lp64 => 8,
        }
    }

    /// Hole the C compiler leaves after an odd number of `__u32` members when the
    /// next member is `long` aligned.
    pub const fn long_pad(self) -> usize {
        match self {
            Abi::Ilp32 => 0,
            Abi::Lp64 => 4,
        }
    }
}

/// Sequential little-endian field writer
#[derive(Debug)]
pub struct Writer {
    abi: Abi,
    bytes: Vec<u8>,
}

impl Writer {
    pub fn new(abi: Abi) -> Self {
        Writer {
            abi,
            bytes: Vec::new(),
        }
    }

    pub fn abi(&self) -> Abi {
        self.abi
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Writes an `unsigned long`, truncated to 32 bits on [`Abi::Ilp32`]
    pub fn ulong(&mut self, value: u64) -> &mut Self {
        match self.abi {
            Abi::Ilp32 => self.u32(value as u32),
            Abi::Lp64 => {
                self.bytes.extend_from_slice(&value.to_le_bytes());
                self
            }
        }
    }

    /// Writes a signed `long`, truncated to 32 bits on [`Abi::Ilp32`]
    pub fn slong(&mut self, value: i64) -> &mut Self {
        match self.abi {
            Abi::Ilp32 => self.i32(value as i32),
            Abi::Lp64 => {
                self.bytes.extend_from_slice(&value.to_le_bytes());
                self
            }
        }
    }

    /// Writes `count` zero bytes
    pub fn pad(&mut self, count: usize) -> &mut Self {
        self.bytes.resize(self.bytes.len() + count, 0);
        self
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Sequential little-endian field reader, the mirror of [`Writer`]
#[derive(Debug)]
pub struct Reader<'a> {
    abi: Abi,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(abi: Abi, bytes: &'a [u8]) -> Self {
        Reader { abi, bytes, pos: 0 }
    }

    fn take(&mut self, count: usize) -> io::Result<&'a [u8]> {
        let end = self.pos + count;
        if end > self.bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "structure truncated: need {} bytes, have {}",
                    end,
                    self.bytes.len()
                ),
            ));
        }

        let field = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(field)
    }

    pub fn u8(&mut self) -> io::Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> io::Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    pub fn i32(&mut self) -> io::Result<i32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(raw))
    }

    pub fn ulong(&mut self) -> io::Result<u64> {
        match self.abi {
            Abi::Ilp32 => Ok(u64::from(self.u32()?)),
            Abi::Lp64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(self.take(8)?);
                Ok(u64::from_le_bytes(raw))
            }
        }
    }

    pub fn slong(&mut self) -> io::Result<i64> {
        match self.abi {
            Abi::Ilp32 => Ok(i64::from(self.i32()?)),
            Abi::Lp64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(self.take(8)?);
                Ok(i64::from_le_bytes(raw))
            }
        }
    }

    pub fn skip(&mut self, count: usize) -> io::Result<()> {
        self.take(count).map(|_| ())
    }
}

/// A kernel structure with a fixed byte layout
pub trait Layout: Sized {
    /// Encoded size in bytes, equal to `sizeof` in C for the given ABI
    fn size(abi: Abi) -> usize;

    fn encode(&self, w: &mut Writer);

    fn decode(r: &mut Reader<'_>) -> io::Result<Self>;

    /// Returns the structure as the byte payload of an ioctl
    fn to_bytes(&self, abi: Abi) -> Vec<u8> {
        let mut w = Writer::new(abi);
        self.encode(&mut w);
        debug_assert_eq!(w.len(), Self::size(abi));
        w.into_bytes()
    }

    fn from_bytes(abi: Abi, bytes: &[u8]) -> io::Result<Self> {
        Self::decode(&mut Reader::new(abi, bytes))
    }
}

/// `struct v4l2_pix_format`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_pix_format {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

impl v4l2_pix_format {
    pub const SIZE: usize = 12 * 4;
}

/// `struct v4l2_format` with the `pix` member of its `fmt` union
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_format {
    pub type_: u32,
    pub pix: v4l2_pix_format,
}

impl v4l2_format {
    /// Size of the `fmt` union, dominated by `__u8 raw_data[200]`
    const UNION_SIZE: usize = 200;

    pub const fn size(abi: Abi) -> usize {
        // the union holds pointers (struct v4l2_window) and is long aligned
        4 + abi.long_pad() + Self::UNION_SIZE
    }
}

impl Layout for v4l2_format {
    fn size(abi: Abi) -> usize {
        v4l2_format::size(abi)
    }

    fn encode(&self, w: &mut Writer) {
        let pad = w.abi().long_pad();
        let pix = &self.pix;
        w.u32(self.type_)
            .pad(pad)
            .u32(pix.width)
            .u32(pix.height)
            .u32(pix.pixelformat)
            .u32(pix.field)
            .u32(pix.bytesperline)
            .u32(pix.sizeimage)
            .u32(pix.colorspace)
            .u32(pix.priv_)
            .u32(pix.flags)
            .u32(pix.ycbcr_enc)
            .u32(pix.quantization)
            .u32(pix.xfer_func)
            .pad(Self::UNION_SIZE - v4l2_pix_format::SIZE);
    }

    fn decode(r: &mut Reader<'_>) -> io::Result<Self> {
        let type_ = r.u32()?;
        r.skip(r.abi.long_pad())?;
        let pix = v4l2_pix_format {
            width: r.u32()?,
            height: r.u32()?,
            pixelformat: r.u32()?,
            field: r.u32()?,
            bytesperline: r.u32()?,
            sizeimage: r.u32()?,
            colorspace: r.u32()?,
            priv_: r.u32()?,
            flags: r.u32()?,
            ycbcr_enc: r.u32()?,
            quantization: r.u32()?,
            xfer_func: r.u32()?,
        };
        r.skip(Self::UNION_SIZE - v4l2_pix_format::SIZE)?;

        Ok(v4l2_format { type_, pix })
    }
}

/// `struct v4l2_requestbuffers`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_requestbuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
}

impl v4l2_requestbuffers {
    pub const SIZE: usize = 4 * 4 + 1 + 3;
}

impl Layout for v4l2_requestbuffers {
    fn size(_abi: Abi) -> usize {
        Self::SIZE
    }

    fn encode(&self, w: &mut Writer) {
        w.u32(self.count)
            .u32(self.type_)
            .u32(self.memory)
            .u32(self.capabilities)
            .u8(self.flags)
            // __u8 reserved[3]
            .pad(3);
    }

    fn decode(r: &mut Reader<'_>) -> io::Result<Self> {
        let reqbufs = v4l2_requestbuffers {
            count: r.u32()?,
            type_: r.u32()?,
            memory: r.u32()?,
            capabilities: r.u32()?,
            flags: r.u8()?,
        };
        r.skip(3)?;
        Ok(reqbufs)
    }
}

/// `struct timeval`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct timeval {
    pub tv_sec: i64,
    pub tv_usec: i64,
}

impl Layout for timeval {
    fn size(abi: Abi) -> usize {
        2 * abi.long_size()
    }

    fn encode(&self, w: &mut Writer) {
        w.slong(self.tv_sec).slong(self.tv_usec);
    }

    fn decode(r: &mut Reader<'_>) -> io::Result<Self> {
        Ok(timeval {
            tv_sec: r.slong()?,
            tv_usec: r.slong()?,
        })
    }
}

/// `struct v4l2_timecode`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_timecode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

impl v4l2_timecode {
    pub const SIZE: usize = 2 * 4 + 8;
}

impl Layout for v4l2_timecode {
    fn size(_abi: Abi) -> usize {
        Self::SIZE
    }

    fn encode(&self, w: &mut Writer) {
        w.u32(self.type_)
            .u32(self.flags)
            .u8(self.frames)
            .u8(self.seconds)
            .u8(self.minutes)
            .u8(self.hours);
        for b in self.userbits.iter() {
            w.u8(*b);
        }
    }

    fn decode(r: &mut Reader<'_>) -> io::Result<Self> {
        Ok(v4l2_timecode {
            type_: r.u32()?,
            flags: r.u32()?,
            frames: r.u8()?,
            seconds: r.u8()?,
            minutes: r.u8()?,
            hours: r.u8()?,
            userbits: [r.u8()?, r.u8()?, r.u8()?, r.u8()?],
        })
    }
}

/// `struct v4l2_buffer`, with `m.userptr` standing in for the `m` union
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct v4l2_buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: timeval,
    pub timecode: v4l2_timecode,
    pub sequence: u32,
    pub memory: u32,
    pub userptr: u64,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

impl v4l2_buffer {
    pub const fn size(abi: Abi) -> usize {
        // index .. field
        5 * 4
            + abi.long_pad()
            // timestamp
            + 2 * abi.long_size()
            + v4l2_timecode::SIZE
            // sequence, memory
            + 2 * 4
            // m
            + abi.long_size()
            // length, reserved2, request_fd
            + 3 * 4
            + abi.long_pad()
    }
}

impl Layout for v4l2_buffer {
    fn size(abi: Abi) -> usize {
        v4l2_buffer::size(abi)
    }

    fn encode(&self, w: &mut Writer) {
        let pad = w.abi().long_pad();
        w.u32(self.index)
            .u32(self.type_)
            .u32(self.bytesused)
            .u32(self.flags)
            .u32(self.field)
            .pad(pad);
        self.timestamp.encode(w);
        self.timecode.encode(w);
        w.u32(self.sequence)
            .u32(self.memory)
            .ulong(self.userptr)
            .u32(self.length)
            .u32(self.reserved2)
            .i32(self.request_fd)
            .pad(pad);
    }

    fn decode(r: &mut Reader<'_>) -> io::Result<Self> {
        let pad = r.abi.long_pad();
        let index = r.u32()?;
        let type_ = r.u32()?;
        let bytesused = r.u32()?;
        let flags = r.u32()?;
        let field = r.u32()?;
        r.skip(pad)?;
        let timestamp = timeval::decode(r)?;
        let timecode = v4l2_timecode::decode(r)?;
        let buf = v4l2_buffer {
            index,
            type_,
            bytesused,
            flags,
            field,
            timestamp,
            timecode,
            sequence: r.u32()?,
            memory: r.u32()?,
            userptr: r.ulong()?,
            length: r.u32()?,
            reserved2: r.u32()?,
            request_fd: r.i32()?,
        };
        r.skip(pad)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uyvy_720p() -> v4l2_format {
        v4l2_format {
            type_: 1,
            pix: v4l2_pix_format {
                width: 1280,
                height: 720,
                pixelformat: u32::from_le_bytes(*b"UYVY"),
                ..Default::default()
            },
        }
    }

    #[test]
    fn format_matches_kernel_bytes_on_ilp32() {
        let bytes = uyvy_720p().to_bytes(Abi::Ilp32);
        assert_eq!(bytes.len(), 204);
        assert_eq!(
            &bytes[..16],
            &[
                0x01, 0x00, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0xD0, 0x02, 0x00, 0x00, 0x55, 0x59,
                0x56, 0x59
            ]
        );
        assert!(bytes[16..].iter().all(|b| *b == 0));
    }

    #[test]
    fn format_union_is_long_aligned_on_lp64() {
        let bytes = uyvy_720p().to_bytes(Abi::Lp64);
        assert_eq!(bytes.len(), 208);
        assert_eq!(&bytes[..8], &[1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &1280u32.to_le_bytes());
        assert_eq!(&bytes[16..20], b"UYVY");
    }

    #[test]
    fn requestbuffers_userptr_bytes() {
        let reqbufs = v4l2_requestbuffers {
            count: 0,
            type_: 1,
            memory: 2,
            ..Default::default()
        };

        for abi in [Abi::Ilp32, Abi::Lp64].iter() {
            let bytes = reqbufs.to_bytes(*abi);
            assert_eq!(bytes.len(), 20);
            assert_eq!(&bytes[..9], &[0, 0, 0, 0, 1, 0, 0, 0, 2]);
            assert!(bytes[9..].iter().all(|b| *b == 0));
        }
    }

    #[test]
    fn buffer_sizes_match_videodev2() {
        assert_eq!(v4l2_buffer::size(Abi::Ilp32), 68);
        assert_eq!(v4l2_buffer::size(Abi::Lp64), 88);
        assert_eq!(v4l2_format::size(Abi::Ilp32), 204);
        assert_eq!(v4l2_format::size(Abi::Lp64), 208);
    }

    #[test]
    fn buffer_field_offsets_on_ilp32() {
        let buf = v4l2_buffer {
            index: 7,
            type_: 1,
            timestamp: timeval {
                tv_sec: 0x11,
                tv_usec: 0x22,
            },
            timecode: v4l2_timecode {
                type_: 0x33,
                flags: 0x44,
                frames: 0x55,
                seconds: 0x56,
                minutes: 0x57,
                hours: 0x58,
                userbits: [0x61, 0x62, 0x63, 0x64],
            },
            sequence: 0x99,
            memory: 2,
            userptr: 0xdead_b000,
            length: 1280 * 720 * 2,
            ..Default::default()
        };
        let bytes = buf.to_bytes(Abi::Ilp32);

        assert_eq!(bytes.len(), 68);
        assert_eq!(bytes[0], 7);
        assert_eq!(bytes[4], 1);
        // timeval right after field, no hole
        assert_eq!(bytes[20], 0x11);
        assert_eq!(bytes[24], 0x22);
        // timecode: two u32 then eight u8
        assert_eq!(bytes[28], 0x33);
        assert_eq!(bytes[32], 0x44);
        assert_eq!(&bytes[36..44], &[0x55, 0x56, 0x57, 0x58, 0x61, 0x62, 0x63, 0x64]);
        assert_eq!(bytes[44], 0x99);
        assert_eq!(bytes[48], 2);
        assert_eq!(&bytes[52..56], &0xdead_b000u32.to_le_bytes());
        assert_eq!(&bytes[56..60], &(1280u32 * 720 * 2).to_le_bytes());
    }

    #[test]
    fn buffer_userptr_offset_on_lp64() {
        let buf = v4l2_buffer {
            memory: 2,
            userptr: 0x7f00_1234_5000,
            length: 4096,
            ..Default::default()
        };
        let bytes = buf.to_bytes(Abi::Lp64);

        assert_eq!(bytes.len(), 88);
        assert_eq!(bytes[60], 2);
        assert_eq!(&bytes[64..72], &0x7f00_1234_5000u64.to_le_bytes());
        assert_eq!(&bytes[72..76], &4096u32.to_le_bytes());
    }

    #[test]
    fn dequeued_buffer_reads_kernel_fields() {
        // what a driver leaves behind after VIDIOC_DQBUF on a 64-bit kernel
        let mut raw = vec![0u8; 88];
        raw[8..12].copy_from_slice(&1_843_200u32.to_le_bytes()); // bytesused
        raw[12..16].copy_from_slice(&0x2001u32.to_le_bytes()); // flags
        raw[24..32].copy_from_slice(&42i64.to_le_bytes()); // tv_sec
        raw[32..40].copy_from_slice(&500_000i64.to_le_bytes()); // tv_usec
        raw[56..60].copy_from_slice(&3u32.to_le_bytes()); // sequence

        let buf = v4l2_buffer::from_bytes(Abi::Lp64, &raw).unwrap();
        assert_eq!(buf.bytesused, 1_843_200);
        assert_eq!(buf.flags, 0x2001);
        assert_eq!(buf.timestamp.tv_sec, 42);
        assert_eq!(buf.timestamp.tv_usec, 500_000);
        assert_eq!(buf.sequence, 3);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let err = v4l2_buffer::from_bytes(Abi::Ilp32, &[0u8; 40]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
