use crate::v4l2::layout::{v4l2_buffer, v4l2_format, v4l2_requestbuffers, Abi};

#[cfg(not(target_env = "musl"))]
#[allow(non_camel_case_types)]
pub type _IOC_TYPE = std::os::raw::c_ulong;
#[cfg(target_env = "musl")]
#[allow(non_camel_case_types)]
pub type _IOC_TYPE = std::os::raw::c_int;

// linux ioctl.h (asm-generic layout)
const _IOC_NRBITS: u8 = 8;
const _IOC_TYPEBITS: u8 = 8;

const _IOC_SIZEBITS: u8 = 14;

const _IOC_NRSHIFT: u8 = 0;
const _IOC_TYPESHIFT: u8 = _IOC_NRSHIFT + _IOC_NRBITS;
const _IOC_SIZESHIFT: u8 = _IOC_TYPESHIFT + _IOC_TYPEBITS;
const _IOC_DIRSHIFT: u8 = _IOC_SIZESHIFT + _IOC_SIZEBITS;

const _IOC_WRITE: u8 = 1;
const _IOC_READ: u8 = 2;

// Sizes are the encoded sizes from `layout`, not `size_of` of a Rust type.
macro_rules! _IOC {
    ($dir:expr, $type:expr, $nr:expr, $size:expr) => {
        (($dir as _IOC_TYPE) << _IOC_DIRSHIFT)
            | (($type as _IOC_TYPE) << _IOC_TYPESHIFT)
            | (($nr as _IOC_TYPE) << _IOC_NRSHIFT)
            | (($size as _IOC_TYPE) << _IOC_SIZESHIFT)
    };
}

macro_rules! _IOW {
    ($type:expr, $nr:expr, $size:expr) => {
        _IOC!(_IOC_WRITE, $type, $nr, $size)
    };
}

macro_rules! _IOWR {
    ($type:expr, $nr:expr, $size:expr) => {
        _IOC!(_IOC_READ | _IOC_WRITE, $type, $nr, $size)
    };
}

pub const fn vidioc_s_fmt(abi: Abi) -> _IOC_TYPE {
    _IOWR!(b'V', 5, v4l2_format::size(abi))
}

pub const fn vidioc_reqbufs(_abi: Abi) -> _IOC_TYPE {
    _IOWR!(b'V', 8, v4l2_requestbuffers::SIZE)
}

pub const fn vidioc_qbuf(abi: Abi) -> _IOC_TYPE {
    _IOWR!(b'V', 15, v4l2_buffer::size(abi))
}

pub const fn vidioc_dqbuf(abi: Abi) -> _IOC_TYPE {
    _IOWR!(b'V', 17, v4l2_buffer::size(abi))
}

pub const VIDIOC_S_FMT: _IOC_TYPE = vidioc_s_fmt(Abi::NATIVE);
pub const VIDIOC_REQBUFS: _IOC_TYPE = vidioc_reqbufs(Abi::NATIVE);
pub const VIDIOC_QBUF: _IOC_TYPE = vidioc_qbuf(Abi::NATIVE);
pub const VIDIOC_DQBUF: _IOC_TYPE = vidioc_dqbuf(Abi::NATIVE);
pub const VIDIOC_STREAMON: _IOC_TYPE = _IOW!(b'V', 18, std::mem::size_of::<std::os::raw::c_int>());
pub const VIDIOC_STREAMOFF: _IOC_TYPE =
    _IOW!(b'V', 19, std::mem::size_of::<std::os::raw::c_int>());
