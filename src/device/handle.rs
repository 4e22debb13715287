use std::sync::atomic::{AtomicBool, Ordering};
use std::{fmt, io, path::Path};

use crate::v4l2;
use crate::v4l2::layout::Abi;

/// Device control calls issued by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Request {
    /// `VIDIOC_S_FMT`, payload `struct v4l2_format`
    SetFormat,
    /// `VIDIOC_REQBUFS`, payload `struct v4l2_requestbuffers`
    RequestBuffers,
    /// `VIDIOC_QBUF`, payload `struct v4l2_buffer`
    QueueBuffer,
    /// `VIDIOC_DQBUF`, payload `struct v4l2_buffer`
    DequeueBuffer,
    /// `VIDIOC_STREAMON`, payload `int` buffer type
    StreamOn,
    /// `VIDIOC_STREAMOFF`, payload `int` buffer type
    StreamOff,
}

impl Request {
    /// ioctl request code for the given ABI
    pub fn code(self, abi: Abi) -> v4l2::vidioc::_IOC_TYPE {
        use v4l2::vidioc::*;

        match self {
            Request::SetFormat => vidioc_s_fmt(abi),
            Request::RequestBuffers => vidioc_reqbufs(abi),
            Request::QueueBuffer => vidioc_qbuf(abi),
            Request::DequeueBuffer => vidioc_dqbuf(abi),
            Request::StreamOn => VIDIOC_STREAMON,
            Request::StreamOff => VIDIOC_STREAMOFF,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Request::SetFormat => "VIDIOC_S_FMT",
            Request::RequestBuffers => "VIDIOC_REQBUFS",
            Request::QueueBuffer => "VIDIOC_QBUF",
            Request::DequeueBuffer => "VIDIOC_DQBUF",
            Request::StreamOn => "VIDIOC_STREAMON",
            Request::StreamOff => "VIDIOC_STREAMOFF",
        };
        write!(f, "{}", name)
    }
}

/// Transport for device control calls
///
/// [`Handle`] talks to a kernel device node. Other implementations can stand in for a device,
/// e.g. to exercise the protocol without hardware.
pub trait Control: Send + Sync + 'static {
    /// ABI the payloads passed to [`Control::ioctl`] are encoded for
    fn abi(&self) -> Abi {
        Abi::NATIVE
    }

    /// Issues a control call
    ///
    /// The payload is the encoded structure of the request and may be rewritten by the callee,
    /// the way the kernel writes results back.
    ///
    /// # Safety
    ///
    /// A [`Request::QueueBuffer`] payload carries a raw user pointer. The memory it points to must
    /// stay valid and must not be moved until the matching [`Request::DequeueBuffer`] returned or
    /// the control was shut down and every worker using it has stopped.
    unsafe fn ioctl(&self, request: Request, payload: &mut [u8]) -> io::Result<()>;

    /// Invalidates the control
    ///
    /// A blocked call fails, as does every call issued afterwards.
    fn shutdown(&self);
}

/// Open device node
///
/// The file descriptor is closed when the handle is dropped; [`Control::shutdown`] only makes the
/// handle unusable, so the descriptor number cannot be recycled by the OS while a worker may still
/// issue calls on it.
pub struct Handle {
    fd: std::os::raw::c_int,
    shut_down: AtomicBool,
}

impl Handle {
    /// Opens a device node for capture
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let fd = v4l2::open(path, libc::O_RDWR)?;

        Ok(Handle {
            fd,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Returns the raw file descriptor
    pub fn fd(&self) -> std::os::raw::c_int {
        self.fd
    }
}

impl Control for Handle {
    unsafe fn ioctl(&self, request: Request, payload: &mut [u8]) -> io::Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }

        // the kernel reads and writes as many bytes as the request code says
        let code = request.code(self.abi());
        let size = ((code as u64) >> 16) as usize & 0x3fff;
        if payload.len() < size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} needs {} payload bytes, got {}", request, size, payload.len()),
            ));
        }

        v4l2::ioctl(
            self.fd,
            code,
            payload.as_mut_ptr() as *mut std::os::raw::c_void,
        )
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        // STREAMOFF wakes up a VIDIOC_DQBUF blocked in the kernel
        let mut typ = (crate::buffer::Type::VideoCapture as u32).to_le_bytes();
        let ret = unsafe {
            v4l2::ioctl(
                self.fd,
                v4l2::vidioc::VIDIOC_STREAMOFF,
                typ.as_mut_ptr() as *mut std::os::raw::c_void,
            )
        };
        if let Err(e) = ret {
            log::debug!("{} on shutdown: {}", Request::StreamOff, e);
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Err(e) = v4l2::close(self.fd) {
            log::warn!("failed to close fd {}: {}", self.fd, e);
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("fd", &self.fd)
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish()
    }
}
