//! Capture device lifecycle: open, configure, stream, close.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::format::{Descriptor, FrameFormat};
use crate::io::slot::{self, Frames};
use crate::io::userptr::Stream;
use crate::negotiate::negotiate;

pub mod handle;
pub use handle::{Control, Handle, Request};

/// Issues a control call, mapping failures to [`Error::DeviceControl`]
///
/// # Safety
///
/// See [`Control::ioctl`].
pub(crate) unsafe fn ioctl<C: Control + ?Sized>(
    control: &C,
    request: Request,
    payload: &mut [u8],
) -> Result<()> {
    control
        .ioctl(request, payload)
        .map_err(|source| Error::DeviceControl { request, source })
}

/// Lifecycle of a device's stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No stream running, initial state
    Idle,
    /// The capture worker is running (or ran and stopped on an error)
    Streaming,
    /// The device was closed, terminal
    Closed,
}

/// Linux capture device
///
/// A device runs at most one stream. Frames are captured by a background worker and delivered
/// through the [`Frames`] receiver returned by [`Device::start`]. Closing the device stops the
/// worker; a device whose stream ended cannot be restarted, open the device again instead.
///
/// # Example
///
/// ```no_run
/// use v4l_capture::{Device, FourCC, FrameFormat};
///
/// let mut dev = Device::open("/dev/video0")?;
/// let frames = dev.stream(&FrameFormat::new(1280, 720, FourCC::UYVY))?;
/// if let Some(frame) = frames.recv() {
///     println!("{}x{}, {} luma samples", frame.width(), frame.height(), frame.y().len());
/// }
/// dev.close()?;
/// # Ok::<(), v4l_capture::Error>(())
/// ```
pub struct Device<C: Control = Handle> {
    control: Option<Arc<C>>,
    state: StreamState,
    negotiated: Option<(FrameFormat, Descriptor)>,
    closing: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Device<Handle> {
    /// Opens a capture device by path
    ///
    /// Linux device nodes are usually found in /dev/videoX.
    ///
    /// # Arguments
    ///
    /// * `path` - Path (e.g. "/dev/video0")
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let handle = Handle::open(path).map_err(|source| Error::DeviceOpen {
            path: path.to_path_buf(),
            source,
        })?;

        log::debug!("opened {} as fd {}", path.display(), handle.fd());
        Ok(Device::with_control(handle))
    }
}

impl<C: Control> Device<C> {
    /// Wraps an already open control transport
    pub fn with_control(control: C) -> Self {
        Device {
            control: Some(Arc::new(control)),
            state: StreamState::Idle,
            negotiated: None,
            closing: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Returns the control transport, unless the device was closed
    pub fn control(&self) -> Option<&C> {
        self.control.as_deref()
    }

    /// Returns the negotiated format, if any
    pub fn format(&self) -> Option<FrameFormat> {
        self.negotiated.map(|(format, _)| format)
    }

    fn live(&self) -> Result<&Arc<C>> {
        match (&self.control, self.state) {
            (Some(control), StreamState::Idle) => Ok(control),
            (Some(_), StreamState::Streaming) => Err(Error::AlreadyStreaming),
            _ => Err(Error::NotOpen),
        }
    }

    /// Negotiates the capture format and buffer exchange mode
    ///
    /// May be called repeatedly before the stream starts; the last successful call wins.
    pub fn configure(&mut self, format: &FrameFormat) -> Result<()> {
        let control = self.live()?;
        let descriptor = negotiate(control.as_ref(), format)?;

        self.negotiated = Some((*format, descriptor));
        Ok(())
    }

    /// Starts capturing with the negotiated format
    ///
    /// Allocates the capture buffer, turns the queue on and spawns the capture worker. A second
    /// call is rejected with [`Error::AlreadyStreaming`] and leaves the running stream alone.
    pub fn start(&mut self) -> Result<Frames> {
        let control = Arc::clone(self.live()?);
        let (format, descriptor) = self.negotiated.ok_or(Error::NotConfigured)?;

        let mut stream = Stream::new(control, format, descriptor)?;
        stream.start()?;

        let (publisher, frames) = slot::slot();
        let closing = Arc::clone(&self.closing);
        let worker = thread::Builder::new()
            .name("v4l-capture".to_string())
            .spawn(move || stream.run(publisher, &closing))
            .map_err(Error::Worker)?;

        self.worker = Some(worker);
        self.state = StreamState::Streaming;
        log::debug!("stream started");
        Ok(frames)
    }

    /// Configures `format` and starts capturing
    pub fn stream(&mut self, format: &FrameFormat) -> Result<Frames> {
        self.configure(format)?;
        self.start()
    }

    /// Closes the device
    ///
    /// A running capture worker is woken up, stops, and is waited for before this returns. The
    /// frame sequence of the stream ends.
    pub fn close(&mut self) -> Result<()> {
        let control = self.control.take().ok_or(Error::NotOpen)?;
        self.state = StreamState::Closed;

        self.closing.store(true, Ordering::Release);
        control.shutdown();

        if let Some(worker) = self.worker.take() {
            log::debug!("waiting for capture worker");
            if worker.join().is_err() {
                log::error!("capture worker panicked");
            }
        }

        // last reference, releases the device node
        drop(control);
        log::debug!("device closed");
        Ok(())
    }
}

impl<C: Control> Drop for Device<C> {
    fn drop(&mut self) {
        if self.state != StreamState::Closed {
            let _ = self.close();
        }
    }
}
