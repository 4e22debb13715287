use std::convert::TryFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::buffer::{Metadata, Type};
use crate::device::{self, Control, Request};
use crate::error::{Error, Result};
use crate::format::{Descriptor, FrameFormat};
use crate::frame::{self, Frame};
use crate::io::slot::Publisher;
use crate::io::userptr::arena::Arena;
use crate::memory::Memory;
use crate::v4l2::layout::{v4l2_buffer, Layout};

/// Stream of user buffers
///
/// The stream owns its capture buffer for its whole lifetime. The buffer is handed to the driver
/// by address on every [`Stream::next`] call and read back once the driver is done with it.
pub struct Stream<C: Control> {
    control: Arc<C>,
    arena: Arena,
    format: FrameFormat,
    descriptor: Descriptor,
    length: u32,

    active: bool,
}

impl<C: Control> Stream<C> {
    /// Returns a stream for frame capturing
    ///
    /// The device must have accepted `format` already. One buffer slot is requested from the
    /// driver and the page aligned capture buffer is allocated.
    pub fn new(control: Arc<C>, format: FrameFormat, descriptor: Descriptor) -> Result<Self> {
        let size = descriptor.frame_size(format.width, format.height);
        let length = u32::try_from(size).map_err(|_| Error::UnsupportedSize(format))?;
        let arena = Arena::allocate(control.as_ref(), size)?;

        Ok(Stream {
            control,
            arena,
            format,
            descriptor,
            length,
            active: false,
        })
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Turns on the capture queue
    pub fn start(&mut self) -> Result<()> {
        let mut typ = (Type::VideoCapture as u32).to_le_bytes();
        unsafe {
            // no user pointer in the payload
            device::ioctl(self.control.as_ref(), Request::StreamOn, &mut typ)?;
        }

        self.active = true;
        Ok(())
    }

    /// Turns off the capture queue, which also takes back every queued buffer
    pub fn stop(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let mut typ = (Type::VideoCapture as u32).to_le_bytes();
        unsafe {
            // no user pointer in the payload
            device::ioctl(self.control.as_ref(), Request::StreamOff, &mut typ)
        }
    }

    /// Hands the capture buffer to the driver
    ///
    /// Returns the encoded `v4l2_buffer`, to be reused for the dequeue call.
    fn queue(&mut self) -> Result<Vec<u8>> {
        let abi = self.control.abi();
        let userptr = self.arena.buffer_mut().as_mut_ptr() as u64;
        let mut payload = v4l2_buffer {
            index: 0,
            type_: Type::VideoCapture as u32,
            memory: Memory::UserPtr as u32,
            userptr,
            length: self.length,
            ..Default::default()
        }
        .to_bytes(abi);

        unsafe {
            // The arena keeps the buffer alive and in place until this stream is dropped, and the
            // stream turns the queue off before that.
            device::ioctl(self.control.as_ref(), Request::QueueBuffer, &mut payload)?;
        }

        Ok(payload)
    }

    /// Waits for the driver to fill the queued buffer
    fn dequeue(&mut self, payload: &mut [u8]) -> Result<Metadata> {
        unsafe {
            // same user pointer as the one just queued
            device::ioctl(self.control.as_ref(), Request::DequeueBuffer, payload)?;
        }

        let filled = v4l2_buffer::from_bytes(self.control.abi(), payload).map_err(|source| {
            Error::DeviceControl {
                request: Request::DequeueBuffer,
                source,
            }
        })?;

        Ok(Metadata::from(&filled))
    }

    /// Captures one frame: queue, wait, decode
    ///
    /// Blocks until the driver delivers a frame or the device is shut down.
    pub fn next(&mut self) -> Result<Frame> {
        let mut payload = self.queue()?;
        let meta = self.dequeue(&mut payload)?;

        let expected = self.descriptor.frame_size(self.format.width, self.format.height);
        if (meta.bytesused as usize) < expected && meta.bytesused != 0 {
            log::warn!(
                "frame {} is short: {} of {} bytes",
                meta.sequence,
                meta.bytesused,
                expected
            );
        }

        let frame = frame::decode(self.arena.buffer(), self.format.width, self.format.height);
        Ok(frame.with_meta(meta))
    }

    /// Capture loop, run by the stream worker
    ///
    /// Publishes frames until a control call fails. The failure ends the frame sequence; it is
    /// passed on to the consumer unless `closing` says the device is being closed on purpose.
    pub fn run(mut self, publisher: Publisher, closing: &AtomicBool) {
        log::debug!("capturing {}", self.format);

        let error = loop {
            match self.next() {
                Ok(frame) => {
                    let sequence = frame.meta().sequence;
                    if publisher.publish(frame) {
                        log::trace!("frame {} replaced an unconsumed one", sequence);
                    }
                }
                Err(e) => break e,
            }
        };

        if closing.load(Ordering::Acquire) {
            log::debug!("capture stopped: {}", error);
            publisher.finish(None);
        } else {
            log::error!("capture failed: {}", error);
            publisher.finish(Some(error));
        }
    }
}

impl<C: Control> Drop for Stream<C> {
    fn drop(&mut self) {
        // the driver may still hold the buffer address; take it back before the memory goes
        if let Err(e) = self.stop() {
            log::debug!("stopping stream: {}", e);
        }
    }
}
