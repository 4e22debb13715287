use crate::buffer::Type;
use crate::device::{self, Control, Request};
use crate::error::{Error, Result};
use crate::memory::{Memory, UserPtr};
use crate::v4l2::layout::{v4l2_requestbuffers, Layout};

/// Requests `count` user pointer buffer slots for video capture
///
/// A count of zero declares the exchange mode without asking for any slots; the memory is always
/// supplied by the application.
///
/// Returns the number of slots as reported by the driver.
pub fn request<C: Control + ?Sized>(control: &C, count: u32) -> Result<u32> {
    let abi = control.abi();
    let mut payload = v4l2_requestbuffers {
        count,
        type_: Type::VideoCapture as u32,
        memory: Memory::UserPtr as u32,
        ..Default::default()
    }
    .to_bytes(abi);

    unsafe {
        // no user pointer in the payload
        device::ioctl(control, Request::RequestBuffers, &mut payload)?;
    }

    let granted =
        v4l2_requestbuffers::from_bytes(abi, &payload).map_err(|source| Error::DeviceControl {
            request: Request::RequestBuffers,
            source,
        })?;

    Ok(granted.count)
}

/// Manage the user allocated capture buffer
///
/// A single page aligned buffer is allocated per stream and reused for every frame.
pub struct Arena {
    buf: UserPtr,
    slots: u32,
}

impl Arena {
    /// Returns a new buffer manager instance
    ///
    /// One buffer slot is requested from the driver and `size` bytes of backing memory are
    /// allocated.
    ///
    /// # Arguments
    ///
    /// * `control` - Device the buffer will be queued on
    /// * `size` - Buffer size in bytes, usually the frame size
    pub fn allocate<C: Control + ?Sized>(control: &C, size: usize) -> Result<Self> {
        let slots = request(control, 1)?;
        if slots != 1 {
            log::debug!("driver granted {} buffer slots, using one", slots);
        }

        Ok(Arena {
            buf: UserPtr::new(size),
            slots,
        })
    }

    /// The buffer handed to the driver
    pub fn buffer(&self) -> &UserPtr {
        &self.buf
    }

    /// Mutable access to the buffer, for passing its address to a driver that writes into it
    pub fn buffer_mut(&mut self) -> &mut UserPtr {
        &mut self.buf
    }

    /// Number of buffer slots granted by the driver
    pub fn slots(&self) -> u32 {
        self.slots
    }
}
