//! Format negotiation: configure the capture format and the buffer exchange mode.

use std::convert::TryFrom;

use crate::buffer::Type;
use crate::device::{self, Control, Request};
use crate::error::{Error, Result};
use crate::format::{registry, Descriptor, FourCC, FrameFormat};
use crate::io::userptr::arena;
use crate::v4l2::layout::{v4l2_format, v4l2_pix_format, Layout};

/// `V4L2_FIELD_ANY`: let the driver pick
const FIELD_ANY: u32 = 0;

/// Configures `format` on the device and declares user pointer buffer exchange
///
/// Nothing is sent to the device if the pixel format is not supported or the frame size does not
/// suit it (e.g. an odd width for a 4:2:2 format). Control call failures are reported as they
/// happen; there are no retries.
///
/// Returns the descriptor of the negotiated pixel format.
pub fn negotiate<C: Control + ?Sized>(control: &C, format: &FrameFormat) -> Result<Descriptor> {
    let descriptor =
        *registry::lookup(format.fourcc).ok_or(Error::UnsupportedFormat(format.fourcc))?;

    if !descriptor.subsampling.fits(format.width, format.height) {
        return Err(Error::UnsupportedSize(*format));
    }

    set_format(control, format, &descriptor)?;
    arena::request(control, 0)?;

    log::debug!("negotiated {} with user pointer buffers", format);
    Ok(descriptor)
}

/// Issues `VIDIOC_S_FMT` and checks what the driver made of it
fn set_format<C: Control + ?Sized>(
    control: &C,
    format: &FrameFormat,
    descriptor: &Descriptor,
) -> Result<()> {
    let abi = control.abi();
    let size = descriptor.frame_size(format.width, format.height);
    let sizeimage = u32::try_from(size).map_err(|_| Error::UnsupportedSize(*format))?;
    let stride = descriptor.stride(format.width);
    let bytesperline = u32::try_from(stride).map_err(|_| Error::UnsupportedSize(*format))?;
    let mut payload = v4l2_format {
        type_: Type::VideoCapture as u32,
        pix: v4l2_pix_format {
            width: format.width,
            height: format.height,
            pixelformat: format.fourcc.into(),
            field: FIELD_ANY,
            bytesperline,
            sizeimage,
            ..Default::default()
        },
    }
    .to_bytes(abi);

    unsafe {
        // no user pointer in the payload
        device::ioctl(control, Request::SetFormat, &mut payload)?;
    }

    let applied = v4l2_format::from_bytes(abi, &payload).map_err(|source| Error::DeviceControl {
        request: Request::SetFormat,
        source,
    })?;
    let accepted = FrameFormat::new(
        applied.pix.width,
        applied.pix.height,
        FourCC::from(applied.pix.pixelformat),
    );
    if accepted != *format {
        return Err(Error::FormatRejected {
            requested: *format,
            accepted,
        });
    }

    if applied.pix.sizeimage > sizeimage {
        log::warn!(
            "driver expects {} bytes per frame, capture buffers hold {}",
            applied.pix.sizeimage,
            sizeimage
        );
    }

    Ok(())
}
