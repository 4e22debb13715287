//! Video capture from Linux V4L2 devices using user pointer streaming I/O.
//!
//! Open a [`Device`], negotiate a [`FrameFormat`] and receive decoded planar [`Frame`]s from a
//! background capture worker.

pub mod v4l2;

pub mod buffer;
pub mod memory;
pub mod timestamp;
pub use timestamp::Timestamp;

pub mod format;
pub use format::{FourCC, FrameFormat, Rect};

pub mod frame;
pub use frame::Frame;

pub mod io;
pub use io::Frames;

pub mod device;
pub use device::{Control, Device, Handle, Request, StreamState};

pub mod negotiate;

mod error;
pub use error::{Error, Result};
