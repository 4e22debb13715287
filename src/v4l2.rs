//! Raw kernel interface: structure layouts, ioctl codes and system calls

pub mod api;
pub mod layout;
pub mod vidioc;

pub use api::{close, ioctl, open};
