//! Streaming I/O: user pointer capture and the frame hand-off to consumers

pub mod slot;
pub use slot::{Frames, Publisher};

pub mod userptr;
