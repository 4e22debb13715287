use std::{io, path::PathBuf};

use thiserror::Error;

use crate::device::Request;
use crate::format::{FourCC, FrameFormat};

/// Errors reported by device and stream operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open {}: {source}", .path.display())]
    DeviceOpen { path: PathBuf, source: io::Error },

    #[error("pixel format {0} is not supported")]
    UnsupportedFormat(FourCC),

    #[error("frame format {0} has an unsupported size")]
    UnsupportedSize(FrameFormat),

    #[error("a stream is already running on this device")]
    AlreadyStreaming,

    #[error("{request} failed: {source}")]
    DeviceControl { request: Request, source: io::Error },

    #[error("driver changed the requested format {requested} to {accepted}")]
    FormatRejected {
        requested: FrameFormat,
        accepted: FrameFormat,
    },

    #[error("failed to spawn capture worker: {0}")]
    Worker(#[source] io::Error),

    #[error("device has no negotiated format")]
    NotConfigured,

    #[error("device is not open")]
    NotOpen,
}

impl Error {
    /// Returns the errno of a failed system call, if this error carries one
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::DeviceOpen { source, .. } | Error::DeviceControl { source, .. } => {
                source.raw_os_error()
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
