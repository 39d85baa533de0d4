use std::{io, path::PathBuf};

use thiserror::Error;

use crate::capability;
use crate::v4l2::vidioc::Request;

/// Errors reported by sessions, pools and the control-plane codec
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open device {path:?}")]
    DeviceOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path:?} is not a video4linux character device")]
    NotAVideoDevice { path: PathBuf },

    #[error("device lacks required capability {required}")]
    CapabilityMissing { required: capability::Flags },

    #[error("unknown pixel format {0:?}")]
    UnknownFormat(String),

    #[error("negotiating format {requested} failed")]
    FormatNegotiationFailed {
        requested: String,
        #[source]
        source: Box<Error>,
    },

    #[error("driver granted no buffers (requested {requested})")]
    OutOfResources { requested: u32 },

    #[error("failed to map plane {plane} of buffer {index}")]
    MapFailed {
        index: u32,
        plane: usize,
        #[source]
        source: io::Error,
    },

    #[error("{request} failed: {}", os_error(.errno))]
    IoctlFailed { request: Request, errno: i32 },

    #[error("operation would block")]
    WouldBlock,

    #[error("timed out waiting for the device")]
    Timeout,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("invalid value {value} for {field}")]
    InvalidDiscriminant { field: &'static str, value: u32 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn os_error(errno: &i32) -> io::Error {
    io::Error::from_raw_os_error(*errno)
}

/// Result type used throughout this crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wraps the OS error of a failed ioctl
    pub fn ioctl(request: Request, err: io::Error) -> Self {
        Error::IoctlFailed {
            request,
            errno: err.raw_os_error().unwrap_or(libc::EIO),
        }
    }

    /// OS error code of a failed ioctl
    pub fn errno(&self) -> Option<i32> {
        match self {
            Error::IoctlFailed { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Whether retrying in the next streaming cycle may succeed
    ///
    /// Only [`Error::WouldBlock`], [`Error::Timeout`] and EAGAIN/EIO from VIDIOC_DQBUF qualify.
    /// Every other failure is terminal for the operation that produced it.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::WouldBlock | Error::Timeout => true,
            Error::IoctlFailed {
                request: Request::VIDIOC_DQBUF,
                errno,
            } => *errno == libc::EAGAIN || *errno == libc::EIO,
            _ => false,
        }
    }

    pub(crate) fn violation<S: Into<String>>(msg: S) -> Self {
        Error::ProtocolViolation(msg.into())
    }
}
