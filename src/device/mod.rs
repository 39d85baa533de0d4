//! Access to video4linux device nodes.
//!
//! Everything above this module talks to a device through the [`Driver`] trait: one method per
//! kernel primitive the streaming protocol needs (ioctl, mmap/munmap and a readiness wait).
//! [`Handle`] is the implementation backed by a real file descriptor.

use std::{io, time::Duration};

use crate::v4l2::vidioc::Code;

pub mod handle;
pub use handle::Handle;

pub mod info;
pub use info::{list, DeviceInfo};

pub mod waker;
pub use waker::Waker;

/// Readiness a caller is waiting for
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Interest {
    /// A capture-class buffer can be dequeued
    pub read: bool,
    /// An output-class buffer can be dequeued
    pub write: bool,
}

impl Interest {
    pub const READ: Interest = Interest {
        read: true,
        write: false,
    };
    pub const WRITE: Interest = Interest {
        read: false,
        write: true,
    };
    pub const BOTH: Interest = Interest {
        read: true,
        write: true,
    };

    /// Combined interest of `self` and `other`
    pub fn union(self, other: Interest) -> Interest {
        Interest {
            read: self.read || other.read,
            write: self.write || other.write,
        }
    }
}

/// Outcome of a readiness wait
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The device signalled readiness for at least one requested direction
    Ready { readable: bool, writable: bool },
    /// The waker was triggered before the device became ready
    Woken,
    /// The timeout elapsed without readiness
    TimedOut,
}

impl Readiness {
    /// Whether the device is ready for everything in `interest`
    pub fn satisfies(&self, interest: Interest) -> bool {
        match *self {
            Readiness::Ready { readable, writable } => {
                (readable || !interest.read) && (writable || !interest.write)
            }
            _ => false,
        }
    }
}

/// Kernel primitives of an open video device
pub trait Driver {
    /// Issues one ioctl, the record is updated in place with the driver's response
    ///
    /// Implementations reject an `arg` whose length differs from [`Code::size`].
    ///
    /// # Safety
    ///
    /// Every address embedded in `arg` must point to a live allocation large enough for what
    /// the request reads or writes through it, for the duration of the call.
    unsafe fn ioctl(&self, code: Code, arg: &mut [u8]) -> io::Result<()>;

    /// Maps `len` bytes of device memory at `offset`, read-write and shared
    fn map(&self, offset: u32, len: usize) -> io::Result<*mut u8>;

    /// Unmaps a region returned by [`Driver::map`]
    ///
    /// # Safety
    ///
    /// `ptr` and `len` must describe a live mapping of this driver. The region must not be
    /// accessed afterwards.
    unsafe fn unmap(&self, ptr: *mut u8, len: usize) -> io::Result<()>;

    /// Blocks until the device is ready for `interest`, `timeout` elapses or `waker` is
    /// triggered
    fn wait(
        &self,
        interest: Interest,
        timeout: Option<Duration>,
        waker: Option<&Waker>,
    ) -> io::Result<Readiness>;

    /// Whether the device was opened with O_NONBLOCK
    fn is_nonblocking(&self) -> bool;
}
