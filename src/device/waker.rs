use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use log::warn;

use crate::v4l2;

/// Secondary readiness source that interrupts a blocked wait
///
/// A waker wraps an eventfd. Any thread holding a reference may call [`Waker::wake`]; a wait
/// that includes the waker then returns [`crate::device::Readiness::Woken`] instead of blocking
/// until the device produces a frame. The waker stays triggered until [`Waker::reset`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use v4l2_mmap::device::Waker;
///
/// let waker = Arc::new(Waker::new().unwrap());
/// let remote = Arc::clone(&waker);
/// std::thread::spawn(move || remote.wake());
/// ```
#[derive(Debug)]
pub struct Waker {
    fd: RawFd,
}

impl Waker {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(Waker { fd })
    }

    /// Triggers the waker
    pub fn wake(&self) -> io::Result<()> {
        let one: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret == -1 {
            let err = io::Error::last_os_error();
            // counter saturated, the waker is triggered anyway
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Clears a pending trigger
    pub fn reset(&self) -> io::Result<()> {
        let mut value: u64 = 0;
        let ret = unsafe {
            libc::read(
                self.fd,
                &mut value as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret == -1 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Whether the waker has been triggered and not reset since
    pub fn is_woken(&self) -> io::Result<bool> {
        let mut fds = [libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        }];
        Ok(v4l2::poll(&mut fds, 0)? > 0 && fds[0].revents & libc::POLLIN != 0)
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl AsRawFd for Waker {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Waker {
    fn drop(&mut self) {
        if let Err(e) = v4l2::close(self.fd) {
            warn!("failed to close eventfd {}: {}", self.fd, e);
        }
    }
}
