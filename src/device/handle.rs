use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::time::{Duration, Instant};

use log::warn;

use crate::device::{Driver, Interest, Readiness, Waker};
use crate::v4l2;
use crate::v4l2::vidioc::Code;

/// Owned file descriptor of an open device node
///
/// The descriptor is closed when the handle is dropped.
#[derive(Debug)]
pub struct Handle {
    fd: RawFd,
    nonblocking: bool,
}

impl Handle {
    /// Opens a device node read-write
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the device node, e.g. /dev/video0
    /// * `nonblocking` - Open with O_NONBLOCK, dequeueing then never blocks
    pub fn open<P: AsRef<Path>>(path: P, nonblocking: bool) -> io::Result<Self> {
        let mut flags = libc::O_RDWR;
        if nonblocking {
            flags |= libc::O_NONBLOCK;
        }
        let fd = v4l2::open(path, flags)?;
        Ok(Handle { fd, nonblocking })
    }

    /// Returns the raw file descriptor
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl AsRawFd for Handle {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Err(e) = v4l2::close(self.fd) {
            warn!("failed to close fd {}: {}", self.fd, e);
        }
    }
}

/// Milliseconds left until `deadline`, rounded up so a wait never ends early
fn remaining_ms(deadline: Instant) -> i32 {
    let left = deadline.saturating_duration_since(Instant::now());
    ((left.as_micros() + 999) / 1000).min(i32::MAX as u128) as i32
}

/// Polls `fd` for `interest`, alongside the waker descriptor if there is one
pub(crate) fn poll_readiness(
    fd: RawFd,
    interest: Interest,
    timeout: Option<Duration>,
    waker: Option<&Waker>,
) -> io::Result<Readiness> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut events = 0;
    if interest.read {
        events |= libc::POLLIN;
    }
    if interest.write {
        events |= libc::POLLOUT;
    }

    loop {
        let mut fds = vec![libc::pollfd {
            fd,
            events,
            revents: 0,
        }];
        if let Some(waker) = waker {
            fds.push(libc::pollfd {
                fd: waker.fd(),
                events: libc::POLLIN,
                revents: 0,
            });
        }

        let timeout_ms = deadline.map(remaining_ms).unwrap_or(-1);
        let ready = v4l2::poll(&mut fds, timeout_ms)?;
        if ready == 0 {
            match deadline {
                Some(deadline) if Instant::now() >= deadline => return Ok(Readiness::TimedOut),
                // interrupted, or woken slightly before the deadline
                _ => continue,
            }
        }

        if fds.len() > 1 && fds[1].revents & libc::POLLIN != 0 {
            return Ok(Readiness::Woken);
        }

        // POLLERR is raised while a queue is not streaming, DQBUF reports the details
        let revents = fds[0].revents;
        let failed = revents & (libc::POLLERR | libc::POLLHUP) != 0;
        let readable = interest.read && (revents & libc::POLLIN != 0 || failed);
        let writable = interest.write && (revents & libc::POLLOUT != 0 || failed);
        if readable || writable {
            return Ok(Readiness::Ready { readable, writable });
        }
    }
}

/// The kernel reads and writes exactly the size encoded in `code`
fn check_arg_size(code: Code, arg: &[u8]) -> io::Result<()> {
    if arg.len() != code.size() {
        warn!(
            "{}: argument is {} bytes, the request encodes {}",
            code.request,
            arg.len(),
            code.size()
        );
        return Err(io::Error::from_raw_os_error(libc::EINVAL));
    }
    Ok(())
}

impl Driver for Handle {
    unsafe fn ioctl(&self, code: Code, arg: &mut [u8]) -> io::Result<()> {
        check_arg_size(code, arg)?;
        v4l2::ioctl(
            self.fd,
            code.raw,
            arg.as_mut_ptr() as *mut std::os::raw::c_void,
        )
    }

    fn map(&self, offset: u32, len: usize) -> io::Result<*mut u8> {
        v4l2::mmap(self.fd, offset, len)
    }

    unsafe fn unmap(&self, ptr: *mut u8, len: usize) -> io::Result<()> {
        v4l2::munmap(ptr, len)
    }

    fn wait(
        &self,
        interest: Interest,
        timeout: Option<Duration>,
        waker: Option<&Waker>,
    ) -> io::Result<Readiness> {
        poll_readiness(self.fd, interest, timeout, waker)
    }

    fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }
}
