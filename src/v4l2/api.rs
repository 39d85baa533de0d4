use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::{io, path::Path, ptr};

use crate::v4l2::vidioc;

/// A convenience wrapper around open(2).
///
/// Returns the file descriptor on success.
/// In case of errors, the last OS error will be reported, aka errno on Linux.
///
/// # Arguments
///
/// * `path` - Path to the device node
/// * `flags` - Open flags
///
/// # Example
///
/// ```no_run
/// use v4l2_mmap::v4l2;
///
/// let fd = v4l2::open("/dev/video0", libc::O_RDWR);
/// ```
pub fn open<P: AsRef<Path>>(path: P, flags: i32) -> io::Result<std::os::raw::c_int> {
    let c_path = CString::new(path.as_ref().as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let fd = unsafe { libc::open(c_path.as_ptr(), flags | libc::O_CLOEXEC) };
    if fd == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(fd)
    }
}

/// A convenience wrapper around close(2).
///
/// In case of errors, the last OS error will be reported, aka errno on Linux.
pub fn close(fd: std::os::raw::c_int) -> io::Result<()> {
    let ret = unsafe { libc::close(fd) };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Returns the (major, minor) numbers of the character device behind `fd`, or `None` if `fd`
/// refers to something else.
pub fn char_device(fd: std::os::raw::c_int) -> io::Result<Option<(u32, u32)>> {
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::fstat(fd, &mut st) };
    if ret == -1 {
        return Err(io::Error::last_os_error());
    }

    if st.st_mode & libc::S_IFMT != libc::S_IFCHR {
        return Ok(None);
    }
    // major()/minor() are unsafe in older libc releases
    #[allow(unused_unsafe)]
    let numbers = unsafe { (libc::major(st.st_rdev), libc::minor(st.st_rdev)) };
    Ok(Some((numbers.0 as u32, numbers.1 as u32)))
}

/// A convenience wrapper around ioctl(2).
///
/// In case of errors, the last OS error will be reported, aka errno on Linux.
///
/// # Arguments
///
/// * `fd` - File descriptor
/// * `request` - IO control code (see [`vidioc`])
/// * `argp` - Pointer to memory region holding the argument record
///
/// # Safety
///
/// `argp` must point to a writable region at least as large as the size encoded in `request`.
pub unsafe fn ioctl(
    fd: std::os::raw::c_int,
    request: vidioc::_IOC_TYPE,
    argp: *mut std::os::raw::c_void,
) -> io::Result<()> {
    /*
     * The libc crate (and libc itself!) defines ioctl() with different, incompatible argument
     * types on different platforms. To hack around this without conditional compilation, use
     * syscall() instead as a drop-in replacement. Details:
     * https://github.com/rust-lang/libc/issues/1036
     */
    let ret = libc::syscall(libc::SYS_ioctl, fd, request, argp);
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Maps `length` bytes of device memory at `offset`, readable and writable, shared with the
/// device.
///
/// In case of errors, the last OS error will be reported, aka errno on Linux.
pub fn mmap(fd: std::os::raw::c_int, offset: u32, length: usize) -> io::Result<*mut u8> {
    let ret = unsafe {
        libc::mmap(
            ptr::null_mut(),
            length,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            offset as libc::off_t,
        )
    };
    if ret == libc::MAP_FAILED {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as *mut u8)
    }
}

/// A convenience wrapper around munmap(2).
///
/// # Safety
///
/// `start` and `length` must describe a mapping previously returned by [`mmap`] that has not
/// been unmapped yet.
pub unsafe fn munmap(start: *mut u8, length: usize) -> io::Result<()> {
    let ret = libc::munmap(start as *mut std::os::raw::c_void, length);
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// A convenience wrapper around poll(2).
///
/// Returns the number of descriptors with pending events. EINTR is reported as zero ready
/// descriptors so callers treat it like a spurious wakeup.
///
/// # Arguments
///
/// * `fds` - Descriptors and their requested events, `revents` is filled in
/// * `timeout` - Milliseconds to wait, negative means forever
pub fn poll(fds: &mut [libc::pollfd], timeout: i32) -> io::Result<usize> {
    let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout) };
    if ret == -1 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(0);
        }
        Err(err)
    } else {
        Ok(ret as usize)
    }
}
