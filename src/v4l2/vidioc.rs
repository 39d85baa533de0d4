use std::fmt;

use crate::v4l2::layout::Layout;

#[cfg(not(target_env = "musl"))]
#[allow(non_camel_case_types)]
pub type _IOC_TYPE = std::os::raw::c_ulong;
#[cfg(target_env = "musl")]
#[allow(non_camel_case_types)]
pub type _IOC_TYPE = std::os::raw::c_int;

// linux ioctl.h (generic encoding, as used by x86 and arm)
const _IOC_NRBITS: u32 = 8;
const _IOC_TYPEBITS: u32 = 8;
const _IOC_SIZEBITS: u32 = 14;

const _IOC_NRSHIFT: u32 = 0;
const _IOC_TYPESHIFT: u32 = _IOC_NRSHIFT + _IOC_NRBITS;
const _IOC_SIZESHIFT: u32 = _IOC_TYPESHIFT + _IOC_TYPEBITS;
const _IOC_DIRSHIFT: u32 = _IOC_SIZESHIFT + _IOC_SIZEBITS;

const _IOC_WRITE: u32 = 1;
const _IOC_READ: u32 = 2;

const V4L2_IOC_MAGIC: u32 = b'V' as u32;

const fn ioc(dir: u32, nr: u32, size: usize) -> u32 {
    (dir << _IOC_DIRSHIFT)
        | (V4L2_IOC_MAGIC << _IOC_TYPESHIFT)
        | (nr << _IOC_NRSHIFT)
        | (((size as u32) & ((1 << _IOC_SIZEBITS) - 1)) << _IOC_SIZESHIFT)
}

/// Control-plane requests understood by this crate
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Request {
    VIDIOC_QUERYCAP,
    VIDIOC_ENUM_FMT,
    VIDIOC_G_FMT,
    VIDIOC_S_FMT,
    VIDIOC_TRY_FMT,
    VIDIOC_REQBUFS,
    VIDIOC_QUERYBUF,
    VIDIOC_QBUF,
    VIDIOC_DQBUF,
    VIDIOC_STREAMON,
    VIDIOC_STREAMOFF,
    VIDIOC_G_PARM,
    VIDIOC_S_PARM,
    VIDIOC_G_CTRL,
    VIDIOC_S_CTRL,
    VIDIOC_QUERYCTRL,
    VIDIOC_QUERYMENU,
    VIDIOC_QUERY_EXT_CTRL,
    VIDIOC_G_EXT_CTRLS,
    VIDIOC_S_EXT_CTRLS,
    VIDIOC_TRY_EXT_CTRLS,
    VIDIOC_CROPCAP,
    VIDIOC_G_CROP,
    VIDIOC_S_CROP,
    VIDIOC_SUBSCRIBE_EVENT,
    VIDIOC_UNSUBSCRIBE_EVENT,
    VIDIOC_DQEVENT,
}

impl Request {
    pub const ALL: [Request; 27] = [
        Request::VIDIOC_QUERYCAP,
        Request::VIDIOC_ENUM_FMT,
        Request::VIDIOC_G_FMT,
        Request::VIDIOC_S_FMT,
        Request::VIDIOC_TRY_FMT,
        Request::VIDIOC_REQBUFS,
        Request::VIDIOC_QUERYBUF,
        Request::VIDIOC_QBUF,
        Request::VIDIOC_DQBUF,
        Request::VIDIOC_STREAMON,
        Request::VIDIOC_STREAMOFF,
        Request::VIDIOC_G_PARM,
        Request::VIDIOC_S_PARM,
        Request::VIDIOC_G_CTRL,
        Request::VIDIOC_S_CTRL,
        Request::VIDIOC_QUERYCTRL,
        Request::VIDIOC_QUERYMENU,
        Request::VIDIOC_QUERY_EXT_CTRL,
        Request::VIDIOC_G_EXT_CTRLS,
        Request::VIDIOC_S_EXT_CTRLS,
        Request::VIDIOC_TRY_EXT_CTRLS,
        Request::VIDIOC_CROPCAP,
        Request::VIDIOC_G_CROP,
        Request::VIDIOC_S_CROP,
        Request::VIDIOC_SUBSCRIBE_EVENT,
        Request::VIDIOC_UNSUBSCRIBE_EVENT,
        Request::VIDIOC_DQEVENT,
    ];

    /// Returns (direction, number) as defined in videodev2.h
    const fn dir_nr(self) -> (u32, u32) {
        const RW: u32 = _IOC_READ | _IOC_WRITE;
        match self {
            Request::VIDIOC_QUERYCAP => (_IOC_READ, 0),
            Request::VIDIOC_ENUM_FMT => (RW, 2),
            Request::VIDIOC_G_FMT => (RW, 4),
            Request::VIDIOC_S_FMT => (RW, 5),
            Request::VIDIOC_REQBUFS => (RW, 8),
            Request::VIDIOC_QUERYBUF => (RW, 9),
            Request::VIDIOC_QBUF => (RW, 15),
            Request::VIDIOC_DQBUF => (RW, 17),
            Request::VIDIOC_STREAMON => (_IOC_WRITE, 18),
            Request::VIDIOC_STREAMOFF => (_IOC_WRITE, 19),
            Request::VIDIOC_G_PARM => (RW, 21),
            Request::VIDIOC_S_PARM => (RW, 22),
            Request::VIDIOC_G_CTRL => (RW, 27),
            Request::VIDIOC_S_CTRL => (RW, 28),
            Request::VIDIOC_QUERYCTRL => (RW, 36),
            Request::VIDIOC_QUERYMENU => (RW, 37),
            Request::VIDIOC_CROPCAP => (RW, 58),
            Request::VIDIOC_G_CROP => (RW, 59),
            Request::VIDIOC_S_CROP => (_IOC_WRITE, 60),
            Request::VIDIOC_TRY_FMT => (RW, 64),
            Request::VIDIOC_G_EXT_CTRLS => (RW, 71),
            Request::VIDIOC_S_EXT_CTRLS => (RW, 72),
            Request::VIDIOC_TRY_EXT_CTRLS => (RW, 73),
            Request::VIDIOC_DQEVENT => (_IOC_READ, 89),
            Request::VIDIOC_SUBSCRIBE_EVENT => (_IOC_WRITE, 90),
            Request::VIDIOC_UNSUBSCRIBE_EVENT => (_IOC_WRITE, 91),
            Request::VIDIOC_QUERY_EXT_CTRL => (RW, 103),
        }
    }

    /// Size of the argument record for this request under the given layout
    pub fn record_size(self, layout: &Layout) -> usize {
        match self {
            Request::VIDIOC_QUERYCAP => layout.capability.size,
            Request::VIDIOC_ENUM_FMT => layout.fmtdesc.size,
            Request::VIDIOC_G_FMT | Request::VIDIOC_S_FMT | Request::VIDIOC_TRY_FMT => {
                layout.format.size
            }
            Request::VIDIOC_REQBUFS => layout.requestbuffers.size,
            Request::VIDIOC_QUERYBUF | Request::VIDIOC_QBUF | Request::VIDIOC_DQBUF => {
                layout.buffer.size
            }
            Request::VIDIOC_STREAMON | Request::VIDIOC_STREAMOFF => 4,
            Request::VIDIOC_G_PARM | Request::VIDIOC_S_PARM => layout.streamparm.size,
            Request::VIDIOC_G_CTRL | Request::VIDIOC_S_CTRL => layout.control.size,
            Request::VIDIOC_QUERYCTRL => layout.queryctrl.size,
            Request::VIDIOC_QUERYMENU => layout.querymenu.size,
            Request::VIDIOC_QUERY_EXT_CTRL => layout.query_ext_ctrl.size,
            Request::VIDIOC_G_EXT_CTRLS
            | Request::VIDIOC_S_EXT_CTRLS
            | Request::VIDIOC_TRY_EXT_CTRLS => layout.ext_controls.size,
            Request::VIDIOC_CROPCAP => layout.cropcap.size,
            Request::VIDIOC_G_CROP | Request::VIDIOC_S_CROP => layout.crop.size,
            Request::VIDIOC_SUBSCRIBE_EVENT | Request::VIDIOC_UNSUBSCRIBE_EVENT => {
                layout.event_subscription.size
            }
            Request::VIDIOC_DQEVENT => layout.event.size,
        }
    }

    /// Request code as passed to ioctl(2)
    pub fn code(self, layout: &Layout) -> Code {
        let (dir, nr) = self.dir_nr();
        Code {
            request: self,
            raw: ioc(dir, nr, self.record_size(layout)) as _IOC_TYPE,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An encoded request code together with the request it was computed for
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Code {
    pub request: Request,
    pub raw: _IOC_TYPE,
}

impl Code {
    /// Argument size encoded in the code, the kernel copies exactly this many bytes
    pub fn size(&self) -> usize {
        (((self.raw as u32) >> _IOC_SIZESHIFT) & ((1 << _IOC_SIZEBITS) - 1)) as usize
    }
}
