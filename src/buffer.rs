use bitflags::bitflags;
use std::convert::TryFrom;
use std::fmt;

use crate::device::Interest;
use crate::format::FieldOrder;
use crate::memory::Memory;
use crate::Timestamp;

/// Buffer type
///
/// Specific types of devices require buffers of corresponding types. The type also decides the
/// shape of every union payload exchanged for a queue.
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    VideoCapture        = 1,
    VideoOutput         = 2,
    VideoOverlay        = 3,
    VbiCapture          = 4,
    VbiOutput           = 5,
    SlicedVbiCapture    = 6,
    SlicedVbiOutput     = 7,
    VideoOutputOverlay  = 8,
    VideoCaptureMplane  = 9,
    VideoOutputMplane   = 10,
    SdrCapture          = 11,
    SdrOutput           = 12,
    MetaCapture         = 13,
    MetaOutput          = 14,
}

impl TryFrom<u32> for Type {
    type Error = ();

    fn try_from(repr: u32) -> Result<Self, Self::Error> {
        match repr {
            1 => Ok(Type::VideoCapture),
            2 => Ok(Type::VideoOutput),
            3 => Ok(Type::VideoOverlay),
            4 => Ok(Type::VbiCapture),
            5 => Ok(Type::VbiOutput),
            6 => Ok(Type::SlicedVbiCapture),
            7 => Ok(Type::SlicedVbiOutput),
            8 => Ok(Type::VideoOutputOverlay),
            9 => Ok(Type::VideoCaptureMplane),
            10 => Ok(Type::VideoOutputMplane),
            11 => Ok(Type::SdrCapture),
            12 => Ok(Type::SdrOutput),
            13 => Ok(Type::MetaCapture),
            14 => Ok(Type::MetaOutput),
            _ => Err(()),
        }
    }
}

impl Type {
    /// Whether buffers of this type carry a plane array
    pub fn is_multiplanar(self) -> bool {
        matches!(self, Type::VideoCaptureMplane | Type::VideoOutputMplane)
    }

    /// Whether the application fills buffers of this type and the device drains them
    pub fn is_output(self) -> bool {
        matches!(
            self,
            Type::VideoOutput
                | Type::VideoOutputMplane
                | Type::VideoOverlay
                | Type::VideoOutputOverlay
                | Type::VbiOutput
                | Type::SlicedVbiOutput
                | Type::SdrOutput
                | Type::MetaOutput
        )
    }

    pub fn is_capture(self) -> bool {
        !self.is_output()
    }

    /// Readiness a queue of this type signals when a buffer can be dequeued
    pub fn interest(self) -> Interest {
        if self.is_output() {
            Interest::WRITE
        } else {
            Interest::READ
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags! {
    #[allow(clippy::unreadable_literal)]
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Flags: u32 {
        /// Buffer is mapped
        const MAPPED                = 0x00000001;
        /// Buffer is queued for processing
        const QUEUED                = 0x00000002;
        /// Buffer is ready
        const DONE                  = 0x00000004;
        /// Image is a keyframe (I-frame)
        const KEYFRAME              = 0x00000008;
        /// Image is a P-frame
        const PFRAME                = 0x00000010;
        /// Image is a B-frame
        const BFRAME                = 0x00000020;
        /// Buffer is ready, but the data contained within is corrupted
        const ERROR                 = 0x00000040;
        /// Buffer is added to an unqueued request
        const IN_REQUEST            = 0x00000080;
        /// Timecode field is valid
        const TIMECODE              = 0x00000100;
        /// Don't return the capture buffer until OUTPUT timestamp changes
        const M2M_HOLD_CAPTURE_BUF  = 0x00000200;
        /// Buffer is prepared for queuing
        const PREPARED              = 0x00000400;
        /// Cache handling flags
        const NO_CACHE_INVALIDATE   = 0x00000800;
        const NO_CACHE_CLEAN        = 0x00001000;
        /// Timestamp type
        const TIMESTAMP_MONOTONIC   = 0x00002000;
        const TIMESTAMP_COPY        = 0x00004000;
        /// Timestamp taken at start of exposure
        const TSTAMP_SRC_SOE        = 0x00010000;
        /// Last buffer produced by a mem2mem encoder/decoder
        const LAST                  = 0x00100000;
        /// request_fd is valid
        const REQUEST_FD            = 0x00800000;
    }
}

impl From<u32> for Flags {
    fn from(flags: u32) -> Self {
        Self::from_bits_retain(flags)
    }
}

impl From<Flags> for u32 {
    fn from(flags: Flags) -> Self {
        flags.bits()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Local ownership state of one buffer slot
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// Known to the application, not owned by the driver
    Queried,
    /// Owned by the driver until dequeued
    Queued,
    /// Returned by the driver, its bytes-used prefix is valid
    Dequeued,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Queried => write!(f, "queried"),
            State::Queued => write!(f, "queued"),
            State::Dequeued => write!(f, "dequeued"),
        }
    }
}

/// Where the payload of a buffer or plane lives
///
/// Which variant applies is decided by the memory model and the buffer type, both of which are
/// known before a record is decoded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferLocation {
    /// Offset into device memory, to be passed to mmap(2)
    Offset(u32),
    /// DMA buffer file descriptor
    FileDescriptor(i32),
    /// Address of a userspace buffer
    UserPointer(usize),
    /// Address of the `v4l2_plane` array of a multi-planar buffer
    PlaneArray(usize),
}

impl Default for BufferLocation {
    fn default() -> Self {
        BufferLocation::Offset(0)
    }
}

impl BufferLocation {
    /// Device memory offset, if this location is one
    pub fn offset(&self) -> Option<u32> {
        match *self {
            BufferLocation::Offset(offset) => Some(offset),
            _ => None,
        }
    }
}

/// SMPTE timecode attached to a buffer
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Timecode {
    pub typ: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

/// One contiguous memory segment of a buffer
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Plane {
    /// Number of valid bytes, set by the driver for capture and by the application for output
    pub bytes_used: u32,
    /// Size of the plane in bytes
    pub length: u32,
    pub location: BufferLocation,
    /// Offset of the payload from the start of the plane
    pub data_offset: u32,
}

/// Typed view of `struct v4l2_buffer`
///
/// Single-planar buffers are represented with exactly one plane so the rest of the crate does not
/// need to distinguish the two shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub index: u32,
    pub typ: Type,
    pub memory: Memory,
    pub flags: Flags,
    pub field: FieldOrder,
    pub timestamp: Timestamp,
    pub timecode: Timecode,
    pub sequence: u32,
    pub planes: Vec<Plane>,
    /// Media request to queue the buffer into (kernel 4.20+)
    pub request_fd: Option<i32>,
}

impl Descriptor {
    /// Returns a descriptor addressing buffer `index` with `planes` empty planes
    pub fn new(typ: Type, memory: Memory, index: u32, planes: usize) -> Self {
        Descriptor {
            index,
            typ,
            memory,
            flags: Flags::empty(),
            field: FieldOrder::Any,
            timestamp: Timestamp::default(),
            timecode: Timecode::default(),
            sequence: 0,
            planes: vec![Plane::default(); planes.max(1)],
            request_fd: None,
        }
    }

    /// Bytes used of every plane, in plane order
    pub fn bytes_used(&self) -> Vec<u32> {
        self.planes.iter().map(|p| p.bytes_used).collect()
    }
}

/// Buffer metadata, mostly used not to convolute the main buffer structs
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Sequence number, counting the frames
    pub seq: u32,
    /// Time of capture (usually set by the driver)
    pub timestamp: Timestamp,
    /// Buffer flags
    pub flags: Flags,
    /// Field order of the image in the buffer
    pub field: FieldOrder,
}

impl From<&Descriptor> for Metadata {
    fn from(desc: &Descriptor) -> Self {
        Metadata {
            seq: desc.sequence,
            timestamp: desc.timestamp,
            flags: desc.flags,
            field: desc.field,
        }
    }
}
