use std::{convert::TryFrom, fmt, slice};

/// Memory used for buffer exchange
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Memory {
    Mmap        = 1,
    UserPtr     = 2,
    Overlay     = 3,
    DmaBuf      = 4,
}

impl TryFrom<u32> for Memory {
    type Error = ();

    fn try_from(repr: u32) -> Result<Self, Self::Error> {
        match repr {
            1 => Ok(Memory::Mmap),
            2 => Ok(Memory::UserPtr),
            3 => Ok(Memory::Overlay),
            4 => Ok(Memory::DmaBuf),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Memory::Mmap => write!(f, "memory-mapped"),
            Memory::UserPtr => write!(f, "user pointer"),
            Memory::Overlay => write!(f, "overlay"),
            Memory::DmaBuf => write!(f, "DMA buffered"),
        }
    }
}

/// Memory-mapped region of one (buffer, plane) pair
///
/// The backing memory is usually located somewhere on the camera hardware itself. It is mapped
/// into the address space of the process so frames never have to be copied. In case of capture
/// devices, the (virtual) memory can be read. In case of output devices, it can be written.
///
/// A region does not unmap itself. The pool that created it is the only owner and unmaps every
/// region before releasing the buffers.
#[derive(Debug)]
pub struct MappedRegion {
    ptr: *mut u8,
    len: usize,
    offset: u32,
}

impl MappedRegion {
    /// # Safety
    ///
    /// `ptr` must be the start of a live shared mapping of `len` bytes.
    pub(crate) unsafe fn new(ptr: *mut u8, len: usize, offset: u32) -> Self {
        MappedRegion { ptr, len, offset }
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Address the region is mapped at in this process
    pub fn address(&self) -> usize {
        self.ptr as usize
    }

    /// Device memory offset the region was mapped from
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whole region, including bytes beyond the valid prefix of the current cycle
    ///
    /// Only sound while the application owns the buffer, the pool checks that before handing
    /// out data.
    pub(crate) fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}
