use std::{fmt, str};

/// Four character code representing a pixelformat
#[derive(Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FourCC {
    pub repr: [u8; 4],
}

impl FourCC {
    /// Returns a pixelformat as four character code
    ///
    /// # Arguments
    ///
    /// * `repr` - Four characters as raw bytes
    ///
    /// # Example
    ///
    /// ```
    /// use v4l2_mmap::format::FourCC;
    /// let fourcc = FourCC::new(b"YUYV");
    /// ```
    pub const fn new(repr: &[u8; 4]) -> FourCC {
        FourCC { repr: *repr }
    }

    /// Little-endian code as stored in `pixelformat` fields
    pub const fn code(self) -> u32 {
        u32::from_le_bytes(self.repr)
    }

    /// Returns the string representation of a four character code
    pub fn str(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.repr)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.str() {
            Ok(s) => write!(f, "{}", s.trim_end()),
            Err(_) => write!(f, "{:#010x}", self.code()),
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}

impl From<u32> for FourCC {
    fn from(code: u32) -> Self {
        FourCC::new(&code.to_le_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(fourcc: FourCC) -> Self {
        fourcc.code()
    }
}
