//! Zero-initialised byte images of control-plane records.
//!
//! Records are plain byte buffers in native endianness. Offsets come from
//! [`crate::v4l2::layout`], never from call sites.

use std::fmt;

use crate::v4l2::layout::PointerWidth;

/// Byte image of one request/response record
#[derive(Clone, PartialEq, Eq)]
pub struct Record {
    bytes: Vec<u8>,
}

impl Record {
    /// Returns a zeroed record of `size` bytes
    pub fn new(size: usize) -> Self {
        Record {
            bytes: vec![0; size],
        }
    }

    /// Wraps an existing byte image, e.g. one captured by a test driver
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Record {
            bytes: bytes.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[offset..offset + N]);
        out
    }

    pub fn u8(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    pub fn put_u8(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value;
    }

    pub fn u32(&self, offset: usize) -> u32 {
        u32::from_ne_bytes(self.array(offset))
    }

    pub fn put_u32(&mut self, offset: usize, value: u32) {
        self.put_bytes(offset, &value.to_ne_bytes());
    }

    pub fn i32(&self, offset: usize) -> i32 {
        i32::from_ne_bytes(self.array(offset))
    }

    pub fn put_i32(&mut self, offset: usize, value: i32) {
        self.put_bytes(offset, &value.to_ne_bytes());
    }

    pub fn u64(&self, offset: usize) -> u64 {
        u64::from_ne_bytes(self.array(offset))
    }

    pub fn put_u64(&mut self, offset: usize, value: u64) {
        self.put_bytes(offset, &value.to_ne_bytes());
    }

    pub fn i64(&self, offset: usize) -> i64 {
        i64::from_ne_bytes(self.array(offset))
    }

    pub fn put_i64(&mut self, offset: usize, value: i64) {
        self.put_bytes(offset, &value.to_ne_bytes());
    }

    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.bytes[offset..offset + len]
    }

    pub fn put_bytes(&mut self, offset: usize, value: &[u8]) {
        self.bytes[offset..offset + value.len()].copy_from_slice(value);
    }

    /// Reads a NUL padded string field of `len` bytes
    pub fn string(&self, offset: usize, len: usize) -> String {
        let raw = self.bytes(offset, len);
        let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    /// Writes a string field of `len` bytes, truncating so that a terminating NUL always fits
    pub fn put_string(&mut self, offset: usize, len: usize, value: &str) {
        let raw = value.as_bytes();
        let n = raw.len().min(len.saturating_sub(1));
        self.bytes[offset..offset + len].iter_mut().for_each(|b| *b = 0);
        self.put_bytes(offset, &raw[..n]);
    }

    /// Reads a native-width address embedded in a union payload
    pub fn address(&self, offset: usize, width: PointerWidth) -> usize {
        match width {
            PointerWidth::Bits32 => self.u32(offset) as usize,
            PointerWidth::Bits64 => self.u64(offset) as usize,
        }
    }

    /// Writes a native-width address into a union payload
    ///
    /// This is the only place an address is turned into record bytes.
    pub(crate) fn put_address(&mut self, offset: usize, width: PointerWidth, address: usize) {
        match width {
            PointerWidth::Bits32 => self.put_u32(offset, address as u32),
            PointerWidth::Bits64 => self.put_u64(offset, address as u64),
        }
    }

    /// Reads a `timeval`/`timespec` pair whose members are `width` bytes wide
    pub fn time(&self, offset: usize, width: usize) -> (i64, i64) {
        if width == 8 {
            (self.i64(offset), self.i64(offset + 8))
        } else {
            (self.i32(offset) as i64, self.i32(offset + 4) as i64)
        }
    }

    pub fn put_time(&mut self, offset: usize, width: usize, value: (i64, i64)) {
        if width == 8 {
            self.put_i64(offset, value.0);
            self.put_i64(offset + 8, value.1);
        } else {
            self.put_i32(offset, value.0 as i32);
            self.put_i32(offset + 4, value.1 as i32);
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record[{}](", self.bytes.len())?;
        for (i, b) in self.bytes.iter().enumerate() {
            if i > 0 && i % 4 == 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}
