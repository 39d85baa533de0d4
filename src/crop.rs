use std::fmt;

use crate::buffer;
use crate::fraction::Fraction;

/// Rectangle in device coordinates
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Rect {
            left,
            top,
            width,
            height,
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Cropping limits as returned by VIDIOC_CROPCAP
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CropCapability {
    pub typ: buffer::Type,
    /// Area that can be sampled
    pub bounds: Rect,
    /// Default cropping rectangle
    pub defrect: Rect,
    /// Pixel aspect ratio (y/x)
    pub pixel_aspect: Fraction,
}

/// Active cropping rectangle of a queue
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Crop {
    pub typ: buffer::Type,
    pub rect: Rect,
}
