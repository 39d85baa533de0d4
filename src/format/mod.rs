use std::fmt;

use crate::buffer;

/// Declares a `#[repr(u32)]` enum mirroring a videodev2.h enumeration, together with its
/// `TryFrom<u32>` decoder and a human readable `Display`.
macro_rules! v4l2_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:literal => $text:literal,)* }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        #[repr(u32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)*
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($text),)*
                }
            }
        }

        impl ::std::convert::TryFrom<u32> for $name {
            type Error = ();

            fn try_from(code: u32) -> Result<Self, Self::Error> {
                match code {
                    $($value => Ok(Self::$variant),)*
                    _ => Err(()),
                }
            }
        }
    };
}

pub mod catalog;

pub mod color;
pub use color::{
    Colorimetry, Colorspace, Encoding, HsvEncoding, Quantization, TransferFunction, YCbCrEncoding,
};

pub mod description;
pub use description::Description;

pub mod field;
pub use field::FieldOrder;

pub mod fourcc;
pub use fourcc::FourCC;

/// Maximum number of planes of a multi-planar format (VIDEO_MAX_PLANES)
pub const MAX_PLANES: usize = 8;

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Flags : u32 {
        const PREMUL_ALPHA  = 0x00000001;
        const SET_CSC       = 0x00000002;
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

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Streaming format (single-planar)
pub struct Format {
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// pixelformat code
    pub fourcc: FourCC,
    /// field order for interlacing
    pub field_order: FieldOrder,

    /// bytes per line
    pub stride: u32,
    /// maximum number of bytes required to store an image
    pub size: u32,

    /// flags set by the application or driver
    pub flags: Flags,
    pub colorimetry: Colorimetry,
}

impl Format {
    /// Returns a capture format
    ///
    /// # Arguments
    ///
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    /// * `fourcc` - Four character code (pixelformat)
    ///
    /// # Example
    ///
    /// ```
    /// use v4l2_mmap::format::{Format, FourCC};
    /// let fmt = Format::new(640, 480, FourCC::new(b"YUYV"));
    /// ```
    pub fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        Format {
            width,
            height,
            fourcc,
            field_order: FieldOrder::Any,
            stride: 0,
            size: 0,
            flags: Flags::empty(),
            colorimetry: Colorimetry::default(),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "width          : {}", self.width)?;
        writeln!(f, "height         : {}", self.height)?;
        writeln!(f, "fourcc         : {}", self.fourcc)?;
        writeln!(f, "field          : {}", self.field_order)?;
        writeln!(f, "stride         : {}", self.stride)?;
        writeln!(f, "size           : {}", self.size)?;
        writeln!(f, "colorimetry    : {}", self.colorimetry)?;
        Ok(())
    }
}

/// Stride and size of one plane of a multi-planar format
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PlaneFormat {
    /// bytes per line
    pub stride: u32,
    /// maximum number of bytes required to store the plane
    pub size: u32,
}

/// Streaming format (multi-planar)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatMplane {
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// pixelformat code
    pub fourcc: FourCC,
    /// field order for interlacing
    pub field_order: FieldOrder,

    /// One entry per plane, never more than [`MAX_PLANES`]
    pub planes: Vec<PlaneFormat>,

    /// flags set by the application or driver
    pub flags: Flags,
    pub colorimetry: Colorimetry,
}

impl FormatMplane {
    /// Returns a multi-planar format requesting `planes` planes, whose sizes are left to the
    /// driver
    pub fn new(width: u32, height: u32, fourcc: FourCC, planes: usize) -> Self {
        FormatMplane {
            width,
            height,
            fourcc,
            field_order: FieldOrder::Any,
            planes: vec![PlaneFormat::default(); planes.min(MAX_PLANES)],
            flags: Flags::empty(),
            colorimetry: Colorimetry::default(),
        }
    }
}

impl fmt::Display for FormatMplane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "width          : {}", self.width)?;
        writeln!(f, "height         : {}", self.height)?;
        writeln!(f, "fourcc         : {}", self.fourcc)?;
        writeln!(f, "field          : {}", self.field_order)?;
        for (i, plane) in self.planes.iter().enumerate() {
            writeln!(f, "plane[{}]       : stride {}, size {}", i, plane.stride, plane.size)?;
        }
        writeln!(f, "flags          : {}", self.flags)?;
        writeln!(f, "colorimetry    : {}", self.colorimetry)?;
        Ok(())
    }
}

/// Format of one queue, shaped by its buffer type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatPayload {
    Single(Format),
    Multi(FormatMplane),
}

impl FormatPayload {
    /// Builds the request for `typ`, picking the shape from the buffer type
    pub fn request(typ: buffer::Type, width: u32, height: u32, fourcc: FourCC) -> Self {
        if typ.is_multiplanar() {
            let planes = catalog::lookup(fourcc)
                .map(|e| e.mem_planes as usize)
                .unwrap_or(1);
            FormatPayload::Multi(FormatMplane::new(width, height, fourcc, planes))
        } else {
            FormatPayload::Single(Format::new(width, height, fourcc))
        }
    }

    /// Whether this payload has the shape `typ` requires
    pub fn fits(&self, typ: buffer::Type) -> bool {
        match self {
            FormatPayload::Single(_) => !typ.is_multiplanar(),
            FormatPayload::Multi(_) => typ.is_multiplanar(),
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            FormatPayload::Single(f) => f.width,
            FormatPayload::Multi(f) => f.width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            FormatPayload::Single(f) => f.height,
            FormatPayload::Multi(f) => f.height,
        }
    }

    pub fn fourcc(&self) -> FourCC {
        match self {
            FormatPayload::Single(f) => f.fourcc,
            FormatPayload::Multi(f) => f.fourcc,
        }
    }

    /// Number of memory planes per buffer
    pub fn plane_count(&self) -> usize {
        match self {
            FormatPayload::Single(_) => 1,
            FormatPayload::Multi(f) => f.planes.len(),
        }
    }

    /// Size of each plane in bytes, as decided by the driver
    pub fn plane_sizes(&self) -> Vec<u32> {
        match self {
            FormatPayload::Single(f) => vec![f.size],
            FormatPayload::Multi(f) => f.planes.iter().map(|p| p.size).collect(),
        }
    }
}

impl fmt::Display for FormatPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatPayload::Single(fmt) => write!(f, "{}", fmt),
            FormatPayload::Multi(fmt) => write!(f, "{}", fmt),
        }
    }
}
