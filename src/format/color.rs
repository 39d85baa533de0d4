//! Colorimetry of a pixel format.
//!
//! The driver decides these for capture streams and the user sets them for output streams.

use std::{convert::TryFrom, fmt};

v4l2_enum! {
    /// Colorspace for pixels
    Colorspace {
        /// driver will pick default
        Default = 0 => "default",
        SMPTE170M = 1 => "SMPTE 170M",
        SMPTE240M = 2 => "SMPTE 240M",
        /// aka BT.709
        Rec709 = 3 => "Rec. 709",
        // BT878=4: deprecated, no driver returns this
        NTSC = 5 => "NTSC",
        EBUTech3213 = 6 => "EBU Tech 3213",
        /// sRGB colorspace, YCbCr encoding and full range quantization
        JPEG = 7 => "JPEG",
        SRGB = 8 => "sRGB",
        OPRGB = 9 => "opRGB",
        /// aka BT.2020
        Rec2020 = 10 => "Rec. 2020",
        RAW = 11 => "RAW",
        DCIP3 = 12 => "DCI-P3",
    }
}

v4l2_enum! {
    /// Y'CbCr encoding
    YCbCrEncoding {
        Default = 0 => "default",
        ITU601 = 1 => "ITU-R 601",
        ITU709 = 2 => "Rec. 709",
        XvYCC601 = 3 => "xvYCC 601",
        XvYCC709 = 4 => "xvYCC 709",
        // SYCC=5: deprecated
        BT2020 = 6 => "BT.2020",
        BT2020ConstLum = 7 => "BT.2020 constant luminance",
        SMPTE240M = 8 => "SMPTE 240M",
    }
}

v4l2_enum! {
    /// Hue encoding of HSV formats
    HsvEncoding {
        /// hue mapped to 0-179
        Hue180 = 128 => "HSV 180",
        /// hue mapped to 0-255
        Hue256 = 129 => "HSV 256",
    }
}

/// The encoding field, which holds an HSV encoding for HSV formats and a Y'CbCr one otherwise
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Encoding {
    YCbCr(YCbCrEncoding),
    Hsv(HsvEncoding),
}

impl Encoding {
    pub fn code(self) -> u32 {
        match self {
            Encoding::YCbCr(enc) => enc as u32,
            Encoding::Hsv(enc) => enc as u32,
        }
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::YCbCr(YCbCrEncoding::Default)
    }
}

impl TryFrom<u32> for Encoding {
    type Error = ();

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        YCbCrEncoding::try_from(code)
            .map(Encoding::YCbCr)
            .or_else(|_| HsvEncoding::try_from(code).map(Encoding::Hsv))
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::YCbCr(enc) => write!(f, "{}", enc),
            Encoding::Hsv(enc) => write!(f, "{}", enc),
        }
    }
}

v4l2_enum! {
    /// Quantization range
    Quantization {
        /// default for the colorspace
        Default = 0 => "default",
        /// 0 goes to 0 and 1 goes to 255
        FullRange = 1 => "full range",
        /// 0 goes to 16 and 1 goes to 235
        LimitedRange = 2 => "limited range",
    }
}

v4l2_enum! {
    /// Transfer function for the colorspace
    TransferFunction {
        Default = 0 => "default transfer function",
        Rec709 = 1 => "Rec. 709 transfer function",
        SRGB = 2 => "sRGB transfer function",
        OPRGB = 3 => "opRGB transfer function",
        SMPTE240M = 4 => "SMPTE 240M transfer function",
        None = 5 => "no transfer function",
        DCIP3 = 6 => "DCI-P3 transfer function",
        SMPTE2084 = 7 => "SMPTE 2084 transfer function",
    }
}

/// Complete colorimetry of a format
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Colorimetry {
    pub colorspace: Colorspace,
    pub encoding: Encoding,
    pub quantization: Quantization,
    pub transfer: TransferFunction,
}

impl Default for Colorimetry {
    fn default() -> Self {
        Colorimetry {
            colorspace: Colorspace::Default,
            encoding: Encoding::default(),
            quantization: Quantization::Default,
            transfer: TransferFunction::Default,
        }
    }
}

impl fmt::Display for Colorimetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            self.colorspace, self.encoding, self.quantization, self.transfer
        )
    }
}
