//! Closed table of pixel formats selectable by name.
//!
//! Every format is known by its four character code. Some also carry the human readable names
//! drivers report through VIDIOC_ENUM_FMT, which resolve to the same code.

use crate::error::{Error, Result};
use crate::format::FourCC;

/// One selectable pixel format
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Entry {
    pub fourcc: FourCC,
    /// Canonical name, always the four character code itself
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Number of separately allocated memory planes
    pub mem_planes: u8,
}

const fn entry(
    code: &'static [u8; 4],
    name: &'static str,
    aliases: &'static [&'static str],
    mem_planes: u8,
) -> Entry {
    Entry {
        fourcc: FourCC::new(code),
        name,
        aliases,
        mem_planes,
    }
}

#[rustfmt::skip]
pub const ENTRIES: &[Entry] = &[
    entry(b"YVU9", "YVU9", &["YUV9", "YVU 4:1:0"],                      1),
    entry(b"YV12", "YV12", &["YVU 4:2:0"],                              1),
    entry(b"YU12", "YU12", &["YUV 4:2:0", "I420"],                      1),
    entry(b"YUYV", "YUYV", &["YUV 4:2:2", "YUY2"],                      1),
    entry(b"UYVY", "UYVY", &["UYVY 4:2:2"],                             1),
    entry(b"422P", "422P", &["YVU422 planar", "YVU422P"],               1),
    entry(b"NV12", "NV12", &["Y/UV 4:2:0"],                             1),
    entry(b"NV21", "NV21", &["Y/VU 4:2:0"],                             1),
    entry(b"NM12", "NM12", &["Y/CbCr 4:2:0"],                           2),
    entry(b"NM21", "NM21", &["Y/CrCb 4:2:0"],                           2),
    entry(b"YM12", "YM12", &["Planar YUV 4:2:0 (N-C)"],                 3),
    entry(b"GREY", "GREY", &["8-bit Greyscale"],                        1),
    entry(b"RGB3", "RGB3", &["24-bit RGB 8-8-8"],                       1),
    entry(b"BGR3", "BGR3", &["24-bit BGR 8-8-8"],                       1),
    entry(b"AR24", "AR24", &["32-bit BGRA 8-8-8-8"],                    1),
    entry(b"MJPG", "MJPG", &["Motion-JPEG"],                            1),
    entry(b"JPEG", "JPEG", &["JFIF JPEG"],                              1),
    entry(b"H264", "H264", &["H.264"],                                  1),
    entry(b"HEVC", "HEVC", &["H.265"],                                  1),
    entry(b"VP80", "VP80", &["VP8"],                                    1),
];

/// Resolves a format name or alias to its code
///
/// # Example
///
/// ```
/// use v4l2_mmap::format::{catalog, FourCC};
///
/// assert_eq!(catalog::resolve("YUV 4:2:2").unwrap(), FourCC::new(b"YUYV"));
/// assert!(catalog::resolve("ZZZZ").is_err());
/// ```
pub fn resolve(name: &str) -> Result<FourCC> {
    ENTRIES
        .iter()
        .find(|e| e.name == name || e.aliases.contains(&name))
        .map(|e| e.fourcc)
        .ok_or_else(|| Error::UnknownFormat(name.to_string()))
}

/// Returns the canonical name of a code
pub fn describe(fourcc: FourCC) -> Result<&'static str> {
    lookup(fourcc)
        .map(|e| e.name)
        .ok_or_else(|| Error::UnknownFormat(fourcc.to_string()))
}

pub fn lookup(fourcc: FourCC) -> Option<&'static Entry> {
    ENTRIES.iter().find(|e| e.fourcc == fourcc)
}
