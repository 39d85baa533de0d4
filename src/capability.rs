use std::fmt;

bitflags::bitflags! {
    /// Capability flags such as V4L2_CAP_VIDEO_CAPTURE
    #[allow(clippy::unreadable_literal)]
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Flags: u32 {
        const VIDEO_CAPTURE         = 0x00000001;
        const VIDEO_OUTPUT          = 0x00000002;
        const VIDEO_OVERLAY         = 0x00000004;
        const VBI_CAPTURE           = 0x00000010;
        const VBI_OUTPUT            = 0x00000020;
        const SLICED_VBI_CAPTURE    = 0x00000040;
        const SLICED_VBI_OUTPUT     = 0x00000080;
        const RDS_CAPTURE           = 0x00000100;
        const VIDEO_OUTPUT_OVERLAY  = 0x00000200;
        const HW_FREQ_SEEK          = 0x00000400;
        const RDS_OUTPUT            = 0x00000800;

        const VIDEO_CAPTURE_MPLANE  = 0x00001000;
        const VIDEO_OUTPUT_MPLANE   = 0x00002000;
        const VIDEO_M2M_MPLANE      = 0x00004000;
        const VIDEO_M2M             = 0x00008000;

        const TUNER                 = 0x00010000;
        const AUDIO                 = 0x00020000;
        const RADIO                 = 0x00040000;
        const MODULATOR             = 0x00080000;

        const SDR_CAPTURE           = 0x00100000;
        const EXT_PIX_FORMAT        = 0x00200000;
        const SDR_OUTPUT            = 0x00400000;
        const META_CAPTURE          = 0x00800000;

        const READ_WRITE            = 0x01000000;
        const ASYNC_IO              = 0x02000000;
        const STREAMING             = 0x04000000;
        const META_OUTPUT           = 0x08000000;

        const TOUCH                 = 0x10000000;
        const IO_MC                 = 0x20000000;

        const DEVICE_CAPS           = 0x80000000;
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

const NAMES: &[(Flags, &str)] = &[
    (Flags::VIDEO_CAPTURE, "Video Capture"),
    (Flags::VIDEO_CAPTURE_MPLANE, "Video Capture Multiplanar"),
    (Flags::VIDEO_OUTPUT, "Video Output"),
    (Flags::VIDEO_OUTPUT_MPLANE, "Video Output Multiplanar"),
    (Flags::VIDEO_M2M, "Video Memory-to-Memory"),
    (Flags::VIDEO_M2M_MPLANE, "Video Memory-to-Memory Multiplanar"),
    (Flags::VIDEO_OVERLAY, "Video Overlay"),
    (Flags::VIDEO_OUTPUT_OVERLAY, "Video Output Overlay"),
    (Flags::VBI_CAPTURE, "VBI Capture"),
    (Flags::VBI_OUTPUT, "VBI Output"),
    (Flags::SLICED_VBI_CAPTURE, "Sliced VBI Capture"),
    (Flags::SLICED_VBI_OUTPUT, "Sliced VBI Output"),
    (Flags::RDS_CAPTURE, "RDS Capture"),
    (Flags::RDS_OUTPUT, "RDS Output"),
    (Flags::SDR_CAPTURE, "SDR Capture"),
    (Flags::SDR_OUTPUT, "SDR Output"),
    (Flags::META_CAPTURE, "Metadata Capture"),
    (Flags::META_OUTPUT, "Metadata Output"),
    (Flags::TUNER, "Tuner"),
    (Flags::TOUCH, "Touch Device"),
    (Flags::HW_FREQ_SEEK, "HW Frequency Seek"),
    (Flags::MODULATOR, "Modulator"),
    (Flags::AUDIO, "Audio"),
    (Flags::RADIO, "Radio"),
    (Flags::READ_WRITE, "Read/Write"),
    (Flags::ASYNC_IO, "Async I/O"),
    (Flags::STREAMING, "Streaming"),
    (Flags::EXT_PIX_FORMAT, "Extended Pix Format"),
    (Flags::IO_MC, "I/O Media Controller"),
    (Flags::DEVICE_CAPS, "Device Capabilities"),
];

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefix = "";
        let mut rest = *self;

        for (flag, name) in NAMES {
            if rest.contains(*flag) {
                write!(f, "{}{}", prefix, name)?;
                prefix = ", ";
                // remove from input flags so we can know about flags we do not recognize
                rest.remove(*flag);
            }
        }

        if !rest.is_empty() {
            write!(f, "{}{:#x}", prefix, rest.bits())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device capabilities, read once after opening a device
pub struct Capabilities {
    /// Driver name, e.g. uvc for usb video class devices
    pub driver: String,
    /// Card name
    pub card: String,
    /// Bus name, e.g. USB or PCI
    pub bus: String,
    /// Kernel version as KERNEL_VERSION(MAJOR, MINOR, PATCH)
    pub version: u32,

    /// Capabilities of the physical device as a whole
    pub capabilities: Flags,
    /// Capabilities of the opened device node
    pub device_caps: Flags,
}

impl Capabilities {
    /// Version number MAJOR.MINOR.PATCH
    pub fn version_triple(&self) -> (u8, u8, u8) {
        (
            ((self.version >> 16) & 0xff) as u8,
            ((self.version >> 8) & 0xff) as u8,
            (self.version & 0xff) as u8,
        )
    }

    /// Capabilities of the opened node, falling back to the device wide set for drivers that do
    /// not fill in per-node capabilities
    pub fn effective(&self) -> Flags {
        if self.capabilities.contains(Flags::DEVICE_CAPS) {
            self.device_caps
        } else {
            self.capabilities
        }
    }

    /// Whether all `required` bits are present on the opened node
    pub fn supports(&self, required: Flags) -> bool {
        self.effective().contains(required)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self.version_triple();
        writeln!(f, "Driver      : {}", self.driver)?;
        writeln!(f, "Card        : {}", self.card)?;
        writeln!(f, "Bus         : {}", self.bus)?;
        writeln!(f, "Version     : {}.{}.{}", version.0, version.1, version.2)?;
        writeln!(f, "Capabilites : {}", self.effective())?;
        Ok(())
    }
}
