use std::fmt;

use crate::fraction::Fraction;

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Capabilities: u32 {
        const TIME_PER_FRAME    = 0x1000;
    }
}

impl From<u32> for Capabilities {
    fn from(caps: u32) -> Self {
        Self::from_bits_retain(caps)
    }
}

impl From<Capabilities> for u32 {
    fn from(capabilities: Capabilities) -> Self {
        capabilities.bits()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

bitflags::bitflags! {
    #[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
    pub struct Modes: u32 {
        const HIGH_QUALITY      = 0x0001;
    }
}

impl From<u32> for Modes {
    fn from(modes: u32) -> Self {
        Self::from_bits_retain(modes)
    }
}

impl From<Modes> for u32 {
    fn from(modes: Modes) -> Self {
        modes.bits()
    }
}

impl fmt::Display for Modes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
/// Streaming parameters of a capture-class queue
pub struct CaptureParams {
    pub capabilities: Capabilities,
    pub modes: Modes,
    /// Time between two frames, inverse of the frame rate
    pub interval: Fraction,
    pub extended_mode: u32,
    /// Number of buffers for read(2) I/O
    pub read_buffers: u32,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
/// Streaming parameters of an output-class queue
pub struct OutputParams {
    pub capabilities: Capabilities,
    pub modes: Modes,
    /// Time between two frames, inverse of the frame rate
    pub interval: Fraction,
    pub extended_mode: u32,
    /// Number of buffers for write(2) I/O
    pub write_buffers: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::empty()
    }
}

impl Default for Modes {
    fn default() -> Self {
        Modes::empty()
    }
}

/// Streaming parameters, shaped by the class of the queue they belong to
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamParams {
    Capture(CaptureParams),
    Output(OutputParams),
}

impl StreamParams {
    /// Parameters requesting a frame interval of `interval`
    pub fn with_interval(output: bool, interval: Fraction) -> Self {
        if output {
            StreamParams::Output(OutputParams {
                interval,
                ..OutputParams::default()
            })
        } else {
            StreamParams::Capture(CaptureParams {
                interval,
                ..CaptureParams::default()
            })
        }
    }

    pub fn interval(&self) -> Fraction {
        match self {
            StreamParams::Capture(p) => p.interval,
            StreamParams::Output(p) => p.interval,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            StreamParams::Capture(p) => p.capabilities,
            StreamParams::Output(p) => p.capabilities,
        }
    }
}

impl fmt::Display for StreamParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "capabilities : {}", self.capabilities())?;
        match self.interval().fps() {
            Some(fps) => writeln!(f, "interval     : {} [s] ({:.2} fps)", self.interval(), fps)?,
            None => writeln!(f, "interval     : {} [s]", self.interval())?,
        }
        match self {
            StreamParams::Capture(p) => writeln!(f, "read buffers : {}", p.read_buffers),
            StreamParams::Output(p) => writeln!(f, "write buffers: {}", p.write_buffers),
        }
    }
}
