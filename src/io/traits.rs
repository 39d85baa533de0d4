use crate::error::Result;

/// Streaming I/O
pub trait Stream {
    /// Start streaming, the device takes ownership of all queued buffers
    fn start(&mut self) -> Result<()>;

    /// Stop streaming, every in-flight buffer is returned to the application
    fn stop(&mut self) -> Result<()>;
}
