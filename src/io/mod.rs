//! Memory-mapped streaming I/O.
//!
//! A [`Pool`] owns the buffers of one queue: it requests them from the driver, maps every plane
//! into the address space of the process and cycles the buffers between application and driver
//! ownership. Mapped regions never outlive the pool.

pub mod pool;
pub use pool::Pool;

pub mod stream;
pub use stream::{Dequeued, StreamState};

pub mod traits;
pub use traits::Stream;
