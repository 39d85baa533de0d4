//! Memory-mapped streaming I/O for video4linux devices.
//!
//! This crate drives the V4L2 streaming protocol without bindgen bindings: every request and
//! response record is encoded from a per-kernel, per-ABI offset table, so the same binary
//! talks to 32-bit and 64-bit kernels alike.
//!
//! The typical flow is to open a [`Session`], negotiate a format, allocate and map a
//! [`Pool`] of buffers and then capture frames from it:
//!
//! ```no_run
//! use v4l2_mmap::buffer::Type;
//! use v4l2_mmap::{capability, Session};
//!
//! let mut session = Session::open("/dev/video0").expect("failed to open device");
//! session
//!     .require(capability::Flags::VIDEO_CAPTURE | capability::Flags::STREAMING)
//!     .expect("not a streaming capture device");
//!
//! session.negotiate(Type::VideoCapture, 800, 600, "YUYV").unwrap();
//! let mut pool = session.allocate_and_map(Type::VideoCapture, 4).unwrap();
//!
//! for _ in 0..10 {
//!     let (frame, meta) = pool.capture().unwrap();
//!     println!("frame {}: {} bytes", meta.seq, frame.len());
//! }
//! ```
//!
//! Everything that touches the device goes through the [`device::Driver`] trait, which makes
//! it possible to run the whole buffer protocol against an in-process driver.

pub mod v4l2;

pub mod buffer;
pub mod capability;
pub use capability::Capabilities;

pub mod codec;
pub mod control;
pub mod crop;
pub mod device;

mod error;
pub use error::{Error, Result};

pub mod event;
pub mod format;
pub use format::FourCC;

mod fraction;
pub use fraction::Fraction;

pub mod io;
pub use io::{Pool, Stream};

pub mod memory;
pub use memory::Memory;

pub mod parameters;
pub mod pipeline;

pub mod session;
pub use session::{Options, Session};

mod timestamp;
pub use timestamp::Timestamp;
