//! Raw control-plane access: syscall wrappers, request codes and record layouts.

mod api;
pub use api::*;

pub mod layout;
pub mod record;
pub mod vidioc;
