//! Control-plane codec.
//!
//! Every request or response record exchanged with a driver has a typed counterpart here. A
//! [`Message`] knows how large its record is under a given [`Layout`] and how to move its fields
//! to and from the record bytes. Union payloads are shaped by a context value the caller already
//! knows (usually the buffer type), never by a value read back from the driver.
//!
//! Records that reference side arrays through a pointer (multi-planar buffers, extended
//! controls) are built as compound records which own the side array next to the main record, so
//! the embedded address stays valid for as long as the record itself.

use std::convert::TryFrom;

use log::trace;

use crate::device::Driver;
use crate::error::{Error, Result};
use crate::v4l2::layout::Layout;
use crate::v4l2::record::Record;
use crate::v4l2::vidioc::Request;

pub mod buffer;
pub mod capability;
pub mod control;
pub mod crop;
pub mod event;
pub mod format;
pub mod parameters;

pub use buffer::{BufferRecord, RequestBuffers};
pub use control::{ExtControl, ExtControlsRecord, MenuEntry, QueryCtrl, QueryExtCtrl};

/// A typed control-plane record
pub trait Message: Sized {
    /// Caller-known value selecting the shape of union payloads
    type Context: Copy;

    /// Size of the record under `layout`
    fn size(layout: &Layout) -> usize;

    /// Writes every field of `self` into a zeroed `record`
    fn encode(&self, layout: &Layout, ctx: Self::Context, record: &mut Record) -> Result<()>;

    /// Reads a typed value back from `record`
    fn decode(layout: &Layout, ctx: Self::Context, record: &Record) -> Result<Self>;

    /// Returns a fresh record holding `self`
    fn to_record(&self, layout: &Layout, ctx: Self::Context) -> Result<Record> {
        let mut record = Record::new(Self::size(layout));
        self.encode(layout, ctx, &mut record)?;
        Ok(record)
    }
}

/// Decodes a closed enumeration, reporting unknown values as contract violations
pub(crate) fn discriminant<T>(field: &'static str, value: u32) -> Result<T>
where
    T: TryFrom<u32, Error = ()>,
{
    T::try_from(value).map_err(|_| Error::InvalidDiscriminant { field, value })
}

/// Performs one request/response exchange with the driver
///
/// The record is updated in place with whatever the driver wrote back.
pub(crate) fn exchange<D: Driver + ?Sized>(
    driver: &D,
    layout: &Layout,
    request: Request,
    record: &mut Record,
) -> Result<()> {
    let code = request.code(layout);
    if record.len() != request.record_size(layout) {
        return Err(Error::violation(format!(
            "{} record is {} bytes, expected {}",
            request,
            record.len(),
            request.record_size(layout)
        )));
    }

    trace!("{} ({:#x})", request, code.raw);
    // records are built by this crate, embedded addresses point into allocations the caller
    // keeps alive across the exchange
    let res = unsafe { driver.ioctl(code, record.as_bytes_mut()) };
    res.map_err(|e| Error::ioctl(request, e))
}

/// Encodes `msg`, exchanges it and decodes the response
pub(crate) fn transact<D, M>(
    driver: &D,
    layout: &Layout,
    request: Request,
    msg: &M,
    ctx: M::Context,
) -> Result<M>
where
    D: Driver + ?Sized,
    M: Message,
{
    let mut record = msg.to_record(layout, ctx)?;
    exchange(driver, layout, request, &mut record)?;
    M::decode(layout, ctx, &record)
}

/// Buffer type word of VIDIOC_STREAMON/VIDIOC_STREAMOFF
impl Message for crate::buffer::Type {
    type Context = ();

    fn size(_layout: &Layout) -> usize {
        4
    }

    fn encode(&self, _layout: &Layout, _ctx: (), record: &mut Record) -> Result<()> {
        record.put_u32(0, *self as u32);
        Ok(())
    }

    fn decode(_layout: &Layout, _ctx: (), record: &Record) -> Result<Self> {
        discriminant("buffer type", record.u32(0))
    }
}
