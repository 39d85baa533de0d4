use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::buffer::{self, Descriptor, State};
use crate::codec::{self, BufferRecord, RequestBuffers};
use crate::device::{Driver, Waker};
use crate::error::{Error, Result};
use crate::format::MAX_PLANES;
use crate::io::stream::StreamState;
use crate::memory::{MappedRegion, Memory};
use crate::session::Claim;
use crate::v4l2::layout::Layout;
use crate::v4l2::vidioc::Request;

/// Most buffers a queue can hold (VIDEO_MAX_FRAME)
pub const MAX_BUFFERS: u32 = 32;

/// One buffer of the pool
#[derive(Debug)]
pub(crate) struct Slot {
    pub desc: Descriptor,
    pub state: State,
    pub regions: Vec<MappedRegion>,
}

/// Buffers of one queue, allocated and mapped in device memory
///
/// The valid buffer indices are exactly `0..len()` as granted by the driver. Dropping the pool
/// stops streaming, unmaps every region and frees the buffers, logging instead of failing.
pub struct Pool<D: Driver> {
    pub(crate) driver: Arc<D>,
    pub(crate) layout: Layout,
    pub(crate) typ: buffer::Type,
    pub(crate) planes: usize,
    pub(crate) slots: Vec<Slot>,
    pub(crate) mapped: bool,
    pub(crate) state: StreamState,
    /// Buffer handed out by the last capture, requeued on the next one
    pub(crate) held: Option<u32>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) waker: Option<Arc<Waker>>,
    claim: Option<Claim>,
}

// Mapped regions are only reachable through the pool, which is never shared.
unsafe impl<D: Driver + Send + Sync> Send for Pool<D> {}

impl<D: Driver> Pool<D> {
    /// Requests `count` memory-mapped buffers and queries every granted one
    ///
    /// The driver may grant fewer buffers than requested. Granting none is reported as
    /// [`Error::OutOfResources`].
    ///
    /// # Arguments
    ///
    /// * `driver` - Device the buffers belong to
    /// * `layout` - Record layout of the session
    /// * `typ` - Buffer type of the queue
    /// * `planes` - Plane count of the negotiated format, 1 for single-planar types
    /// * `count` - Number of buffers to request
    pub fn allocate(
        driver: Arc<D>,
        layout: Layout,
        typ: buffer::Type,
        planes: usize,
        count: u32,
    ) -> Result<Self> {
        if count == 0 {
            return Err(Error::OutOfResources { requested: 0 });
        }
        let planes = if typ.is_multiplanar() { planes } else { 1 };
        if planes == 0 || planes > MAX_PLANES {
            return Err(Error::violation(format!(
                "{} planes per buffer are not supported",
                planes
            )));
        }

        let mut pool = Pool {
            driver,
            layout,
            typ,
            planes,
            slots: Vec::new(),
            mapped: false,
            state: StreamState::Idle,
            held: None,
            timeout: None,
            waker: None,
            claim: None,
        };

        let granted = pool.request(count)?;
        debug!("{}: requested {} buffers, granted {}", typ, count, granted);
        if granted == 0 {
            return Err(Error::OutOfResources { requested: count });
        }

        // from here on, dropping the pool frees the buffers again
        pool.slots.reserve(granted as usize);
        for index in 0..granted {
            if index >= MAX_BUFFERS {
                return Err(Error::violation(format!(
                    "driver granted {} buffers, at most {} exist",
                    granted, MAX_BUFFERS
                )));
            }
            let desc = pool.query(index)?;
            pool.slots.push(Slot {
                desc,
                state: State::Queried,
                regions: Vec::new(),
            });
        }

        Ok(pool)
    }

    pub(crate) fn with_claim(mut self, claim: Claim) -> Self {
        self.claim = Some(claim);
        self
    }

    fn request(&self, count: u32) -> Result<u32> {
        let reqbufs = RequestBuffers::new(self.typ, Memory::Mmap, count);
        let granted = codec::transact(
            &*self.driver,
            &self.layout,
            Request::VIDIOC_REQBUFS,
            &reqbufs,
            (),
        )?;
        Ok(granted.count)
    }

    /// Reads placement and state of buffer `index` from the driver
    ///
    /// Multi-planar buffers must report exactly as many planes as the negotiated format has.
    pub fn query(&self, index: u32) -> Result<Descriptor> {
        let mut record =
            BufferRecord::new(&self.layout, self.typ, Memory::Mmap, index, self.planes)?;
        codec::exchange(
            &*self.driver,
            &self.layout,
            Request::VIDIOC_QUERYBUF,
            &mut record.main,
        )?;
        let desc = record.decode(&self.layout)?;

        if desc.index != index {
            return Err(Error::violation(format!(
                "queried buffer {} but driver answered for {}",
                index, desc.index
            )));
        }
        if desc.planes.len() != self.planes {
            return Err(Error::violation(format!(
                "buffer {} has {} planes, the format has {}",
                index,
                desc.planes.len(),
                self.planes
            )));
        }
        Ok(desc)
    }

    /// Maps every plane of every buffer
    ///
    /// If any mapping fails, the regions mapped so far are unmapped before the error is
    /// returned.
    pub fn map_all(&mut self) -> Result<()> {
        if self.mapped {
            return Err(Error::violation("buffers are already mapped"));
        }

        if let Err(e) = self.map_slots() {
            self.unmap_slots();
            return Err(e);
        }

        self.mapped = true;
        debug!(
            "{}: mapped {} buffers with {} planes each",
            self.typ,
            self.slots.len(),
            self.planes
        );
        Ok(())
    }

    fn map_slots(&mut self) -> Result<()> {
        for slot in self.slots.iter_mut() {
            let index = slot.desc.index;
            for (i, plane) in slot.desc.planes.iter().enumerate() {
                let offset = plane.location.offset().ok_or_else(|| {
                    Error::violation(format!(
                        "plane {} of buffer {} has no memory offset",
                        i, index
                    ))
                })?;
                let len = plane.length as usize;
                let ptr = self
                    .driver
                    .map(offset, len)
                    .map_err(|source| Error::MapFailed {
                        index,
                        plane: i,
                        source,
                    })?;
                slot.regions
                    .push(unsafe { MappedRegion::new(ptr, len, offset) });
            }
        }
        Ok(())
    }

    /// Unmaps whatever is mapped, returns the first failure after trying every region
    fn unmap_slots(&mut self) -> Option<std::io::Error> {
        let mut first = None;
        for slot in self.slots.iter_mut() {
            for region in slot.regions.drain(..) {
                let res = unsafe { self.driver.unmap(region.as_ptr(), region.len()) };
                if let Err(e) = res {
                    warn!(
                        "failed to unmap buffer {} at offset {:#x}: {}",
                        slot.desc.index,
                        region.offset(),
                        e
                    );
                    first.get_or_insert(e);
                }
            }
        }
        first
    }

    /// Unmaps every region
    ///
    /// Not allowed while streaming, since the driver may still write into the regions.
    pub fn unmap_all(&mut self) -> Result<()> {
        if !self.mapped {
            return Err(Error::violation("buffers are not mapped"));
        }
        if self.state == StreamState::Streaming {
            return Err(Error::violation("cannot unmap buffers while streaming"));
        }

        self.mapped = false;
        self.held = None;
        match self.unmap_slots() {
            Some(e) => Err(Error::Io(e)),
            None => {
                debug!("{}: unmapped all buffers", self.typ);
                Ok(())
            }
        }
    }

    /// Number of buffers granted by the driver
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn buffer_type(&self) -> buffer::Type {
        self.typ
    }

    /// Planes per buffer
    pub fn plane_count(&self) -> usize {
        self.planes
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Number of mapped regions, one per (buffer, plane) pair while mapped
    pub fn region_count(&self) -> usize {
        self.slots.iter().map(|s| s.regions.len()).sum()
    }

    /// Placement of buffer `index` as last reported by the driver
    pub fn descriptor(&self, index: u32) -> Option<&Descriptor> {
        self.slots.get(index as usize).map(|s| &s.desc)
    }

    /// Local ownership state of buffer `index`
    pub fn buffer_state(&self, index: u32) -> Option<State> {
        self.slots.get(index as usize).map(|s| s.state)
    }

    /// Where one plane is mapped
    ///
    /// The region only describes the mapping, its bytes are reached through [`Pool::data`] and
    /// [`Pool::data_mut`] which check buffer ownership.
    pub fn region(&self, index: u32, plane: usize) -> Option<&MappedRegion> {
        self.slots.get(index as usize)?.regions.get(plane)
    }

    /// Valid prefix of a dequeued plane
    ///
    /// Bytes beyond the bytes-used count are left over from earlier cycles, so they are not
    /// part of the returned slice. Buffers that are not dequeued have no valid data.
    pub fn data(&self, index: u32, plane: usize) -> Option<&[u8]> {
        let slot = self.slots.get(index as usize)?;
        if slot.state != State::Dequeued {
            return None;
        }
        let region = slot.regions.get(plane)?;
        let used = slot.desc.planes.get(plane)?.bytes_used as usize;
        Some(&region.as_slice()[..used.min(region.len())])
    }

    /// Writable plane of a buffer the application owns, for filling output buffers
    pub fn data_mut(&mut self, index: u32, plane: usize) -> Option<&mut [u8]> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.state == State::Queued {
            return None;
        }
        slot.regions.get_mut(plane).map(|r| r.as_mut_slice())
    }

    /// Frees all buffers of the queue (REQBUFS with a count of zero)
    fn release(&mut self) -> Result<()> {
        self.request(0)?;
        self.slots.clear();
        debug!("{}: released buffers", self.typ);
        Ok(())
    }
}

impl<D: Driver> Drop for Pool<D> {
    fn drop(&mut self) {
        if self.state == StreamState::Streaming || self.in_flight() > 0 {
            if let Err(e) = self.stream_off() {
                warn!("{}: failed to stop streaming: {}", self.typ, e);
            }
        }
        if self.mapped {
            self.state = StreamState::Idle;
            if let Err(e) = self.unmap_all() {
                warn!("{}: {}", self.typ, e);
            }
        }
        if let Err(e) = self.release() {
            warn!("{}: failed to free buffers: {}", self.typ, e);
        }
    }
}
