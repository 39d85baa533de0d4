use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::buffer::{Metadata, State};
use crate::codec::{self, BufferRecord, Message};
use crate::device::{Driver, Readiness, Waker};
use crate::error::{Error, Result};
use crate::io::pool::Pool;
use crate::io::traits::Stream;
use crate::memory::Memory;
use crate::v4l2::vidioc::Request;

/// Streaming state of a queue
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamState::Idle => write!(f, "idle"),
            StreamState::Streaming => write!(f, "streaming"),
        }
    }
}

/// A buffer returned by the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dequeued {
    pub index: u32,
    /// Valid prefix of each plane for this cycle
    pub bytes_used: Vec<u32>,
    pub meta: Metadata,
}

impl<D: Driver> Pool<D> {
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of buffers currently owned by the driver
    pub fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state == State::Queued)
            .count()
    }

    /// Bounds every blocking dequeue, `None` waits indefinitely
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Installs a waker which interrupts [`Pool::wait`]
    pub fn set_waker(&mut self, waker: Option<Arc<Waker>>) {
        self.waker = waker;
    }

    /// Starts streaming
    ///
    /// Capture-class queues need at least one queued buffer. On failure the queue stays idle.
    pub fn stream_on(&mut self) -> Result<()> {
        if self.state == StreamState::Streaming {
            return Err(Error::violation(format!("{} is already streaming", self.typ)));
        }
        if self.typ.is_capture() && self.in_flight() == 0 {
            return Err(Error::violation(format!(
                "no buffers queued on {} before streaming",
                self.typ
            )));
        }

        let mut record = self.typ.to_record(&self.layout, ())?;
        codec::exchange(
            &*self.driver,
            &self.layout,
            Request::VIDIOC_STREAMON,
            &mut record,
        )?;
        self.state = StreamState::Streaming;
        debug!("{}: stream on ({} queued)", self.typ, self.in_flight());
        Ok(())
    }

    /// Stops streaming and takes back every in-flight buffer
    ///
    /// Without streaming and without queued buffers this is a no-op.
    pub fn stream_off(&mut self) -> Result<()> {
        if self.state == StreamState::Idle && self.in_flight() == 0 {
            trace!("{}: stream off, nothing to do", self.typ);
            return Ok(());
        }

        let mut record = self.typ.to_record(&self.layout, ())?;
        codec::exchange(
            &*self.driver,
            &self.layout,
            Request::VIDIOC_STREAMOFF,
            &mut record,
        )?;
        for slot in self.slots.iter_mut() {
            slot.state = State::Queried;
        }
        self.state = StreamState::Idle;
        self.held = None;
        debug!("{}: stream off", self.typ);
        Ok(())
    }

    /// Hands buffer `index` to the driver
    ///
    /// Output buffers are submitted with every plane full, see [`Pool::enqueue_with`] to
    /// submit shorter payloads.
    pub fn enqueue(&mut self, index: u32) -> Result<()> {
        self.enqueue_with(index, None)
    }

    /// Hands buffer `index` to the driver, declaring `bytes_used` per plane for output queues
    pub fn enqueue_with(&mut self, index: u32, bytes_used: Option<&[u32]>) -> Result<()> {
        let output = self.typ.is_output();
        let slot = self.slots.get(index as usize).ok_or_else(|| {
            Error::violation(format!(
                "buffer {} does not exist, the pool has {}",
                index,
                self.slots.len()
            ))
        })?;
        if slot.state == State::Queued {
            return Err(Error::violation(format!(
                "buffer {} is already queued",
                index
            )));
        }

        let mut desc = slot.desc.clone();
        desc.flags = crate::buffer::Flags::empty();
        desc.request_fd = None;
        for (i, plane) in desc.planes.iter_mut().enumerate() {
            plane.bytes_used = match (output, bytes_used) {
                (false, _) => 0,
                (true, Some(used)) => used.get(i).copied().unwrap_or(0),
                (true, None) => plane.length,
            };
            if plane.bytes_used > plane.length {
                return Err(Error::violation(format!(
                    "{} bytes do not fit plane {} of buffer {}",
                    plane.bytes_used, i, index
                )));
            }
        }

        let mut record = BufferRecord::encode(&self.layout, &desc)?;
        codec::exchange(
            &*self.driver,
            &self.layout,
            Request::VIDIOC_QBUF,
            &mut record.main,
        )?;

        let slot = &mut self.slots[index as usize];
        slot.state = State::Queued;
        for (stored, queued) in slot.desc.planes.iter_mut().zip(desc.planes.iter()) {
            stored.bytes_used = queued.bytes_used;
        }
        if self.held == Some(index) {
            self.held = None;
        }
        trace!("{}: queued buffer {}", self.typ, index);
        Ok(())
    }

    /// Waits until a buffer can be dequeued or the waker is triggered
    ///
    /// An elapsed timeout is reported as [`Error::Timeout`], which is retryable.
    pub fn wait(&self) -> Result<Readiness> {
        let readiness = self
            .driver
            .wait(self.typ.interest(), self.timeout, self.waker.as_deref())?;
        match readiness {
            Readiness::TimedOut => Err(Error::Timeout),
            readiness => Ok(readiness),
        }
    }

    /// Takes back a completed buffer from the driver
    ///
    /// Blocking handles wait for completion, bounded by the pool timeout. Non-blocking handles
    /// report [`Error::WouldBlock`] instead. Only buffers queued earlier are ever returned.
    pub fn dequeue(&mut self) -> Result<Dequeued> {
        if self.driver.is_nonblocking() {
            if self.in_flight() == 0 {
                return Err(Error::WouldBlock);
            }
        } else if self.timeout.is_some() || self.in_flight() == 0 {
            match self.driver.wait(self.typ.interest(), self.timeout, None)? {
                Readiness::TimedOut => return Err(Error::Timeout),
                Readiness::Woken => return Err(Error::WouldBlock),
                Readiness::Ready { .. } => {}
            }
        }

        let mut record =
            BufferRecord::new(&self.layout, self.typ, Memory::Mmap, 0, self.planes)?;
        let res = codec::exchange(
            &*self.driver,
            &self.layout,
            Request::VIDIOC_DQBUF,
            &mut record.main,
        );
        match res {
            Err(ref e) if e.errno() == Some(libc::EAGAIN) => return Err(Error::WouldBlock),
            res => res?,
        }
        let desc = record.decode(&self.layout)?;

        let index = desc.index;
        let slot = match self.slots.get_mut(index as usize) {
            Some(slot) if slot.state == State::Queued => slot,
            _ => {
                return Err(Error::violation(format!(
                    "driver returned buffer {} which was not queued",
                    index
                )))
            }
        };

        let mut bytes_used = Vec::with_capacity(desc.planes.len());
        for (stored, done) in slot.desc.planes.iter_mut().zip(desc.planes.iter()) {
            let mut used = done.bytes_used;
            if used > stored.length {
                warn!(
                    "buffer {}: driver used {} of {} bytes, clamping",
                    index, used, stored.length
                );
                used = stored.length;
            }
            stored.bytes_used = used;
            stored.data_offset = done.data_offset;
            bytes_used.push(used);
        }
        slot.desc.flags = desc.flags;
        slot.desc.field = desc.field;
        slot.desc.timestamp = desc.timestamp;
        slot.desc.timecode = desc.timecode;
        slot.desc.sequence = desc.sequence;
        slot.state = State::Dequeued;

        trace!(
            "{}: dequeued buffer {} (seq {}, {:?} bytes)",
            self.typ,
            index,
            desc.sequence,
            bytes_used
        );
        Ok(Dequeued {
            index,
            bytes_used,
            meta: Metadata::from(&slot.desc),
        })
    }

    /// Returns the next captured frame
    ///
    /// On first use every buffer is queued and streaming starts. The buffer returned by the
    /// previous call is handed back to the driver before waiting for the next one, so the
    /// returned slice is valid until the next call. Callers that need the data longer must copy
    /// it.
    pub fn capture(&mut self) -> Result<(&[u8], Metadata)> {
        if !self.typ.is_capture() {
            return Err(Error::violation(format!(
                "{} is not a capture queue",
                self.typ
            )));
        }
        if !self.mapped {
            return Err(Error::violation("buffers must be mapped before capturing"));
        }

        if self.state == StreamState::Idle {
            for index in 0..self.slots.len() as u32 {
                if self.slots[index as usize].state != State::Queued {
                    self.enqueue(index)?;
                }
            }
            self.stream_on()?;
        } else if let Some(index) = self.held {
            // stays held until the driver accepts it again
            self.enqueue(index)?;
        }

        let done = self.dequeue()?;
        self.held = Some(done.index);
        let data = self.data(done.index, 0).unwrap_or(&[]);
        Ok((data, done.meta))
    }
}

impl<D: Driver> Stream for Pool<D> {
    fn start(&mut self) -> Result<()> {
        self.stream_on()
    }

    fn stop(&mut self) -> Result<()> {
        self.stream_off()
    }
}
